//! Error taxonomy for API access.
//!
//! Only authentication failures abort a run. Everything else is scoped to
//! the single record being fetched: the caller logs it, skips the record and
//! keeps walking the collection.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// The record was deleted between listing and detail fetch.
    #[error("record not found at {path}")]
    NotFound { path: String },

    /// 5xx / 429 / timeout that survived every retry attempt.
    #[error("{path} still failing after {attempts} attempt(s): {reason}")]
    Transient {
        path: String,
        attempts: u32,
        reason: String,
    },

    /// Expired or rejected credentials. Fatal for the whole run.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Payload is not JSON or lacks a required key.
    #[error("malformed response from {path}: {reason}")]
    Malformed { path: String, reason: String },

    /// Any other non-success status.
    #[error("unexpected HTTP {status} from {path}")]
    Status { path: String, status: u16 },
}

impl ApiError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, ApiError::Auth(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound { .. })
    }
}

/// Turn a per-record failure into a skip.
///
/// Fatal errors propagate; `NotFound` is logged at info (an expected race with
/// deletions) and everything else at warn. `what` names the record, e.g.
/// `"package 42"`.
pub fn recover<T>(result: Result<T, ApiError>, what: &str) -> Result<Option<T>, ApiError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.is_fatal() => Err(err),
        Err(err @ ApiError::NotFound { .. }) => {
            tracing::info!("{what} no longer exists, skipping ({err})");
            Ok(None)
        }
        Err(err) => {
            tracing::warn!("skipping {what}: {err}");
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_auth_is_fatal() {
        assert!(ApiError::Auth("expired".into()).is_fatal());
        assert!(
            !ApiError::NotFound {
                path: "/x".into()
            }
            .is_fatal()
        );
        assert!(
            !ApiError::Transient {
                path: "/x".into(),
                attempts: 5,
                reason: "503".into()
            }
            .is_fatal()
        );
    }

    #[test]
    fn recover_skips_non_fatal() {
        let missing: Result<u8, _> = Err(ApiError::NotFound {
            path: "/JSSResource/packages/id/4".into(),
        });
        assert!(matches!(recover(missing, "package 4"), Ok(None)));

        let malformed: Result<u8, _> = Err(ApiError::Malformed {
            path: "/p".into(),
            reason: "missing field `name`".into(),
        });
        assert!(matches!(recover(malformed, "policy 1"), Ok(None)));

        assert!(matches!(recover(Ok(3u8), "x"), Ok(Some(3))));
    }

    #[test]
    fn recover_propagates_auth() {
        let denied: Result<u8, _> = Err(ApiError::Auth("401".into()));
        assert!(recover(denied, "policy 1").is_err());
    }
}
