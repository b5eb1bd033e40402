//! Bearer-token session.
//!
//! Collectors never see tokens. The transport asks [`Session::bearer`] before
//! each request, which refreshes proactively when the token is close to
//! expiry, and calls [`Session::force_refresh`] once when the server answers
//! 401 anyway.
//!
//! Only a 401 or 403 from the token endpoints is an [`ApiError::Auth`].
//! Throttling, gateway errors and dropped connections are retried with the
//! transport's [`RetryPolicy`] and end as [`ApiError::Transient`], which the
//! caller skips like any other per-record failure.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::header::{ACCEPT, RETRY_AFTER};
use reqwest::{Client, RequestBuilder, StatusCode};
use tokio::sync::Mutex;

use super::models::TokenResponse;
use super::retry::{RetryPolicy, parse_retry_after};
use crate::error::ApiError;

/// Lifetime assumed when the token response carries no `expires`.
const DEFAULT_TOKEN_LIFETIME_MINUTES: i64 = 20;

const TOKEN_PATH: &str = "/api/v1/auth/token";
const KEEP_ALIVE_PATH: &str = "/api/v1/auth/keep-alive";

#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

impl Token {
    pub fn from_response(response: TokenResponse, now: DateTime<Utc>) -> Self {
        let expires_at = response
            .expires
            .as_deref()
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|at| at.with_timezone(&Utc))
            .unwrap_or_else(|| now + chrono::Duration::minutes(DEFAULT_TOKEN_LIFETIME_MINUTES));
        Self {
            value: response.token,
            expires_at,
        }
    }
}

/// True when the token expires within `margin` of `now` (or already has).
pub fn needs_refresh(expires_at: DateTime<Utc>, now: DateTime<Utc>, margin: chrono::Duration) -> bool {
    expires_at - now <= margin
}

pub struct Session {
    client: Client,
    base_url: String,
    credentials: Credentials,
    refresh_margin: chrono::Duration,
    retry: RetryPolicy,
    token: Mutex<Option<Token>>,
}

/// One token exchange that did not produce a token.
enum Exchange {
    /// Worth another attempt, with an optional `Retry-After` hint.
    Retry(String, Option<Duration>),
    Failed(ApiError),
}

impl Session {
    pub fn new(
        client: Client,
        base_url: impl Into<String>,
        credentials: Credentials,
        refresh_margin: Duration,
        retry: RetryPolicy,
    ) -> Self {
        let refresh_margin = chrono::Duration::from_std(refresh_margin)
            .unwrap_or_else(|_| chrono::Duration::seconds(60));
        Self {
            client,
            base_url: base_url.into(),
            credentials,
            refresh_margin,
            retry,
            token: Mutex::new(None),
        }
    }

    /// Current bearer token, obtaining or renewing it as needed.
    pub async fn bearer(&self) -> Result<String, ApiError> {
        let mut guard = self.token.lock().await;
        if let Some(token) = guard.as_ref() {
            if !needs_refresh(token.expires_at, Utc::now(), self.refresh_margin) {
                return Ok(token.value.clone());
            }
        }

        let fresh = match guard.as_ref() {
            Some(current) => match self.keep_alive(&current.value).await {
                Ok(token) => token,
                Err(err) => {
                    tracing::warn!("token keep-alive failed ({err}), re-authenticating");
                    self.request_token().await?
                }
            },
            None => self.request_token().await?,
        };
        let value = fresh.value.clone();
        *guard = Some(fresh);
        Ok(value)
    }

    /// Replace a token the server rejected. If another request already
    /// replaced `stale`, the newer token is returned without a round-trip.
    pub async fn force_refresh(&self, stale: &str) -> Result<String, ApiError> {
        let mut guard = self.token.lock().await;
        if let Some(current) = guard.as_ref() {
            if current.value != stale {
                return Ok(current.value.clone());
            }
        }
        tracing::info!("bearer token rejected, requesting a new one");
        let fresh = self.request_token().await?;
        let value = fresh.value.clone();
        *guard = Some(fresh);
        Ok(value)
    }

    /// Invalidate the token at the end of a run. Failures are only logged.
    pub async fn invalidate(&self) {
        let Some(token) = self.token.lock().await.take() else {
            return;
        };
        let url = format!("{}/api/v1/auth/invalidate-token", self.base_url);
        match self.client.post(&url).bearer_auth(&token.value).send().await {
            Ok(resp) if resp.status().is_success() => {
                tracing::debug!("bearer token invalidated");
            }
            Ok(resp) => {
                tracing::warn!("token invalidation returned HTTP {}", resp.status());
            }
            Err(err) => tracing::warn!("token invalidation failed: {err}"),
        }
    }

    async fn request_token(&self) -> Result<Token, ApiError> {
        tracing::debug!("requesting bearer token for {}", self.credentials.username);
        self.with_retry(TOKEN_PATH, |url| {
            self.client
                .post(url)
                .basic_auth(&self.credentials.username, Some(&self.credentials.password))
        })
        .await
    }

    async fn keep_alive(&self, current: &str) -> Result<Token, ApiError> {
        tracing::debug!("renewing bearer token");
        self.with_retry(KEEP_ALIVE_PATH, |url| self.client.post(url).bearer_auth(current))
            .await
    }

    async fn with_retry<F>(&self, path: &str, request: F) -> Result<Token, ApiError>
    where
        F: Fn(&str) -> RequestBuilder,
    {
        let url = format!("{}{}", self.base_url, path);
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let (reason, retry_after) = match self.exchange(request(url.as_str())).await {
                Ok(token) => return Ok(token),
                Err(Exchange::Failed(err)) => return Err(err),
                Err(Exchange::Retry(reason, retry_after)) => (reason, retry_after),
            };
            if !self.retry.should_retry(attempt) {
                return Err(ApiError::Transient {
                    path: path.to_string(),
                    attempts: attempt,
                    reason,
                });
            }
            let delay = self.retry.delay_with_hint(attempt, retry_after);
            tracing::debug!("{path} failed ({reason}), retrying in {delay:?}");
            tokio::time::sleep(delay).await;
        }
    }

    async fn exchange(&self, request: RequestBuilder) -> Result<Token, Exchange> {
        let response = match request.header(ACCEPT, "application/json").send().await {
            Ok(response) => response,
            Err(err) => return Err(Exchange::Retry(err.to_string(), None)),
        };

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(Exchange::Failed(ApiError::Auth(format!(
                "credentials rejected for {} (HTTP {})",
                self.credentials.username,
                status.as_u16()
            ))));
        }
        if RetryPolicy::is_retryable(status.as_u16()) {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after);
            return Err(Exchange::Retry(format!("HTTP {}", status.as_u16()), retry_after));
        }
        let path = response.url().path().to_string();
        if !status.is_success() {
            return Err(Exchange::Failed(ApiError::Status {
                path,
                status: status.as_u16(),
            }));
        }

        match response.json::<TokenResponse>().await {
            Ok(body) => Ok(Token::from_response(body, Utc::now())),
            Err(err) => Err(Exchange::Failed(ApiError::Malformed {
                path,
                reason: format!("unreadable token response: {err}"),
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fake::{Reply, StubServer};
    use chrono::TimeZone;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, h, m, s).unwrap()
    }

    #[test]
    fn refresh_when_inside_margin() {
        let margin = chrono::Duration::seconds(60);
        let expires = at(12, 20, 0);
        assert!(!needs_refresh(expires, at(12, 18, 59), margin));
        assert!(needs_refresh(expires, at(12, 19, 0), margin));
        assert!(needs_refresh(expires, at(12, 25, 0), margin));
    }

    #[test]
    fn token_uses_expires_when_present() {
        let response = TokenResponse {
            token: "abc".into(),
            expires: Some("2026-03-01T12:20:00.000Z".into()),
        };
        let token = Token::from_response(response, at(12, 0, 0));
        assert_eq!(token.value, "abc");
        assert_eq!(token.expires_at, at(12, 20, 0));
    }

    #[test]
    fn token_without_expires_lives_twenty_minutes() {
        let response: TokenResponse = serde_json::from_str(r#"{"token":"abc"}"#).unwrap();
        let token = Token::from_response(response, at(12, 0, 0));
        assert_eq!(token.expires_at, at(12, 20, 0));

        let garbled = TokenResponse {
            token: "abc".into(),
            expires: Some("soon".into()),
        };
        assert_eq!(
            Token::from_response(garbled, at(9, 0, 0)).expires_at,
            at(9, 20, 0)
        );
    }

    #[test]
    fn credentials_debug_hides_password() {
        let creds = Credentials {
            username: "api".into(),
            password: "hunter2".into(),
        };
        let shown = format!("{creds:?}");
        assert!(shown.contains("api"));
        assert!(!shown.contains("hunter2"));
    }

    fn session(server: &StubServer) -> Session {
        let quick = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        };
        Session::new(
            Client::new(),
            server.base_url(),
            Credentials {
                username: "api".into(),
                password: "secret".into(),
            },
            Duration::from_secs(60),
            quick,
        )
    }

    #[tokio::test]
    async fn unavailable_token_endpoint_is_transient() {
        let server = StubServer::start(vec![(TOKEN_PATH, vec![Reply::status(503)])]).await;

        let err = session(&server).bearer().await.unwrap_err();

        assert!(!err.is_fatal(), "{err}");
        assert!(matches!(err, ApiError::Transient { attempts: 3, .. }), "{err}");
        assert_eq!(server.hits(TOKEN_PATH), 3);
    }

    #[tokio::test]
    async fn token_endpoint_recovers_after_throttling() {
        let server = StubServer::start(vec![(
            TOKEN_PATH,
            vec![Reply::status(429), Reply::token("fresh")],
        )])
        .await;

        assert_eq!(session(&server).bearer().await.unwrap(), "fresh");
        assert_eq!(server.hits(TOKEN_PATH), 2);
    }

    #[tokio::test]
    async fn rejected_credentials_are_fatal() {
        for status in [401, 403] {
            let server = StubServer::start(vec![(TOKEN_PATH, vec![Reply::status(status)])]).await;

            let err = session(&server).bearer().await.unwrap_err();

            assert!(err.is_fatal(), "HTTP {status}: {err}");
            assert_eq!(server.hits(TOKEN_PATH), 1);
        }
    }

    #[tokio::test]
    async fn other_token_statuses_are_not_fatal() {
        let server = StubServer::start(vec![(TOKEN_PATH, vec![Reply::status(400)])]).await;

        let err = session(&server).bearer().await.unwrap_err();

        assert!(matches!(err, ApiError::Status { status: 400, .. }), "{err}");
        assert_eq!(server.hits(TOKEN_PATH), 1);
    }

    #[tokio::test]
    async fn token_is_reused_until_close_to_expiry() {
        let server = StubServer::start(vec![(TOKEN_PATH, vec![Reply::token("t1")])]).await;
        let session = session(&server);

        assert_eq!(session.bearer().await.unwrap(), "t1");
        assert_eq!(session.bearer().await.unwrap(), "t1");
        assert_eq!(server.hits(TOKEN_PATH), 1);
    }
}
