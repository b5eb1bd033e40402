//! reqwest-backed transport with timeout, retry and a global in-flight cap.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::header::{ACCEPT, RETRY_AFTER};
use reqwest::Client;
use serde_json::Value;
use tokio::sync::Semaphore;

use super::Transport;
use super::retry::{RetryPolicy, parse_retry_after};
use super::session::{Credentials, Session};
use crate::error::ApiError;

#[derive(Debug, Clone)]
pub struct HttpSettings {
    /// Server root, e.g. `https://example.jamfcloud.com`. No trailing slash.
    pub base_url: String,
    pub timeout: Duration,
    /// Maximum requests in flight across the whole run.
    pub concurrency: usize,
    pub retry: RetryPolicy,
    pub refresh_margin: Duration,
}

impl HttpSettings {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(15),
            concurrency: 8,
            retry: RetryPolicy::default(),
            refresh_margin: Duration::from_secs(60),
        }
    }
}

/// Result of a single request attempt, before retry classification.
enum Attempt {
    Body(String),
    Status(u16, Option<Duration>),
    Failed(reqwest::Error),
    PoolClosed,
}

pub struct HttpTransport {
    client: Client,
    base_url: String,
    session: Session,
    permits: Semaphore,
    retry: RetryPolicy,
}

impl HttpTransport {
    pub fn new(settings: HttpSettings, credentials: Credentials) -> Result<Self> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .user_agent(concat!("jamfrep/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build HTTP client")?;
        let session = Session::new(
            client.clone(),
            settings.base_url.clone(),
            credentials,
            settings.refresh_margin,
            settings.retry,
        );
        Ok(Self {
            client,
            base_url: settings.base_url,
            session,
            permits: Semaphore::new(settings.concurrency.max(1)),
            retry: settings.retry,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    async fn attempt(&self, url: &str, token: &str) -> Attempt {
        let Ok(_permit) = self.permits.acquire().await else {
            return Attempt::PoolClosed;
        };

        let response = match self
            .client
            .get(url)
            .bearer_auth(token)
            .header(ACCEPT, "application/json")
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => return Attempt::Failed(err),
        };

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after);
            return Attempt::Status(status.as_u16(), retry_after);
        }
        match response.text().await {
            Ok(body) => Attempt::Body(body),
            Err(err) => Attempt::Failed(err),
        }
    }
}

impl Transport for HttpTransport {
    async fn get_json(&self, path: &str) -> Result<Value, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        let mut token = self.session.bearer().await?;
        let mut refreshed = false;
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            tracing::debug!("GET {path} (attempt {attempt})");

            let (reason, retry_after) = match self.attempt(&url, &token).await {
                Attempt::Body(body) => {
                    return serde_json::from_str(&body).map_err(|e| ApiError::Malformed {
                        path: path.to_string(),
                        reason: format!("response is not JSON: {e}"),
                    });
                }
                Attempt::Status(404, _) => {
                    return Err(ApiError::NotFound {
                        path: path.to_string(),
                    });
                }
                Attempt::Status(401, _) if !refreshed => {
                    refreshed = true;
                    token = self.session.force_refresh(&token).await?;
                    // the reactive refresh does not use up a retry
                    attempt -= 1;
                    continue;
                }
                Attempt::Status(401, _) => {
                    return Err(ApiError::Auth(format!("{path} rejected a fresh token")));
                }
                Attempt::Status(status, retry_after) if RetryPolicy::is_retryable(status) => {
                    (format!("HTTP {status}"), retry_after)
                }
                Attempt::Status(status, _) => {
                    return Err(ApiError::Status {
                        path: path.to_string(),
                        status,
                    });
                }
                Attempt::Failed(err) if err.is_timeout() || err.is_connect() || err.is_request() => {
                    (err.to_string(), None)
                }
                Attempt::Failed(err) => {
                    return Err(ApiError::Transient {
                        path: path.to_string(),
                        attempts: attempt,
                        reason: err.to_string(),
                    });
                }
                Attempt::PoolClosed => {
                    return Err(ApiError::Transient {
                        path: path.to_string(),
                        attempts: attempt,
                        reason: "request pool closed".into(),
                    });
                }
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
            token = self.session.bearer().await?;
        }
    }
}
