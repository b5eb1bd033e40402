//! Jamf Pro API access.
//!
//! [`Transport`] is the seam: it returns raw JSON for a path, or a classified
//! [`ApiError`]. [`HttpTransport`] is the real implementation (timeouts,
//! retries, token session, global in-flight cap). [`JamfClient`] turns paths
//! into typed records and is what the collectors talk to.

mod client;
mod http;
pub mod models;
mod retry;
mod session;

#[cfg(test)]
pub(crate) mod fake;

use serde_json::Value;

use crate::error::ApiError;

pub use client::{JamfClient, PRESTAGE_PAGE_SIZE};
pub use http::{HttpSettings, HttpTransport};
pub use retry::{RetryPolicy, parse_retry_after};
pub use session::{Credentials, Session, Token, needs_refresh};

/// Read-only JSON access to the server, relative to its base URL.
#[allow(async_fn_in_trait)]
pub trait Transport {
    async fn get_json(&self, path: &str) -> Result<Value, ApiError>;
}
