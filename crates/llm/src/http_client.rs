//! HTTP Client Factory
//!
//! Builds the shared reqwest client used by chat and embedding providers.

use std::time::Duration;

use crate::types::{LlmError, LlmResult};

/// Build a `reqwest::Client` with a per-request timeout.
///
/// A zero timeout leaves reqwest's default (no timeout) in place.
pub fn build_http_client(timeout_secs: u64) -> LlmResult<reqwest::Client> {
    let mut builder = reqwest::Client::builder();
    if timeout_secs > 0 {
        builder = builder.timeout(Duration::from_secs(timeout_secs));
    }
    builder.build().map_err(|e| LlmError::Other {
        message: format!("failed to build HTTP client: {}", e),
    })
}
