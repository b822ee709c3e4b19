//! LLM Provider Trait
//!
//! The engine only needs single-shot completions: one system instruction, a
//! few user turns, one text answer.

use async_trait::async_trait;

use super::types::{LlmError, LlmRequestOptions, LlmResponse, LlmResult, Message, ProviderConfig};

#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider label used in logs and errors (e.g. "openai")
    fn name(&self) -> &'static str;

    fn model(&self) -> &str;

    fn config(&self) -> &ProviderConfig;

    /// Send a conversation and wait for the complete response.
    async fn send_message(
        &self,
        messages: Vec<Message>,
        system: Option<String>,
        request_options: LlmRequestOptions,
    ) -> LlmResult<LlmResponse>;

    /// Trimmed answer text; an empty answer is an error.
    async fn complete(
        &self,
        system: &str,
        messages: Vec<Message>,
        request_options: LlmRequestOptions,
    ) -> LlmResult<String> {
        let response = self
            .send_message(messages, Some(system.to_string()), request_options)
            .await?;
        match response.text().trim() {
            "" => Err(LlmError::ParseError {
                message: format!("{} returned no text", self.name()),
            }),
            text => Ok(text.to_string()),
        }
    }
}

/// Error for a provider that needs a key but has none.
pub fn missing_api_key(provider: &str) -> LlmError {
    LlmError::AuthenticationFailed {
        message: format!("no API key configured for {provider}"),
    }
}

/// Map a non-success HTTP status and body to an error.
pub fn status_error(provider: &str, status: u16, body: &str) -> LlmError {
    let body = body.trim().to_string();
    match status {
        401 | 403 => LlmError::AuthenticationFailed {
            message: format!("{provider} rejected the credentials (HTTP {status})"),
        },
        404 => LlmError::ModelNotFound { model: body },
        408 | 504 => LlmError::NetworkError {
            message: format!("{provider} timed out (HTTP {status})"),
        },
        429 => LlmError::RateLimited {
            message: body,
            retry_after: None,
        },
        400 | 422 => LlmError::InvalidRequest { message: body },
        500..=599 => LlmError::ServerError {
            message: body,
            status: Some(status),
        },
        _ => LlmError::Other {
            message: format!("{provider}: HTTP {status}: {body}"),
        },
    }
}
