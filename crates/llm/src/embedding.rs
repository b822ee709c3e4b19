//! Embedding Provider
//!
//! Embedding is a separate responsibility from chat completion, so it gets its
//! own object-safe `EmbeddingProvider` trait. The OpenAI implementation also
//! works against any OpenAI-compatible `/v1/embeddings` endpoint.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::http_client::build_http_client;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur during embedding operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EmbeddingError {
    /// Authentication failed (invalid or missing API key).
    AuthenticationFailed { message: String },
    /// The requested model was not found or is not available.
    ModelNotFound { model: String },
    /// The provider is not reachable.
    ProviderUnavailable { message: String },
    /// A network or connection error occurred.
    NetworkError { message: String },
    /// The provider returned an unexpected or unparseable response.
    ParseError { message: String },
    /// The provider returned an HTTP error.
    ServerError {
        message: String,
        status: Option<u16>,
    },
    /// Rate limit exceeded.
    RateLimited { message: String },
    /// Configuration is invalid or incomplete.
    InvalidConfig { message: String },
}

impl fmt::Display for EmbeddingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AuthenticationFailed { message } => {
                write!(f, "authentication failed: {}", message)
            }
            Self::ModelNotFound { model } => write!(f, "model not found: {}", model),
            Self::ProviderUnavailable { message } => {
                write!(f, "provider unavailable: {}", message)
            }
            Self::NetworkError { message } => write!(f, "network error: {}", message),
            Self::ParseError { message } => write!(f, "parse error: {}", message),
            Self::ServerError { message, status } => {
                if let Some(code) = status {
                    write!(f, "server error (HTTP {}): {}", code, message)
                } else {
                    write!(f, "server error: {}", message)
                }
            }
            Self::RateLimited { message } => write!(f, "rate limited: {}", message),
            Self::InvalidConfig { message } => write!(f, "invalid config: {}", message),
        }
    }
}

impl std::error::Error for EmbeddingError {}

/// Convenience alias for embedding operation results.
pub type EmbeddingResult<T> = Result<T, EmbeddingError>;

// ---------------------------------------------------------------------------
// Provider configuration
// ---------------------------------------------------------------------------

const OPENAI_EMBEDDING_API_URL: &str = "https://api.openai.com/v1/embeddings";

const DEFAULT_MODEL: &str = "text-embedding-3-small";

/// Configuration for an embedding provider instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingProviderConfig {
    /// Model identifier (e.g., "text-embedding-3-small").
    #[serde(default = "default_model")]
    pub model: String,
    /// API key. Omitted for local OpenAI-compatible servers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Endpoint override. If `None`, the OpenAI endpoint is used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// HTTP request timeout in seconds
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_timeout() -> u64 {
    30
}

impl Default for EmbeddingProviderConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            api_key: None,
            base_url: None,
            request_timeout_secs: default_timeout(),
        }
    }
}

// ---------------------------------------------------------------------------
// Embedding provider trait
// ---------------------------------------------------------------------------

/// Async trait for embedding providers.
///
/// Implementations return one dense vector per input, in input order.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a batch of texts.
    async fn embed_documents(&self, documents: &[&str]) -> EmbeddingResult<Vec<Vec<f32>>>;

    /// Embed a single query text.
    async fn embed_query(&self, query: &str) -> EmbeddingResult<Vec<f32>> {
        let mut vectors = self.embed_documents(&[query]).await?;
        vectors.pop().ok_or_else(|| EmbeddingError::ParseError {
            message: "provider returned no embedding for query".to_string(),
        })
    }

    /// Human-readable provider name for logs.
    fn display_name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// OpenAI implementation
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct OpenAIEmbeddingResponse {
    data: Vec<OpenAIEmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct OpenAIEmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[derive(Debug, Deserialize)]
struct OpenAIErrorResponse {
    error: Option<OpenAIErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct OpenAIErrorDetail {
    message: Option<String>,
}

/// OpenAI (or compatible) embedding provider.
pub struct OpenAIEmbeddingProvider {
    client: reqwest::Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
    display_name: String,
}

impl OpenAIEmbeddingProvider {
    /// Create a provider from its configuration.
    pub fn new(config: &EmbeddingProviderConfig) -> EmbeddingResult<Self> {
        let model = if config.model.trim().is_empty() {
            DEFAULT_MODEL.to_string()
        } else {
            config.model.trim().to_string()
        };
        let base_url = config
            .base_url
            .as_deref()
            .unwrap_or(OPENAI_EMBEDDING_API_URL)
            .to_string();
        let client = build_http_client(config.request_timeout_secs).map_err(|e| {
            EmbeddingError::InvalidConfig {
                message: e.to_string(),
            }
        })?;

        Ok(Self {
            client,
            api_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
            display_name: format!("OpenAI ({})", model),
            model,
            base_url,
        })
    }

    fn is_default_endpoint(&self) -> bool {
        self.base_url == OPENAI_EMBEDDING_API_URL
    }

    fn map_reqwest_error(&self, err: reqwest::Error) -> EmbeddingError {
        if err.is_connect() {
            EmbeddingError::ProviderUnavailable {
                message: format!("cannot connect to {}", self.base_url),
            }
        } else {
            EmbeddingError::NetworkError {
                message: err.to_string(),
            }
        }
    }

    fn map_http_error(&self, status: u16, body_text: &str) -> EmbeddingError {
        let error_message = serde_json::from_str::<OpenAIErrorResponse>(body_text)
            .ok()
            .and_then(|r| r.error)
            .and_then(|d| d.message)
            .unwrap_or_else(|| body_text.to_string());

        match status {
            401 | 403 => EmbeddingError::AuthenticationFailed {
                message: error_message,
            },
            404 => EmbeddingError::ModelNotFound {
                model: format!("'{}' at {}: {}", self.model, self.base_url, error_message),
            },
            429 => EmbeddingError::RateLimited {
                message: error_message,
            },
            400 => EmbeddingError::InvalidConfig {
                message: error_message,
            },
            _ => EmbeddingError::ServerError {
                message: error_message,
                status: Some(status),
            },
        }
    }

    /// Check the count and restore input order.
    fn extract_embeddings(
        mut response: OpenAIEmbeddingResponse,
        expected_count: usize,
    ) -> EmbeddingResult<Vec<Vec<f32>>> {
        if response.data.len() != expected_count {
            return Err(EmbeddingError::ParseError {
                message: format!(
                    "expected {} embeddings but got {}",
                    expected_count,
                    response.data.len()
                ),
            });
        }
        response.data.sort_by_key(|d| d.index);
        Ok(response.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbeddingProvider {
    async fn embed_documents(&self, documents: &[&str]) -> EmbeddingResult<Vec<Vec<f32>>> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }
        if self.api_key.is_none() && self.is_default_endpoint() {
            return Err(EmbeddingError::AuthenticationFailed {
                message: "OpenAI API key is not configured".to_string(),
            });
        }

        let body = serde_json::json!({
            "model": self.model,
            "input": documents,
        });

        let mut request = self
            .client
            .post(&self.base_url)
            .header("Content-Type", "application/json")
            .json(&body);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request
            .send()
            .await
            .map_err(|e| self.map_reqwest_error(e))?;
        let status = response.status().as_u16();
        let body_text = response
            .text()
            .await
            .map_err(|e| EmbeddingError::NetworkError {
                message: format!("failed to read response body: {}", e),
            })?;

        if status != 200 {
            tracing::warn!(model = %self.model, status, "embedding request failed");
            return Err(self.map_http_error(status, &body_text));
        }

        let parsed: OpenAIEmbeddingResponse =
            serde_json::from_str(&body_text).map_err(|e| EmbeddingError::ParseError {
                message: format!("failed to parse embedding response: {}", e),
            })?;
        Self::extract_embeddings(parsed, documents.len())
    }

    fn display_name(&self) -> &str {
        &self.display_name
    }
}
