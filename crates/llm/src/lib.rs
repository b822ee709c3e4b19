//! Interview Assist LLM
//!
//! Provider abstraction for the live interview engine: chat completions over
//! OpenAI-compatible endpoints and a separate embedding provider.

pub mod embedding;
pub mod http_client;
pub mod openai;
pub mod provider;
pub mod types;

pub use embedding::{
    EmbeddingError, EmbeddingProvider, EmbeddingProviderConfig, EmbeddingResult,
    OpenAIEmbeddingProvider,
};
pub use openai::OpenAIProvider;
pub use provider::{missing_api_key, status_error, LlmProvider};
pub use types::{
    LlmError, LlmRequestOptions, LlmResponse, LlmResult, Message, MessageRole, ProviderConfig,
    ProviderType, StopReason, UsageStats,
};
