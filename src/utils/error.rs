//! Error Handling
//!
//! Errors the engine reports to its caller. Oracle and case-search failures
//! are not among them: the orchestrator replaces those with fallbacks.

use interview_assist_core::CoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    /// Invalid engine configuration or a missing collaborator
    #[error("Configuration error: {0}")]
    Config(String),

    /// Rejected request input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Config file I/O
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed config file
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        AppError::Validation(err.to_string())
    }
}
