//! Core Errors
//!
//! Input errors raised by the foundation crate. Oracle failures never surface
//! here; they are recovered inside the engine.

use thiserror::Error;

/// Rejected caller input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A required field was empty after trimming
    #[error("{field} must not be empty")]
    BlankField { field: &'static str },
}

/// Result type alias for core errors
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    pub fn blank(field: &'static str) -> Self {
        Self::BlankField { field }
    }

    /// Name of the offending field
    pub fn field(&self) -> &'static str {
        match self {
            Self::BlankField { field } => field,
        }
    }
}

/// `value` trimmed, or [`CoreError::BlankField`] when nothing is left.
pub fn require_text<'a>(field: &'static str, value: &'a str) -> CoreResult<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(CoreError::blank(field))
    } else {
        Ok(trimmed)
    }
}
