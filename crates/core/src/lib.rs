//! Interview Assist Core
//!
//! Foundational types for the Interview Assist workspace. This crate has no
//! dependencies on application-level code (LLM providers, session registry,
//! configuration files).
//!
//! ## Module Organization
//!
//! - `error` - Input errors (`CoreError`) and `require_text`
//! - `text` - Text normalization used as question identity and match basis
//! - `language` - Requested output language (`LanguageMode`)
//! - `streaming` - Session event records emitted per request

pub mod error;
pub mod language;
pub mod streaming;
pub mod text;

// ── Error Types ────────────────────────────────────────────────────────
pub use error::{require_text, CoreError, CoreResult};

// ── Language ───────────────────────────────────────────────────────────
pub use language::LanguageMode;

// ── Session Events ─────────────────────────────────────────────────────
pub use streaming::{RankedQuestion, RecommendedQuestion, SessionEvent};

// ── Text ───────────────────────────────────────────────────────────────
pub use text::{clip_tail, normalize, normalized_tokens, tokens};
