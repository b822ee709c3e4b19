//! Interview Assist - Rust Backend Library
//!
//! Live session recommendation engine for clinical interviews.
//! It includes:
//! - The live session service (registry, matcher, throttle, ranker, orchestrator)
//! - Storage layer (JSON config)
//! - Data models and utilities

pub mod models;
pub mod services;
pub mod storage;
pub mod utils;

pub use interview_assist_core::{LanguageMode, RankedQuestion, RecommendedQuestion, SessionEvent};
pub use models::settings::{EngineConfig, MatchStrategy, SettingsUpdate};
pub use services::live_session::{
    CandidateInput, ConversationMode, ConversationRequest, SessionKey, SessionOrchestrator,
};
pub use storage::ConfigService;
pub use utils::error::{AppError, AppResult};
