//! Services
//!
//! Business logic services for the application.

pub mod live_session;

pub use live_session::{SessionOrchestrator, SessionRegistry};
