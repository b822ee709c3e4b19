//! Data Models
//!
//! Contains the configuration structures used throughout the application.

pub mod settings;

pub use settings::*;
