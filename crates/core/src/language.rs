//! Language Mode
//!
//! Output language requested by the caller for summaries, recommendations and
//! oracle instructions.

use serde::{Deserialize, Serialize};

/// Language mode for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LanguageMode {
    /// English and Swahili side by side
    #[default]
    Bilingual,
    /// English only
    English,
    /// Swahili only
    Swahili,
}

impl LanguageMode {
    /// Get the string form used on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bilingual => "bilingual",
            Self::English => "english",
            Self::Swahili => "swahili",
        }
    }

    /// Parse a caller-supplied label; anything unrecognized is bilingual.
    pub fn parse(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "english" | "en" => Self::English,
            "swahili" | "sw" => Self::Swahili,
            _ => Self::Bilingual,
        }
    }
}

impl std::fmt::Display for LanguageMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
