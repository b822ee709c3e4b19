//! Session Event Records
//!
//! Transport-agnostic records emitted by the session orchestrator for a single
//! request. A request yields a finite, ordered sequence of these events; the
//! transport layer (SSE, WebSocket, CLI) is responsible for framing them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A candidate question with its priority score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RankedQuestion {
    /// Original question text as supplied by the planner
    pub question: String,
    /// Priority score in [0, 1]
    pub score: f64,
}

impl RankedQuestion {
    pub fn new(question: impl Into<String>, score: f64) -> Self {
        Self {
            question: question.into(),
            score: score.clamp(0.0, 1.0),
        }
    }
}

/// A recommended next question, split by language.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecommendedQuestion {
    pub english: String,
    pub swahili: String,
}

impl RecommendedQuestion {
    pub fn is_empty(&self) -> bool {
        self.english.trim().is_empty() && self.swahili.trim().is_empty()
    }
}

/// Event emitted while processing a conversation request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A conversational turn (patient, clinician, listener, ...)
    Message {
        role: String,
        text: String,
        timestamp: DateTime<Utc>,
    },

    /// Suggested next question for the clinician
    Recommendation {
        question: RecommendedQuestion,
        timestamp: DateTime<Utc>,
    },

    /// Outstanding candidate questions, highest priority first
    RankedUnasked {
        questions: Vec<RankedQuestion>,
        timestamp: DateTime<Utc>,
    },

    /// Terminal event: summary + plan and the final unasked list
    Finalized {
        summary_and_plan: String,
        unasked: Vec<RankedQuestion>,
        timestamp: DateTime<Utc>,
    },
}

impl SessionEvent {
    /// Create a message event stamped now
    pub fn message(role: impl Into<String>, text: impl Into<String>) -> Self {
        Self::Message {
            role: role.into(),
            text: text.into().trim().to_string(),
            timestamp: Utc::now(),
        }
    }

    /// Create a recommendation event stamped now
    pub fn recommendation(question: RecommendedQuestion) -> Self {
        Self::Recommendation {
            question,
            timestamp: Utc::now(),
        }
    }

    /// Create a ranked-unasked event stamped now
    pub fn ranked_unasked(questions: Vec<RankedQuestion>) -> Self {
        Self::RankedUnasked {
            questions,
            timestamp: Utc::now(),
        }
    }

    /// Create a finalized event stamped now
    pub fn finalized(summary_and_plan: impl Into<String>, unasked: Vec<RankedQuestion>) -> Self {
        Self::Finalized {
            summary_and_plan: summary_and_plan.into(),
            unasked,
            timestamp: Utc::now(),
        }
    }

    /// Whether this event terminates the request's sequence
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finalized { .. })
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::Message { timestamp, .. }
            | Self::Recommendation { timestamp, .. }
            | Self::RankedUnasked { timestamp, .. }
            | Self::Finalized { timestamp, .. } => *timestamp,
        }
    }
}
