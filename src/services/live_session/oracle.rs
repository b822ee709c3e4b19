//! Oracles
//!
//! Seams to the external reasoning services the engine consumes: question
//! scoring, dialogue (recommend / summarize / simulate / follow-up) and
//! case-similarity search. `LlmOracle` implements the first two on top of any
//! `LlmProvider`.

use std::future::Future;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use interview_assist_core::{LanguageMode, RankedQuestion, RecommendedQuestion};
use interview_assist_llm::{LlmError, LlmProvider, LlmRequestOptions, Message};
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::prompts;
use super::state::FollowUpTurn;

/// Failure of an external oracle call. Always recovered locally.
#[derive(Error, Debug, Clone)]
pub enum OracleError {
    #[error("oracle not configured")]
    Unavailable,

    #[error("oracle timed out after {0}s")]
    Timeout(u64),

    #[error("provider error: {0}")]
    Provider(String),
}

impl From<LlmError> for OracleError {
    fn from(err: LlmError) -> Self {
        OracleError::Provider(err.to_string())
    }
}

pub type OracleResult<T> = Result<T, OracleError>;

/// Bound an oracle call by `limit`.
pub async fn bounded<T, F>(limit: Duration, fut: F) -> OracleResult<T>
where
    F: Future<Output = OracleResult<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(OracleError::Timeout(limit.as_secs())),
    }
}

// ============================================================================
// Traits
// ============================================================================

/// Scores candidate questions against the conversation.
#[async_trait]
pub trait ScoringOracle: Send + Sync {
    /// Raw oracle reply; expected to contain a JSON list of
    /// `{question, score, rationale}` objects.
    async fn score_questions(
        &self,
        context: &str,
        questions: &[String],
        language: LanguageMode,
    ) -> OracleResult<String>;
}

/// Grounding for a post-session follow-up question.
#[derive(Debug, Clone)]
pub struct FollowUpPrompt {
    pub transcript: String,
    pub summary_and_plan: String,
    pub unasked: Vec<RankedQuestion>,
    pub previous_turns: Vec<FollowUpTurn>,
    pub message: String,
    pub language: LanguageMode,
}

/// Free-text dialogue tasks.
#[async_trait]
pub trait DialogueOracle: Send + Sync {
    /// Summary of the conversation followed by a step-by-step plan.
    async fn summarize_and_plan(
        &self,
        transcript: &str,
        language: LanguageMode,
    ) -> OracleResult<String>;

    /// Raw next-question suggestion (see [`parse_recommendation`]).
    async fn recommend_question(&self, context: &str, language: LanguageMode)
        -> OracleResult<String>;

    /// Simulated patient answer to a clinician question.
    async fn simulate_patient_reply(
        &self,
        question: &RecommendedQuestion,
        language: LanguageMode,
    ) -> OracleResult<String>;

    /// Answer a clinician's question about a finished session.
    async fn answer_follow_up(&self, prompt: &FollowUpPrompt) -> OracleResult<String>;
}

/// A historical case similar to the current presentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseMatch {
    pub case_id: String,
    pub similarity: f32,
    pub title: String,
    pub summary: String,
    #[serde(default)]
    pub suspected_conditions: Vec<String>,
    #[serde(default)]
    pub recommended_questions: Vec<String>,
}

/// Case-similarity index.
#[async_trait]
pub trait CaseSearch: Send + Sync {
    /// Up to `k` cases with similarity at or above `threshold`.
    async fn search(&self, query: &str, k: usize, threshold: f32) -> OracleResult<Vec<CaseMatch>>;
}

// ============================================================================
// Recommendation parsing
// ============================================================================

fn bilingual_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?s)English:\**\s*(.+?)\n+\**Swahili:\**\s*(.+)").ok())
        .as_ref()
}

fn strip_label<'a>(text: &'a str, label: &str) -> &'a str {
    let trimmed = text.trim().trim_start_matches('*');
    match trimmed.strip_prefix(label) {
        Some(rest) => rest.trim_start_matches('*').trim(),
        None => text.trim(),
    }
}

/// Split a recommendation reply into its English and Swahili parts.
///
/// Bilingual replies are expected as `English: ...` followed by
/// `Swahili: ...`; anything else is treated as English.
pub fn parse_recommendation(raw: &str, language: LanguageMode) -> RecommendedQuestion {
    match language {
        LanguageMode::English => RecommendedQuestion {
            english: strip_label(raw, "English:").to_string(),
            swahili: String::new(),
        },
        LanguageMode::Swahili => RecommendedQuestion {
            english: String::new(),
            swahili: strip_label(raw, "Swahili:").to_string(),
        },
        LanguageMode::Bilingual => {
            let captures = bilingual_pattern().and_then(|re| re.captures(raw));
            match captures {
                Some(caps) => RecommendedQuestion {
                    english: caps[1].trim().to_string(),
                    swahili: caps[2].trim().to_string(),
                },
                None => RecommendedQuestion {
                    english: raw.trim().to_string(),
                    swahili: String::new(),
                },
            }
        }
    }
}

/// What the clinician would say aloud for a recommendation.
pub fn spoken_question(question: &RecommendedQuestion, language: LanguageMode) -> String {
    match language {
        LanguageMode::English => question.english.clone(),
        LanguageMode::Swahili => question.swahili.clone(),
        LanguageMode::Bilingual => {
            if question.swahili.is_empty() {
                question.english.clone()
            } else {
                format!("{}\n\n{}", question.english, question.swahili)
            }
        }
    }
}

// ============================================================================
// LLM-backed oracle
// ============================================================================

/// Scoring and dialogue oracle over an LLM provider.
pub struct LlmOracle {
    provider: Arc<dyn LlmProvider>,
}

impl LlmOracle {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self { provider }
    }

    async fn complete(
        &self,
        system: &str,
        messages: Vec<Message>,
        temperature: Option<f32>,
    ) -> OracleResult<String> {
        let options = LlmRequestOptions {
            temperature_override: temperature,
            ..Default::default()
        };
        Ok(self.provider.complete(system, messages, options).await?)
    }
}

#[async_trait]
impl ScoringOracle for LlmOracle {
    async fn score_questions(
        &self,
        context: &str,
        questions: &[String],
        language: LanguageMode,
    ) -> OracleResult<String> {
        let prompt = prompts::scoring_prompt(context, questions, language);
        self.complete(
            prompts::CLINICAL_SYSTEM_PROMPT,
            vec![Message::user(prompt)],
            Some(0.0),
        )
        .await
    }
}

#[async_trait]
impl DialogueOracle for LlmOracle {
    async fn summarize_and_plan(
        &self,
        transcript: &str,
        language: LanguageMode,
    ) -> OracleResult<String> {
        let prompt = prompts::summary_prompt(transcript, language);
        self.complete(prompts::CLINICAL_SYSTEM_PROMPT, vec![Message::user(prompt)], None)
            .await
    }

    async fn recommend_question(
        &self,
        context: &str,
        language: LanguageMode,
    ) -> OracleResult<String> {
        let prompt = prompts::recommendation_prompt(context, language);
        self.complete(prompts::CLINICAL_SYSTEM_PROMPT, vec![Message::user(prompt)], None)
            .await
    }

    async fn simulate_patient_reply(
        &self,
        question: &RecommendedQuestion,
        language: LanguageMode,
    ) -> OracleResult<String> {
        let prompt = prompts::patient_reply_prompt(question, language);
        self.complete(prompts::PATIENT_SYSTEM_PROMPT, vec![Message::user(prompt)], Some(0.7))
            .await
    }

    async fn answer_follow_up(&self, prompt: &FollowUpPrompt) -> OracleResult<String> {
        let system = prompts::follow_up_context(
            &prompt.transcript,
            &prompt.summary_and_plan,
            &prompt.unasked,
            prompt.language,
        );
        let mut messages = Vec::with_capacity(2);
        if let Some(history) = prompts::follow_up_history(&prompt.previous_turns) {
            messages.push(Message::user(history));
        }
        messages.push(Message::user(prompt.message.clone()));
        self.complete(&system, messages, None).await
    }
}
