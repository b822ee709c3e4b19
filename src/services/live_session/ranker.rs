//! Question Ranker
//!
//! Orders outstanding candidate questions by priority. The scoring oracle is
//! asked first; its reply goes through a defensive decoder, and any failure
//! falls back to a deterministic token-overlap heuristic.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use interview_assist_core::{clip_tail, normalize, tokens, LanguageMode, RankedQuestion};
use serde_json::Value;

use crate::models::settings::EngineConfig;

use super::dedup::dedup_questions;
use super::oracle::{bounded, OracleError, ScoringOracle};

/// Ranking parameters.
#[derive(Debug, Clone)]
pub struct RankerConfig {
    /// Conversation tail (characters) sent to the oracle
    pub context_chars: usize,
    /// Maximum questions returned
    pub limit: usize,
    /// Score at or above which a question is high priority
    pub high_score_threshold: f64,
    /// Fewer high-priority questions than this returns the overall top list
    pub min_high_count: usize,
    pub dedup_threshold: f64,
    pub oracle_timeout: Duration,
}

impl Default for RankerConfig {
    fn default() -> Self {
        Self {
            context_chars: 6000,
            limit: 10,
            high_score_threshold: 0.6,
            min_high_count: 5,
            dedup_threshold: 0.75,
            oracle_timeout: Duration::from_secs(45),
        }
    }
}

impl From<&EngineConfig> for RankerConfig {
    fn from(config: &EngineConfig) -> Self {
        Self {
            context_chars: config.ranker_context_chars,
            limit: config.ranked_limit,
            high_score_threshold: config.high_score_threshold,
            min_high_count: config.min_high_count,
            dedup_threshold: config.dedup_threshold,
            oracle_timeout: Duration::from_secs(config.oracle_timeout_secs),
        }
    }
}

/// Why oracle scores could not be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackReason {
    NoOracle,
    OracleFailed(String),
    NoJson,
    NotAnArray,
    NoMatchingItems,
}

/// Outcome of decoding an oracle reply.
#[derive(Debug, Clone, PartialEq)]
pub enum ScoreOutcome {
    /// Scores for known questions, in reply order
    Scored(Vec<RankedQuestion>),
    Fallback(FallbackReason),
}

// ── Decoder ──

/// Locate the first JSON array or object in free text.
fn extract_json(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Some(value);
    }

    let start = trimmed.find(['[', '{'])?;
    let closer = if trimmed[start..].starts_with('[') {
        ']'
    } else {
        '}'
    };
    let end = trimmed.rfind(closer)?;
    if end < start {
        return None;
    }
    serde_json::from_str(&trimmed[start..=end]).ok()
}

/// Parse a score from a number or numeric string; anything else is 0.0.
fn parse_score(value: Option<&Value>) -> f64 {
    let raw = match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    if raw.is_finite() {
        raw.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Decode an oracle reply against the questions that were asked about.
///
/// Only items whose normalized question equals a normalized input survive,
/// reported with the input's original text; repeats are dropped.
pub fn decode_scores(raw: &str, inputs: &[String]) -> ScoreOutcome {
    let Some(value) = extract_json(raw) else {
        return ScoreOutcome::Fallback(FallbackReason::NoJson);
    };
    let Value::Array(items) = value else {
        return ScoreOutcome::Fallback(FallbackReason::NotAnArray);
    };

    let originals: HashMap<String, &String> = inputs.iter().map(|q| (normalize(q), q)).collect();
    let mut seen: HashSet<String> = HashSet::new();
    let mut scored = Vec::new();

    for item in &items {
        let Value::Object(obj) = item else {
            continue;
        };
        let question = obj
            .get("question")
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or("");
        if question.is_empty() {
            continue;
        }
        let key = normalize(question);
        let Some(original) = originals.get(&key) else {
            continue;
        };
        if !seen.insert(key) {
            continue;
        }
        scored.push(RankedQuestion::new(
            original.as_str(),
            parse_score(obj.get("score")),
        ));
    }

    if scored.is_empty() {
        ScoreOutcome::Fallback(FallbackReason::NoMatchingItems)
    } else {
        ScoreOutcome::Scored(scored)
    }
}

// ── Ordering ──

fn sort_desc(ranked: &mut [RankedQuestion]) {
    // stable: equal scores keep their incoming order
    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
}

/// Keep the list focused on high-priority questions.
///
/// Too few high scorers returns the overall top `limit`; too many is cut to
/// `limit`; otherwise only the high scorers are returned.
pub fn clip_ranked(mut scored: Vec<RankedQuestion>, config: &RankerConfig) -> Vec<RankedQuestion> {
    sort_desc(&mut scored);
    let high = scored
        .iter()
        .take_while(|q| q.score >= config.high_score_threshold)
        .count();
    if high < config.min_high_count || high > config.limit {
        scored.truncate(config.limit);
    } else {
        scored.truncate(high);
    }
    scored
}

/// Deterministic fallback: share of each question's tokens present in the
/// conversation.
pub fn heuristic_rank(context: &str, questions: &[String], limit: usize) -> Vec<RankedQuestion> {
    let context_tokens = tokens(context);
    let mut ranked: Vec<RankedQuestion> = questions
        .iter()
        .map(|q| {
            let q_tokens = tokens(q);
            let overlap = q_tokens.intersection(&context_tokens).count();
            RankedQuestion::new(q.as_str(), overlap as f64 / q_tokens.len().max(1) as f64)
        })
        .collect();
    sort_desc(&mut ranked);
    ranked.truncate(limit);
    ranked
}

// ── Ranker ──

/// Ranks questions with an optional scoring oracle.
#[derive(Clone)]
pub struct Ranker {
    oracle: Option<Arc<dyn ScoringOracle>>,
    config: RankerConfig,
}

impl Ranker {
    pub fn new(oracle: Option<Arc<dyn ScoringOracle>>, config: RankerConfig) -> Self {
        Self { oracle, config }
    }

    /// Heuristic-only ranker
    pub fn heuristic(config: RankerConfig) -> Self {
        Self::new(None, config)
    }

    pub fn config(&self) -> &RankerConfig {
        &self.config
    }

    /// Rank `questions` against the conversation `context`, best first.
    ///
    /// Never fails: oracle problems degrade to the heuristic.
    pub async fn rank(
        &self,
        context: &str,
        questions: &[String],
        language: LanguageMode,
    ) -> Vec<RankedQuestion> {
        let cleaned: Vec<&str> = questions
            .iter()
            .map(|q| q.trim())
            .filter(|q| !q.is_empty())
            .collect();
        if cleaned.is_empty() {
            return Vec::new();
        }
        let unique = dedup_questions(&cleaned, self.config.dedup_threshold);
        let context = context.trim();

        match self.score_with_oracle(context, &unique, language).await {
            ScoreOutcome::Scored(scored) => clip_ranked(scored, &self.config),
            ScoreOutcome::Fallback(reason) => {
                if reason != FallbackReason::NoOracle {
                    tracing::warn!(?reason, "oracle scoring unusable; using heuristic ranking");
                }
                heuristic_rank(context, &unique, self.config.limit)
            }
        }
    }

    async fn score_with_oracle(
        &self,
        context: &str,
        questions: &[String],
        language: LanguageMode,
    ) -> ScoreOutcome {
        let Some(oracle) = &self.oracle else {
            return ScoreOutcome::Fallback(FallbackReason::NoOracle);
        };
        let clipped = clip_tail(context, self.config.context_chars);
        let reply = bounded(
            self.config.oracle_timeout,
            oracle.score_questions(clipped, questions, language),
        )
        .await;
        match reply {
            Ok(raw) => decode_scores(&raw, questions),
            Err(OracleError::Unavailable) => ScoreOutcome::Fallback(FallbackReason::NoOracle),
            Err(e) => ScoreOutcome::Fallback(FallbackReason::OracleFailed(e.to_string())),
        }
    }
}
