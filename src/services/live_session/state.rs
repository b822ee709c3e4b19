//! Session State
//!
//! The per-conversation record owned by the session registry: append-only
//! history, candidate questions keyed by normalized text, throttle stamp,
//! post-session snapshot and follow-up log.
//!
//! Everything here is synchronous; callers hold the per-session mutex.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use interview_assist_core::{normalize, require_text, LanguageMode, RankedQuestion};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::models::settings::EngineConfig;
use crate::utils::error::AppResult;

// ============================================================================
// Keys
// ============================================================================

/// Identity of a live session: (user, conversation).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKey {
    user_id: String,
    conversation_id: String,
}

impl SessionKey {
    /// Build a key; both parts must be non-blank.
    pub fn new(user_id: impl Into<String>, conversation_id: impl Into<String>) -> AppResult<Self> {
        let user_id = user_id.into();
        let conversation_id = conversation_id.into();
        Ok(Self {
            user_id: require_text("user id", &user_id)?.to_string(),
            conversation_id: require_text("conversation id", &conversation_id)?.to_string(),
        })
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.user_id, self.conversation_id)
    }
}

// ============================================================================
// Records
// ============================================================================

/// Conversation phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationPhase {
    #[default]
    Idle,
    Active,
    Finalized,
}

/// One conversational turn in the history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl HistoryEntry {
    /// "Role: text" transcript line
    pub fn line(&self) -> String {
        format!("{}: {}", self.role, self.text)
    }
}

/// A question the clinician is expected to cover.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateQuestion {
    /// Planner-supplied identifier, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Text as supplied by the planner
    pub text: String,
    /// Normalized identity key, never empty
    pub normalized: String,
    /// Last priority score in [0, 1]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    pub added_at: DateTime<Utc>,
    pub asked: bool,
}

/// Candidate question as submitted by a planner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub text: String,
}

impl CandidateInput {
    pub fn with_id(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            text: text.into(),
        }
    }
}

impl From<&str> for CandidateInput {
    fn from(text: &str) -> Self {
        Self {
            id: None,
            text: text.to_string(),
        }
    }
}

impl From<String> for CandidateInput {
    fn from(text: String) -> Self {
        Self { id: None, text }
    }
}

/// A question newly marked as asked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkedQuestion {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub text: String,
}

impl CandidateQuestion {
    fn mark(&mut self) -> MarkedQuestion {
        self.asked = true;
        MarkedQuestion {
            id: self.id.clone(),
            text: self.text.clone(),
        }
    }
}

/// Result of a candidate intake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntakeOutcome {
    /// Questions newly stored by this call
    pub added: usize,
    /// Questions stored in the session afterwards
    pub total: usize,
}

/// Captured at finalization and used to ground follow-up questions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostSessionSnapshot {
    /// Tail of the transcript
    pub transcript: String,
    pub summary_and_plan: String,
    pub unasked: Vec<RankedQuestion>,
    pub language: LanguageMode,
    pub saved_at: DateTime<Utc>,
}

/// Speaker of a follow-up turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FollowUpRole {
    Clinician,
    Assistant,
}

impl FollowUpRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Clinician => "clinician",
            Self::Assistant => "assistant",
        }
    }
}

/// One post-session follow-up message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowUpTurn {
    pub role: FollowUpRole,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// Size bounds for the append-only logs.
///
/// Once a log grows past `*_max` it is cut back to the most recent `*_retain`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Retention {
    pub history_max: usize,
    pub history_retain: usize,
    pub follow_up_max: usize,
    pub follow_up_retain: usize,
}

impl Default for Retention {
    fn default() -> Self {
        Self {
            history_max: 400,
            history_retain: 300,
            follow_up_max: 200,
            follow_up_retain: 150,
        }
    }
}

impl From<&EngineConfig> for Retention {
    fn from(config: &EngineConfig) -> Self {
        Self {
            history_max: config.history_max_entries,
            history_retain: config.history_retain_entries,
            follow_up_max: config.follow_up_max_entries,
            follow_up_retain: config.follow_up_retain_entries,
        }
    }
}

fn trim_to_retained<T>(log: &mut Vec<T>, max: usize, retain: usize) {
    if log.len() > max {
        let excess = log.len() - retain.min(log.len());
        log.drain(..excess);
    }
}

// ============================================================================
// Session
// ============================================================================

/// Mutable state of one live session.
#[derive(Debug)]
pub struct Session {
    created_at: DateTime<Utc>,
    history: Vec<HistoryEntry>,
    questions: Vec<CandidateQuestion>,
    /// normalized key -> position in `questions`
    index: HashMap<String, usize>,
    last_recommendation: Option<Instant>,
    snapshot: Option<PostSessionSnapshot>,
    follow_ups: Vec<FollowUpTurn>,
    phase: ConversationPhase,
    epoch: u64,
    last_access: Instant,
    retention: Retention,
}

impl Session {
    pub fn new(retention: Retention) -> Self {
        Self {
            created_at: Utc::now(),
            history: Vec::new(),
            questions: Vec::new(),
            index: HashMap::new(),
            last_recommendation: None,
            snapshot: None,
            follow_ups: Vec::new(),
            phase: ConversationPhase::Idle,
            epoch: 0,
            last_access: Instant::now(),
            retention,
        }
    }

    /// Replace everything with a fresh state and advance the reset epoch.
    pub fn reset(&mut self) {
        let epoch = self.epoch + 1;
        *self = Session::new(self.retention);
        self.epoch = epoch;
    }

    // ── Bookkeeping ──

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Reset counter; results computed against an older epoch are stale.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn phase(&self) -> ConversationPhase {
        self.phase
    }

    pub fn set_phase(&mut self, phase: ConversationPhase) {
        self.phase = phase;
    }

    pub fn touch(&mut self) {
        self.last_access = Instant::now();
    }

    pub fn last_access(&self) -> Instant {
        self.last_access
    }

    pub fn last_recommendation(&self) -> Option<Instant> {
        self.last_recommendation
    }

    pub fn set_last_recommendation(&mut self, at: Instant) {
        self.last_recommendation = Some(at);
    }

    // ── History ──

    /// Append a turn. Blank text is ignored; stored text is trimmed.
    ///
    /// An accepted turn moves the conversation into `Active`.
    pub fn append_history(&mut self, role: &str, text: &str) -> bool {
        let text = text.trim();
        if text.is_empty() {
            return false;
        }
        self.history.push(HistoryEntry {
            role: role.trim().to_string(),
            text: text.to_string(),
            timestamp: Utc::now(),
        });
        trim_to_retained(
            &mut self.history,
            self.retention.history_max,
            self.retention.history_retain,
        );
        self.phase = ConversationPhase::Active;
        true
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    /// Whole history as "Role: text" lines.
    pub fn transcript(&self) -> String {
        Self::join_lines(&self.history)
    }

    /// The last `entries` history lines.
    pub fn recent_context(&self, entries: usize) -> String {
        let start = self.history.len().saturating_sub(entries);
        Self::join_lines(&self.history[start..])
    }

    fn join_lines(entries: &[HistoryEntry]) -> String {
        entries
            .iter()
            .map(HistoryEntry::line)
            .collect::<Vec<_>>()
            .join("\n")
    }

    // ── Candidate questions ──

    /// Store new candidate questions, skipping blanks and known normalized keys.
    pub fn add_candidates<I>(&mut self, items: I) -> IntakeOutcome
    where
        I: IntoIterator<Item = CandidateInput>,
    {
        let mut added = 0;
        for item in items {
            let text = item.text.trim();
            if text.is_empty() {
                continue;
            }
            let normalized = normalize(text);
            if normalized.is_empty() || self.index.contains_key(&normalized) {
                continue;
            }
            self.index.insert(normalized.clone(), self.questions.len());
            self.questions.push(CandidateQuestion {
                id: item
                    .id
                    .map(|id| id.trim().to_string())
                    .filter(|id| !id.is_empty()),
                text: text.to_string(),
                normalized,
                score: None,
                added_at: Utc::now(),
                asked: false,
            });
            added += 1;
        }
        IntakeOutcome {
            added,
            total: self.questions.len(),
        }
    }

    pub fn questions(&self) -> &[CandidateQuestion] {
        &self.questions
    }

    pub fn question(&self, normalized: &str) -> Option<&CandidateQuestion> {
        self.index.get(normalized).map(|&i| &self.questions[i])
    }

    /// Unasked questions in stored order.
    pub fn unasked(&self) -> impl Iterator<Item = &CandidateQuestion> {
        self.questions.iter().filter(|q| !q.asked)
    }

    pub fn unasked_texts(&self) -> Vec<String> {
        self.unasked().map(|q| q.text.clone()).collect()
    }

    pub fn has_unasked(&self) -> bool {
        self.questions.iter().any(|q| !q.asked)
    }

    /// Mark every unasked question whose normalized text occurs inside the
    /// normalized utterance.
    pub fn mark_substring_matches(&mut self, normalized_utterance: &str) -> Vec<MarkedQuestion> {
        if normalized_utterance.is_empty() {
            return Vec::new();
        }
        self.questions
            .iter_mut()
            .filter(|q| !q.asked && normalized_utterance.contains(q.normalized.as_str()))
            .map(CandidateQuestion::mark)
            .collect()
    }

    /// Mark the given normalized keys as asked. Unknown or already-asked keys
    /// are skipped.
    pub fn mark_asked_keys(&mut self, keys: &[String]) -> Vec<MarkedQuestion> {
        let mut marked = Vec::new();
        for key in keys {
            if let Some(&i) = self.index.get(key) {
                let q = &mut self.questions[i];
                if !q.asked {
                    marked.push(q.mark());
                }
            }
        }
        marked
    }

    /// Mark the question carrying `id`, if it is still unasked.
    pub fn mark_asked_by_id(&mut self, id: &str) -> Option<MarkedQuestion> {
        let id = id.trim();
        if id.is_empty() {
            return None;
        }
        let q = self
            .questions
            .iter_mut()
            .find(|q| q.id.as_deref() == Some(id))?;
        if q.asked {
            return None;
        }
        Some(q.mark())
    }

    /// Remember the latest scores for ranked questions.
    pub fn record_scores(&mut self, ranked: &[RankedQuestion]) {
        for r in ranked {
            if let Some(&i) = self.index.get(&normalize(&r.question)) {
                self.questions[i].score = Some(r.score.clamp(0.0, 1.0));
            }
        }
    }

    // ── Post-session ──

    pub fn snapshot(&self) -> Option<&PostSessionSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn set_snapshot(&mut self, snapshot: PostSessionSnapshot) {
        self.snapshot = Some(snapshot);
    }

    pub fn follow_ups(&self) -> &[FollowUpTurn] {
        &self.follow_ups
    }

    /// The most recent `turns` follow-up turns.
    pub fn recent_follow_ups(&self, turns: usize) -> &[FollowUpTurn] {
        let start = self.follow_ups.len().saturating_sub(turns);
        &self.follow_ups[start..]
    }

    pub fn append_follow_up(&mut self, role: FollowUpRole, text: &str) {
        self.follow_ups.push(FollowUpTurn {
            role,
            text: text.trim().to_string(),
            timestamp: Utc::now(),
        });
        trim_to_retained(
            &mut self.follow_ups,
            self.retention.follow_up_max,
            self.retention.follow_up_retain,
        );
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(Retention::default())
    }
}
