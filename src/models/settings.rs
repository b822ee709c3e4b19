//! Settings Models
//!
//! Engine configuration and settings data structures.

use interview_assist_core::LanguageMode;
use interview_assist_llm::{EmbeddingProviderConfig, ProviderConfig};
use serde::{Deserialize, Serialize};

/// Fewest history entries a trim may leave behind.
pub const MIN_HISTORY_RETAIN: usize = 300;

/// Fallback strategy used by the utterance-to-question matcher once the
/// exact/substring rule has not matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStrategy {
    /// Token overlap between question and utterance
    #[default]
    Lexical,
    /// Cosine similarity of embeddings
    Embedding,
}

/// Engine configuration stored in config.json
///
/// Every field has a default, so a partial file is accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Default language mode for recommendations and summaries
    pub language: LanguageMode,

    // ── Question intake ──
    /// Combined similarity at or above which two candidate questions are duplicates
    pub dedup_threshold: f64,

    // ── Recommendation throttle & ranking ──
    /// Minimum seconds between two live recommendations for one session
    pub throttle_interval_secs: u64,
    /// Conversation tail (characters) sent to the scoring oracle
    pub ranker_context_chars: usize,
    /// Maximum ranked questions returned
    pub ranked_limit: usize,
    /// Score at or above which a question counts as high priority
    pub high_score_threshold: f64,
    /// Fewer high-priority questions than this falls back to the overall top list
    pub min_high_count: usize,
    /// Upper bound for any oracle call, in seconds
    pub oracle_timeout_secs: u64,

    // ── Matching ──
    pub match_strategy: MatchStrategy,
    /// Minimum shared tokens for a lexical match
    pub lexical_min_overlap: usize,
    /// Minimum overlap / smaller-token-set ratio for a lexical match
    pub lexical_min_ratio: f64,
    /// Minimum cosine similarity for an embedding match
    pub embedding_similarity_threshold: f32,

    // ── Coherence filter ──
    /// Recent history entries used as coherence context
    pub coherence_context_entries: usize,

    // ── Retention ──
    pub history_max_entries: usize,
    /// Entries kept after a trim; never below [`MIN_HISTORY_RETAIN`]
    pub history_retain_entries: usize,
    pub follow_up_max_entries: usize,
    pub follow_up_retain_entries: usize,
    /// Conversation tail (characters) sent to the summarizer
    pub summary_context_chars: usize,
    /// Transcript tail (characters) kept in the post-session snapshot
    pub snapshot_transcript_chars: usize,
    /// Follow-up turns replayed to the dialogue oracle
    pub follow_up_history_turns: usize,
    /// Unasked questions included as follow-up grounding
    pub follow_up_unasked_limit: usize,

    // ── Session lifecycle ──
    /// Sessions untouched for this long are evicted
    pub session_idle_timeout_secs: u64,
    /// How often the background eviction task runs
    pub eviction_interval_secs: u64,
    /// Optional cap on live sessions; least recently used are evicted first
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_sessions: Option<usize>,

    // ── Simulated mode ──
    pub simulated_turns: usize,
    pub case_search_k: usize,
    pub case_search_threshold: f32,

    // ── Providers ──
    pub llm: ProviderConfig,
    pub embedding: EmbeddingProviderConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            language: LanguageMode::Bilingual,
            dedup_threshold: 0.75,
            throttle_interval_secs: 7,
            ranker_context_chars: 6000,
            ranked_limit: 10,
            high_score_threshold: 0.6,
            min_high_count: 5,
            oracle_timeout_secs: 45,
            match_strategy: MatchStrategy::Lexical,
            lexical_min_overlap: 3,
            lexical_min_ratio: 0.55,
            embedding_similarity_threshold: 0.74,
            coherence_context_entries: 10,
            history_max_entries: 400,
            history_retain_entries: 300,
            follow_up_max_entries: 200,
            follow_up_retain_entries: 150,
            summary_context_chars: 9000,
            snapshot_transcript_chars: 12000,
            follow_up_history_turns: 8,
            follow_up_unasked_limit: 20,
            session_idle_timeout_secs: 4 * 60 * 60,
            eviction_interval_secs: 300,
            max_sessions: None,
            simulated_turns: 6,
            case_search_k: 5,
            case_search_threshold: 0.19,
            llm: ProviderConfig::default(),
            embedding: EmbeddingProviderConfig::default(),
        }
    }
}

/// Settings update request (partial update)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SettingsUpdate {
    pub language: Option<LanguageMode>,
    pub dedup_threshold: Option<f64>,
    pub throttle_interval_secs: Option<u64>,
    pub oracle_timeout_secs: Option<u64>,
    pub match_strategy: Option<MatchStrategy>,
    pub session_idle_timeout_secs: Option<u64>,
    pub max_sessions: Option<usize>,
    pub llm_model: Option<String>,
    pub llm_base_url: Option<String>,
    pub embedding_model: Option<String>,
}

impl EngineConfig {
    /// Apply a partial update to the configuration
    pub fn apply_update(&mut self, update: SettingsUpdate) {
        if let Some(language) = update.language {
            self.language = language;
        }
        if let Some(threshold) = update.dedup_threshold {
            self.dedup_threshold = threshold;
        }
        if let Some(interval) = update.throttle_interval_secs {
            self.throttle_interval_secs = interval;
        }
        if let Some(timeout) = update.oracle_timeout_secs {
            self.oracle_timeout_secs = timeout;
        }
        if let Some(strategy) = update.match_strategy {
            self.match_strategy = strategy;
        }
        if let Some(idle) = update.session_idle_timeout_secs {
            self.session_idle_timeout_secs = idle;
        }
        if let Some(max) = update.max_sessions {
            self.max_sessions = Some(max);
        }
        if let Some(model) = update.llm_model {
            self.llm.model = model;
        }
        if let Some(base_url) = update.llm_base_url {
            self.llm.base_url = Some(base_url);
        }
        if let Some(model) = update.embedding_model {
            self.embedding.model = model;
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        let unit = |name: &str, value: f64| -> Result<(), String> {
            if (0.0..=1.0).contains(&value) {
                Ok(())
            } else {
                Err(format!("{} must be within [0, 1], got {}", name, value))
            }
        };

        unit("dedup_threshold", self.dedup_threshold)?;
        unit("high_score_threshold", self.high_score_threshold)?;
        unit("lexical_min_ratio", self.lexical_min_ratio)?;
        unit(
            "embedding_similarity_threshold",
            f64::from(self.embedding_similarity_threshold),
        )?;
        unit("case_search_threshold", f64::from(self.case_search_threshold))?;

        if self.ranked_limit == 0 {
            return Err("ranked_limit must be at least 1".to_string());
        }
        if self.min_high_count > self.ranked_limit {
            return Err("min_high_count cannot exceed ranked_limit".to_string());
        }
        if self.oracle_timeout_secs == 0 {
            return Err("oracle_timeout_secs must be at least 1 second".to_string());
        }
        if self.history_retain_entries < MIN_HISTORY_RETAIN
            || self.history_retain_entries > self.history_max_entries
        {
            return Err(format!(
                "history_retain_entries must be within {}..=history_max_entries",
                MIN_HISTORY_RETAIN
            ));
        }
        if self.follow_up_retain_entries == 0
            || self.follow_up_retain_entries > self.follow_up_max_entries
        {
            return Err(
                "follow_up_retain_entries must be within 1..=follow_up_max_entries".to_string(),
            );
        }
        if self.ranker_context_chars == 0
            || self.summary_context_chars == 0
            || self.snapshot_transcript_chars == 0
        {
            return Err("context clip sizes must be non-zero".to_string());
        }
        if self.session_idle_timeout_secs == 0 || self.eviction_interval_secs == 0 {
            return Err("session lifecycle intervals must be non-zero".to_string());
        }
        if self.max_sessions == Some(0) {
            return Err("max_sessions cannot be 0".to_string());
        }
        if self.llm.model.trim().is_empty() {
            return Err("llm.model must not be empty".to_string());
        }

        Ok(())
    }
}
