//! Utterance-to-Question Matcher
//!
//! Decides which outstanding candidate questions an utterance covers. The
//! exact/substring rule always runs first inside the session lock; whatever
//! is still unasked goes to a pluggable `MatchPolicy`. Policies that can
//! answer synchronously run in the same critical section; only network-backed
//! ones are consulted after the lock is released.

use std::sync::Arc;

use async_trait::async_trait;
use interview_assist_core::{normalize, normalized_tokens};
use interview_assist_llm::EmbeddingProvider;
use serde::{Deserialize, Serialize};

use crate::models::settings::{EngineConfig, MatchStrategy};

use super::registry::SessionRegistry;
use super::state::{MarkedQuestion, Session, SessionKey};

/// An unasked question handed to a match policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchCandidate {
    /// Normalized identity key
    pub key: String,
    /// Original text
    pub text: String,
}

/// Result of a mark-asked request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkAskedOutcome {
    /// Number of questions newly marked
    pub matched: usize,
    /// Texts of the questions newly marked, in stored order per pass
    pub questions: Vec<String>,
    /// Identifiers of the newly marked questions that carry one
    #[serde(default)]
    pub ids: Vec<String>,
}

impl From<Vec<MarkedQuestion>> for MarkAskedOutcome {
    fn from(marked: Vec<MarkedQuestion>) -> Self {
        let ids = marked.iter().filter_map(|m| m.id.clone()).collect();
        Self {
            matched: marked.len(),
            questions: marked.into_iter().map(|m| m.text).collect(),
            ids,
        }
    }
}

/// Fallback strategy for questions the substring rule did not cover.
#[async_trait]
pub trait MatchPolicy: Send + Sync {
    /// Policy name for logs
    fn name(&self) -> &'static str;

    /// Return the keys of `candidates` that `utterance` covers.
    ///
    /// Must not fail; an unusable backend yields no matches.
    async fn matches(&self, utterance: &str, candidates: &[MatchCandidate]) -> Vec<String>;

    /// Same as [`MatchPolicy::matches`] for policies that need no I/O.
    ///
    /// A `Some` answer is applied while the session lock is still held.
    fn matches_now(
        &self,
        _utterance: &str,
        _candidates: &[MatchCandidate],
    ) -> Option<Vec<String>> {
        None
    }
}

// ============================================================================
// Lexical
// ============================================================================

/// Token-overlap policy.
///
/// A question matches when it shares at least `min_overlap` tokens with the
/// utterance and the overlap covers at least `min_ratio` of the smaller set.
#[derive(Debug, Clone)]
pub struct LexicalPolicy {
    pub min_overlap: usize,
    pub min_ratio: f64,
}

impl Default for LexicalPolicy {
    fn default() -> Self {
        Self {
            min_overlap: 3,
            min_ratio: 0.55,
        }
    }
}

impl LexicalPolicy {
    /// Whether a normalized question matches a normalized utterance.
    pub fn is_match(&self, question: &str, utterance: &str) -> bool {
        let q = normalized_tokens(question);
        let u = normalized_tokens(utterance);
        let overlap = q.intersection(&u).count();
        let ratio = overlap as f64 / q.len().min(u.len()).max(1) as f64;
        overlap >= self.min_overlap && ratio >= self.min_ratio
    }

    fn matching_keys(&self, utterance: &str, candidates: &[MatchCandidate]) -> Vec<String> {
        let utterance = normalize(utterance);
        candidates
            .iter()
            .filter(|c| self.is_match(&c.key, &utterance))
            .map(|c| c.key.clone())
            .collect()
    }
}

#[async_trait]
impl MatchPolicy for LexicalPolicy {
    fn name(&self) -> &'static str {
        "lexical"
    }

    async fn matches(&self, utterance: &str, candidates: &[MatchCandidate]) -> Vec<String> {
        self.matching_keys(utterance, candidates)
    }

    fn matches_now(
        &self,
        utterance: &str,
        candidates: &[MatchCandidate],
    ) -> Option<Vec<String>> {
        Some(self.matching_keys(utterance, candidates))
    }
}

// ============================================================================
// Embedding
// ============================================================================

/// Compute the cosine similarity between two vectors.
///
/// Returns 0.0 when either vector has zero magnitude or the lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut mag_a = 0.0f32;
    let mut mag_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        mag_a += x * x;
        mag_b += y * y;
    }

    let denom = mag_a.sqrt() * mag_b.sqrt();
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}

/// Semantic policy: cosine similarity of embeddings at or above `threshold`.
pub struct EmbeddingPolicy {
    provider: Arc<dyn EmbeddingProvider>,
    threshold: f32,
}

impl EmbeddingPolicy {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, threshold: f32) -> Self {
        Self {
            provider,
            threshold,
        }
    }
}

#[async_trait]
impl MatchPolicy for EmbeddingPolicy {
    fn name(&self) -> &'static str {
        "embedding"
    }

    async fn matches(&self, utterance: &str, candidates: &[MatchCandidate]) -> Vec<String> {
        if candidates.is_empty() || utterance.trim().is_empty() {
            return Vec::new();
        }

        // Utterance first, then every candidate, in one batch.
        let mut inputs: Vec<&str> = Vec::with_capacity(candidates.len() + 1);
        inputs.push(utterance.trim());
        inputs.extend(candidates.iter().map(|c| c.text.as_str()));

        let vectors = match self.provider.embed_documents(&inputs).await {
            Ok(v) if v.len() == inputs.len() => v,
            Ok(v) => {
                tracing::warn!(
                    expected = inputs.len(),
                    got = v.len(),
                    "embedding count mismatch; skipping semantic match"
                );
                return Vec::new();
            }
            Err(e) => {
                tracing::warn!(
                    provider = self.provider.display_name(),
                    error = %e,
                    "embedding failed; skipping semantic match"
                );
                return Vec::new();
            }
        };

        let (utterance_vec, question_vecs) = vectors.split_at(1);
        candidates
            .iter()
            .zip(question_vecs)
            .filter(|(_, v)| cosine_similarity(&utterance_vec[0], v) >= self.threshold)
            .map(|(c, _)| c.key.clone())
            .collect()
    }
}

/// Build the policy selected by `match_strategy`.
///
/// The embedding strategy falls back to lexical when no provider is given.
pub fn policy_from_config(
    config: &EngineConfig,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
) -> Arc<dyn MatchPolicy> {
    let lexical = || -> Arc<dyn MatchPolicy> {
        Arc::new(LexicalPolicy {
            min_overlap: config.lexical_min_overlap,
            min_ratio: config.lexical_min_ratio,
        })
    };
    match (config.match_strategy, embedder) {
        (MatchStrategy::Embedding, Some(provider)) => Arc::new(EmbeddingPolicy::new(
            provider,
            config.embedding_similarity_threshold,
        )),
        (MatchStrategy::Embedding, None) => {
            tracing::warn!("embedding match strategy without a provider; using lexical");
            lexical()
        }
        (MatchStrategy::Lexical, _) => lexical(),
    }
}

// ============================================================================
// Matcher
// ============================================================================

/// Marks applied inside one critical section.
///
/// `deferred` holds the reset epoch and the still-unasked questions when the
/// policy has to be awaited; [`QuestionMatcher::settle`] finishes the job.
#[derive(Debug, Default)]
pub struct LockedMarks {
    marked: Vec<MarkedQuestion>,
    deferred: Option<(u64, Vec<MatchCandidate>)>,
}

/// Marks candidate questions as asked from free-text utterances.
#[derive(Clone)]
pub struct QuestionMatcher {
    registry: Arc<SessionRegistry>,
    policy: Arc<dyn MatchPolicy>,
}

impl QuestionMatcher {
    pub fn new(registry: Arc<SessionRegistry>, policy: Arc<dyn MatchPolicy>) -> Self {
        Self { registry, policy }
    }

    pub fn policy_name(&self) -> &'static str {
        self.policy.name()
    }

    /// Apply the substring rule, and the policy when it can answer without
    /// awaiting, to a session the caller has locked.
    pub fn mark_in_session(&self, session: &mut Session, utterance: &str) -> LockedMarks {
        let normalized = normalize(utterance);
        if normalized.is_empty() {
            return LockedMarks::default();
        }

        let mut marked = session.mark_substring_matches(&normalized);
        let remaining: Vec<MatchCandidate> = session
            .unasked()
            .map(|q| MatchCandidate {
                key: q.normalized.clone(),
                text: q.text.clone(),
            })
            .collect();
        if remaining.is_empty() {
            return LockedMarks {
                marked,
                deferred: None,
            };
        }

        match self.policy.matches_now(utterance, &remaining) {
            Some(keys) => {
                marked.extend(session.mark_asked_keys(&keys));
                LockedMarks {
                    marked,
                    deferred: None,
                }
            }
            None => LockedMarks {
                marked,
                deferred: Some((session.epoch(), remaining)),
            },
        }
    }

    /// Consult a deferred policy and write its matches back, unless the
    /// session was reset since the marks were taken.
    pub async fn settle(
        &self,
        key: &SessionKey,
        utterance: &str,
        locked: LockedMarks,
    ) -> MarkAskedOutcome {
        let LockedMarks {
            mut marked,
            deferred,
        } = locked;

        if let Some((epoch, remaining)) = deferred {
            let keys = self.policy.matches(utterance, &remaining).await;
            if !keys.is_empty() {
                if let Some(more) = self
                    .registry
                    .with_session_at_epoch(key, epoch, |s| s.mark_asked_keys(&keys))
                    .await
                {
                    marked.extend(more);
                }
            }
        }

        if !marked.is_empty() {
            tracing::debug!(
                session = %key,
                policy = self.policy.name(),
                matched = marked.len(),
                "marked questions as asked"
            );
        }
        marked.into()
    }

    /// Mark every unasked question the utterance covers.
    pub async fn mark_asked(&self, key: &SessionKey, utterance: &str) -> MarkAskedOutcome {
        let locked = self
            .registry
            .with_session(key, |s| self.mark_in_session(s, utterance))
            .await;
        self.settle(key, utterance, locked).await
    }

    /// Mark the question with the given external id. Unknown ids match nothing.
    pub async fn mark_asked_by_id(&self, key: &SessionKey, id: &str) -> MarkAskedOutcome {
        let marked = self
            .registry
            .with_session(key, |s| s.mark_asked_by_id(id))
            .await;
        marked.into_iter().collect::<Vec<_>>().into()
    }
}
