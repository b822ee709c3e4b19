//! Question Deduplicator
//!
//! Collapses near-duplicate candidate questions. Similarity blends token
//! Jaccard (40%) with a character-level sequence ratio (60%) over the
//! normalized forms. The sequence ratio is Ratcliff/Obershelp: twice the
//! total length of the longest matching blocks over the combined length.

use difflib::sequencematcher::SequenceMatcher;
use interview_assist_core::{normalize, normalized_tokens};

/// Default combined-similarity threshold.
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.75;

const JACCARD_WEIGHT: f64 = 0.4;
const SEQUENCE_WEIGHT: f64 = 0.6;

/// Combined similarity of two questions in [0, 1].
///
/// Returns 0.0 when either side normalizes to an empty string.
pub fn similarity(a: &str, b: &str) -> f64 {
    let na = normalize(a);
    let nb = normalize(b);
    normalized_similarity(&na, &nb)
}

fn normalized_similarity(na: &str, nb: &str) -> f64 {
    if na.is_empty() || nb.is_empty() {
        return 0.0;
    }

    let ta = normalized_tokens(na);
    let tb = normalized_tokens(nb);
    let union = ta.union(&tb).count();
    let jaccard = if union == 0 {
        0.0
    } else {
        ta.intersection(&tb).count() as f64 / union as f64
    };

    JACCARD_WEIGHT * jaccard + SEQUENCE_WEIGHT * sequence_ratio(na, nb)
}

/// Matching-blocks ratio over the characters of two strings.
fn sequence_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    f64::from(SequenceMatcher::new(&a, &b).ratio())
}

/// Whether two questions are near duplicates at `threshold`.
pub fn are_similar(a: &str, b: &str, threshold: f64) -> bool {
    similarity(a, b) >= threshold
}

/// Deduplicate items by their question text, keeping the first-seen item of
/// each cluster.
///
/// Greedy and left-to-right: each item is compared against the items already
/// kept. Items with blank text are dropped; output order follows input order.
pub fn dedup_by<T, F>(items: impl IntoIterator<Item = T>, threshold: f64, text: F) -> Vec<T>
where
    F: Fn(&T) -> &str,
{
    let mut kept: Vec<(T, String)> = Vec::new();

    for item in items {
        let original = text(&item).trim();
        if original.is_empty() {
            continue;
        }
        let norm = normalize(original);
        let duplicate = kept
            .iter()
            .any(|(_, seen)| normalized_similarity(&norm, seen) >= threshold);
        if !duplicate {
            kept.push((item, norm));
        }
    }

    kept.into_iter().map(|(item, _)| item).collect()
}

/// Deduplicate question strings; see [`dedup_by`].
pub fn dedup_questions<S: AsRef<str>>(questions: &[S], threshold: f64) -> Vec<String> {
    dedup_by(
        questions.iter().map(|q| q.as_ref().trim().to_string()),
        threshold,
        |q| q.as_str(),
    )
}
