//! Coherence Filter
//!
//! Drops transcription noise before it reaches the conversation history:
//! fillers, platform boilerplate, microphone tests and off-topic chatter.

use regex::Regex;
use std::sync::OnceLock;

/// Minimum trimmed length of an accepted utterance.
const MIN_CHARS: usize = 3;

/// A character repeated this many times in a row marks garbled output.
const MAX_CHAR_RUN: usize = 5;

/// Context longer than this makes off-topic utterances suspicious.
const OFF_TOPIC_CONTEXT_CHARS: usize = 100;

/// Utterances with at least this many words must look clinical or conversational.
const TOPIC_CHECK_MIN_WORDS: usize = 3;

/// Bilingual (English / Swahili) clinical vocabulary.
const MEDICAL_KEYWORDS: &[&str] = &[
    "pain", "ache", "hurt", "feel", "symptom", "sick", "ill", "doctor", "hospital",
    "medicine", "treatment", "diagnosis", "test", "exam", "blood", "pressure",
    "headache", "fever", "cough", "breath", "chest", "stomach", "back", "leg", "arm",
    "week", "month", "day", "year", "ago", "started", "began", "worse", "better",
    "maumivu", "homa", "kichwa", "kifua", "tumbo", "mguu", "mkono", "daktari",
    "hospitali", "dawa", "matibabu", "ugonjwa", "dalili", "kipimo",
];

const CONVERSATIONAL_PHRASES: &[&str] = &[
    "i have", "i feel", "it started", "it hurts", "when i", "how long",
    "what about", "can you", "could you", "should i", "is it",
    "nina", "nimehisi", "inauma", "tangu", "wiki", "siku",
];

/// Noise patterns, matched against the lowercased, trimmed utterance.
fn noise_patterns() -> &'static Vec<Regex> {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            // fillers
            r"^(um+|uh+|hmm+|ah+|oh+)$",
            // bare acknowledgements
            r"^(okay|ok|yeah|yes|no|maybe)$",
            // video platform boilerplate
            r"(thank you for watching|subscribe|like and subscribe)",
            r"(subtitles|captions|music|applause|laughter)",
            // symbols only
            r"^[\W_]+$",
            // microphone tests
            r"^(one[\s,]*two[\s,]*three|testing[\s,]*one|check[\s,]*one|mic[\s,]*check)",
            r"^(test(ing)?[\s,]*\d+)",
            r"(one two three|1 2 3|testing testing)",
        ]
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
    })
}

/// True when some character repeats `MAX_CHAR_RUN` or more times in a row.
fn has_long_char_run(text: &str) -> bool {
    let mut prev: Option<char> = None;
    let mut run = 0usize;
    for ch in text.chars() {
        if Some(ch) == prev {
            run += 1;
        } else {
            prev = Some(ch);
            run = 1;
        }
        if run >= MAX_CHAR_RUN {
            return true;
        }
    }
    false
}

/// Decide whether a transcribed utterance should enter the conversation.
///
/// `context` is the recent conversation (a few history lines). Never fails;
/// `false` means the utterance should be dropped silently.
pub fn is_coherent(text: &str, context: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.chars().count() < MIN_CHARS {
        return false;
    }

    let lowered = trimmed.to_lowercase();

    if noise_patterns().iter().any(|re| re.is_match(&lowered)) {
        return false;
    }
    if has_long_char_run(&lowered) {
        return false;
    }
    if trimmed.chars().count() < 5 && trimmed.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }

    if trimmed.split_whitespace().count() >= TOPIC_CHECK_MIN_WORDS {
        let on_topic = MEDICAL_KEYWORDS.iter().any(|k| lowered.contains(k))
            || CONVERSATIONAL_PHRASES.iter().any(|p| lowered.contains(p));
        if !on_topic && context.chars().count() > OFF_TOPIC_CONTEXT_CHARS {
            return false;
        }
    }

    true
}
