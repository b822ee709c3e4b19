//! Session State Integration Tests
//!
//! Candidate intake, utterance matching, reset and idle eviction through the
//! orchestrator's public surface.

use std::time::Duration;

use interview_assist::services::live_session::{
    CandidateInput, ConversationPhase, SessionRegistry,
};
use interview_assist::{EngineConfig, LanguageMode, SessionOrchestrator};

use crate::support::{heuristic_engine, key};

// ============================================================================
// Candidate intake
// ============================================================================

#[tokio::test]
async fn test_intake_is_idempotent_by_normalized_text() {
    let engine = heuristic_engine();
    let k = key("intake");

    let first = engine
        .add_candidate_questions(&k, vec![CandidateInput::with_id("q1", "Any fever?")])
        .await;
    assert_eq!((first.added, first.total), (1, 1));

    let second = engine
        .add_candidate_questions(&k, vec![CandidateInput::with_id("q2", "  any FEVER ")])
        .await;
    assert_eq!((second.added, second.total), (0, 1));
}

#[tokio::test]
async fn test_intake_skips_blank_and_punctuation_only_items() {
    let engine = heuristic_engine();
    let k = key("blank-intake");

    let outcome = engine
        .add_candidate_questions(
            &k,
            vec![
                CandidateInput::from("   "),
                CandidateInput::from("???"),
                CandidateInput::from("Do you smoke?"),
            ],
        )
        .await;
    assert_eq!((outcome.added, outcome.total), (1, 1));
}

#[tokio::test]
async fn test_intake_keeps_first_seen_phrasing_of_near_duplicates() {
    let engine = heuristic_engine();
    let k = key("dedup");

    let outcome = engine
        .add_candidate_questions(
            &k,
            vec![
                CandidateInput::from("Do you have a fever?"),
                CandidateInput::from("Do you have fever?"),
            ],
        )
        .await;
    assert_eq!(outcome.added, 1);

    let stored = engine
        .registry()
        .with_session(&k, |s| s.unasked_texts())
        .await;
    assert_eq!(stored, vec!["Do you have a fever?"]);
}

// ============================================================================
// Mark asked
// ============================================================================

#[tokio::test]
async fn test_substring_match_takes_precedence() {
    let engine = heuristic_engine();
    let k = key("substring");
    engine
        .add_candidate_questions(&k, vec![CandidateInput::from("pain")])
        .await;

    let outcome = engine.mark_asked(&k, "I have chest pain today").await;
    assert_eq!(outcome.matched, 1);
    assert_eq!(outcome.questions, vec!["pain"]);
}

#[tokio::test]
async fn test_token_overlap_floor() {
    let engine = heuristic_engine();
    let k = key("overlap");
    engine
        .add_candidate_questions(&k, vec![CandidateInput::from("Any recent travel abroad?")])
        .await;

    // two shared tokens never match through the fallback
    let weak = engine.mark_asked(&k, "Did you travel recently abroad").await;
    assert_eq!(weak.matched, 0);

    let strong = engine.mark_asked(&k, "Have you had any recent travel").await;
    assert_eq!(strong.matched, 1);
}

#[tokio::test]
async fn test_asked_flag_is_monotonic() {
    let engine = heuristic_engine();
    let k = key("monotonic");
    engine
        .add_candidate_questions(
            &k,
            vec![
                CandidateInput::with_id("q-fever", "Any fever?"),
                CandidateInput::from("Do you smoke?"),
            ],
        )
        .await;

    assert_eq!(engine.mark_asked_by_id(&k, "q-fever").await.matched, 1);
    assert_eq!(engine.mark_asked_by_id(&k, "q-fever").await.matched, 0);
    assert_eq!(engine.mark_asked(&k, "any fever").await.matched, 0);

    // re-adding the same question does not revive it
    engine
        .add_candidate_questions(&k, vec![CandidateInput::from("Any fever?")])
        .await;
    let unasked = engine
        .registry()
        .with_session(&k, |s| s.unasked_texts())
        .await;
    assert_eq!(unasked, vec!["Do you smoke?"]);
}

#[tokio::test]
async fn test_unknown_id_and_blank_utterance_match_nothing() {
    let engine = heuristic_engine();
    let k = key("unknown");
    engine
        .add_candidate_questions(&k, vec![CandidateInput::from("Any fever?")])
        .await;

    assert_eq!(engine.mark_asked_by_id(&k, "nope").await.matched, 0);
    assert_eq!(engine.mark_asked(&k, "   ").await.matched, 0);
}

// ============================================================================
// Reset
// ============================================================================

#[tokio::test]
async fn test_reset_clears_everything() {
    let engine = heuristic_engine();
    let k = key("reset");
    engine
        .add_candidate_questions(&k, vec![CandidateInput::from("Any fever?")])
        .await;
    engine
        .registry()
        .append_history(&k, "Patient", "I have a cough")
        .await;
    engine.finalize(&k, LanguageMode::English).await;
    engine
        .follow_up(&k, "What should I check first?", LanguageMode::English)
        .await
        .unwrap();

    engine.reset(&k).await;

    let (history, questions, snapshot, follow_ups, phase) = engine
        .registry()
        .with_session(&k, |s| {
            (
                s.history().len(),
                s.questions().len(),
                s.snapshot().is_some(),
                s.follow_ups().len(),
                s.phase(),
            )
        })
        .await;
    assert_eq!(history, 0);
    assert_eq!(questions, 0);
    assert!(!snapshot);
    assert_eq!(follow_ups, 0);
    assert_eq!(phase, ConversationPhase::Idle);
}

#[tokio::test]
async fn test_reset_of_one_key_leaves_others() {
    let engine = heuristic_engine();
    let (a, b) = (key("a"), key("b"));
    engine.registry().append_history(&a, "Patient", "cough").await;
    engine.registry().append_history(&b, "Patient", "fever").await;

    engine.reset(&a).await;

    assert!(engine.registry().history(&a).await.is_empty());
    assert_eq!(engine.registry().history(&b).await.len(), 1);
}

// ============================================================================
// Eviction
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_idle_sessions_are_evicted() {
    let registry = SessionRegistry::default();
    registry.append_history(&key("old"), "Patient", "cough").await;
    tokio::time::advance(Duration::from_secs(3 * 3600)).await;
    registry.append_history(&key("new"), "Patient", "fever").await;

    let evicted = registry.evict_idle(Duration::from_secs(2 * 3600)).await;
    assert_eq!(evicted, 1);
    assert_eq!(registry.session_count().await, 1);
    assert!(registry.get(&key("old")).await.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_background_sweeper_evicts_idle_sessions() {
    let config = EngineConfig {
        session_idle_timeout_secs: 600,
        eviction_interval_secs: 300,
        ..Default::default()
    };
    let engine = SessionOrchestrator::builder(config).build().unwrap();
    engine
        .registry()
        .append_history(&key("sweep"), "Patient", "cough")
        .await;
    let sweeper = engine.spawn_eviction_task();

    tokio::time::sleep(Duration::from_secs(901)).await;

    assert_eq!(engine.registry().session_count().await, 0);
    sweeper.abort();
}

#[tokio::test(start_paused = true)]
async fn test_session_cap_evicts_least_recently_used() {
    let config = EngineConfig {
        max_sessions: Some(2),
        ..Default::default()
    };
    let engine = SessionOrchestrator::builder(config).build().unwrap();
    let registry = engine.registry();

    let tick = Duration::from_secs(1);
    registry.append_history(&key("first"), "Patient", "one").await;
    tokio::time::advance(tick).await;
    registry.append_history(&key("second"), "Patient", "two").await;
    tokio::time::advance(tick).await;
    // touch the first so the second is the oldest
    registry.append_history(&key("first"), "Patient", "again").await;
    tokio::time::advance(tick).await;
    registry.append_history(&key("third"), "Patient", "three").await;

    assert_eq!(registry.session_count().await, 2);
    assert!(registry.get(&key("second")).await.is_none());
    assert!(registry.get(&key("first")).await.is_some());
}
