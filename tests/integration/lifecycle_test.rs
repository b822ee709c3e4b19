//! Session Lifecycle Integration Tests
//!
//! Simulated conversations, finalization snapshots, follow-up chat and the
//! reset epoch guard on results that arrive late.

use std::sync::Arc;

use async_trait::async_trait;
use interview_assist::services::live_session::{
    CandidateInput, ConversationPhase, DialogueOracle, FollowUpPrompt, FollowUpRole,
    OracleResult,
};
use interview_assist::{
    AppError, ConversationMode, ConversationRequest, EngineConfig, LanguageMode,
    RecommendedQuestion, SessionEvent, SessionOrchestrator,
};
use tokio::sync::Notify;

use crate::support::{
    engine_with, key, messages, pneumonia_case, recommendations, ScriptedOracle, StaticCases,
    PATIENT_REPLY, SUMMARY,
};

fn simulated(conversation: &str, seed: &str) -> ConversationRequest {
    ConversationRequest::utterance(
        key(conversation),
        ConversationMode::Simulated,
        "Patient",
        seed,
        LanguageMode::Bilingual,
    )
}

fn two_turns() -> EngineConfig {
    EngineConfig {
        simulated_turns: 2,
        ..Default::default()
    }
}

// ============================================================================
// Simulated mode
// ============================================================================

#[tokio::test]
async fn test_simulated_conversation_runs_turns_then_finalizes() {
    let oracle = Arc::new(ScriptedOracle::new());
    let cases = Arc::new(StaticCases::found(vec![pneumonia_case()]));
    let engine = SessionOrchestrator::builder(two_turns())
        .scoring_oracle(oracle.clone())
        .dialogue_oracle(oracle.clone())
        .case_search(cases.clone())
        .build()
        .unwrap();
    let k = key("sim");
    engine
        .add_candidate_questions(
            &k,
            vec![
                CandidateInput::from("How long have you had the cough?"),
                CandidateInput::from("Any blood in the sputum?"),
            ],
        )
        .await;

    let events = engine
        .events(simulated("sim", "I have a bad cough"))
        .await
        .unwrap();

    // seed, 2 x (recommendation, clinician, patient), finalized
    assert_eq!(events.len(), 8);
    assert_eq!(recommendations(&events), 2);
    let roles: Vec<String> = messages(&events).into_iter().map(|(role, _)| role).collect();
    assert_eq!(
        roles,
        vec!["Patient", "Clinician", "Patient", "Clinician", "Patient"]
    );
    assert_eq!(messages(&events)[2].1, PATIENT_REPLY);

    match events.last() {
        Some(SessionEvent::Finalized {
            summary_and_plan,
            unasked,
            ..
        }) => {
            assert_eq!(summary_and_plan, SUMMARY);
            // the clinician asked the cough question during the loop
            assert_eq!(unasked.len(), 1);
            assert_eq!(unasked[0].question, "Any blood in the sputum?");
        }
        other => panic!("expected finalized event, got {:?}", other),
    }

    let queries = cases.queries.lock().unwrap().clone();
    assert_eq!(queries, vec![("I have a bad cough".to_string(), 5, 0.19)]);
    let contexts = oracle.recommend_contexts.lock().unwrap().clone();
    assert!(contexts[0].contains("Community-acquired pneumonia"));
    assert_eq!(ScriptedOracle::count(&oracle.patient_calls), 2);
}

#[tokio::test]
async fn test_simulation_continues_when_case_search_fails() {
    let oracle = Arc::new(ScriptedOracle::new());
    let engine = SessionOrchestrator::builder(two_turns())
        .dialogue_oracle(oracle.clone())
        .case_search(Arc::new(StaticCases::failing()))
        .build()
        .unwrap();

    let events = engine
        .events(simulated("sim-no-cases", "I have a bad cough"))
        .await
        .unwrap();

    assert_eq!(events.len(), 8);
    let contexts = oracle.recommend_contexts.lock().unwrap().clone();
    assert!(contexts.iter().all(|c| !c.contains("Similar cases")));
}

#[tokio::test]
async fn test_simulation_rejects_blank_seed() {
    let oracle = Arc::new(ScriptedOracle::new());
    let engine = engine_with(&oracle, two_turns());

    let err = engine.events(simulated("sim-blank", "   ")).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    assert!(engine.registry().history(&key("sim-blank")).await.is_empty());
}

// ============================================================================
// Finalize
// ============================================================================

#[tokio::test]
async fn test_finalize_stores_snapshot_and_keeps_history() {
    let oracle = Arc::new(ScriptedOracle::new());
    let engine = engine_with(&oracle, EngineConfig::default());
    let k = key("finalize");
    engine
        .registry()
        .append_history(&k, "Patient", "I have a cough")
        .await;
    engine
        .add_candidate_questions(&k, vec![CandidateInput::from("Any fever?")])
        .await;

    let events = engine
        .events(ConversationRequest::finalize(
            k.clone(),
            ConversationMode::TurnBased,
            LanguageMode::English,
        ))
        .await
        .unwrap();
    assert_eq!(events.len(), 1);
    assert!(events[0].is_terminal());

    let (snapshot, history, phase) = engine
        .registry()
        .with_session(&k, |s| (s.snapshot().cloned(), s.history().len(), s.phase()))
        .await;
    let snapshot = snapshot.expect("snapshot stored");
    assert_eq!(snapshot.summary_and_plan, SUMMARY);
    assert_eq!(snapshot.transcript, "Patient: I have a cough");
    assert_eq!(snapshot.unasked.len(), 1);
    assert_eq!(snapshot.language, LanguageMode::English);
    assert_eq!(history, 1);
    assert_eq!(phase, ConversationPhase::Finalized);
}

#[tokio::test]
async fn test_finalize_clips_summary_input_and_snapshot_transcript() {
    let oracle = Arc::new(ScriptedOracle::new());
    let config = EngineConfig {
        summary_context_chars: 50,
        snapshot_transcript_chars: 80,
        ..Default::default()
    };
    let engine = engine_with(&oracle, config);
    let k = key("clip");
    for i in 0..20 {
        engine
            .registry()
            .append_history(&k, "Patient", &format!("symptom report number {i}"))
            .await;
    }

    engine.finalize(&k, LanguageMode::English).await;

    let inputs = oracle.summary_inputs.lock().unwrap().clone();
    assert_eq!(inputs[0].chars().count(), 50);
    assert!(inputs[0].ends_with("symptom report number 19"));
    let snapshot = engine
        .registry()
        .with_session(&k, |s| s.snapshot().cloned())
        .await
        .unwrap();
    assert_eq!(snapshot.transcript.chars().count(), 80);
}

#[tokio::test]
async fn test_finalize_falls_back_to_placeholder_summary() {
    let oracle = Arc::new(ScriptedOracle::new().with_failing_summary());
    let engine = engine_with(&oracle, EngineConfig::default());
    let k = key("placeholder");
    engine
        .registry()
        .append_history(&k, "Patient", "Nina homa tangu jana")
        .await;

    let outcome = engine.finalize(&k, LanguageMode::Swahili).await;
    assert!(outcome.summary_and_plan.contains("Muhtasari haupatikani"));
    assert_eq!(ScriptedOracle::count(&oracle.summary_calls), 1);
}

// ============================================================================
// Follow-up
// ============================================================================

#[tokio::test]
async fn test_follow_up_is_grounded_on_snapshot() {
    let oracle = Arc::new(ScriptedOracle::new());
    let engine = engine_with(&oracle, EngineConfig::default());
    let k = key("follow-up");
    engine
        .registry()
        .append_history(&k, "Patient", "I have a cough")
        .await;
    engine
        .add_candidate_questions(
            &k,
            vec![
                CandidateInput::from("Any fever?"),
                CandidateInput::from("Do you smoke?"),
            ],
        )
        .await;
    engine.finalize(&k, LanguageMode::English).await;

    let first = engine
        .follow_up(&k, "What should I order?", LanguageMode::English)
        .await
        .unwrap();
    assert_eq!(first, "Consider a chest X-ray (2 unasked)");
    engine
        .follow_up(&k, "Anything urgent?", LanguageMode::English)
        .await
        .unwrap();

    let prompts = oracle.follow_ups.lock().unwrap().clone();
    assert_eq!(prompts[0].summary_and_plan, SUMMARY);
    assert_eq!(prompts[0].transcript, "Patient: I have a cough");
    assert!(prompts[0].previous_turns.is_empty());
    assert_eq!(prompts[1].previous_turns.len(), 2);
    assert_eq!(prompts[1].previous_turns[0].role, FollowUpRole::Clinician);

    let log = engine
        .registry()
        .with_session(&k, |s| s.follow_ups().len())
        .await;
    assert_eq!(log, 4);
}

#[tokio::test]
async fn test_follow_up_without_snapshot_uses_history() {
    let oracle = Arc::new(ScriptedOracle::new());
    let engine = engine_with(&oracle, EngineConfig::default());
    let k = key("follow-up-raw");
    engine
        .registry()
        .append_history(&k, "Patient", "My knee is swollen")
        .await;

    engine
        .follow_up(&k, "Could this be gout?", LanguageMode::English)
        .await
        .unwrap();

    let prompts = oracle.follow_ups.lock().unwrap().clone();
    assert_eq!(prompts[0].transcript, "Patient: My knee is swollen");
    assert_eq!(prompts[0].message, "Could this be gout?");
}

#[tokio::test]
async fn test_follow_up_rejects_empty_message() {
    let oracle = Arc::new(ScriptedOracle::new());
    let engine = engine_with(&oracle, EngineConfig::default());

    let err = engine
        .follow_up(&key("empty"), "  ", LanguageMode::English)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    assert!(oracle.follow_ups.lock().unwrap().is_empty());
}

// ============================================================================
// Reset epoch guard
// ============================================================================

/// Dialogue oracle whose summary waits until released.
struct GatedDialogue {
    started: Notify,
    release: Notify,
}

#[async_trait]
impl DialogueOracle for GatedDialogue {
    async fn summarize_and_plan(&self, _: &str, _: LanguageMode) -> OracleResult<String> {
        self.started.notify_one();
        self.release.notified().await;
        Ok("late summary".to_string())
    }

    async fn recommend_question(&self, _: &str, _: LanguageMode) -> OracleResult<String> {
        Ok("English: Any fever?".to_string())
    }

    async fn simulate_patient_reply(
        &self,
        _: &RecommendedQuestion,
        _: LanguageMode,
    ) -> OracleResult<String> {
        Ok("No".to_string())
    }

    async fn answer_follow_up(&self, _: &FollowUpPrompt) -> OracleResult<String> {
        Ok("ok".to_string())
    }
}

#[tokio::test]
async fn test_results_computed_before_reset_are_discarded() {
    let gate = Arc::new(GatedDialogue {
        started: Notify::new(),
        release: Notify::new(),
    });
    let engine = SessionOrchestrator::builder(EngineConfig::default())
        .dialogue_oracle(gate.clone())
        .build()
        .unwrap();
    let k = key("epoch");
    engine
        .registry()
        .append_history(&k, "Patient", "I have a cough")
        .await;

    let pending = {
        let engine = engine.clone();
        let k = k.clone();
        tokio::spawn(async move { engine.finalize(&k, LanguageMode::English).await })
    };
    gate.started.notified().await;
    engine.reset(&k).await;
    gate.release.notify_one();

    let outcome = pending.await.unwrap();
    assert_eq!(outcome.summary_and_plan, "late summary");

    let (snapshot, phase) = engine
        .registry()
        .with_session(&k, |s| (s.snapshot().is_some(), s.phase()))
        .await;
    assert!(!snapshot);
    assert_eq!(phase, ConversationPhase::Idle);
}
