//! Live and Turn-Based Mode Integration Tests
//!
//! Coherence gating, throttled recommendations and the event sequence a
//! single utterance produces.

use std::sync::Arc;
use std::time::Duration;

use interview_assist::services::live_session::{CandidateInput, ConversationPhase};
use interview_assist::{
    ConversationMode, ConversationRequest, EngineConfig, LanguageMode, SessionEvent,
};
use tokio_stream::StreamExt;

use crate::support::{engine_with, key, messages, recommendations, ScriptedOracle};

fn live(conversation: &str, text: &str) -> ConversationRequest {
    ConversationRequest::utterance(
        key(conversation),
        ConversationMode::Live,
        "Speaker",
        text,
        LanguageMode::Bilingual,
    )
}

// ============================================================================
// Live mode
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_live_utterances_are_throttled() {
    let oracle = Arc::new(ScriptedOracle::new());
    let engine = engine_with(&oracle, EngineConfig::default());
    let k = key("throttle");

    let first = engine
        .events(live("throttle", "I have chest pain since yesterday"))
        .await
        .unwrap();
    assert_eq!(recommendations(&first), 1);
    let stamped = engine
        .registry()
        .with_session(&k, |s| s.last_recommendation())
        .await;
    assert!(stamped.is_some());

    tokio::time::advance(Duration::from_secs(3)).await;
    let second = engine
        .events(live("throttle", "The pain spreads to my left arm"))
        .await
        .unwrap();
    assert_eq!(recommendations(&second), 0);
    assert_eq!(second.len(), 1, "only the patient message is emitted");
    assert_eq!(ScriptedOracle::count(&oracle.recommend_calls), 1);
    let unchanged = engine
        .registry()
        .with_session(&k, |s| s.last_recommendation())
        .await;
    assert_eq!(unchanged, stamped);

    tokio::time::advance(Duration::from_secs(7)).await;
    let third = engine
        .events(live("throttle", "I also feel short of breath"))
        .await
        .unwrap();
    assert_eq!(recommendations(&third), 1);
    assert_eq!(ScriptedOracle::count(&oracle.recommend_calls), 2);
}

#[tokio::test]
async fn test_concurrent_live_utterances_emit_one_recommendation() {
    let oracle = Arc::new(ScriptedOracle::new());
    let engine = engine_with(&oracle, EngineConfig::default());

    let (a, b) = tokio::join!(
        engine.events(live("race", "My head hurts a lot")),
        engine.events(live("race", "The headache started this morning")),
    );
    let total = recommendations(&a.unwrap()) + recommendations(&b.unwrap());
    assert_eq!(total, 1);
    assert_eq!(engine.registry().history(&key("race")).await.len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_history_order_follows_lock_acquisition_order() {
    let oracle = Arc::new(ScriptedOracle::new());
    let engine = engine_with(&oracle, EngineConfig::default());
    let k = key("ordering");

    let tasks: Vec<_> = (0..32)
        .map(|i| {
            let registry = engine.registry().clone();
            let k = k.clone();
            tokio::spawn(async move {
                let position = registry
                    .with_session(&k, |s| {
                        s.append_history("Patient", &format!("report {i}"));
                        s.history().len()
                    })
                    .await;
                (i, position)
            })
        })
        .collect();

    let mut positions = Vec::new();
    for task in tasks {
        positions.push(task.await.unwrap());
    }

    let history = engine.registry().history(&k).await;
    assert_eq!(history.len(), 32);
    for (i, position) in positions {
        assert_eq!(history[position - 1].text, format!("report {i}"));
    }
}

#[tokio::test]
async fn test_live_mode_records_patient_role_and_marks_questions() {
    let oracle = Arc::new(ScriptedOracle::new());
    let engine = engine_with(&oracle, EngineConfig::default());
    let k = key("live-role");
    engine
        .add_candidate_questions(
            &k,
            vec![
                CandidateInput::from("Chest pain"),
                CandidateInput::from("Any night sweats?"),
            ],
        )
        .await;

    let events = engine
        .events(live("live-role", "I have chest pain when I climb stairs"))
        .await
        .unwrap();

    assert_eq!(
        messages(&events),
        vec![(
            "Patient".to_string(),
            "I have chest pain when I climb stairs".to_string()
        )]
    );
    match events.last() {
        Some(SessionEvent::RankedUnasked { questions, .. }) => {
            assert_eq!(questions.len(), 1);
            assert_eq!(questions[0].question, "Any night sweats?");
        }
        other => panic!("expected ranked unasked list, got {:?}", other),
    }

    let phase = engine.registry().with_session(&k, |s| s.phase()).await;
    assert_eq!(phase, ConversationPhase::Active);
}

#[tokio::test]
async fn test_noise_is_dropped_silently() {
    let oracle = Arc::new(ScriptedOracle::new());
    let engine = engine_with(&oracle, EngineConfig::default());

    for noise in ["um", "Thank you for watching!", "testing testing", "aaaaaah", "12"] {
        let events = engine.events(live("noise", noise)).await.unwrap();
        assert!(events.is_empty(), "{noise:?} should be filtered");
    }
    assert!(engine.registry().history(&key("noise")).await.is_empty());
    assert_eq!(ScriptedOracle::count(&oracle.recommend_calls), 0);
}

#[tokio::test]
async fn test_off_topic_chatter_is_dropped_once_conversation_is_underway() {
    let oracle = Arc::new(ScriptedOracle::new());
    let engine = engine_with(&oracle, EngineConfig::default());
    let k = key("off-topic");
    for line in [
        "I have had a cough for two weeks now",
        "It gets worse at night and I feel tired",
        "Sometimes there is blood when I cough",
    ] {
        engine.registry().append_history(&k, "Patient", line).await;
    }

    let events = engine
        .events(live("off-topic", "the football match was great"))
        .await
        .unwrap();
    assert!(events.is_empty());
    assert_eq!(engine.registry().history(&k).await.len(), 3);
}

#[tokio::test]
async fn test_stream_delivers_events_in_order() {
    let oracle = Arc::new(ScriptedOracle::new());
    let engine = engine_with(&oracle, EngineConfig::default());

    let stream = engine
        .stream(live("stream", "I have a fever and a sore throat"))
        .unwrap();
    let events: Vec<SessionEvent> = stream.collect().await;

    assert_eq!(events.len(), 2);
    assert!(matches!(events[0], SessionEvent::Message { .. }));
    match &events[1] {
        SessionEvent::Recommendation { question, .. } => {
            assert_eq!(question.english, "How long have you had the cough?");
            assert_eq!(question.swahili, "Umekuwa na kikohozi kwa muda gani?");
        }
        other => panic!("unexpected event {:?}", other),
    }
}

// ============================================================================
// Turn-based mode
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_turn_based_mode_is_not_throttled() {
    let oracle = Arc::new(ScriptedOracle::new());
    let engine = engine_with(&oracle, EngineConfig::default());

    for (role, text) in [
        ("Patient", "I have had a cough for a week"),
        ("Clinician", "Do you have any fever at night?"),
        ("Patient", "Yes, I feel hot every night"),
    ] {
        let events = engine
            .events(ConversationRequest::utterance(
                key("turns"),
                ConversationMode::TurnBased,
                role,
                text,
                LanguageMode::English,
            ))
            .await
            .unwrap();
        assert_eq!(recommendations(&events), 1, "{role}: {text}");
    }

    let roles: Vec<String> = engine
        .registry()
        .history(&key("turns"))
        .await
        .into_iter()
        .map(|e| e.role)
        .collect();
    assert_eq!(roles, vec!["Patient", "Clinician", "Patient"]);
}

#[tokio::test]
async fn test_new_utterance_reactivates_finalized_session() {
    let oracle = Arc::new(ScriptedOracle::new());
    let engine = engine_with(&oracle, EngineConfig::default());
    let k = key("reactivate");

    engine
        .events(ConversationRequest::utterance(
            k.clone(),
            ConversationMode::TurnBased,
            "Patient",
            "My stomach hurts after meals",
            LanguageMode::English,
        ))
        .await
        .unwrap();
    engine.finalize(&k, LanguageMode::English).await;
    assert_eq!(
        engine.registry().with_session(&k, |s| s.phase()).await,
        ConversationPhase::Finalized
    );

    engine
        .events(ConversationRequest::utterance(
            k.clone(),
            ConversationMode::TurnBased,
            "Patient",
            "It is worse in the evening",
            LanguageMode::English,
        ))
        .await
        .unwrap();
    assert_eq!(
        engine.registry().with_session(&k, |s| s.phase()).await,
        ConversationPhase::Active
    );
    assert_eq!(engine.registry().history(&k).await.len(), 2);
}
