//! Shared mock oracles for the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use interview_assist::services::live_session::{
    CaseMatch, CaseSearch, DialogueOracle, FollowUpPrompt, OracleError, OracleResult,
    ScoringOracle, SessionKey, SessionOrchestrator,
};
use interview_assist::{EngineConfig, LanguageMode, RecommendedQuestion, SessionEvent};

pub const RECOMMENDATION: &str =
    "English: How long have you had the cough?\n\nSwahili: Umekuwa na kikohozi kwa muda gani?";
pub const PATIENT_REPLY: &str = "It started three days ago and gets worse at night.";
pub const SUMMARY: &str =
    "**English Summary:**\n- Cough for three days\n\n**FINAL PLAN:**\n- Step 1: Chest exam";

pub fn key(conversation: &str) -> SessionKey {
    SessionKey::new("clinician-1", conversation).unwrap()
}

/// Scoring and dialogue oracle with canned replies and call counters.
pub struct ScriptedOracle {
    scoring_reply: Mutex<Option<String>>,
    summary_fails: bool,
    pub scoring_calls: AtomicUsize,
    pub recommend_calls: AtomicUsize,
    pub summary_calls: AtomicUsize,
    pub patient_calls: AtomicUsize,
    pub recommend_contexts: Mutex<Vec<String>>,
    pub summary_inputs: Mutex<Vec<String>>,
    pub follow_ups: Mutex<Vec<FollowUpPrompt>>,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self {
            scoring_reply: Mutex::new(None),
            summary_fails: false,
            scoring_calls: AtomicUsize::new(0),
            recommend_calls: AtomicUsize::new(0),
            summary_calls: AtomicUsize::new(0),
            patient_calls: AtomicUsize::new(0),
            recommend_contexts: Mutex::new(Vec::new()),
            summary_inputs: Mutex::new(Vec::new()),
            follow_ups: Mutex::new(Vec::new()),
        }
    }

    /// Scoring replies with `reply` instead of failing.
    pub fn with_scores(self, reply: &str) -> Self {
        *self.scoring_reply.lock().unwrap() = Some(reply.to_string());
        self
    }

    pub fn with_failing_summary(mut self) -> Self {
        self.summary_fails = true;
        self
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ScoringOracle for ScriptedOracle {
    async fn score_questions(
        &self,
        _context: &str,
        _questions: &[String],
        _language: LanguageMode,
    ) -> OracleResult<String> {
        self.scoring_calls.fetch_add(1, Ordering::SeqCst);
        self.scoring_reply
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| OracleError::Provider("scoring offline".into()))
    }
}

#[async_trait]
impl DialogueOracle for ScriptedOracle {
    async fn summarize_and_plan(
        &self,
        transcript: &str,
        _language: LanguageMode,
    ) -> OracleResult<String> {
        self.summary_calls.fetch_add(1, Ordering::SeqCst);
        self.summary_inputs.lock().unwrap().push(transcript.to_string());
        if self.summary_fails {
            Err(OracleError::Timeout(45))
        } else {
            Ok(SUMMARY.to_string())
        }
    }

    async fn recommend_question(
        &self,
        context: &str,
        _language: LanguageMode,
    ) -> OracleResult<String> {
        self.recommend_calls.fetch_add(1, Ordering::SeqCst);
        self.recommend_contexts
            .lock()
            .unwrap()
            .push(context.to_string());
        Ok(RECOMMENDATION.to_string())
    }

    async fn simulate_patient_reply(
        &self,
        _question: &RecommendedQuestion,
        _language: LanguageMode,
    ) -> OracleResult<String> {
        self.patient_calls.fetch_add(1, Ordering::SeqCst);
        Ok(PATIENT_REPLY.to_string())
    }

    async fn answer_follow_up(&self, prompt: &FollowUpPrompt) -> OracleResult<String> {
        self.follow_ups.lock().unwrap().push(prompt.clone());
        Ok(format!("Consider a chest X-ray ({} unasked)", prompt.unasked.len()))
    }
}

/// Case index returning a fixed result.
pub struct StaticCases {
    result: OracleResult<Vec<CaseMatch>>,
    pub queries: Mutex<Vec<(String, usize, f32)>>,
}

impl StaticCases {
    pub fn found(cases: Vec<CaseMatch>) -> Self {
        Self {
            result: Ok(cases),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            result: Err(OracleError::Provider("index offline".into())),
            queries: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl CaseSearch for StaticCases {
    async fn search(&self, query: &str, k: usize, threshold: f32) -> OracleResult<Vec<CaseMatch>> {
        self.queries
            .lock()
            .unwrap()
            .push((query.to_string(), k, threshold));
        self.result.clone()
    }
}

pub fn pneumonia_case() -> CaseMatch {
    CaseMatch {
        case_id: "case-17".to_string(),
        similarity: 0.42,
        title: "Community-acquired pneumonia".to_string(),
        summary: "Productive cough, fever and pleuritic chest pain".to_string(),
        suspected_conditions: vec!["pneumonia".to_string()],
        recommended_questions: vec!["Any shortness of breath?".to_string()],
    }
}

/// Orchestrator wired to `oracle` for both scoring and dialogue.
pub fn engine_with(oracle: &Arc<ScriptedOracle>, config: EngineConfig) -> SessionOrchestrator {
    SessionOrchestrator::builder(config)
        .scoring_oracle(oracle.clone())
        .dialogue_oracle(oracle.clone())
        .build()
        .unwrap()
}

/// Orchestrator with no oracles at all.
pub fn heuristic_engine() -> SessionOrchestrator {
    SessionOrchestrator::builder(EngineConfig::default())
        .build()
        .unwrap()
}

pub fn recommendations(events: &[SessionEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, SessionEvent::Recommendation { .. }))
        .count()
}

pub fn messages(events: &[SessionEvent]) -> Vec<(String, String)> {
    events
        .iter()
        .filter_map(|e| match e {
            SessionEvent::Message { role, text, .. } => Some((role.clone(), text.clone())),
            _ => None,
        })
        .collect()
}
