//! Session Orchestrator
//!
//! Drives the three conversation modes (simulated, turn-based, live) and the
//! post-session lifecycle (finalize, follow-up, reset) on top of the registry,
//! matcher, throttle and ranker. Each request emits a finite, ordered sequence
//! of [`SessionEvent`]s through an `mpsc` channel.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use interview_assist_core::{
    clip_tail, require_text, LanguageMode, RankedQuestion, SessionEvent,
};
use interview_assist_llm::{EmbeddingProvider, LlmProvider};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;

use crate::models::settings::EngineConfig;
use crate::utils::error::{AppError, AppResult};

use super::coherence::is_coherent;
use super::dedup::dedup_by;
use super::matcher::{policy_from_config, MarkAskedOutcome, MatchPolicy, QuestionMatcher};
use super::oracle::{
    bounded, parse_recommendation, spoken_question, CaseSearch, DialogueOracle, FollowUpPrompt,
    LlmOracle, ScoringOracle,
};
use super::ranker::{Ranker, RankerConfig};
use super::registry::SessionRegistry;
use super::state::{
    CandidateInput, ConversationPhase, FollowUpRole, IntakeOutcome, PostSessionSnapshot,
    SessionKey,
};
use super::throttle::RecommendationThrottle;

pub const PATIENT_ROLE: &str = "Patient";
pub const CLINICIAN_ROLE: &str = "Clinician";

/// Capacity of the per-request event channel
const EVENT_BUFFER: usize = 64;

// ============================================================================
// Requests
// ============================================================================

/// How utterances reach the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationMode {
    /// Synthetic clinician/patient loop seeded by one patient message
    Simulated,
    /// Real patient and clinician turns
    TurnBased,
    /// Finalized transcription chunks, treated as patient speech
    Live,
}

/// What a request asks the session to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnAction {
    Utterance { role: String, text: String },
    Finalize,
}

/// One conversation request.
#[derive(Debug, Clone)]
pub struct ConversationRequest {
    pub key: SessionKey,
    pub mode: ConversationMode,
    pub action: TurnAction,
    pub language: LanguageMode,
}

impl ConversationRequest {
    pub fn utterance(
        key: SessionKey,
        mode: ConversationMode,
        role: impl Into<String>,
        text: impl Into<String>,
        language: LanguageMode,
    ) -> Self {
        Self {
            key,
            mode,
            action: TurnAction::Utterance {
                role: role.into(),
                text: text.into(),
            },
            language,
        }
    }

    pub fn finalize(key: SessionKey, mode: ConversationMode, language: LanguageMode) -> Self {
        Self {
            key,
            mode,
            action: TurnAction::Finalize,
            language,
        }
    }
}

/// Summary and ranked leftovers of a finished session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalizeOutcome {
    pub summary_and_plan: String,
    pub unasked: Vec<RankedQuestion>,
}

fn placeholder_summary(language: LanguageMode) -> &'static str {
    match language {
        LanguageMode::English => {
            "**English Summary:**\n- Summary unavailable right now.\n\n**FINAL PLAN:**\n\
             - Review the transcript and outstanding questions manually."
        }
        LanguageMode::Swahili => {
            "**Muhtasari wa Kiswahili:**\n- Muhtasari haupatikani kwa sasa.\n\n**MPANGO WA MWISHO:**\n\
             - Pitia mazungumzo na maswali yaliyobaki wewe mwenyewe."
        }
        LanguageMode::Bilingual => {
            "**English Summary:**\n- Summary unavailable right now.\n\n**Swahili Summary:**\n\
             - Muhtasari haupatikani kwa sasa.\n\n**FINAL PLAN:**\n\
             - Review the transcript and outstanding questions manually."
        }
    }
}

fn placeholder_follow_up(language: LanguageMode) -> &'static str {
    match language {
        LanguageMode::Swahili => "Samahani, siwezi kujibu kwa sasa. Tafadhali jaribu tena baadaye.",
        _ => "Sorry, I cannot answer right now. Please try again shortly.",
    }
}

async fn emit(events: &mpsc::Sender<SessionEvent>, event: SessionEvent) {
    if events.send(event).await.is_err() {
        tracing::debug!("event receiver dropped");
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Assembles a [`SessionOrchestrator`] from its collaborators.
pub struct SessionOrchestratorBuilder {
    config: EngineConfig,
    scoring: Option<Arc<dyn ScoringOracle>>,
    dialogue: Option<Arc<dyn DialogueOracle>>,
    case_search: Option<Arc<dyn CaseSearch>>,
    policy: Option<Arc<dyn MatchPolicy>>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    registry: Option<Arc<SessionRegistry>>,
}

impl SessionOrchestratorBuilder {
    fn new(config: EngineConfig) -> Self {
        Self {
            config,
            scoring: None,
            dialogue: None,
            case_search: None,
            policy: None,
            embedder: None,
            registry: None,
        }
    }

    pub fn scoring_oracle(mut self, oracle: Arc<dyn ScoringOracle>) -> Self {
        self.scoring = Some(oracle);
        self
    }

    pub fn dialogue_oracle(mut self, oracle: Arc<dyn DialogueOracle>) -> Self {
        self.dialogue = Some(oracle);
        self
    }

    /// Use one LLM provider for scoring and dialogue.
    pub fn llm_provider(self, provider: Arc<dyn LlmProvider>) -> Self {
        let oracle = Arc::new(LlmOracle::new(provider));
        self.scoring_oracle(oracle.clone()).dialogue_oracle(oracle)
    }

    pub fn case_search(mut self, search: Arc<dyn CaseSearch>) -> Self {
        self.case_search = Some(search);
        self
    }

    /// Explicit fallback match policy; overrides `match_strategy`.
    pub fn match_policy(mut self, policy: Arc<dyn MatchPolicy>) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Embedding provider for the embedding match strategy.
    pub fn embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Share an existing registry.
    pub fn registry(mut self, registry: Arc<SessionRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn build(self) -> AppResult<SessionOrchestrator> {
        self.config.validate().map_err(AppError::config)?;

        let registry = self
            .registry
            .unwrap_or_else(|| Arc::new(SessionRegistry::from_config(&self.config)));
        let policy = match self.policy {
            Some(policy) => policy,
            None => policy_from_config(&self.config, self.embedder),
        };
        let matcher = QuestionMatcher::new(registry.clone(), policy);
        let throttle = RecommendationThrottle::new(
            registry.clone(),
            Duration::from_secs(self.config.throttle_interval_secs),
        );
        let ranker = Ranker::new(self.scoring, RankerConfig::from(&self.config));

        tracing::debug!(
            policy = matcher.policy_name(),
            dialogue = self.dialogue.is_some(),
            case_search = self.case_search.is_some(),
            "session orchestrator ready"
        );

        Ok(SessionOrchestrator {
            registry,
            matcher,
            throttle,
            ranker,
            dialogue: self.dialogue,
            case_search: self.case_search,
            config: Arc::new(self.config),
        })
    }
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Entry point for the transport layer.
#[derive(Clone)]
pub struct SessionOrchestrator {
    registry: Arc<SessionRegistry>,
    matcher: QuestionMatcher,
    throttle: RecommendationThrottle,
    ranker: Ranker,
    dialogue: Option<Arc<dyn DialogueOracle>>,
    case_search: Option<Arc<dyn CaseSearch>>,
    config: Arc<EngineConfig>,
}

impl SessionOrchestrator {
    pub fn builder(config: EngineConfig) -> SessionOrchestratorBuilder {
        SessionOrchestratorBuilder::new(config)
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn oracle_timeout(&self) -> Duration {
        Duration::from_secs(self.config.oracle_timeout_secs)
    }

    /// Start the idle-session sweeper.
    pub fn spawn_eviction_task(&self) -> JoinHandle<()> {
        self.registry.spawn_eviction_task(
            Duration::from_secs(self.config.eviction_interval_secs),
            Duration::from_secs(self.config.session_idle_timeout_secs),
        )
    }

    // ── Requests ──

    /// Process one request, sending its events to `events`.
    pub async fn run(
        &self,
        request: ConversationRequest,
        events: &mpsc::Sender<SessionEvent>,
    ) -> AppResult<()> {
        self.precheck(&request)?;
        let ConversationRequest {
            key,
            mode,
            action,
            language,
        } = request;

        match action {
            TurnAction::Finalize => {
                let outcome = self.finalize(&key, language).await;
                emit(
                    events,
                    SessionEvent::finalized(outcome.summary_and_plan, outcome.unasked),
                )
                .await;
                Ok(())
            }
            TurnAction::Utterance { text, .. } if mode == ConversationMode::Simulated => {
                self.run_simulated(&key, &text, language, events).await
            }
            TurnAction::Utterance { role, text } => {
                self.handle_utterance(&key, mode, &role, &text, language, events)
                    .await
            }
        }
    }

    /// Run a request in the background and stream its events.
    ///
    /// Requests that would fail validation fail here, before anything runs.
    pub fn stream(&self, request: ConversationRequest) -> AppResult<ReceiverStream<SessionEvent>> {
        self.precheck(&request)?;
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let orchestrator = self.clone();
        tokio::spawn(async move {
            let key = request.key.clone();
            if let Err(e) = orchestrator.run(request, &tx).await {
                tracing::warn!(session = %key, error = %e, "conversation request failed");
            }
        });
        Ok(ReceiverStream::new(rx))
    }

    /// Run a request to completion and collect its events.
    pub async fn events(&self, request: ConversationRequest) -> AppResult<Vec<SessionEvent>> {
        let (tx, mut rx) = mpsc::channel(EVENT_BUFFER);
        let produce = async move {
            let result = self.run(request, &tx).await;
            drop(tx);
            result
        };
        let collect = async {
            let mut collected = Vec::new();
            while let Some(event) = rx.recv().await {
                collected.push(event);
            }
            collected
        };
        let (result, collected) = tokio::join!(produce, collect);
        result.map(|()| collected)
    }

    fn precheck(&self, request: &ConversationRequest) -> AppResult<()> {
        match (&request.action, request.mode) {
            (TurnAction::Utterance { text, .. }, ConversationMode::Simulated) => {
                if self.dialogue.is_none() {
                    return Err(AppError::config("simulated mode requires a dialogue oracle"));
                }
                require_text("simulation seed", text)?;
                Ok(())
            }
            (TurnAction::Utterance { role, .. }, ConversationMode::TurnBased) => {
                require_text("speaker role", role)?;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    // ── Turn-based and live ──

    async fn handle_utterance(
        &self,
        key: &SessionKey,
        mode: ConversationMode,
        role: &str,
        text: &str,
        language: LanguageMode,
        events: &mpsc::Sender<SessionEvent>,
    ) -> AppResult<()> {
        let role = match mode {
            ConversationMode::Live => PATIENT_ROLE,
            _ => role.trim(),
        };
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }

        let entries = self.config.coherence_context_entries;
        let locked = self
            .registry
            .with_session(key, |s| {
                if !is_coherent(text, &s.recent_context(entries)) {
                    return None;
                }
                s.append_history(role, text);
                Some(self.matcher.mark_in_session(s, text))
            })
            .await;
        let Some(locked) = locked else {
            tracing::info!(session = %key, text, "filtered incoherent utterance");
            return Ok(());
        };

        emit(events, SessionEvent::message(role, text)).await;
        self.matcher.settle(key, text, locked).await;

        let recommend = match mode {
            ConversationMode::Live => self.throttle.try_reserve(key).await,
            _ => {
                role.eq_ignore_ascii_case(PATIENT_ROLE) || role.eq_ignore_ascii_case(CLINICIAN_ROLE)
            }
        };
        if recommend {
            self.recommend_and_rank(key, language, events).await;
        }
        Ok(())
    }

    /// Emit a next-question suggestion and the ranked outstanding list.
    async fn recommend_and_rank(
        &self,
        key: &SessionKey,
        language: LanguageMode,
        events: &mpsc::Sender<SessionEvent>,
    ) {
        let (epoch, transcript, unasked) = self
            .registry
            .with_session(key, |s| (s.epoch(), s.transcript(), s.unasked_texts()))
            .await;

        let recommendation = async {
            let dialogue = self.dialogue.as_ref()?;
            let context = clip_tail(&transcript, self.config.ranker_context_chars);
            match bounded(
                self.oracle_timeout(),
                dialogue.recommend_question(context, language),
            )
            .await
            {
                Ok(raw) => Some(parse_recommendation(&raw, language)).filter(|q| !q.is_empty()),
                Err(e) => {
                    tracing::warn!(session = %key, error = %e, "recommendation unavailable");
                    None
                }
            }
        };
        let ranking = async {
            if unasked.is_empty() {
                Vec::new()
            } else {
                self.ranker.rank(&transcript, &unasked, language).await
            }
        };
        let (recommendation, ranked) = tokio::join!(recommendation, ranking);

        if let Some(question) = recommendation {
            emit(events, SessionEvent::recommendation(question)).await;
        }
        if !ranked.is_empty() {
            self.registry
                .with_session_at_epoch(key, epoch, |s| s.record_scores(&ranked))
                .await;
            emit(events, SessionEvent::ranked_unasked(ranked)).await;
        }
    }

    // ── Simulated ──

    async fn run_simulated(
        &self,
        key: &SessionKey,
        seed: &str,
        language: LanguageMode,
        events: &mpsc::Sender<SessionEvent>,
    ) -> AppResult<()> {
        let dialogue = self
            .dialogue
            .clone()
            .ok_or_else(|| AppError::config("simulated mode requires a dialogue oracle"))?;
        let seed = seed.trim();

        self.record_turn(key, PATIENT_ROLE, seed).await;
        emit(events, SessionEvent::message(PATIENT_ROLE, seed)).await;

        let cases = self.similar_cases(seed).await;
        let timeout = self.oracle_timeout();

        for turn in 0..self.config.simulated_turns {
            let transcript = self.registry.with_session(key, |s| s.transcript()).await;
            let mut context = clip_tail(&transcript, self.config.ranker_context_chars).to_string();
            if let Some(cases) = &cases {
                context.push_str("\n\nSimilar cases (context):\n");
                context.push_str(cases);
            }

            let question = match bounded(timeout, dialogue.recommend_question(&context, language))
                .await
            {
                Ok(raw) => parse_recommendation(&raw, language),
                Err(e) => {
                    tracing::warn!(session = %key, turn, error = %e, "simulation stopped");
                    break;
                }
            };
            if question.is_empty() {
                tracing::warn!(session = %key, turn, "empty recommendation; simulation stopped");
                break;
            }

            emit(events, SessionEvent::recommendation(question.clone())).await;
            let spoken = spoken_question(&question, language);
            self.record_turn(key, CLINICIAN_ROLE, &spoken).await;
            emit(events, SessionEvent::message(CLINICIAN_ROLE, &spoken)).await;

            let reply = match bounded(timeout, dialogue.simulate_patient_reply(&question, language))
                .await
            {
                Ok(reply) => reply,
                Err(e) => {
                    tracing::warn!(session = %key, turn, error = %e, "simulation stopped");
                    break;
                }
            };
            if self.registry.append_history(key, PATIENT_ROLE, &reply).await {
                emit(events, SessionEvent::message(PATIENT_ROLE, reply.trim())).await;
            } else {
                tracing::debug!(session = %key, turn, "blank simulated reply not recorded");
            }
        }

        let outcome = self.finalize(key, language).await;
        emit(
            events,
            SessionEvent::finalized(outcome.summary_and_plan, outcome.unasked),
        )
        .await;
        Ok(())
    }

    /// Append a turn and mark what it covers in one critical section.
    async fn record_turn(&self, key: &SessionKey, role: &str, text: &str) -> MarkAskedOutcome {
        let locked = self
            .registry
            .with_session(key, |s| {
                s.append_history(role, text);
                self.matcher.mark_in_session(s, text)
            })
            .await;
        self.matcher.settle(key, text, locked).await
    }

    /// Bulleted titles and summaries of cases similar to `query`.
    async fn similar_cases(&self, query: &str) -> Option<String> {
        let search = self.case_search.as_ref()?;
        let found = bounded(
            self.oracle_timeout(),
            search.search(
                query,
                self.config.case_search_k,
                self.config.case_search_threshold,
            ),
        )
        .await;
        match found {
            Ok(cases) if !cases.is_empty() => {
                tracing::debug!(cases = cases.len(), "retrieved similar cases");
                Some(
                    cases
                        .iter()
                        .map(|c| format!("- {}: {}", c.title, c.summary))
                        .collect::<Vec<_>>()
                        .join("\n"),
                )
            }
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(error = %e, "case search failed; continuing without retrieval");
                None
            }
        }
    }

    // ── Candidate questions ──

    /// Store planner questions, collapsing near duplicates in the batch.
    pub async fn add_candidate_questions<I>(&self, key: &SessionKey, items: I) -> IntakeOutcome
    where
        I: IntoIterator<Item = CandidateInput>,
    {
        let unique = dedup_by(items, self.config.dedup_threshold, |c| c.text.as_str());
        self.registry.add_candidate_questions(key, unique).await
    }

    pub async fn mark_asked(&self, key: &SessionKey, utterance: &str) -> MarkAskedOutcome {
        self.matcher.mark_asked(key, utterance).await
    }

    pub async fn mark_asked_by_id(&self, key: &SessionKey, id: &str) -> MarkAskedOutcome {
        self.matcher.mark_asked_by_id(key, id).await
    }

    /// Outstanding questions ranked against the whole conversation.
    pub async fn unasked(&self, key: &SessionKey, language: LanguageMode) -> Vec<RankedQuestion> {
        let (epoch, transcript, unasked) = self
            .registry
            .with_session(key, |s| (s.epoch(), s.transcript(), s.unasked_texts()))
            .await;
        let ranked = self.ranker.rank(&transcript, &unasked, language).await;
        self.registry
            .with_session_at_epoch(key, epoch, |s| s.record_scores(&ranked))
            .await;
        ranked
    }

    // ── Lifecycle ──

    /// Summarize the session, rank what is left and store the snapshot.
    ///
    /// History is kept; a later utterance reactivates the session.
    pub async fn finalize(&self, key: &SessionKey, language: LanguageMode) -> FinalizeOutcome {
        let (epoch, transcript, unasked) = self
            .registry
            .with_session(key, |s| (s.epoch(), s.transcript(), s.unasked_texts()))
            .await;

        let summary = async {
            let excerpt = clip_tail(&transcript, self.config.summary_context_chars);
            let dialogue = match &self.dialogue {
                Some(dialogue) if !excerpt.trim().is_empty() => dialogue,
                _ => return placeholder_summary(language).to_string(),
            };
            match bounded(
                self.oracle_timeout(),
                dialogue.summarize_and_plan(excerpt, language),
            )
            .await
            {
                Ok(summary) => summary,
                Err(e) => {
                    tracing::warn!(session = %key, error = %e, "summary unavailable; using placeholder");
                    placeholder_summary(language).to_string()
                }
            }
        };
        let ranking = self.ranker.rank(&transcript, &unasked, language);
        let (summary_and_plan, ranked) = tokio::join!(summary, ranking);

        let snapshot = PostSessionSnapshot {
            transcript: clip_tail(&transcript, self.config.snapshot_transcript_chars).to_string(),
            summary_and_plan: summary_and_plan.clone(),
            unasked: ranked.clone(),
            language,
            saved_at: Utc::now(),
        };
        let stored = self
            .registry
            .with_session_at_epoch(key, epoch, |s| {
                s.record_scores(&ranked);
                s.set_snapshot(snapshot);
                s.set_phase(ConversationPhase::Finalized);
            })
            .await;
        if stored.is_some() {
            tracing::info!(session = %key, unasked = ranked.len(), "session finalized");
        }

        FinalizeOutcome {
            summary_and_plan,
            unasked: ranked,
        }
    }

    /// Answer a clinician question about the session.
    ///
    /// Grounded on the post-session snapshot, or on the raw history when the
    /// session was never finalized.
    pub async fn follow_up(
        &self,
        key: &SessionKey,
        message: &str,
        language: LanguageMode,
    ) -> AppResult<String> {
        let message = require_text("follow-up message", message)?;

        let turns = self.config.follow_up_history_turns;
        let limit = self.config.follow_up_unasked_limit;
        let transcript_chars = self.config.snapshot_transcript_chars;
        let (epoch, prompt) = self
            .registry
            .with_session(key, |s| {
                let (transcript, summary_and_plan, unasked) = match s.snapshot() {
                    Some(snapshot) => (
                        snapshot.transcript.clone(),
                        snapshot.summary_and_plan.clone(),
                        snapshot.unasked.iter().take(limit).cloned().collect(),
                    ),
                    None => (
                        clip_tail(&s.transcript(), transcript_chars).to_string(),
                        "(not finalized yet)".to_string(),
                        s.unasked()
                            .take(limit)
                            .map(|q| RankedQuestion::new(q.text.as_str(), q.score.unwrap_or(0.0)))
                            .collect(),
                    ),
                };
                let prompt = FollowUpPrompt {
                    transcript,
                    summary_and_plan,
                    unasked,
                    previous_turns: s.recent_follow_ups(turns).to_vec(),
                    message: message.to_string(),
                    language,
                };
                (s.epoch(), prompt)
            })
            .await;

        let answer = match &self.dialogue {
            Some(dialogue) => {
                match bounded(self.oracle_timeout(), dialogue.answer_follow_up(&prompt)).await {
                    Ok(answer) => answer,
                    Err(e) => {
                        tracing::warn!(session = %key, error = %e, "follow-up unavailable");
                        placeholder_follow_up(language).to_string()
                    }
                }
            }
            None => placeholder_follow_up(language).to_string(),
        };

        self.registry
            .with_session_at_epoch(key, epoch, |s| {
                s.append_follow_up(FollowUpRole::Clinician, message);
                s.append_follow_up(FollowUpRole::Assistant, &answer);
            })
            .await;
        Ok(answer)
    }

    /// Drop all state of the caller's session.
    pub async fn reset(&self, key: &SessionKey) {
        self.registry.reset(key).await
    }
}
