//! Live Session Recommendation Engine
//!
//! In-memory, per-session state machine behind the clinical interview
//! assistant: conversation history, candidate questions and their asked
//! flags, throttled recommendations, oracle-backed ranking and utterance
//! matching.
//!
//! ## Module Organization
//!
//! - `state` - Session record, keys and value types
//! - `registry` - Keyed session store with per-session locking and eviction
//! - `coherence` - Transcript noise filter
//! - `dedup` - Near-duplicate question collapsing
//! - `matcher` - Utterance-to-question matching with pluggable fallback
//! - `throttle` - Recommendation rate limiting
//! - `ranker` - Oracle scoring with heuristic fallback
//! - `oracle` - External oracle seams and the LLM-backed implementation
//! - `prompts` - Oracle instructions
//! - `orchestrator` - Conversation modes and session lifecycle

pub mod coherence;
pub mod dedup;
pub mod matcher;
pub mod oracle;
pub mod orchestrator;
pub mod prompts;
pub mod ranker;
pub mod registry;
pub mod state;
pub mod throttle;

pub use coherence::is_coherent;
pub use dedup::{are_similar, dedup_by, dedup_questions, similarity, DEFAULT_SIMILARITY_THRESHOLD};
pub use matcher::{
    cosine_similarity, policy_from_config, EmbeddingPolicy, LexicalPolicy, LockedMarks,
    MarkAskedOutcome, MatchCandidate, MatchPolicy, QuestionMatcher,
};
pub use oracle::{
    bounded, parse_recommendation, spoken_question, CaseMatch, CaseSearch, DialogueOracle,
    FollowUpPrompt, LlmOracle, OracleError, OracleResult, ScoringOracle,
};
pub use orchestrator::{
    ConversationMode, ConversationRequest, FinalizeOutcome, SessionOrchestrator,
    SessionOrchestratorBuilder, TurnAction, CLINICIAN_ROLE, PATIENT_ROLE,
};
pub use ranker::{
    clip_ranked, decode_scores, heuristic_rank, FallbackReason, Ranker, RankerConfig,
    ScoreOutcome,
};
pub use registry::{SessionHandle, SessionRegistry};
pub use state::{
    CandidateInput, CandidateQuestion, ConversationPhase, FollowUpRole, FollowUpTurn,
    HistoryEntry, IntakeOutcome, MarkedQuestion, PostSessionSnapshot, Retention, Session,
    SessionKey,
};
pub use throttle::RecommendationThrottle;
