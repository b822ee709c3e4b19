//! Session Registry
//!
//! Owns every live session. The map itself sits behind an `RwLock`; each
//! session has its own `Mutex`, so different keys proceed in parallel while
//! operations on one key are serialized in lock-acquisition order.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::models::settings::EngineConfig;

use super::state::{
    CandidateInput, HistoryEntry, IntakeOutcome, PostSessionSnapshot, Retention, Session,
    SessionKey,
};

/// Shared handle to one session
pub type SessionHandle = Arc<Mutex<Session>>;

/// Registry of live sessions keyed by (user, conversation).
#[derive(Debug)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionKey, SessionHandle>>,
    retention: Retention,
    max_sessions: Option<usize>,
}

impl SessionRegistry {
    /// Create an empty registry
    pub fn new(retention: Retention, max_sessions: Option<usize>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            retention,
            max_sessions,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(Retention::from(config), config.max_sessions)
    }

    /// Get the session for `key`, creating it on first access.
    pub async fn get_or_create(&self, key: &SessionKey) -> SessionHandle {
        {
            let sessions = self.sessions.read().await;
            if let Some(handle) = sessions.get(key) {
                return Arc::clone(handle);
            }
        }

        let mut sessions = self.sessions.write().await;
        // Another task may have created it between the two locks.
        if let Some(handle) = sessions.get(key) {
            return Arc::clone(handle);
        }

        if let Some(max) = self.max_sessions {
            if sessions.len() >= max {
                Self::evict_least_recent(&mut sessions);
            }
        }

        let handle = Arc::new(Mutex::new(Session::new(self.retention)));
        sessions.insert(key.clone(), Arc::clone(&handle));
        tracing::debug!(session = %key, total = sessions.len(), "created live session");
        handle
    }

    /// Get the session for `key` if it exists.
    pub async fn get(&self, key: &SessionKey) -> Option<SessionHandle> {
        self.sessions.read().await.get(key).cloned()
    }

    /// Run `f` inside the session's critical section.
    pub async fn with_session<R>(&self, key: &SessionKey, f: impl FnOnce(&mut Session) -> R) -> R {
        let handle = self.get_or_create(key).await;
        let mut session = handle.lock().await;
        session.touch();
        f(&mut *session)
    }

    /// Run `f` only when the session still has the given reset epoch.
    ///
    /// Used to write back results of calls made outside the critical section.
    pub async fn with_session_at_epoch<R>(
        &self,
        key: &SessionKey,
        epoch: u64,
        f: impl FnOnce(&mut Session) -> R,
    ) -> Option<R> {
        let handle = self.get(key).await?;
        let mut session = handle.lock().await;
        if session.epoch() != epoch {
            tracing::debug!(session = %key, "discarding result computed before reset");
            return None;
        }
        session.touch();
        Some(f(&mut *session))
    }

    /// Clear all state of a session.
    pub async fn reset(&self, key: &SessionKey) {
        if let Some(handle) = self.get(key).await {
            handle.lock().await.reset();
            tracing::info!(session = %key, "session reset");
        }
    }

    /// Append a history turn; blank text is a no-op.
    pub async fn append_history(&self, key: &SessionKey, role: &str, text: &str) -> bool {
        self.with_session(key, |s| s.append_history(role, text)).await
    }

    /// Store candidate questions not already present.
    pub async fn add_candidate_questions<I>(&self, key: &SessionKey, items: I) -> IntakeOutcome
    where
        I: IntoIterator<Item = CandidateInput>,
    {
        let outcome = self.with_session(key, |s| s.add_candidates(items)).await;
        tracing::debug!(
            session = %key,
            added = outcome.added,
            total = outcome.total,
            "candidate intake"
        );
        outcome
    }

    /// Store the post-session snapshot, replacing any previous one.
    pub async fn snapshot_post_session(&self, key: &SessionKey, snapshot: PostSessionSnapshot) {
        self.with_session(key, |s| s.set_snapshot(snapshot)).await
    }

    /// Copy of the session's history.
    pub async fn history(&self, key: &SessionKey) -> Vec<HistoryEntry> {
        match self.get(key).await {
            Some(handle) => handle.lock().await.history().to_vec(),
            None => Vec::new(),
        }
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Remove sessions idle for at least `max_idle`. Busy sessions are kept.
    pub async fn evict_idle(&self, max_idle: Duration) -> usize {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, handle| match handle.try_lock() {
            Ok(session) => now.saturating_duration_since(session.last_access()) < max_idle,
            Err(_) => true,
        });
        let evicted = before - sessions.len();
        if evicted > 0 {
            tracing::info!(evicted, remaining = sessions.len(), "evicted idle sessions");
        }
        evicted
    }

    /// Periodically evict idle sessions until the registry is dropped.
    pub fn spawn_eviction_task(
        self: &Arc<Self>,
        interval: Duration,
        max_idle: Duration,
    ) -> JoinHandle<()> {
        let registry = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(registry) = registry.upgrade() else {
                    break;
                };
                registry.evict_idle(max_idle).await;
            }
        })
    }

    fn evict_least_recent(sessions: &mut HashMap<SessionKey, SessionHandle>) {
        let victim = sessions
            .iter()
            .filter_map(|(key, handle)| {
                handle
                    .try_lock()
                    .ok()
                    .map(|session| (key.clone(), session.last_access()))
            })
            .min_by_key(|(_, last_access)| *last_access)
            .map(|(key, _)| key);

        match victim {
            Some(key) => {
                sessions.remove(&key);
                tracing::info!(session = %key, "evicted least recently used session");
            }
            None => tracing::warn!("session cap reached but every session is busy"),
        }
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(Retention::default(), None)
    }
}
