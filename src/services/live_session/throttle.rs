//! Recommendation Throttle
//!
//! Limits live recommendations to one per interval per session. The stamp
//! lives in the session record, so reads and writes share the session lock.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use super::registry::SessionRegistry;
use super::state::SessionKey;

/// Whether `last` lies within `interval` of `now`.
fn within_interval(last: Option<Instant>, now: Instant, interval: Duration) -> bool {
    match last {
        Some(last) => now.saturating_duration_since(last) < interval,
        None => false,
    }
}

/// Per-session recommendation rate limiter.
#[derive(Debug, Clone)]
pub struct RecommendationThrottle {
    registry: Arc<SessionRegistry>,
    interval: Duration,
}

impl RecommendationThrottle {
    pub fn new(registry: Arc<SessionRegistry>, interval: Duration) -> Self {
        Self { registry, interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// True if a recommendation was emitted less than `interval` ago.
    pub async fn should_throttle(&self, key: &SessionKey) -> bool {
        let interval = self.interval;
        self.registry
            .with_session(key, |s| {
                within_interval(s.last_recommendation(), Instant::now(), interval)
            })
            .await
    }

    /// Stamp the session as having just emitted a recommendation.
    pub async fn record_emitted(&self, key: &SessionKey) {
        self.registry
            .with_session(key, |s| s.set_last_recommendation(Instant::now()))
            .await
    }

    /// Check and stamp in one critical section.
    ///
    /// Returns false, leaving the stamp untouched, when throttled.
    pub async fn try_reserve(&self, key: &SessionKey) -> bool {
        let interval = self.interval;
        let reserved = self
            .registry
            .with_session(key, |s| {
                let now = Instant::now();
                if within_interval(s.last_recommendation(), now, interval) {
                    false
                } else {
                    s.set_last_recommendation(now);
                    true
                }
            })
            .await;
        if !reserved {
            tracing::debug!(session = %key, "recommendation throttled");
        }
        reserved
    }
}
