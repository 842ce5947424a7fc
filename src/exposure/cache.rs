//! Short-TTL cache for the derived exposure snapshot.
//!
//! Single writer (the exposure engine), many readers (admin queries, risk
//! alerting). The snapshot is always replaced as a unit; readers either see
//! the previous complete cycle or the next one, never a partial update.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use crate::models::{ExposureSnapshot, MarketExposure, MatchExposure, OutcomeExposure};

struct CacheEntry {
    snapshot: Arc<ExposureSnapshot>,
    expires_at: Instant,
}

#[derive(Default)]
pub struct ExposureCache {
    inner: RwLock<Option<CacheEntry>>,
}

impl ExposureCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wholesale replacement; the only write path.
    pub fn replace(&self, snapshot: ExposureSnapshot, ttl: Duration) {
        let entry = CacheEntry {
            snapshot: Arc::new(snapshot),
            expires_at: Instant::now() + ttl,
        };
        *self.inner.write() = Some(entry);
    }

    /// Last-computed snapshot; `None` before the first cycle or after the
    /// TTL has lapsed with no refresh.
    pub fn snapshot(&self) -> Option<Arc<ExposureSnapshot>> {
        let guard = self.inner.read();
        let entry = guard.as_ref()?;
        if Instant::now() >= entry.expires_at {
            return None;
        }
        Some(entry.snapshot.clone())
    }

    /// Previous cycle's snapshot regardless of TTL; the engine uses it to
    /// carry entries forward across a partially-failed recompute.
    pub fn last_snapshot(&self) -> Option<Arc<ExposureSnapshot>> {
        self.inner.read().as_ref().map(|e| e.snapshot.clone())
    }

    pub fn outcome(&self, outcome_id: &str) -> Option<OutcomeExposure> {
        self.snapshot()?.outcomes.get(outcome_id).cloned()
    }

    pub fn market(&self, market_id: &str) -> Option<MarketExposure> {
        self.snapshot()?.markets.get(market_id).cloned()
    }

    pub fn match_(&self, match_id: &str) -> Option<MatchExposure> {
        self.snapshot()?.matches.get(match_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot_with_outcome(outcome_id: &str, exposure_cents: i64) -> ExposureSnapshot {
        let mut snapshot = ExposureSnapshot::default();
        snapshot.outcomes.insert(
            outcome_id.to_string(),
            OutcomeExposure {
                outcome_id: outcome_id.to_string(),
                market_id: "mkt".into(),
                match_id: "match".into(),
                exposure_cents,
                bet_count: 1,
            },
        );
        snapshot
    }

    #[test]
    fn empty_before_first_cycle() {
        let cache = ExposureCache::new();
        assert!(cache.snapshot().is_none());
        assert!(cache.outcome("x").is_none());
    }

    #[test]
    fn replace_is_wholesale() {
        let cache = ExposureCache::new();
        cache.replace(snapshot_with_outcome("a", 100), Duration::from_secs(60));
        assert_eq!(cache.outcome("a").unwrap().exposure_cents, 100);

        cache.replace(snapshot_with_outcome("b", 200), Duration::from_secs(60));
        // Old entries do not survive a replacement
        assert!(cache.outcome("a").is_none());
        assert_eq!(cache.outcome("b").unwrap().exposure_cents, 200);
    }

    #[test]
    fn ttl_expiry_hides_snapshot_but_keeps_last() {
        let cache = ExposureCache::new();
        cache.replace(snapshot_with_outcome("a", 100), Duration::from_millis(0));
        assert!(cache.snapshot().is_none());
        assert!(cache.last_snapshot().is_some());
    }
}
