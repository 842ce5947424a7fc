//! Exposure Calculation Engine
//!
//! Periodically recomputes the operator's worst-case liability for every
//! open outcome, market and match from pending-bet state, and publishes the
//! result to the short-TTL cache for admin reads and risk alerting.
//!
//! Attribution is conservative full-attribution: an express bet's entire net
//! payout is charged against every outcome it depends on, because any one of
//! them failing voids the payout. Market exposure is therefore an upper
//! bound across mutually exclusive outcomes.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::exposure::cache::ExposureCache;
use crate::ledger::LedgerDb;
use crate::models::{
    Config, ExposureSnapshot, MarketExposure, MatchExposure, OutcomeExposure,
};

#[derive(Debug, Clone)]
pub struct ExposureEngineConfig {
    pub interval: Duration,
    pub cache_ttl: Duration,
    pub alert_limit_cents: i64,
}

impl Default for ExposureEngineConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            cache_ttl: Duration::from_secs(30),
            alert_limit_cents: 5_000_000,
        }
    }
}

impl ExposureEngineConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            interval: Duration::from_secs(config.exposure_interval_secs.max(1)),
            cache_ttl: Duration::from_secs(config.exposure_cache_ttl_secs.max(1)),
            alert_limit_cents: config.exposure_alert_limit_cents,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdScope {
    Outcome,
    Market,
}

/// One aggregate over the configured liability limit, for risk alerting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdBreach {
    pub scope: ThresholdScope,
    pub id: String,
    pub exposure_cents: i64,
    pub limit_cents: i64,
}

/// Snapshot filter for admin queries.
#[derive(Debug, Clone, Default)]
pub struct ExposureFilter {
    pub match_id: Option<String>,
    pub market_id: Option<String>,
    pub min_exposure_cents: Option<i64>,
}

pub struct ExposureEngine {
    db: Arc<LedgerDb>,
    cache: Arc<ExposureCache>,
    config: ExposureEngineConfig,
}

/// Lifecycle handle owned by the process bootstrap. Dropping it does not
/// kill the engine; call `stop()` for a clean shutdown.
pub struct ExposureEngineHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ExposureEngineHandle {
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }
}

impl ExposureEngine {
    pub fn new(db: Arc<LedgerDb>, cache: Arc<ExposureCache>, config: ExposureEngineConfig) -> Self {
        Self { db, cache, config }
    }

    /// Start the periodic recompute task. Only one cycle is ever in flight:
    /// a tick that lands while a cycle is still running is skipped.
    pub fn spawn(self: Arc<Self>) -> ExposureEngineHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        info!(
            interval_secs = self.config.interval.as_secs(),
            cache_ttl_secs = self.config.cache_ttl.as_secs(),
            "🧮 exposure engine started"
        );

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.config.interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        self.run_cycle();
                    }
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            info!("exposure engine stopping");
                            break;
                        }
                    }
                }
            }
        });

        ExposureEngineHandle {
            shutdown: shutdown_tx,
            task,
        }
    }

    /// One full recompute + cache publish. Exposed for tests and admin
    /// refresh endpoints.
    pub fn run_cycle(&self) {
        let pending = match self.db.pending_bets() {
            Ok(bets) => bets,
            Err(e) => {
                // Nothing to attribute; the previous snapshot stays live
                warn!(%e, "exposure cycle aborted: failed to list pending bets");
                return;
            }
        };

        let mut snapshot = ExposureSnapshot {
            pending_bets: pending.len() as u64,
            computed_at: Some(Utc::now()),
            ..Default::default()
        };
        let mut had_errors = false;

        for bet in &pending {
            let selections = match self.db.selections_by_bet(&bet.id) {
                Ok(s) => s,
                Err(e) => {
                    warn!(bet_id = %bet.id, %e, "skipping bet in exposure cycle");
                    had_errors = true;
                    continue;
                }
            };

            // Net payout beyond stake, charged in full to every pending leg
            let net_liability = bet.potential_winnings_cents - bet.total_stake_cents;
            if net_liability <= 0 {
                continue;
            }

            for sel in selections.iter().filter(|s| !s.status.is_terminal()) {
                let entry = snapshot
                    .outcomes
                    .entry(sel.outcome_id.clone())
                    .or_insert_with(|| OutcomeExposure {
                        outcome_id: sel.outcome_id.clone(),
                        market_id: sel.market_id.clone(),
                        match_id: sel.match_id.clone(),
                        exposure_cents: 0,
                        bet_count: 0,
                    });
                entry.exposure_cents += net_liability;
                entry.bet_count += 1;
            }
        }

        // A bet that failed to load may have backed outcomes the new pass
        // never saw; carry those entries forward instead of zeroing them.
        if had_errors {
            if let Some(previous) = self.cache.last_snapshot() {
                for (outcome_id, entry) in &previous.outcomes {
                    snapshot
                        .outcomes
                        .entry(outcome_id.clone())
                        .or_insert_with(|| entry.clone());
                }
            }
        }

        roll_up(&mut snapshot);

        debug!(
            pending_bets = snapshot.pending_bets,
            outcomes = snapshot.outcomes.len(),
            markets = snapshot.markets.len(),
            matches = snapshot.matches.len(),
            "exposure cycle complete"
        );

        self.cache.replace(snapshot, self.config.cache_ttl);
    }

    // ---- query surface (reads the cached snapshot) ----

    pub fn outcome_exposure(&self, outcome_id: &str) -> Option<OutcomeExposure> {
        self.cache.outcome(outcome_id)
    }

    pub fn market_exposure(&self, market_id: &str) -> Option<MarketExposure> {
        self.cache.market(market_id)
    }

    pub fn match_exposure(&self, match_id: &str) -> Option<MatchExposure> {
        self.cache.match_(match_id)
    }

    /// Filtered view of the last-computed snapshot; empty before the first
    /// cycle.
    pub fn cached_exposure(&self, filter: &ExposureFilter) -> Vec<OutcomeExposure> {
        let Some(snapshot) = self.cache.snapshot() else {
            return Vec::new();
        };
        let mut out: Vec<OutcomeExposure> = snapshot
            .outcomes
            .values()
            .filter(|o| {
                filter
                    .match_id
                    .as_ref()
                    .map_or(true, |m| &o.match_id == m)
                    && filter
                        .market_id
                        .as_ref()
                        .map_or(true, |m| &o.market_id == m)
                    && filter
                        .min_exposure_cents
                        .map_or(true, |min| o.exposure_cents >= min)
            })
            .cloned()
            .collect();
        out.sort_by(|a, b| b.exposure_cents.cmp(&a.exposure_cents));
        out
    }

    /// Outcomes and markets over the limit, worst first. Polled by the admin
    /// surface for risk alerting.
    pub fn check_thresholds(&self, limit_cents: i64) -> Vec<ThresholdBreach> {
        let Some(snapshot) = self.cache.snapshot() else {
            return Vec::new();
        };
        let mut breaches: Vec<ThresholdBreach> = snapshot
            .outcomes
            .values()
            .filter(|o| o.exposure_cents > limit_cents)
            .map(|o| ThresholdBreach {
                scope: ThresholdScope::Outcome,
                id: o.outcome_id.clone(),
                exposure_cents: o.exposure_cents,
                limit_cents,
            })
            .chain(
                snapshot
                    .markets
                    .values()
                    .filter(|m| m.exposure_cents > limit_cents)
                    .map(|m| ThresholdBreach {
                        scope: ThresholdScope::Market,
                        id: m.market_id.clone(),
                        exposure_cents: m.exposure_cents,
                        limit_cents,
                    }),
            )
            .collect();
        breaches.sort_by(|a, b| b.exposure_cents.cmp(&a.exposure_cents));
        breaches
    }

    /// Threshold check with the configured default limit.
    pub fn check_default_thresholds(&self) -> Vec<ThresholdBreach> {
        self.check_thresholds(self.config.alert_limit_cents)
    }
}

/// Rebuild market and match aggregates from the outcome map. Counts sum the
/// per-outcome attributions, so an express touching two outcomes of one
/// match counts twice at match level, matching its doubled liability.
fn roll_up(snapshot: &mut ExposureSnapshot) {
    snapshot.markets.clear();
    snapshot.matches.clear();

    for outcome in snapshot.outcomes.values() {
        let market = snapshot
            .markets
            .entry(outcome.market_id.clone())
            .or_insert_with(|| MarketExposure {
                market_id: outcome.market_id.clone(),
                match_id: outcome.match_id.clone(),
                exposure_cents: 0,
                bet_count: 0,
            });
        market.exposure_cents += outcome.exposure_cents;
        market.bet_count += outcome.bet_count;
    }

    for market in snapshot.markets.values() {
        let m = snapshot
            .matches
            .entry(market.match_id.clone())
            .or_insert_with(|| MatchExposure {
                match_id: market.match_id.clone(),
                exposure_cents: 0,
                bet_count: 0,
            });
        m.exposure_cents += market.exposure_cents;
        m.bet_count += market.bet_count;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::betting::acceptance::BetAcceptanceService;
    use crate::betting::settlement::SettlementService;
    use crate::models::{BetType, SelectionRequest, SelectionStatus};

    struct Fixture {
        db: Arc<LedgerDb>,
        cache: Arc<ExposureCache>,
        engine: ExposureEngine,
        acceptance: BetAcceptanceService,
        settlement: SettlementService,
        _dir: tempfile::TempDir,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("ledger.db");
        let db = Arc::new(LedgerDb::new(path.to_str().unwrap()).expect("open db"));
        let cache = Arc::new(ExposureCache::new());
        let (tx, _rx) = crate::events::channel();
        Fixture {
            engine: ExposureEngine::new(
                db.clone(),
                cache.clone(),
                ExposureEngineConfig::default(),
            ),
            acceptance: BetAcceptanceService::new(
                db.clone(),
                tx.clone(),
                crate::models::Config::default(),
            ),
            settlement: SettlementService::new(db.clone(), tx, crate::models::Config::default()),
            db,
            cache,
            _dir: dir,
        }
    }

    fn leg(m: &str, outcome: &str, odds: &str) -> SelectionRequest {
        SelectionRequest {
            match_id: m.into(),
            market_id: format!("{}:1x2", m),
            outcome_id: format!("{}:1x2:{}", m, outcome),
            odds: odds.into(),
        }
    }

    #[test]
    fn empty_before_first_cycle() {
        let f = fixture();
        assert!(f.engine.outcome_exposure("x").is_none());
        assert!(f.engine.cached_exposure(&ExposureFilter::default()).is_empty());
    }

    #[test]
    fn single_bet_exposure_is_net_payout() {
        let f = fixture();
        let user = f.db.create_user("alice", 10_000).unwrap();
        f.acceptance
            .place_bet(user.id, BetType::Single, 1_000, vec![leg("m1", "home", "2.50")])
            .unwrap();

        f.engine.run_cycle();

        let exposure = f.engine.outcome_exposure("m1:1x2:home").unwrap();
        // 2500 payout - 1000 stake
        assert_eq!(exposure.exposure_cents, 1_500);
        assert_eq!(exposure.bet_count, 1);
    }

    #[test]
    fn express_full_attribution_on_every_leg() {
        let f = fixture();
        let user = f.db.create_user("bob", 10_000).unwrap();
        f.acceptance
            .place_bet(
                user.id,
                BetType::Express,
                500,
                vec![leg("m1", "home", "2.00"), leg("m2", "away", "1.80")],
            )
            .unwrap();

        f.engine.run_cycle();

        // 1800 - 500 = 1300 charged to BOTH legs
        for outcome in ["m1:1x2:home", "m2:1x2:away"] {
            let exposure = f.engine.outcome_exposure(outcome).unwrap();
            assert_eq!(exposure.exposure_cents, 1_300, "outcome {}", outcome);
        }

        // Match roll-up follows the market sum
        assert_eq!(f.engine.match_exposure("m1").unwrap().exposure_cents, 1_300);
        assert_eq!(f.engine.match_exposure("m2").unwrap().exposure_cents, 1_300);
    }

    #[test]
    fn settled_bets_contribute_zero() {
        let f = fixture();
        let user = f.db.create_user("carol", 10_000).unwrap();
        let placed = f
            .acceptance
            .place_bet(user.id, BetType::Single, 1_000, vec![leg("m1", "home", "2.50")])
            .unwrap();

        f.engine.run_cycle();
        assert!(f.engine.outcome_exposure("m1:1x2:home").is_some());

        f.settlement
            .settle_selection(&placed.selections[0].id, SelectionStatus::Lose)
            .unwrap();
        f.engine.run_cycle();

        assert!(f.engine.outcome_exposure("m1:1x2:home").is_none());
        assert_eq!(f.cache.snapshot().unwrap().pending_bets, 0);
    }

    #[test]
    fn market_sums_its_outcomes() {
        let f = fixture();
        let user = f.db.create_user("dave", 50_000).unwrap();
        f.acceptance
            .place_bet(user.id, BetType::Single, 1_000, vec![leg("m1", "home", "2.00")])
            .unwrap();
        f.acceptance
            .place_bet(user.id, BetType::Single, 1_000, vec![leg("m1", "away", "3.00")])
            .unwrap();

        f.engine.run_cycle();

        // 1000 + 2000 across mutually exclusive outcomes: upper bound
        let market = f.engine.market_exposure("m1:1x2").unwrap();
        assert_eq!(market.exposure_cents, 3_000);
        assert_eq!(market.bet_count, 2);
    }

    #[test]
    fn thresholds_flag_worst_first() {
        let f = fixture();
        let user = f.db.create_user("erin", 1_000_000).unwrap();
        f.acceptance
            .place_bet(user.id, BetType::Single, 100_000, vec![leg("m1", "home", "5.00")])
            .unwrap();
        f.acceptance
            .place_bet(user.id, BetType::Single, 10_000, vec![leg("m2", "home", "2.00")])
            .unwrap();

        f.engine.run_cycle();

        // m1 outcome: 400_000 over; m2 outcome: 10_000 under
        let breaches = f.engine.check_thresholds(50_000);
        assert!(!breaches.is_empty());
        assert_eq!(breaches[0].exposure_cents, 400_000);
        assert!(breaches
            .iter()
            .all(|b| b.exposure_cents > b.limit_cents));
        assert!(breaches
            .windows(2)
            .all(|w| w[0].exposure_cents >= w[1].exposure_cents));
    }

    #[tokio::test]
    async fn spawn_and_stop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.db");
        let db = Arc::new(LedgerDb::new(path.to_str().unwrap()).unwrap());
        let cache = Arc::new(ExposureCache::new());
        let engine = Arc::new(ExposureEngine::new(
            db,
            cache.clone(),
            ExposureEngineConfig {
                interval: Duration::from_millis(10),
                cache_ttl: Duration::from_secs(30),
                alert_limit_cents: 1,
            },
        ));

        let handle = engine.spawn();
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.stop().await;

        // At least one cycle ran before shutdown
        assert!(cache.snapshot().is_some());
    }
}
