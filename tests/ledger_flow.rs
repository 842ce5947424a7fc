//! End-to-end ledger flow tests
//!
//! Drives the public services the way a deployment would: place bets,
//! recompute exposure, settle selections, then audit the ledger invariant
//! (stored balance equals the sum of the transaction trail) after every
//! money movement.

use std::sync::Arc;

use bookcore::betting::{BetAcceptanceService, SettlementService};
use bookcore::error::BetError;
use bookcore::events;
use bookcore::exposure::{ExposureCache, ExposureEngine, ExposureEngineConfig};
use bookcore::ledger::LedgerDb;
use bookcore::models::{BetStatus, BetType, Config, SelectionRequest, SelectionStatus};

struct TestApp {
    db: Arc<LedgerDb>,
    acceptance: BetAcceptanceService,
    settlement: SettlementService,
    engine: ExposureEngine,
    _dir: tempfile::TempDir,
}

fn app() -> TestApp {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("ledger.db");
    let db = Arc::new(LedgerDb::new(path.to_str().unwrap()).expect("open db"));
    let (tx, _rx) = events::channel();
    let cache = Arc::new(ExposureCache::new());
    TestApp {
        acceptance: BetAcceptanceService::new(db.clone(), tx.clone(), Config::default()),
        settlement: SettlementService::new(db.clone(), tx, Config::default()),
        engine: ExposureEngine::new(db.clone(), cache, ExposureEngineConfig::default()),
        db,
        _dir: dir,
    }
}

fn leg(match_id: &str, outcome: &str, odds: &str) -> SelectionRequest {
    SelectionRequest {
        match_id: match_id.into(),
        market_id: format!("{}:1x2", match_id),
        outcome_id: format!("{}:1x2:{}", match_id, outcome),
        odds: odds.into(),
    }
}

fn assert_ledger_sound(db: &LedgerDb, user_id: i64) {
    let (stored, tx_sum) = db.balance_check(user_id).expect("balance check");
    assert_eq!(stored, tx_sum, "balance diverged from transaction trail");
    assert!(db.balance_drift().unwrap().is_empty());
}

#[test]
fn winning_single_full_cycle() {
    let app = app();
    let user = app.db.create_user("alice", 10_000).unwrap();

    let placed = app
        .acceptance
        .place_bet(user.id, BetType::Single, 1_000, vec![leg("m1", "home", "2.50")])
        .unwrap();
    assert_eq!(placed.user.balance_cents, 9_000);
    assert_eq!(placed.bet.potential_winnings_cents, 2_500);
    assert_ledger_sound(&app.db, user.id);

    app.engine.run_cycle();
    let exposure = app.engine.outcome_exposure("m1:1x2:home").unwrap();
    assert_eq!(exposure.exposure_cents, 1_500);

    let settled = app
        .settlement
        .settle_selection(&placed.selections[0].id, SelectionStatus::Win)
        .unwrap();
    let resolution = settled.bet_resolution.expect("single leg resolves bet");
    assert_eq!(resolution.status, BetStatus::Won);
    assert_eq!(resolution.payout_cents, 2_500);

    let user = app.db.user(user.id).unwrap().unwrap();
    assert_eq!(user.balance_cents, 11_500);
    assert_ledger_sound(&app.db, user.id);

    // Settled bets no longer carry exposure
    app.engine.run_cycle();
    assert!(app.engine.outcome_exposure("m1:1x2:home").is_none());
}

#[test]
fn losing_express_keeps_stake_debited() {
    let app = app();
    let user = app.db.create_user("bob", 10_000).unwrap();

    let placed = app
        .acceptance
        .place_bet(
            user.id,
            BetType::Express,
            500,
            vec![leg("m1", "home", "2.00"), leg("m2", "away", "1.80")],
        )
        .unwrap();
    assert_eq!(placed.bet.potential_winnings_cents, 1_800);

    // One losing leg sinks the whole bet even with the other still open
    let settled = app
        .settlement
        .settle_selection(&placed.selections[0].id, SelectionStatus::Lose)
        .unwrap();
    let resolution = settled.bet_resolution.expect("losing leg resolves bet");
    assert_eq!(resolution.status, BetStatus::Lost);
    assert_eq!(resolution.payout_cents, 0);

    let user = app.db.user(user.id).unwrap().unwrap();
    assert_eq!(user.balance_cents, 9_500);
    assert_ledger_sound(&app.db, user.id);
}

#[test]
fn void_leg_shrinks_express_payout() {
    let app = app();
    let user = app.db.create_user("carol", 10_000).unwrap();

    let placed = app
        .acceptance
        .place_bet(
            user.id,
            BetType::Express,
            1_000,
            vec![leg("m1", "home", "2.00"), leg("m2", "away", "1.80")],
        )
        .unwrap();

    app.settlement
        .settle_selection(&placed.selections[1].id, SelectionStatus::Void)
        .unwrap();
    let settled = app
        .settlement
        .settle_selection(&placed.selections[0].id, SelectionStatus::Win)
        .unwrap();
    let resolution = settled.bet_resolution.unwrap();

    // Voided leg collapses to odds 1.0: payout is 1000 * 2.00
    assert_eq!(resolution.status, BetStatus::Won);
    assert_eq!(resolution.payout_cents, 2_000);
    assert_ledger_sound(&app.db, user.id);
}

#[test]
fn insufficient_balance_rejects_without_side_effects() {
    let app = app();
    let user = app.db.create_user("dave", 400).unwrap();

    let err = app
        .acceptance
        .place_bet(user.id, BetType::Single, 500, vec![leg("m1", "home", "2.00")])
        .unwrap_err();
    assert!(matches!(err, BetError::InsufficientBalance));

    let user = app.db.user(user.id).unwrap().unwrap();
    assert_eq!(user.balance_cents, 400);
    assert!(app.db.bets_by_user(user.id).unwrap().is_empty());
    assert_ledger_sound(&app.db, user.id);
}

#[test]
fn settlement_is_idempotent() {
    let app = app();
    let user = app.db.create_user("erin", 10_000).unwrap();

    let placed = app
        .acceptance
        .place_bet(user.id, BetType::Single, 1_000, vec![leg("m1", "home", "3.00")])
        .unwrap();

    app.settlement
        .settle_selection(&placed.selections[0].id, SelectionStatus::Win)
        .unwrap();
    let err = app
        .settlement
        .settle_selection(&placed.selections[0].id, SelectionStatus::Lose)
        .unwrap_err();
    assert!(matches!(err, BetError::AlreadySettled));

    // Paid exactly once
    let user = app.db.user(user.id).unwrap().unwrap();
    assert_eq!(user.balance_cents, 12_000);
    assert_ledger_sound(&app.db, user.id);
}

#[test]
fn force_refund_voids_open_legs() {
    let app = app();
    let user = app.db.create_user("frank", 10_000).unwrap();

    let placed = app
        .acceptance
        .place_bet(
            user.id,
            BetType::Express,
            1_000,
            vec![leg("m1", "home", "2.00"), leg("m2", "away", "1.80")],
        )
        .unwrap();

    let resolution = app
        .settlement
        .settle_bet(&placed.bet.id, BetStatus::Refunded, None, "match abandoned")
        .unwrap();
    assert_eq!(resolution.payout_cents, 1_000);

    let user = app.db.user(user.id).unwrap().unwrap();
    assert_eq!(user.balance_cents, 10_000);
    for sel in app.db.selections_by_bet(&placed.bet.id).unwrap() {
        assert_eq!(sel.status, SelectionStatus::Void);
    }
    assert_ledger_sound(&app.db, user.id);

    // No exposure survives a refund
    app.engine.run_cycle();
    assert!(app.engine.outcome_exposure("m1:1x2:home").is_none());
}

#[test]
fn concurrent_placements_never_overdraw() {
    let app = app();
    let user = app.db.create_user("grace", 1_000).unwrap();
    let acceptance = Arc::new(app.acceptance);

    let mut handles = Vec::new();
    for _ in 0..8 {
        let svc = acceptance.clone();
        handles.push(std::thread::spawn(move || {
            svc.place_bet(user.id, BetType::Single, 300, vec![leg("m1", "home", "2.00")])
        }));
    }

    let accepted = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|r| r.is_ok())
        .count();

    // 1000 / 300 leaves room for at most three stakes
    assert!(accepted <= 3, "accepted {} bets on a 1000-cent balance", accepted);
    let user = app.db.user(user.id).unwrap().unwrap();
    assert!(user.balance_cents >= 0);
    assert_eq!(user.balance_cents, 1_000 - 300 * accepted as i64);
    assert_ledger_sound(&app.db, user.id);
}
