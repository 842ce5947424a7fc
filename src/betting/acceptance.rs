//! Bet Acceptance Service
//!
//! Validates and atomically places a wager: debit the stake, persist the bet
//! with its selections, append the audit transaction. Validation fails fast
//! with nothing written; a failure after the debit is compensated with a
//! stake-reversal credit so the user is never left under-balanced without a
//! matching bet record.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::betting::odds;
use crate::error::BetError;
use crate::events::{emit, EventSender, LedgerEvent};
use crate::ledger::LedgerDb;
use crate::models::{
    Bet, BetSelection, BetStatus, BetType, Config, SelectionRequest, SelectionStatus, Transaction,
    TransactionType, User,
};

/// Successful placement result: everything written in the operation.
#[derive(Debug, Clone)]
pub struct PlacedBet {
    pub bet: Bet,
    pub selections: Vec<BetSelection>,
    pub transaction: Transaction,
    pub user: User,
}

pub struct BetAcceptanceService {
    db: Arc<LedgerDb>,
    events: EventSender,
    config: Config,
}

impl BetAcceptanceService {
    pub fn new(db: Arc<LedgerDb>, events: EventSender, config: Config) -> Self {
        Self { db, events, config }
    }

    /// Place a wager. Same-user placements serialize on the atomic debit;
    /// placements by different users proceed independently.
    pub fn place_bet(
        &self,
        user_id: i64,
        bet_type: BetType,
        total_stake_cents: i64,
        selections: Vec<SelectionRequest>,
    ) -> Result<PlacedBet, BetError> {
        // 1. user exists and is active
        let user = self
            .db
            .user(user_id)?
            .filter(|u| u.is_active)
            .ok_or(BetError::UserInactiveOrMissing)?;

        // 2. stake within configured limits
        if total_stake_cents < self.config.min_stake_cents
            || total_stake_cents > self.config.max_stake_cents
        {
            debug!(user_id, total_stake_cents, "stake outside limits");
            return Err(BetError::InvalidStake(total_stake_cents));
        }

        // 3. leg count and per-leg odds
        odds::validate_leg_count(bet_type, selections.len())?;
        let mut leg_odds = Vec::with_capacity(selections.len());
        for sel in &selections {
            leg_odds.push(odds::parse_odds(&sel.odds, self.config.min_odds)?);
        }

        // 4. combined odds must clear the floor too
        let total_odds = odds::total_odds(bet_type, &leg_odds);
        if !total_odds.is_finite() || total_odds < self.config.min_odds {
            return Err(BetError::InvalidTotalOdds(total_odds));
        }

        let bet_id = Uuid::new_v4().to_string();

        // 5. balance check and debit are one atomic step
        let transaction = self.db.debit_balance(
            user_id,
            total_stake_cents,
            TransactionType::BetStake,
            &format!("bet:{}", bet_id),
        )?;

        // Stake is held from here on: every failure below must give it back.
        let bet = Bet {
            id: bet_id.clone(),
            user_id,
            bet_type,
            total_stake_cents,
            total_odds,
            potential_winnings_cents: odds::potential_winnings_cents(total_stake_cents, total_odds),
            status: BetStatus::Pending,
            actual_winnings_cents: None,
            placed_at: Utc::now(),
            settled_at: None,
        };

        if let Err(e) = self.db.insert_bet(&bet) {
            return Err(self.compensate(user_id, total_stake_cents, &bet_id, e));
        }

        let bet_selections: Vec<BetSelection> = selections
            .iter()
            .zip(leg_odds.iter())
            .map(|(req, &leg)| BetSelection {
                id: Uuid::new_v4().to_string(),
                bet_id: bet_id.clone(),
                match_id: req.match_id.clone(),
                market_id: req.market_id.clone(),
                outcome_id: req.outcome_id.clone(),
                odds: leg,
                status: SelectionStatus::Pending,
            })
            .collect();

        if let Err(e) = self.db.insert_selections(&bet_selections) {
            // Remove the half-written bet before returning the stake
            if let Err(cleanup) = self.db.delete_bet(&bet_id) {
                error!(bet_id, %cleanup, "failed to clean up bet during compensation");
            }
            return Err(self.compensate(user_id, total_stake_cents, &bet_id, e));
        }

        let user = self.db.user(user_id)?.unwrap_or(user);

        info!(
            user_id,
            bet_id,
            bet_type = bet_type.as_str(),
            total_stake_cents,
            total_odds,
            potential_winnings_cents = bet.potential_winnings_cents,
            "bet placed"
        );

        emit(
            &self.events,
            LedgerEvent::BetPlaced {
                bet_id,
                user_id,
                timestamp: bet.placed_at,
            },
        );

        Ok(PlacedBet {
            bet,
            selections: bet_selections,
            transaction,
            user,
        })
    }

    /// Return the held stake after a post-debit failure. A compensation that
    /// itself fails leaves the ledger invariant broken and must page.
    fn compensate(
        &self,
        user_id: i64,
        stake_cents: i64,
        bet_id: &str,
        cause: anyhow::Error,
    ) -> BetError {
        match self.db.credit_balance(
            user_id,
            stake_cents,
            TransactionType::StakeReversal,
            &format!("reversal:{}", bet_id),
        ) {
            Ok(_) => {
                error!(user_id, bet_id, %cause, "placement failed after debit; stake reversed");
                BetError::PlacementFailed
            }
            Err(comp_err) => {
                error!(
                    user_id,
                    bet_id,
                    stake_cents,
                    %cause,
                    %comp_err,
                    "LEDGER INVARIANT BROKEN: stake debit could not be compensated"
                );
                BetError::CompensationFailed(format!(
                    "user {} bet {}: {}",
                    user_id, bet_id, comp_err
                ))
            }
        }
    }
}
