//! Settlement Service
//!
//! Transitions selections and bets to terminal outcomes and credits winnings
//! through the same atomic balance primitive acceptance uses. A bet resolves
//! only once every one of its selections is terminal:
//!
//! - any losing leg forfeits the stake (no credit)
//! - all surviving legs winning pays the product of surviving odds, with
//!   void/push legs collapsed to 1.0
//! - every leg void/push refunds the stake exactly
//!
//! Re-settling anything terminal fails with `AlreadySettled` instead of
//! double-crediting.

use std::sync::Arc;

use anyhow::anyhow;
use chrono::Utc;
use tracing::{error, info, warn};

use crate::betting::odds;
use crate::error::BetError;
use crate::events::{emit, EventSender, LedgerEvent};
use crate::ledger::LedgerDb;
use crate::models::{
    Bet, BetSelection, BetStatus, Config, SelectionStatus, Transaction, TransactionType,
};

/// Outcome of resolving a whole bet.
#[derive(Debug, Clone)]
pub struct BetResolution {
    pub bet_id: String,
    pub status: BetStatus,
    pub payout_cents: i64,
    pub transaction: Option<Transaction>,
}

/// Result of settling one selection; carries the parent bet's resolution
/// when this was the last open leg.
#[derive(Debug, Clone)]
pub struct SelectionSettlement {
    pub selection_id: String,
    pub status: SelectionStatus,
    pub bet_resolution: Option<BetResolution>,
}

pub struct SettlementService {
    db: Arc<LedgerDb>,
    events: EventSender,
    #[allow(dead_code)]
    config: Config,
}

impl SettlementService {
    pub fn new(db: Arc<LedgerDb>, events: EventSender, config: Config) -> Self {
        Self { db, events, config }
    }

    /// Settle one leg. When this was the bet's last pending leg, the parent
    /// bet is resolved and credited in the same call.
    pub fn settle_selection(
        &self,
        selection_id: &str,
        result: SelectionStatus,
    ) -> Result<SelectionSettlement, BetError> {
        if !result.is_terminal() {
            return Err(BetError::Store(anyhow!(
                "settlement result must be terminal, got {}",
                result.as_str()
            )));
        }

        let selection = self
            .db
            .selection(selection_id)?
            .ok_or_else(|| BetError::Store(anyhow!("selection {} not found", selection_id)))?;

        if !self.db.update_selection_status(selection_id, result)? {
            return Err(BetError::AlreadySettled);
        }

        let siblings = self.db.selections_by_bet(&selection.bet_id)?;
        let all_terminal = siblings.iter().all(|s| s.status.is_terminal());

        let bet_resolution = if all_terminal {
            Some(self.resolve_bet(&selection.bet_id, &siblings)?)
        } else {
            None
        };

        Ok(SelectionSettlement {
            selection_id: selection_id.to_string(),
            status: result,
            bet_resolution,
        })
    }

    /// Administrative force settlement. Bypasses selection-level computation
    /// but still records the reason in an audit transaction and honors the
    /// `AlreadySettled` idempotency guard.
    pub fn settle_bet(
        &self,
        bet_id: &str,
        outcome: BetStatus,
        payout_cents: Option<i64>,
        reason: &str,
    ) -> Result<BetResolution, BetError> {
        if !outcome.is_terminal() {
            return Err(BetError::Store(anyhow!(
                "forced outcome must be terminal, got {}",
                outcome.as_str()
            )));
        }

        let bet = self
            .db
            .bet(bet_id)?
            .ok_or_else(|| BetError::Store(anyhow!("bet {} not found", bet_id)))?;
        if bet.status.is_terminal() {
            return Err(BetError::AlreadySettled);
        }

        let payout = match outcome {
            BetStatus::Won => payout_cents.unwrap_or(bet.potential_winnings_cents),
            BetStatus::Voided | BetStatus::Refunded => bet.total_stake_cents,
            BetStatus::Lost => 0,
            BetStatus::Pending => unreachable!(),
        };

        let resolution = self.apply_resolution(
            &bet,
            outcome,
            payout,
            &format!("force_settle:{}:{}", reason, bet_id),
        )?;

        // Close out any legs still open so nothing keeps feeding exposure
        for sel in self.db.selections_by_bet(bet_id)? {
            if !sel.status.is_terminal() {
                if let Err(e) = self.db.update_selection_status(&sel.id, SelectionStatus::Void) {
                    warn!(bet_id, selection_id = %sel.id, %e, "failed to void selection on force settle");
                }
            }
        }

        info!(bet_id, outcome = outcome.as_str(), payout, reason, "bet force-settled");
        Ok(resolution)
    }

    /// Retry resolution for a bet whose legs are all terminal but which is
    /// still pending (a payout credit failed and reverted the settlement).
    pub fn resolve_open_bet(&self, bet_id: &str) -> Result<BetResolution, BetError> {
        let selections = self.db.selections_by_bet(bet_id)?;
        if selections.is_empty() || !selections.iter().all(|s| s.status.is_terminal()) {
            return Err(BetError::Store(anyhow!(
                "bet {} still has open selections",
                bet_id
            )));
        }
        self.resolve_bet(bet_id, &selections)
    }

    /// Compute the bet-level outcome from fully-terminal selections and
    /// apply it.
    fn resolve_bet(
        &self,
        bet_id: &str,
        selections: &[BetSelection],
    ) -> Result<BetResolution, BetError> {
        let bet = self
            .db
            .bet(bet_id)?
            .ok_or_else(|| BetError::Store(anyhow!("bet {} not found", bet_id)))?;
        if bet.status.is_terminal() {
            return Err(BetError::AlreadySettled);
        }

        let any_lose = selections
            .iter()
            .any(|s| s.status == SelectionStatus::Lose);
        let all_voided = selections.iter().all(|s| s.status.is_voided());

        let (status, payout) = if any_lose {
            (BetStatus::Lost, 0)
        } else if all_voided {
            (BetStatus::Voided, bet.total_stake_cents)
        } else {
            // Only wins and voided legs remain: recompute from surviving odds
            (
                BetStatus::Won,
                odds::surviving_winnings_cents(bet.total_stake_cents, selections),
            )
        };

        let resolution =
            self.apply_resolution(&bet, status, payout, &format!("settle:{}", bet_id))?;

        info!(
            bet_id,
            status = status.as_str(),
            payout_cents = payout,
            "bet resolved"
        );
        Ok(resolution)
    }

    /// Claim the settlement via CAS, then credit. A credit failure reverts
    /// the claim so the bet can be settled again; a revert failure is the
    /// alertable broken-invariant state.
    fn apply_resolution(
        &self,
        bet: &Bet,
        status: BetStatus,
        payout_cents: i64,
        reference: &str,
    ) -> Result<BetResolution, BetError> {
        let actual_winnings = if status == BetStatus::Won {
            payout_cents
        } else {
            0
        };
        let settled_at = Utc::now();

        if !self
            .db
            .update_bet_settlement(&bet.id, status, actual_winnings, settled_at)?
        {
            return Err(BetError::AlreadySettled);
        }

        let transaction = if payout_cents > 0 {
            let tx_type = if status == BetStatus::Won {
                TransactionType::BetPayout
            } else {
                TransactionType::BetRefund
            };
            match self
                .db
                .credit_balance(bet.user_id, payout_cents, tx_type, reference)
            {
                Ok(tx) => Some(tx),
                Err(credit_err) => {
                    // Give the settlement claim back before surfacing the error
                    match self.db.revert_bet_settlement(&bet.id) {
                        Ok(_) => {
                            error!(
                                bet_id = %bet.id,
                                %credit_err,
                                "settlement credit failed; settlement reverted"
                            );
                            return Err(credit_err);
                        }
                        Err(revert_err) => {
                            error!(
                                bet_id = %bet.id,
                                user_id = bet.user_id,
                                payout_cents,
                                %credit_err,
                                %revert_err,
                                "LEDGER INVARIANT BROKEN: settled bet without payout"
                            );
                            return Err(BetError::CompensationFailed(format!(
                                "bet {} user {}: {}",
                                bet.id, bet.user_id, revert_err
                            )));
                        }
                    }
                }
            }
        } else {
            // No money moved; leave the audit trail the reason anyway
            Some(self.db.record_audit(bet.user_id, reference)?)
        };

        emit(
            &self.events,
            LedgerEvent::BetSettled {
                bet_id: bet.id.clone(),
                user_id: bet.user_id,
                status,
                timestamp: settled_at,
            },
        );

        Ok(BetResolution {
            bet_id: bet.id.clone(),
            status,
            payout_cents,
            transaction,
        })
    }
}
