//! Betting services: wager acceptance and settlement.
//!
//! Both services are plain structs with injected store/event dependencies,
//! constructed by the process bootstrap. All balance movement goes through
//! the ledger's atomic primitives; any write that fails after a debit is
//! compensated explicitly before the error is returned.

pub mod acceptance;
pub mod odds;
pub mod settlement;

pub use acceptance::{BetAcceptanceService, PlacedBet};
pub use settlement::{BetResolution, SelectionSettlement, SettlementService};
