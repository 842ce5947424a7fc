//! Bookcore Library
//!
//! Betting ledger and risk-exposure engine: bet acceptance with atomic
//! balance movement, selection-driven settlement, and a periodic exposure
//! calculator feeding a short-TTL snapshot cache.

pub mod betting;
pub mod error;
pub mod events;
pub mod exposure;
pub mod ledger;
pub mod models;

pub use betting::{BetAcceptanceService, SettlementService};
pub use error::BetError;
pub use exposure::{ExposureCache, ExposureEngine, ExposureEngineConfig};
pub use ledger::LedgerDb;
