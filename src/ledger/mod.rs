pub mod db;

pub use db::{BalanceDrift, LedgerDb};
