use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Wager composition: one leg, multiplied legs, or system combinations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BetType {
    Single,
    Express,
    System,
}

impl BetType {
    pub fn as_str(&self) -> &str {
        match self {
            BetType::Single => "single",
            BetType::Express => "express",
            BetType::System => "system",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "single" => Some(BetType::Single),
            "express" => Some(BetType::Express),
            "system" => Some(BetType::System),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BetStatus {
    Pending,
    Won,
    Lost,
    Voided,
    Refunded,
}

impl BetStatus {
    pub fn as_str(&self) -> &str {
        match self {
            BetStatus::Pending => "pending",
            BetStatus::Won => "won",
            BetStatus::Lost => "lost",
            BetStatus::Voided => "voided",
            BetStatus::Refunded => "refunded",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(BetStatus::Pending),
            "won" => Some(BetStatus::Won),
            "lost" => Some(BetStatus::Lost),
            "voided" => Some(BetStatus::Voided),
            "refunded" => Some(BetStatus::Refunded),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, BetStatus::Pending)
    }
}

/// Per-leg result, independent of siblings until the parent bet resolves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionStatus {
    Pending,
    Win,
    Lose,
    Void,
    Push,
}

impl SelectionStatus {
    pub fn as_str(&self) -> &str {
        match self {
            SelectionStatus::Pending => "pending",
            SelectionStatus::Win => "win",
            SelectionStatus::Lose => "lose",
            SelectionStatus::Void => "void",
            SelectionStatus::Push => "push",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(SelectionStatus::Pending),
            "win" => Some(SelectionStatus::Win),
            "lose" => Some(SelectionStatus::Lose),
            "void" => Some(SelectionStatus::Void),
            "push" => Some(SelectionStatus::Push),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, SelectionStatus::Pending)
    }

    /// Void and push legs drop out of the payout: their odds collapse to 1.0
    pub fn is_voided(&self) -> bool {
        matches!(self, SelectionStatus::Void | SelectionStatus::Push)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    BetStake,
    BetPayout,
    BetRefund,
    StakeReversal,
    Adjustment,
}

impl TransactionType {
    pub fn as_str(&self) -> &str {
        match self {
            TransactionType::BetStake => "bet_stake",
            TransactionType::BetPayout => "bet_payout",
            TransactionType::BetRefund => "bet_refund",
            TransactionType::StakeReversal => "stake_reversal",
            TransactionType::Adjustment => "adjustment",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "bet_stake" => Some(TransactionType::BetStake),
            "bet_payout" => Some(TransactionType::BetPayout),
            "bet_refund" => Some(TransactionType::BetRefund),
            "stake_reversal" => Some(TransactionType::StakeReversal),
            "adjustment" => Some(TransactionType::Adjustment),
            _ => None,
        }
    }
}

/// Bettor account. `balance_cents` is mutated only through the ledger's
/// atomic balance primitives; everything else is bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub balance_cents: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A placed wager. The core fields are immutable after placement; only
/// `status`, `actual_winnings_cents` and `settled_at` change, exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bet {
    pub id: String,
    pub user_id: i64,
    pub bet_type: BetType,
    pub total_stake_cents: i64,
    /// Product of the selections' frozen odds (single: the one leg's odds)
    pub total_odds: f64,
    pub potential_winnings_cents: i64,
    pub status: BetStatus,
    pub actual_winnings_cents: Option<i64>,
    pub placed_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
}

/// One leg of a bet. Odds are frozen at placement and never re-read live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BetSelection {
    pub id: String,
    pub bet_id: String,
    pub match_id: String,
    pub market_id: String,
    pub outcome_id: String,
    pub odds: f64,
    pub status: SelectionStatus,
}

/// Append-only ledger entry. One per balance mutation, never edited.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub user_id: i64,
    pub tx_type: TransactionType,
    /// Signed: debits negative, credits positive
    pub amount_cents: i64,
    pub balance_before_cents: i64,
    pub balance_after_cents: i64,
    pub reference: String,
    pub created_at: DateTime<Utc>,
}

/// Leg of a placement request; odds arrive as the string the odds feed
/// quoted, so the acceptance service rejects unparseable values itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionRequest {
    pub match_id: String,
    pub market_id: String,
    pub outcome_id: String,
    pub odds: String,
}

/// Worst-case liability for one outcome: the sum over all pending bets
/// referencing it of net payout beyond stake. Derived, never authoritative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutcomeExposure {
    pub outcome_id: String,
    pub market_id: String,
    pub match_id: String,
    pub exposure_cents: i64,
    pub bet_count: u64,
}

/// Sum of a market's outcome exposures. Mutually exclusive outcomes are
/// deliberately double-counted: each leg is charged the bet's full net
/// payout, so this is an upper bound, not an expected payout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketExposure {
    pub market_id: String,
    pub match_id: String,
    pub exposure_cents: i64,
    pub bet_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchExposure {
    pub match_id: String,
    pub exposure_cents: i64,
    pub bet_count: u64,
}

/// Full output of one exposure cycle; replaced in the cache as a unit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExposureSnapshot {
    pub outcomes: std::collections::HashMap<String, OutcomeExposure>,
    pub markets: std::collections::HashMap<String, MarketExposure>,
    pub matches: std::collections::HashMap<String, MatchExposure>,
    pub pending_bets: u64,
    pub computed_at: Option<DateTime<Utc>>,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: String,
    pub min_stake_cents: i64,
    pub max_stake_cents: i64,
    pub min_odds: f64,
    pub exposure_interval_secs: u64,
    pub exposure_cache_ttl_secs: u64,
    pub exposure_alert_limit_cents: i64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        let database_path =
            std::env::var("DATABASE_PATH").unwrap_or_else(|_| "./bookcore.db".to_string());

        let min_stake_cents = std::env::var("MIN_STAKE_CENTS")
            .unwrap_or_else(|_| "100".to_string())
            .parse()
            .unwrap_or(100);

        let max_stake_cents = std::env::var("MAX_STAKE_CENTS")
            .unwrap_or_else(|_| "10000000".to_string())
            .parse()
            .unwrap_or(10_000_000);

        let min_odds = std::env::var("MIN_ODDS")
            .unwrap_or_else(|_| "1.01".to_string())
            .parse()
            .unwrap_or(1.01);

        let exposure_interval_secs = std::env::var("EXPOSURE_INTERVAL_SECS")
            .unwrap_or_else(|_| "5".to_string())
            .parse()
            .unwrap_or(5);

        let exposure_cache_ttl_secs = std::env::var("EXPOSURE_CACHE_TTL_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .unwrap_or(30);

        let exposure_alert_limit_cents = std::env::var("EXPOSURE_ALERT_LIMIT_CENTS")
            .unwrap_or_else(|_| "5000000".to_string())
            .parse()
            .unwrap_or(5_000_000);

        Ok(Self {
            database_path,
            min_stake_cents,
            max_stake_cents,
            min_odds,
            exposure_interval_secs,
            exposure_cache_ttl_secs,
            exposure_alert_limit_cents,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: "./bookcore.db".to_string(),
            min_stake_cents: 100,
            max_stake_cents: 10_000_000,
            min_odds: 1.01,
            exposure_interval_secs: 5,
            exposure_cache_ttl_secs: 30,
            exposure_alert_limit_cents: 5_000_000,
        }
    }
}
