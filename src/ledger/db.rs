//! Database-backed Betting Ledger Store
//!
//! Durable keyed storage for users, bets, bet selections and the append-only
//! transaction trail. The two balance primitives (`debit_balance`,
//! `credit_balance`) are the only code paths that mutate a user balance:
//! each runs as a single guarded UPDATE plus transaction append inside one
//! SQL transaction, so the double-entry invariant
//! `sum(transactions.amount_cents) == users.balance_cents` holds at every
//! commit point.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OpenFlags, Row};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::BetError;
use crate::models::{
    Bet, BetSelection, BetStatus, BetType, SelectionStatus, Transaction, TransactionType, User,
};

const SCHEMA_SQL: &str = r#"
-- WAL for concurrent reads during settlement/exposure cycles
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;
PRAGMA foreign_keys = ON;
PRAGMA temp_store = MEMORY;

CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT UNIQUE NOT NULL,
    balance_cents INTEGER NOT NULL DEFAULT 0,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS bets (
    id TEXT PRIMARY KEY,
    user_id INTEGER NOT NULL,
    bet_type TEXT NOT NULL,
    total_stake_cents INTEGER NOT NULL,
    total_odds REAL NOT NULL,
    potential_winnings_cents INTEGER NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending',
    actual_winnings_cents INTEGER,
    placed_at TEXT NOT NULL,
    settled_at TEXT,
    FOREIGN KEY (user_id) REFERENCES users(id)
) WITHOUT ROWID;

CREATE TABLE IF NOT EXISTS bet_selections (
    id TEXT PRIMARY KEY,
    bet_id TEXT NOT NULL,
    match_id TEXT NOT NULL,
    market_id TEXT NOT NULL,
    outcome_id TEXT NOT NULL,
    odds REAL NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending',
    FOREIGN KEY (bet_id) REFERENCES bets(id)
) WITHOUT ROWID;

CREATE TABLE IF NOT EXISTS transactions (
    id TEXT PRIMARY KEY,
    user_id INTEGER NOT NULL,
    tx_type TEXT NOT NULL,
    amount_cents INTEGER NOT NULL,
    balance_before_cents INTEGER NOT NULL,
    balance_after_cents INTEGER NOT NULL,
    reference TEXT NOT NULL,
    created_at TEXT NOT NULL,
    FOREIGN KEY (user_id) REFERENCES users(id)
) WITHOUT ROWID;

CREATE INDEX IF NOT EXISTS idx_bets_user
    ON bets(user_id, placed_at DESC);

-- Partial index: the exposure engine only ever scans pending bets
CREATE INDEX IF NOT EXISTS idx_bets_pending
    ON bets(placed_at DESC) WHERE status = 'pending';

CREATE INDEX IF NOT EXISTS idx_selections_bet
    ON bet_selections(bet_id);

CREATE INDEX IF NOT EXISTS idx_selections_outcome
    ON bet_selections(outcome_id, status);

CREATE INDEX IF NOT EXISTS idx_transactions_user
    ON transactions(user_id, created_at DESC);
"#;

/// Betting ledger store over SQLite
pub struct LedgerDb {
    conn: Arc<Mutex<Connection>>,
}

impl LedgerDb {
    pub fn new(db_path: &str) -> Result<Self> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX; // We handle our own locking

        let conn = Connection::open_with_flags(db_path, flags)
            .with_context(|| format!("Failed to open ledger database at {}", db_path))?;

        conn.execute_batch(SCHEMA_SQL)
            .context("Failed to initialize ledger schema")?;

        let journal_mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap_or_default();
        if journal_mode.to_lowercase() != "wal" {
            warn!("WAL mode not active, journal_mode = {}", journal_mode);
        }

        info!("📒 Ledger database initialized at: {}", db_path);

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    // ---- users ----

    /// Create a user. A non-zero opening balance is written together with an
    /// `adjustment` transaction so the ledger sums from account creation.
    pub fn create_user(&self, username: &str, opening_balance_cents: i64) -> Result<User> {
        let conn = self.conn.lock();
        let now = Utc::now();
        let now_str = now.to_rfc3339();

        conn.execute("BEGIN IMMEDIATE", [])?;

        let result = (|| -> Result<User> {
            conn.execute(
                "INSERT INTO users (username, balance_cents, is_active, created_at, updated_at)
                 VALUES (?1, ?2, 1, ?3, ?3)",
                params![username, opening_balance_cents, &now_str],
            )?;
            let id = conn.last_insert_rowid();

            if opening_balance_cents != 0 {
                conn.execute(
                    "INSERT INTO transactions
                     (id, user_id, tx_type, amount_cents, balance_before_cents, balance_after_cents, reference, created_at)
                     VALUES (?1, ?2, ?3, ?4, 0, ?4, ?5, ?6)",
                    params![
                        Uuid::new_v4().to_string(),
                        id,
                        TransactionType::Adjustment.as_str(),
                        opening_balance_cents,
                        format!("opening_balance:{}", username),
                        &now_str,
                    ],
                )?;
            }

            Ok(User {
                id,
                username: username.to_string(),
                balance_cents: opening_balance_cents,
                is_active: true,
                created_at: now,
                updated_at: now,
            })
        })();

        match result {
            Ok(user) => {
                conn.execute("COMMIT", [])?;
                Ok(user)
            }
            Err(e) => {
                let _ = conn.execute("ROLLBACK", []);
                Err(e)
            }
        }
    }

    pub fn user(&self, user_id: i64) -> Result<Option<User>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, username, balance_cents, is_active, created_at, updated_at
             FROM users WHERE id = ?1",
        )?;
        let mut rows = stmt.query_map([user_id], row_to_user)?;
        rows.next().transpose().map_err(Into::into)
    }

    pub fn set_user_active(&self, user_id: i64, active: bool) -> Result<bool> {
        let conn = self.conn.lock();
        let changes = conn.execute(
            "UPDATE users SET is_active = ?1, updated_at = ?2 WHERE id = ?3",
            params![active as i64, Utc::now().to_rfc3339(), user_id],
        )?;
        Ok(changes > 0)
    }

    // ---- balance primitives ----

    /// Atomically debit a user: guarded UPDATE plus transaction append in one
    /// SQL transaction. The guard doubles as the balance check, so a lost
    /// race surfaces as `InsufficientBalance` rather than an overdraft.
    pub fn debit_balance(
        &self,
        user_id: i64,
        amount_cents: i64,
        tx_type: TransactionType,
        reference: &str,
    ) -> Result<Transaction, BetError> {
        if amount_cents <= 0 {
            return Err(BetError::InvalidStake(amount_cents));
        }

        let conn = self.conn.lock();
        conn.execute("BEGIN IMMEDIATE", [])
            .context("begin debit")?;

        let result = (|| -> Result<Transaction, BetError> {
            let row: Option<(i64, bool)> = conn
                .query_row(
                    "SELECT balance_cents, is_active FROM users WHERE id = ?1",
                    [user_id],
                    |row| Ok((row.get(0)?, row.get::<_, i64>(1)? == 1)),
                )
                .map(Some)
                .or_else(ignore_not_found)
                .context("read balance for debit")?;

            let (balance_before, is_active) = match row {
                Some(r) => r,
                None => return Err(BetError::UserInactiveOrMissing),
            };
            if !is_active {
                return Err(BetError::UserInactiveOrMissing);
            }
            if balance_before < amount_cents {
                return Err(BetError::InsufficientBalance);
            }

            let now = Utc::now();
            let changes = conn
                .execute(
                    "UPDATE users SET balance_cents = balance_cents - ?1, updated_at = ?2
                     WHERE id = ?3 AND is_active = 1 AND balance_cents >= ?1",
                    params![amount_cents, now.to_rfc3339(), user_id],
                )
                .context("apply debit")?;
            if changes == 0 {
                // Guard failed despite the read above: lost a race
                return Err(BetError::ConcurrencyConflict);
            }

            let tx = Transaction {
                id: Uuid::new_v4().to_string(),
                user_id,
                tx_type,
                amount_cents: -amount_cents,
                balance_before_cents: balance_before,
                balance_after_cents: balance_before - amount_cents,
                reference: reference.to_string(),
                created_at: now,
            };
            insert_transaction(&conn, &tx).context("append debit transaction")?;
            Ok(tx)
        })();

        finish_tx(&conn, result)
    }

    /// Atomically credit a user. Credits are allowed on deactivated accounts:
    /// settlement of an open bet must still pay out.
    pub fn credit_balance(
        &self,
        user_id: i64,
        amount_cents: i64,
        tx_type: TransactionType,
        reference: &str,
    ) -> Result<Transaction, BetError> {
        if amount_cents <= 0 {
            return Err(BetError::InvalidStake(amount_cents));
        }

        let conn = self.conn.lock();
        conn.execute("BEGIN IMMEDIATE", [])
            .context("begin credit")?;

        let result = (|| -> Result<Transaction, BetError> {
            let balance_before: Option<i64> = conn
                .query_row(
                    "SELECT balance_cents FROM users WHERE id = ?1",
                    [user_id],
                    |row| row.get(0),
                )
                .map(Some)
                .or_else(ignore_not_found)
                .context("read balance for credit")?;

            let balance_before = match balance_before {
                Some(b) => b,
                None => return Err(BetError::UserInactiveOrMissing),
            };

            let now = Utc::now();
            conn.execute(
                "UPDATE users SET balance_cents = balance_cents + ?1, updated_at = ?2
                 WHERE id = ?3",
                params![amount_cents, now.to_rfc3339(), user_id],
            )
            .context("apply credit")?;

            let tx = Transaction {
                id: Uuid::new_v4().to_string(),
                user_id,
                tx_type,
                amount_cents,
                balance_before_cents: balance_before,
                balance_after_cents: balance_before + amount_cents,
                reference: reference.to_string(),
                created_at: now,
            };
            insert_transaction(&conn, &tx).context("append credit transaction")?;
            Ok(tx)
        })();

        finish_tx(&conn, result)
    }

    /// Append a zero-amount audit entry. Force settlements that move no
    /// money (a forced loss) still leave a trail this way; the transaction
    /// sum is unchanged so the balance invariant is untouched.
    pub fn record_audit(&self, user_id: i64, reference: &str) -> Result<Transaction, BetError> {
        let conn = self.conn.lock();
        let balance: Option<i64> = conn
            .query_row(
                "SELECT balance_cents FROM users WHERE id = ?1",
                [user_id],
                |row| row.get(0),
            )
            .map(Some)
            .or_else(ignore_not_found)
            .context("read balance for audit")?;
        let balance = balance.ok_or(BetError::UserInactiveOrMissing)?;

        let tx = Transaction {
            id: Uuid::new_v4().to_string(),
            user_id,
            tx_type: TransactionType::Adjustment,
            amount_cents: 0,
            balance_before_cents: balance,
            balance_after_cents: balance,
            reference: reference.to_string(),
            created_at: Utc::now(),
        };
        insert_transaction(&conn, &tx).context("append audit transaction")?;
        Ok(tx)
    }

    // ---- bets & selections ----

    pub fn insert_bet(&self, bet: &Bet) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO bets
             (id, user_id, bet_type, total_stake_cents, total_odds, potential_winnings_cents,
              status, actual_winnings_cents, placed_at, settled_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                &bet.id,
                bet.user_id,
                bet.bet_type.as_str(),
                bet.total_stake_cents,
                bet.total_odds,
                bet.potential_winnings_cents,
                bet.status.as_str(),
                bet.actual_winnings_cents,
                bet.placed_at.to_rfc3339(),
                bet.settled_at.map(|t| t.to_rfc3339()),
            ],
        )
        .context("insert bet")?;
        Ok(())
    }

    pub fn insert_selections(&self, selections: &[BetSelection]) -> Result<()> {
        if selections.is_empty() {
            return Ok(());
        }
        let conn = self.conn.lock();
        conn.execute("BEGIN IMMEDIATE", [])?;
        for sel in selections {
            let res = conn.execute(
                "INSERT INTO bet_selections
                 (id, bet_id, match_id, market_id, outcome_id, odds, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    &sel.id,
                    &sel.bet_id,
                    &sel.match_id,
                    &sel.market_id,
                    &sel.outcome_id,
                    sel.odds,
                    sel.status.as_str(),
                ],
            );
            if let Err(e) = res {
                let _ = conn.execute("ROLLBACK", []);
                return Err(anyhow::Error::from(e).context("insert selections"));
            }
        }
        conn.execute("COMMIT", [])?;
        Ok(())
    }

    pub fn bet(&self, bet_id: &str) -> Result<Option<Bet>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!("{} WHERE id = ?1", SELECT_BET))?;
        let mut rows = stmt.query_map([bet_id], row_to_bet)?;
        rows.next().transpose().map_err(Into::into)
    }

    pub fn selection(&self, selection_id: &str) -> Result<Option<BetSelection>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!("{} WHERE id = ?1", SELECT_SELECTION))?;
        let mut rows = stmt.query_map([selection_id], row_to_selection)?;
        rows.next().transpose().map_err(Into::into)
    }

    pub fn bets_by_user(&self, user_id: i64) -> Result<Vec<Bet>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "{} WHERE user_id = ?1 ORDER BY placed_at DESC",
            SELECT_BET
        ))?;
        let bets = stmt
            .query_map([user_id], row_to_bet)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(bets)
    }

    pub fn selections_by_bet(&self, bet_id: &str) -> Result<Vec<BetSelection>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!("{} WHERE bet_id = ?1", SELECT_SELECTION))?;
        let selections = stmt
            .query_map([bet_id], row_to_selection)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(selections)
    }

    /// All bets still awaiting settlement; the exposure engine's scan set.
    pub fn pending_bets(&self) -> Result<Vec<Bet>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "{} WHERE status = 'pending' ORDER BY placed_at",
            SELECT_BET
        ))?;
        let bets = stmt
            .query_map([], row_to_bet)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(bets)
    }

    pub fn pending_selections_for_outcome(&self, outcome_id: &str) -> Result<Vec<BetSelection>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "{} WHERE outcome_id = ?1 AND status = 'pending'",
            SELECT_SELECTION
        ))?;
        let selections = stmt
            .query_map([outcome_id], row_to_selection)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(selections)
    }

    // ---- settlement CAS ----

    /// Move a bet out of `pending`. Returns false when the bet was already
    /// terminal (the `AlreadySettled` idempotency guard).
    pub fn update_bet_settlement(
        &self,
        bet_id: &str,
        status: BetStatus,
        actual_winnings_cents: i64,
        settled_at: DateTime<Utc>,
    ) -> Result<bool> {
        let conn = self.conn.lock();
        let changes = conn.execute(
            "UPDATE bets SET status = ?1, actual_winnings_cents = ?2, settled_at = ?3
             WHERE id = ?4 AND status = 'pending'",
            params![
                status.as_str(),
                actual_winnings_cents,
                settled_at.to_rfc3339(),
                bet_id
            ],
        )?;
        Ok(changes > 0)
    }

    /// Undo a settlement claim whose payout could not be written. Only the
    /// settlement compensation path calls this.
    pub fn revert_bet_settlement(&self, bet_id: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let changes = conn.execute(
            "UPDATE bets SET status = 'pending', actual_winnings_cents = NULL, settled_at = NULL
             WHERE id = ?1",
            params![bet_id],
        )?;
        Ok(changes > 0)
    }

    /// Move a selection out of `pending`; false when already terminal.
    pub fn update_selection_status(
        &self,
        selection_id: &str,
        status: SelectionStatus,
    ) -> Result<bool> {
        let conn = self.conn.lock();
        let changes = conn.execute(
            "UPDATE bet_selections SET status = ?1 WHERE id = ?2 AND status = 'pending'",
            params![status.as_str(), selection_id],
        )?;
        Ok(changes > 0)
    }

    /// Remove a half-written bet and its selections. Only the placement
    /// compensation path calls this.
    pub fn delete_bet(&self, bet_id: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute("BEGIN IMMEDIATE", [])?;
        let res = conn
            .execute(
                "DELETE FROM bet_selections WHERE bet_id = ?1",
                params![bet_id],
            )
            .and_then(|_| conn.execute("DELETE FROM bets WHERE id = ?1", params![bet_id]));
        match res {
            Ok(_) => {
                conn.execute("COMMIT", [])?;
                Ok(())
            }
            Err(e) => {
                let _ = conn.execute("ROLLBACK", []);
                Err(anyhow::Error::from(e).context("delete bet"))
            }
        }
    }

    // ---- audit ----

    pub fn transactions_by_user(&self, user_id: i64) -> Result<Vec<Transaction>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, user_id, tx_type, amount_cents, balance_before_cents,
                    balance_after_cents, reference, created_at
             FROM transactions WHERE user_id = ?1 ORDER BY created_at",
        )?;
        let txs = stmt
            .query_map([user_id], row_to_transaction)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(txs)
    }

    /// Invariant audit: stored balance vs the sum of the transaction trail.
    pub fn balance_check(&self, user_id: i64) -> Result<(i64, i64)> {
        let conn = self.conn.lock();
        let stored: i64 = conn.query_row(
            "SELECT balance_cents FROM users WHERE id = ?1",
            [user_id],
            |row| row.get(0),
        )?;
        let tx_sum: i64 = conn.query_row(
            "SELECT COALESCE(SUM(amount_cents), 0) FROM transactions WHERE user_id = ?1",
            [user_id],
            |row| row.get(0),
        )?;
        Ok((stored, tx_sum))
    }

    /// Every account whose stored balance has drifted from its transaction
    /// trail. Empty on a healthy ledger.
    pub fn balance_drift(&self) -> Result<Vec<BalanceDrift>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT u.id, u.balance_cents, COALESCE(t.total, 0)
             FROM users u
             LEFT JOIN (SELECT user_id, SUM(amount_cents) AS total
                        FROM transactions GROUP BY user_id) t ON t.user_id = u.id
             WHERE u.balance_cents != COALESCE(t.total, 0)",
        )?;
        let drifts = stmt
            .query_map([], |row| {
                Ok(BalanceDrift {
                    user_id: row.get(0)?,
                    stored_balance_cents: row.get(1)?,
                    derived_balance_cents: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(drifts)
    }
}

/// One account failing the balance-vs-transactions audit.
#[derive(Debug, Clone)]
pub struct BalanceDrift {
    pub user_id: i64,
    pub stored_balance_cents: i64,
    pub derived_balance_cents: i64,
}

const SELECT_BET: &str = "SELECT id, user_id, bet_type, total_stake_cents, total_odds,
        potential_winnings_cents, status, actual_winnings_cents, placed_at, settled_at FROM bets";

const SELECT_SELECTION: &str =
    "SELECT id, bet_id, match_id, market_id, outcome_id, odds, status FROM bet_selections";

fn finish_tx<T>(conn: &Connection, result: Result<T, BetError>) -> Result<T, BetError> {
    match result {
        Ok(v) => {
            conn.execute("COMMIT", []).context("commit")?;
            Ok(v)
        }
        Err(e) => {
            let _ = conn.execute("ROLLBACK", []);
            Err(e)
        }
    }
}

fn ignore_not_found<T>(e: rusqlite::Error) -> Result<Option<T>, rusqlite::Error> {
    match e {
        rusqlite::Error::QueryReturnedNoRows => Ok(None),
        other => Err(other),
    }
}

fn insert_transaction(conn: &Connection, tx: &Transaction) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO transactions
         (id, user_id, tx_type, amount_cents, balance_before_cents, balance_after_cents, reference, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            &tx.id,
            tx.user_id,
            tx.tx_type.as_str(),
            tx.amount_cents,
            tx.balance_before_cents,
            tx.balance_after_cents,
            &tx.reference,
            tx.created_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

fn parse_rfc3339(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn row_to_user(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        balance_cents: row.get(2)?,
        is_active: row.get::<_, i64>(3)? == 1,
        created_at: parse_rfc3339(row.get::<_, String>(4)?),
        updated_at: parse_rfc3339(row.get::<_, String>(5)?),
    })
}

fn row_to_bet(row: &Row<'_>) -> rusqlite::Result<Bet> {
    let bet_type: String = row.get(2)?;
    let status: String = row.get(6)?;
    Ok(Bet {
        id: row.get(0)?,
        user_id: row.get(1)?,
        bet_type: BetType::from_str(&bet_type).unwrap_or(BetType::Single),
        total_stake_cents: row.get(3)?,
        total_odds: row.get(4)?,
        potential_winnings_cents: row.get(5)?,
        status: BetStatus::from_str(&status).unwrap_or(BetStatus::Pending),
        actual_winnings_cents: row.get(7)?,
        placed_at: parse_rfc3339(row.get::<_, String>(8)?),
        settled_at: row.get::<_, Option<String>>(9)?.map(parse_rfc3339),
    })
}

fn row_to_selection(row: &Row<'_>) -> rusqlite::Result<BetSelection> {
    let status: String = row.get(6)?;
    Ok(BetSelection {
        id: row.get(0)?,
        bet_id: row.get(1)?,
        match_id: row.get(2)?,
        market_id: row.get(3)?,
        outcome_id: row.get(4)?,
        odds: row.get(5)?,
        status: SelectionStatus::from_str(&status).unwrap_or(SelectionStatus::Pending),
    })
}

fn row_to_transaction(row: &Row<'_>) -> rusqlite::Result<Transaction> {
    let tx_type: String = row.get(2)?;
    Ok(Transaction {
        id: row.get(0)?,
        user_id: row.get(1)?,
        tx_type: TransactionType::from_str(&tx_type).unwrap_or(TransactionType::Adjustment),
        amount_cents: row.get(3)?,
        balance_before_cents: row.get(4)?,
        balance_after_cents: row.get(5)?,
        reference: row.get(6)?,
        created_at: parse_rfc3339(row.get::<_, String>(7)?),
    })
}
