//! Fire-and-forget ledger events for external subscribers (admin feeds, UI
//! fan-out). Sends never block the write path; a send with no receivers is
//! not an error.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::models::BetStatus;

pub const EVENT_CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    BetPlaced {
        bet_id: String,
        user_id: i64,
        timestamp: DateTime<Utc>,
    },
    BetSettled {
        bet_id: String,
        user_id: i64,
        status: BetStatus,
        timestamp: DateTime<Utc>,
    },
}

pub type EventSender = broadcast::Sender<LedgerEvent>;

pub fn channel() -> (EventSender, broadcast::Receiver<LedgerEvent>) {
    broadcast::channel(EVENT_CHANNEL_CAPACITY)
}

/// Best-effort publish; dropped silently when nobody is listening.
pub fn emit(tx: &EventSender, event: LedgerEvent) {
    let _ = tx.send(event);
}
