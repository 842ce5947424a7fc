//! Bookcore Daemon
//!
//! Opens the ledger database, starts the exposure engine and an event log
//! subscriber, then runs until Ctrl-C. Bet placement and settlement are
//! driven through the library services; this binary is the operational
//! wrapper around them.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use dotenv::dotenv;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bookcore::events::{self, LedgerEvent};
use bookcore::exposure::{ExposureCache, ExposureEngine, ExposureEngineConfig};
use bookcore::ledger::LedgerDb;
use bookcore::models::Config;
use bookcore::{BetAcceptanceService, SettlementService};

#[derive(Parser, Debug)]
#[command(name = "bookcored")]
#[command(about = "Betting ledger and risk-exposure daemon")]
struct Args {
    /// Path to the SQLite ledger database
    #[arg(long, env = "DATABASE_PATH")]
    database: Option<String>,

    /// Seconds between exposure recomputes
    #[arg(long, env = "EXPOSURE_INTERVAL_SECS")]
    exposure_interval: Option<u64>,

    /// Liability limit in cents for threshold alerts
    #[arg(long, env = "EXPOSURE_ALERT_LIMIT_CENTS")]
    alert_limit: Option<i64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenv();
    init_tracing();

    let args = Args::parse();
    let mut config = Config::from_env().context("Failed to load configuration")?;
    if let Some(database) = args.database {
        config.database_path = database;
    }
    if let Some(secs) = args.exposure_interval {
        config.exposure_interval_secs = secs;
    }
    if let Some(limit) = args.alert_limit {
        config.exposure_alert_limit_cents = limit;
    }

    info!("🚀 Bookcore starting");
    info!("💾 Ledger database: {}", config.database_path);

    let db = Arc::new(LedgerDb::new(&config.database_path).context("Failed to open ledger")?);

    match db.balance_drift() {
        Ok(drifts) if drifts.is_empty() => {
            info!("✅ Ledger invariant verified: balances match transaction sums");
        }
        Ok(drifts) => {
            for m in &drifts {
                warn!(
                    user_id = m.user_id,
                    stored = m.stored_balance_cents,
                    derived = m.derived_balance_cents,
                    "⚠️ balance drift detected"
                );
            }
        }
        Err(e) => warn!(%e, "startup balance check failed"),
    }

    let (event_tx, event_rx) = events::channel();

    // Services are constructed here even though the daemon itself only
    // exercises the engine; an admin/API layer drives them in deployment.
    let _acceptance = BetAcceptanceService::new(db.clone(), event_tx.clone(), config.clone());
    let _settlement = SettlementService::new(db.clone(), event_tx.clone(), config.clone());

    let cache = Arc::new(ExposureCache::new());
    let engine_config = ExposureEngineConfig::from_config(&config);
    let alert_limit = engine_config.alert_limit_cents;
    let engine = Arc::new(ExposureEngine::new(
        db.clone(),
        cache.clone(),
        engine_config,
    ));
    let engine_handle = engine.clone().spawn();

    // Event log: every ledger event lands in the structured log stream
    let event_task = tokio::spawn(event_log_loop(event_rx));

    // Periodic threshold sweep against the cached snapshot
    let alert_engine = engine.clone();
    let alert_task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(30));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            for breach in alert_engine.check_thresholds(alert_limit) {
                warn!(
                    scope = ?breach.scope,
                    id = %breach.id,
                    exposure_cents = breach.exposure_cents,
                    limit_cents = breach.limit_cents,
                    "🚨 exposure over limit"
                );
            }
        }
    });

    info!("📈 Exposure engine running every {}s", config.exposure_interval_secs);

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("🛑 Shutdown signal received");

    alert_task.abort();
    event_task.abort();
    engine_handle.stop().await;
    info!("👋 Bookcore stopped");

    Ok(())
}

async fn event_log_loop(mut rx: tokio::sync::broadcast::Receiver<LedgerEvent>) {
    loop {
        match rx.recv().await {
            Ok(LedgerEvent::BetPlaced {
                bet_id, user_id, ..
            }) => {
                info!(%bet_id, user_id, "🎫 bet placed");
            }
            Ok(LedgerEvent::BetSettled {
                bet_id,
                user_id,
                status,
                ..
            }) => {
                info!(%bet_id, user_id, status = %status.as_str(), "🏁 bet settled");
            }
            Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "event subscriber lagged");
            }
            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bookcore=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
