use chrono::Duration;
use fixit_engine::{events::EventProducers, market_api::GatewayConfig, LedgerApi, SqliteDatabase};
use log::*;
use tokio::task::JoinHandle;

/// Starts the cleanup worker, which deletes pending top-ups and job payments that were never paid. Do not await the
/// returned JoinHandle, as it will run indefinitely.
pub fn start_cleanup_worker(
    db: SqliteDatabase,
    producers: EventProducers,
    gateway: GatewayConfig,
    max_age: Duration,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let period = interval.to_std().unwrap_or(std::time::Duration::from_secs(3600));
        let mut timer = tokio::time::interval(period);
        let api = LedgerApi::new(db, gateway, producers);
        info!("🕰️ Pending transaction cleanup worker started. Runs every {} minutes", interval.num_minutes());
        loop {
            timer.tick().await;
            debug!("🕰️ Running pending transaction cleanup job");
            match api.cleanup_expired_transactions(max_age.num_hours()).await {
                Ok(result) if result.total() > 0 => {
                    info!(
                        "🕰️ Removed {} expired top-ups and {} expired job payments",
                        result.transactions, result.paid_transactions
                    );
                },
                Ok(_) => trace!("🕰️ No expired transactions to remove"),
                Err(e) => {
                    error!("🕰️ Error running pending transaction cleanup job: {e}");
                },
            }
        }
    })
}
