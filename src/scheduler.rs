// src/scheduler.rs
use std::sync::Arc;

use metrics::{counter, gauge};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::updater::PriceUpdater;

/// Spawn the recurring catalog update. The first tick fires immediately
/// (tokio interval semantics), then every `interval_secs`. The task exits
/// promptly when the shutdown channel flips; an in-flight batch observes
/// the same channel and stops between products.
pub fn spawn_update_scheduler(
    interval_secs: u64,
    updater: Arc<PriceUpdater>,
    shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
        let mut shutdown_rx = shutdown.clone();
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!(target: "updater", "scheduler shutting down");
                        break;
                    }
                    continue;
                }
            }

            let now = chrono::Utc::now().timestamp().max(0) as u64;
            match updater.update_all(shutdown.clone()).await {
                Ok(report) => {
                    counter!("price_update_runs_total").increment(1);
                    gauge!("price_update_last_run_ts").set(now as f64);
                    info!(
                        target: "updater",
                        attempted = report.attempted,
                        updated = report.updated,
                        dropped = report.dropped,
                        failed = report.failed,
                        "scheduled update tick"
                    );
                }
                Err(e) => {
                    counter!("price_update_run_errors_total").increment(1);
                    error!(target: "updater", "scheduled update aborted: {e:#}");
                }
            }

            if *shutdown.borrow() {
                break;
            }
        }
    })
}
