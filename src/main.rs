//! Dealwatch — Binary Entrypoint
//! Boots the Axum HTTP surface, the recurring price-update scheduler, and
//! the push worker pool, and wires them together over shared state.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use dealwatch::api::{self, AppState};
use dealwatch::config::AppConfig;
use dealwatch::gemini::GeminiClient;
use dealwatch::metrics::Metrics;
use dealwatch::notify::{FcmTransport, PriceDropNotifier, PushPool};
use dealwatch::prompt::PriceSearchLadder;
use dealwatch::scheduler::spawn_update_scheduler;
use dealwatch::store::MemoryStore;
use dealwatch::updater::PriceUpdater;

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("dealwatch=info,updater=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = AppConfig::load()?;
    let metrics = Metrics::init(cfg.updater.interval_secs);

    let client = Arc::new(GeminiClient::new(&cfg.gemini)?);
    let ladder = PriceSearchLadder::new(client);

    let store = Arc::new(MemoryStore::new());

    let transport = Arc::new(FcmTransport::new(&cfg.push)?);
    let pool = PushPool::new(transport, cfg.push.workers, cfg.push.queue_depth);
    let notifier = Arc::new(PriceDropNotifier::new(store.clone(), pool.handle()));

    let updater = Arc::new(PriceUpdater::new(
        store.clone(),
        ladder,
        notifier,
        cfg.updater.clone(),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = spawn_update_scheduler(
        cfg.updater.interval_secs,
        updater.clone(),
        shutdown_rx.clone(),
    );

    let state = AppState {
        store,
        updater,
        shutdown: shutdown_rx,
    };
    let app = api::router(state).merge(metrics.router());

    let listener = tokio::net::TcpListener::bind(&cfg.server.bind)
        .await
        .with_context(|| format!("bind {}", cfg.server.bind))?;
    info!(addr = %cfg.server.bind, "dealwatch listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("serve")?;

    // Stop the batch between products, then drain queued pushes.
    info!("shutdown signal received, draining");
    let _ = shutdown_tx.send(true);
    let _ = scheduler.await;
    pool.shutdown().await;

    Ok(())
}
