// src/updater.rs
//! Price update orchestrator: runs the ladder per product, applies the
//! drop-detection rule, persists, and hands drops to the fan-out.
//!
//! The drop rule and state transitions live in `decide_price_change`, a
//! pure function mirrored one-to-one by the product state machine:
//! Unknown → Stable on first observation, Stable ⇄ Dropped on subsequent
//! ones, no transition at all on a failed ladder run.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use metrics::counter;
use tokio::sync::watch;
use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};

use crate::config::UpdaterConfig;
use crate::model::{PriceState, Product};
use crate::notify::PriceDropNotifier;
use crate::prompt::PriceSearchLadder;
use crate::store::ProductStore;

/// What `update_one` did for a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// New observation persisted. `dropped` is true when the fan-out fired.
    Updated { dropped: bool },
    /// Ladder found nothing usable; the stored record was left untouched.
    Skipped,
}

/// Batch counters returned by `update_all` (and logged at completion).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct BatchReport {
    pub attempted: usize,
    pub updated: usize,
    pub dropped: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Resolution of one successful observation against the stored record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceDecision {
    pub last_lowest_price: Option<f64>,
    pub state: PriceState,
    pub dropped: bool,
}

/// Apply the drop rule: a drop is a new price strictly below the
/// immediately preceding current price. The first observation only sets
/// the baseline. The lowest-ever price never moves upward.
pub fn decide_price_change(
    old_price: Option<f64>,
    old_lowest: Option<f64>,
    observed: f64,
) -> PriceDecision {
    match old_price {
        None => PriceDecision {
            last_lowest_price: Some(observed),
            state: PriceState::Stable,
            dropped: false,
        },
        Some(old) => {
            let dropped = observed < old;
            let last_lowest_price = if dropped {
                match old_lowest {
                    Some(lowest) if observed >= lowest => Some(lowest),
                    _ => Some(observed),
                }
            } else {
                old_lowest
            };
            PriceDecision {
                last_lowest_price,
                state: if dropped {
                    PriceState::Dropped
                } else {
                    PriceState::Stable
                },
                dropped,
            }
        }
    }
}

pub struct PriceUpdater {
    store: Arc<dyn ProductStore>,
    ladder: PriceSearchLadder,
    notifier: Arc<PriceDropNotifier>,
    cfg: UpdaterConfig,
}

impl PriceUpdater {
    pub fn new(
        store: Arc<dyn ProductStore>,
        ladder: PriceSearchLadder,
        notifier: Arc<PriceDropNotifier>,
        cfg: UpdaterConfig,
    ) -> Self {
        Self {
            store,
            ladder,
            notifier,
            cfg,
        }
    }

    /// Update a single product. A failed ladder run leaves the stored
    /// record completely unchanged — last-known-good beats a blank.
    pub async fn update_one(&self, product: &Product) -> Result<UpdateOutcome> {
        let result = self.ladder.search(&product.name).await;

        let Some(observed) = result.lowest_price.filter(|_| result.success) else {
            warn!(target: "updater", product = %product.name, "no usable price this cycle");
            counter!("price_update_skipped_total").increment(1);
            return Ok(UpdateOutcome::Skipped);
        };

        let decision =
            decide_price_change(product.current_price, product.last_lowest_price, observed);

        let mut updated = product.clone();
        updated.current_price = Some(observed);
        updated.last_lowest_price = decision.last_lowest_price;
        updated.price_state = decision.state;
        updated.platform = result.platform;
        // Keep a previously known link rather than nulling it out.
        if result.deep_link.is_some() {
            updated.deep_link = result.deep_link;
        }
        updated.updated_at = Some(Utc::now());

        let saved = self
            .store
            .upsert(updated)
            .await
            .with_context(|| format!("persist product {}", product.name))?;

        counter!("price_update_updated_total").increment(1);
        info!(
            target: "updater",
            product = %saved.name,
            price = observed,
            platform = saved.platform.as_deref().unwrap_or("-"),
            dropped = decision.dropped,
            "price updated"
        );

        if decision.dropped {
            counter!("price_update_drops_total").increment(1);
            // Detached: watcher resolution and dispatch never hold up the
            // batch loop.
            let notifier = Arc::clone(&self.notifier);
            let (id, name) = (saved.id, saved.name.clone());
            tokio::spawn(async move {
                notifier.notify_price_drop(id, &name, observed).await;
            });
        }

        Ok(UpdateOutcome::Updated {
            dropped: decision.dropped,
        })
    }

    /// Admin entry point: update one product addressed by name.
    /// `Ok(None)` means the name is unknown.
    pub async fn update_one_by_name(&self, name: &str) -> Result<Option<UpdateOutcome>> {
        match self.store.find_by_name(name).await? {
            Some(product) => Ok(Some(self.update_one(&product).await?)),
            None => Ok(None),
        }
    }

    /// One serialized pass over the catalog. Each product is isolated: a
    /// failure is logged and the loop moves on. Only an unreachable store
    /// aborts the batch. The inter-product delay is interruptible; a
    /// shutdown signal stops before the next product, never mid-write.
    pub async fn update_all(&self, mut shutdown: watch::Receiver<bool>) -> Result<BatchReport> {
        let products = self.store.list_all().await.context("list product catalog")?;
        let total = products.len();
        info!(target: "updater", total, "starting catalog price update");

        let mut report = BatchReport::default();
        for (i, product) in products.iter().enumerate() {
            if *shutdown.borrow() {
                info!(target: "updater", done = i, total, "shutdown requested, stopping batch");
                break;
            }

            report.attempted += 1;
            match self.update_one(product).await {
                Ok(UpdateOutcome::Updated { dropped }) => {
                    report.updated += 1;
                    if dropped {
                        report.dropped += 1;
                    }
                }
                Ok(UpdateOutcome::Skipped) => report.skipped += 1,
                Err(e) => {
                    report.failed += 1;
                    counter!("price_update_failed_total").increment(1);
                    error!(target: "updater", product = %product.name, "update failed: {e:#}");
                }
            }

            if i + 1 < total {
                tokio::select! {
                    _ = sleep(Duration::from_millis(self.cfg.product_delay_ms)) => {}
                    _ = shutdown.changed() => {}
                }
            }
        }

        info!(
            target: "updater",
            updated = report.updated,
            dropped = report.dropped,
            skipped = report.skipped,
            failed = report.failed,
            "catalog update complete"
        );
        Ok(report)
    }
}
