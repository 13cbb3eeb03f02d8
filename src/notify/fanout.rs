// src/notify/fanout.rs
//! Price-drop fan-out: resolve the watcher list and queue one push per
//! valid device token. Best-effort end to end — nothing here ever fails
//! the price update that triggered it.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::{PushHandle, PushMessage};
use crate::store::ProductStore;

pub struct PriceDropNotifier {
    store: Arc<dyn ProductStore>,
    push: PushHandle,
}

impl PriceDropNotifier {
    pub fn new(store: Arc<dyn ProductStore>, push: PushHandle) -> Self {
        Self { store, push }
    }

    /// Notify every watcher of `product_id` that the price dropped to
    /// `new_price`. Watchers without a token are skipped silently; an empty
    /// watcher list is a logged no-op.
    pub async fn notify_price_drop(&self, product_id: u64, product_name: &str, new_price: f64) {
        let watchers = match self.store.watchers_for(product_id).await {
            Ok(w) => w,
            Err(e) => {
                warn!(product = product_name, error = %e, "could not resolve watchers");
                return;
            }
        };

        if watchers.is_empty() {
            debug!(product = product_name, "price dropped but nobody is watching");
            return;
        }

        let mut queued = 0usize;
        for watcher in &watchers {
            let Some(token) = watcher.fcm_token.as_deref().filter(|t| !t.is_empty()) else {
                continue;
            };
            self.push.submit(PushMessage {
                token: token.to_string(),
                title: "Price Dropped!".to_string(),
                body: format!(
                    "Price of {product_name} has dropped to ₹{}",
                    format_price(new_price)
                ),
            });
            queued += 1;
        }

        info!(
            product = product_name,
            watchers = watchers.len(),
            queued,
            "price drop fan-out"
        );
    }
}

/// Whole rupees without a decimal tail, paise with two digits.
fn format_price(price: f64) -> String {
    if price.fract() == 0.0 {
        format!("{price:.0}")
    } else {
        format!("{price:.2}")
    }
}
