// src/model.rs
//! Domain records shared across the pipeline: products, watchers, and the
//! ephemeral per-attempt result produced by the price search.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Explicit per-product price state.
///
/// `Unknown` until the first successful extraction; afterwards `Dropped`
/// exactly when the most recent observation was strictly below the
/// previously stored current price, `Stable` otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PriceState {
    #[default]
    Unknown,
    Stable,
    Dropped,
}

/// A tracked product row. Long-lived; mutated only by the updater.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: u64,
    /// Canonical product name, unique in the store.
    pub name: String,
    pub current_price: Option<f64>,
    /// Lowest price ever observed. Monotone non-increasing once set.
    pub last_lowest_price: Option<f64>,
    pub price_state: PriceState,
    /// Direct listing URL on the cheapest retailer, when one was found.
    pub deep_link: Option<String>,
    /// Last known retailer name.
    pub platform: Option<String>,
    pub image_url: Option<String>,
    pub desc: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Product {
    /// Fresh, unpriced row created when a name is first referenced.
    pub fn unpriced(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            current_price: None,
            last_lowest_price: None,
            price_state: PriceState::Unknown,
            deep_link: None,
            platform: None,
            image_url: None,
            desc: None,
            updated_at: None,
        }
    }
}

/// A user watching one or more products. Read-only from this crate's
/// perspective; rows come from the store collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Watcher {
    pub uid: String,
    pub name: String,
    pub email: String,
    /// Device push token; absent means the user cannot be notified.
    pub fcm_token: Option<String>,
}

/// Outcome of one ladder run. Never persisted; consumed immediately by the
/// updater. `success` is true iff a usable price was extracted.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PriceSearchResult {
    pub lowest_price: Option<f64>,
    pub platform: Option<String>,
    pub deep_link: Option<String>,
    pub success: bool,
}

impl PriceSearchResult {
    pub fn found(lowest_price: f64, platform: Option<String>, deep_link: Option<String>) -> Self {
        Self {
            lowest_price: Some(lowest_price),
            platform,
            deep_link,
            success: true,
        }
    }

    pub fn failed() -> Self {
        Self::default()
    }
}
