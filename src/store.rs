// src/store.rs
//! Persistence collaborator seam. The pipeline only needs single-row
//! lookups and whole-row upserts, so the trait stays deliberately small;
//! a relational backend can slot in behind it without touching the core.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::model::{Product, Watcher};

#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn find_by_name(&self, name: &str) -> Result<Option<Product>>;
    /// Return the product named `name`, creating an unpriced row on first
    /// reference.
    async fn find_or_create(&self, name: &str) -> Result<Product>;
    async fn list_all(&self) -> Result<Vec<Product>>;
    /// Whole-row write, keyed by product id. Last writer wins.
    async fn upsert(&self, product: Product) -> Result<Product>;
    /// Users watching the given product. Empty is a normal outcome.
    async fn watchers_for(&self, product_id: u64) -> Result<Vec<Watcher>>;
}

/// In-process store backed by a `RwLock`ed map. Serves local runs and
/// tests; row writes are atomic by construction (the whole row swaps under
/// the write lock).
#[derive(Default)]
pub struct MemoryStore {
    products: RwLock<HashMap<u64, Product>>,
    watchers: RwLock<HashMap<u64, Vec<Watcher>>>,
    next_id: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            products: RwLock::new(HashMap::new()),
            watchers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register `watcher` on a product. Test/demo seeding helper.
    pub async fn add_watcher(&self, product_id: u64, watcher: Watcher) {
        self.watchers
            .write()
            .await
            .entry(product_id)
            .or_default()
            .push(watcher);
    }
}

#[async_trait]
impl ProductStore for MemoryStore {
    async fn find_by_name(&self, name: &str) -> Result<Option<Product>> {
        let guard = self.products.read().await;
        Ok(guard.values().find(|p| p.name == name).cloned())
    }

    async fn find_or_create(&self, name: &str) -> Result<Product> {
        let mut guard = self.products.write().await;
        if let Some(existing) = guard.values().find(|p| p.name == name) {
            return Ok(existing.clone());
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let product = Product::unpriced(id, name);
        guard.insert(id, product.clone());
        Ok(product)
    }

    async fn list_all(&self) -> Result<Vec<Product>> {
        let guard = self.products.read().await;
        let mut all: Vec<Product> = guard.values().cloned().collect();
        all.sort_by_key(|p| p.id);
        Ok(all)
    }

    async fn upsert(&self, product: Product) -> Result<Product> {
        let mut guard = self.products.write().await;
        guard.insert(product.id, product.clone());
        Ok(product)
    }

    async fn watchers_for(&self, product_id: u64) -> Result<Vec<Watcher>> {
        let guard = self.watchers.read().await;
        Ok(guard.get(&product_id).cloned().unwrap_or_default())
    }
}
