// tests/api_http.rs
//
// HTTP-level tests for the public API Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.
//
// Covered:
// - GET /health
// - POST /api/products (lazy creation)
// - GET /api/products
// - POST /api/products/{name}/refresh (known and unknown names)

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value as Json};
use tokio::sync::watch;
use tower::ServiceExt as _; // for `oneshot`

use dealwatch::api::{self, AppState};
use dealwatch::config::UpdaterConfig;
use dealwatch::gemini::{FinishReason, Generated, TextGenClient};
use dealwatch::notify::{PriceDropNotifier, PushMessage, PushPool, PushTransport};
use dealwatch::prompt::PriceSearchLadder;
use dealwatch::store::{MemoryStore, ProductStore};
use dealwatch::updater::PriceUpdater;

const BODY_LIMIT: usize = 1024 * 1024;

/// Client that never finds anything; refresh outcomes become "skipped".
struct EmptyClient;

#[async_trait]
impl TextGenClient for EmptyClient {
    async fn generate(&self, _prompt: &str, _max_output_tokens: u32) -> Result<Generated> {
        Ok(Generated {
            text: String::new(),
            finish_reason: FinishReason::Other,
        })
    }
}

struct NullTransport;

#[async_trait]
impl PushTransport for NullTransport {
    async fn send(&self, _msg: &PushMessage) -> Result<()> {
        Ok(())
    }
}

struct TestApp {
    router: Router,
    store: Arc<MemoryStore>,
    // Held so the shutdown channel and push workers outlive the requests.
    _shutdown_tx: watch::Sender<bool>,
    _pool: PushPool,
}

/// Build the same Router the binary uses, on an empty in-memory store.
fn test_app() -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let pool = PushPool::new(Arc::new(NullTransport), 1, 4);
    let notifier = Arc::new(PriceDropNotifier::new(store.clone(), pool.handle()));
    let ladder = PriceSearchLadder::new(Arc::new(EmptyClient));
    let updater = Arc::new(PriceUpdater::new(
        store.clone(),
        ladder,
        notifier,
        UpdaterConfig {
            interval_secs: 3600,
            product_delay_ms: 10,
        },
    ));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let state = AppState {
        store: store.clone(),
        updater,
        shutdown: shutdown_rx,
    };
    TestApp {
        router: api::router(state),
        store,
        _shutdown_tx: shutdown_tx,
        _pool: pool,
    }
}

#[tokio::test]
async fn api_health_returns_200_and_ok_body() {
    let app = test_app();

    let req = Request::builder()
        .method("GET")
        .uri("/health")
        .body(Body::empty())
        .expect("build GET /health");

    let resp = app.router.oneshot(req).await.expect("oneshot /health");
    assert_eq!(resp.status(), StatusCode::OK, "health should be 200");

    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    let body = String::from_utf8(bytes).expect("utf8");
    assert_eq!(body.trim(), "OK", "health body should be 'OK'");
}

#[tokio::test]
async fn api_create_then_list_products() {
    let app = test_app();

    let payload = json!({ "name": "Kindle Paperwhite 2024" });
    let req = Request::builder()
        .method("POST")
        .uri("/api/products")
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .expect("build POST /api/products");

    let resp = app.router.clone().oneshot(req).await.expect("oneshot create");
    assert_eq!(resp.status(), StatusCode::CREATED);

    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read json")
        .to_vec();
    let created: Json = serde_json::from_slice(&bytes).expect("parse created product");
    assert_eq!(created["name"], "Kindle Paperwhite 2024");
    assert_eq!(created["price_state"], "unknown");
    assert!(created["current_price"].is_null());

    let req = Request::builder()
        .method("GET")
        .uri("/api/products")
        .body(Body::empty())
        .expect("build GET /api/products");
    let resp = app.router.oneshot(req).await.expect("oneshot list");
    assert!(resp.status().is_success());

    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read json")
        .to_vec();
    let listed: Json = serde_json::from_slice(&bytes).expect("parse product list");
    assert_eq!(listed.as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn api_create_rejects_blank_names() {
    let app = test_app();

    let req = Request::builder()
        .method("POST")
        .uri("/api/products")
        .header("content-type", "application/json")
        .body(Body::from(json!({ "name": "   " }).to_string()))
        .expect("build POST /api/products");

    let resp = app.router.oneshot(req).await.expect("oneshot create blank");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn api_refresh_unknown_product_is_404() {
    let app = test_app();

    let req = Request::builder()
        .method("POST")
        .uri("/api/products/nonexistent/refresh")
        .body(Body::empty())
        .expect("build POST refresh");

    let resp = app.router.oneshot(req).await.expect("oneshot refresh unknown");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn api_refresh_known_product_reports_outcome() {
    let app = test_app();
    app.store.find_or_create("Known Product").await.unwrap();

    let req = Request::builder()
        .method("POST")
        .uri("/api/products/Known%20Product/refresh")
        .body(Body::empty())
        .expect("build POST refresh");

    let resp = app.router.oneshot(req).await.expect("oneshot refresh known");
    assert!(resp.status().is_success());

    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read json")
        .to_vec();
    let v: Json = serde_json::from_slice(&bytes).expect("parse refresh json");
    // The stub client never finds a price, so the outcome is a skip.
    assert_eq!(v["outcome"], "skipped");
    assert_eq!(v["dropped"], false);
}
