// tests/updater_flow.rs
//
// Orchestrator scenarios against the in-memory store, a scripted
// text-generation client and a recording push transport:
// - drop detection fires exactly one fan-out
// - higher price updates without notifying
// - ladder failure leaves the record byte-identical
// - one bad product never aborts the batch

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tokio::sync::watch;

use dealwatch::config::UpdaterConfig;
use dealwatch::gemini::{FinishReason, Generated, TextGenClient};
use dealwatch::model::{PriceState, Product, Watcher};
use dealwatch::notify::{PriceDropNotifier, PushMessage, PushPool, PushTransport};
use dealwatch::prompt::PriceSearchLadder;
use dealwatch::store::{MemoryStore, ProductStore};
use dealwatch::updater::{PriceUpdater, UpdateOutcome};

enum Step {
    Text(&'static str),
    Fail(&'static str),
}

struct ScriptedClient {
    script: Mutex<VecDeque<Step>>,
}

impl ScriptedClient {
    fn new(script: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
        })
    }
}

#[async_trait]
impl TextGenClient for ScriptedClient {
    async fn generate(&self, _prompt: &str, _max_output_tokens: u32) -> Result<Generated> {
        match self.script.lock().unwrap().pop_front() {
            Some(Step::Text(text)) => Ok(Generated {
                text: text.to_string(),
                finish_reason: FinishReason::Stop,
            }),
            Some(Step::Fail(msg)) => Err(anyhow!(msg)),
            None => Ok(Generated {
                text: String::new(),
                finish_reason: FinishReason::Other,
            }),
        }
    }
}

#[derive(Default)]
struct RecordingTransport {
    sent: Mutex<Vec<PushMessage>>,
}

#[async_trait]
impl PushTransport for RecordingTransport {
    async fn send(&self, msg: &PushMessage) -> Result<()> {
        self.sent.lock().unwrap().push(msg.clone());
        Ok(())
    }
}

struct Harness {
    store: Arc<MemoryStore>,
    updater: PriceUpdater,
    transport: Arc<RecordingTransport>,
    // Keeps the workers alive for the test's lifetime.
    _pool: PushPool,
}

fn harness(script: Vec<Step>) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let transport = Arc::new(RecordingTransport::default());
    let pool = PushPool::new(transport.clone(), 2, 16);
    let notifier = Arc::new(PriceDropNotifier::new(store.clone(), pool.handle()));
    let ladder = PriceSearchLadder::new(ScriptedClient::new(script));
    let updater = PriceUpdater::new(
        store.clone(),
        ladder,
        notifier,
        UpdaterConfig {
            interval_secs: 3600,
            product_delay_ms: 10,
        },
    );
    Harness {
        store,
        updater,
        transport,
        _pool: pool,
    }
}

async fn seed_product(
    store: &MemoryStore,
    name: &str,
    current: Option<f64>,
    lowest: Option<f64>,
) -> Product {
    let mut p = store.find_or_create(name).await.unwrap();
    p.current_price = current;
    p.last_lowest_price = lowest;
    p.price_state = if current.is_some() {
        PriceState::Stable
    } else {
        PriceState::Unknown
    };
    store.upsert(p).await.unwrap()
}

fn watcher(uid: &str, token: Option<&str>) -> Watcher {
    Watcher {
        uid: uid.to_string(),
        name: format!("user {uid}"),
        email: format!("{uid}@example.com"),
        fcm_token: token.map(str::to_string),
    }
}

/// Poll until `cond` holds or a second passes.
async fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..100 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met within 1s");
}

#[tokio::test]
async fn drop_updates_record_and_notifies_each_watching_token_once() {
    let h = harness(vec![Step::Text(
        "Lowest price ₹800 on Flipkart: https://www.flipkart.com/item/p/itm800",
    )]);
    let product = seed_product(&h.store, "X", Some(1000.0), Some(1000.0)).await;
    h.store.add_watcher(product.id, watcher("u1", Some("tok-u1"))).await;
    h.store.add_watcher(product.id, watcher("u2", None)).await;

    let outcome = h.updater.update_one(&product).await.unwrap();
    assert_eq!(outcome, UpdateOutcome::Updated { dropped: true });

    let stored = h.store.find_by_name("X").await.unwrap().unwrap();
    assert_eq!(stored.current_price, Some(800.0));
    assert_eq!(stored.last_lowest_price, Some(800.0));
    assert_eq!(stored.price_state, PriceState::Dropped);
    assert_eq!(stored.platform.as_deref(), Some("Flipkart"));
    assert!(stored.deep_link.as_deref().unwrap().contains("flipkart.com"));

    // Exactly one push: u2 has no token.
    wait_until(|| !h.transport.sent.lock().unwrap().is_empty()).await;
    let sent = h.transport.sent.lock().unwrap().clone();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].token, "tok-u1");
    assert_eq!(sent[0].title, "Price Dropped!");
    assert_eq!(sent[0].body, "Price of X has dropped to ₹800");
}

#[tokio::test]
async fn higher_price_updates_without_notification() {
    let h = harness(vec![Step::Text("now selling at ₹600 on Amazon")]);
    let product = seed_product(&h.store, "Y", Some(500.0), Some(500.0)).await;
    h.store.add_watcher(product.id, watcher("u1", Some("tok-u1"))).await;

    let outcome = h.updater.update_one(&product).await.unwrap();
    assert_eq!(outcome, UpdateOutcome::Updated { dropped: false });

    let stored = h.store.find_by_name("Y").await.unwrap().unwrap();
    assert_eq!(stored.current_price, Some(600.0));
    assert_eq!(stored.last_lowest_price, Some(500.0), "historic low must not move up");
    assert_eq!(stored.price_state, PriceState::Stable);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(h.transport.sent.lock().unwrap().is_empty(), "no drop, no push");
}

#[tokio::test]
async fn first_observation_sets_baseline_and_stays_quiet() {
    let h = harness(vec![Step::Text("₹2,499 on Ajio")]);
    let product = seed_product(&h.store, "Z", None, None).await;
    h.store.add_watcher(product.id, watcher("u1", Some("tok-u1"))).await;

    let outcome = h.updater.update_one(&product).await.unwrap();
    assert_eq!(outcome, UpdateOutcome::Updated { dropped: false });

    let stored = h.store.find_by_name("Z").await.unwrap().unwrap();
    assert_eq!(stored.current_price, Some(2499.0));
    assert_eq!(stored.last_lowest_price, Some(2499.0));
    assert_eq!(stored.price_state, PriceState::Stable);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(h.transport.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn failed_ladder_leaves_the_record_untouched() {
    // Every rung fails; nothing may be written.
    let h = harness(vec![
        Step::Fail("boom"),
        Step::Fail("boom"),
        Step::Fail("boom"),
        Step::Fail("boom"),
        Step::Fail("boom"),
    ]);
    let before = seed_product(&h.store, "W", Some(750.0), Some(700.0)).await;

    let outcome = h.updater.update_one(&before).await.unwrap();
    assert_eq!(outcome, UpdateOutcome::Skipped);

    let after = h.store.find_by_name("W").await.unwrap().unwrap();
    assert_eq!(after, before, "skip must not mutate any field");
}

#[tokio::test]
async fn deep_link_survives_a_result_without_one() {
    let h = harness(vec![Step::Text("price dropped to ₹450 on Amazon, no link handy")]);
    let mut product = seed_product(&h.store, "V", Some(500.0), Some(500.0)).await;
    product.deep_link = Some("https://www.amazon.in/dp/B0OLD".to_string());
    let product = h.store.upsert(product).await.unwrap();

    h.updater.update_one(&product).await.unwrap();

    let stored = h.store.find_by_name("V").await.unwrap().unwrap();
    assert_eq!(
        stored.deep_link.as_deref(),
        Some("https://www.amazon.in/dp/B0OLD"),
        "a known link must not be nulled out by an absent one"
    );
}

#[tokio::test]
async fn one_failing_product_does_not_abort_the_batch() {
    // Product order in the batch is id order: a, b, c. Product b's rungs
    // all fail with transport errors; a and c succeed on the first rung.
    let h = harness(vec![
        Step::Text("₹100 on Flipkart"),
        Step::Fail("connection reset"),
        Step::Fail("connection reset"),
        Step::Fail("connection reset"),
        Step::Fail("connection reset"),
        Step::Fail("connection reset"),
        Step::Text("₹300 on Amazon"),
    ]);
    let _a = seed_product(&h.store, "a", Some(150.0), Some(150.0)).await;
    let b = seed_product(&h.store, "b", Some(250.0), Some(250.0)).await;
    let _c = seed_product(&h.store, "c", Some(350.0), Some(350.0)).await;

    let (_tx, rx) = watch::channel(false);
    let report = h.updater.update_all(rx).await.unwrap();

    assert_eq!(report.attempted, 3);
    assert_eq!(report.updated, 2);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.failed, 0);

    assert_eq!(
        h.store.find_by_name("a").await.unwrap().unwrap().current_price,
        Some(100.0)
    );
    assert_eq!(
        h.store.find_by_name("b").await.unwrap().unwrap(),
        b,
        "the failing product's record must be unchanged"
    );
    assert_eq!(
        h.store.find_by_name("c").await.unwrap().unwrap().current_price,
        Some(300.0)
    );
}

#[tokio::test]
async fn shutdown_signal_stops_the_batch_between_products() {
    let h = harness(vec![Step::Text("₹100 on Flipkart"), Step::Text("₹200 on Amazon")]);
    seed_product(&h.store, "a", Some(150.0), Some(150.0)).await;
    seed_product(&h.store, "b", Some(250.0), Some(250.0)).await;

    let (tx, rx) = watch::channel(false);
    tx.send(true).unwrap();
    let report = h.updater.update_all(rx).await.unwrap();

    assert_eq!(report.attempted, 0, "no new product may start after shutdown");
}
