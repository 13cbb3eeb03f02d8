use axum::{routing::get, Router};
use metrics::gauge;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Initialize the Prometheus recorder and publish the configured update
    /// interval as a static gauge.
    pub fn init(update_interval_secs: u64) -> Self {
        // Default buckets; counters dominate here anyway.
        let builder = PrometheusBuilder::new();

        let handle = builder
            .install_recorder()
            .expect("prometheus: install recorder");

        gauge!("price_update_interval_secs").set(update_interval_secs as f64);

        Self { handle }
    }

    /// Returns a router exposing `/metrics` in the Prometheus exposition
    /// format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
