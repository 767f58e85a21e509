// src/metrics.rs
//! Prometheus recorder and the `/metrics` route.

use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

/// One-time registration so pipeline series show up on /metrics.
pub fn ensure_pipeline_metrics() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("pipeline_runs_total", "Completed pipeline runs.");
        describe_counter!(
            "pipeline_items_fetched_total",
            "Candidate items fetched across all sources."
        );
        describe_counter!(
            "pipeline_items_new_total",
            "Items inserted after deduplication."
        );
        describe_counter!(
            "pipeline_items_summarized_total",
            "Items enriched with a summary."
        );
        describe_counter!(
            "pipeline_source_errors_total",
            "Per-source fetch failures (including timeouts)."
        );
        describe_gauge!("pipeline_last_run_ts", "Unix ts of the last pipeline run.");
    });
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder. Call once, from `main`.
    pub fn init() -> Self {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .expect("prometheus: install recorder");
        ensure_pipeline_metrics();
        Self { handle }
    }

    /// A router exposing `/metrics` in Prometheus exposition format.
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
