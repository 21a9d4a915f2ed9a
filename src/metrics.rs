use anyhow::{Context, Result};
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

pub const RECORDS_TOTAL: &str = "sentinel_records_total";
pub const DROPPED_TOTAL: &str = "sentinel_dropped_total";
pub const ALERTS_TOTAL: &str = "sentinel_alerts_total";
pub const DELIVERY_FAILURES_TOTAL: &str = "sentinel_delivery_failures_total";
pub const SOURCE_ERRORS_TOTAL: &str = "sentinel_source_errors_total";
pub const UNPARSEABLE_TIMESTAMPS_TOTAL: &str = "sentinel_unparseable_timestamps_total";
pub const CYCLE_LAST_RUN_TS: &str = "sentinel_cycle_last_run_ts";

/// One-time metrics registration (so series show up on /metrics).
pub fn describe_all() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(RECORDS_TOTAL, "Headline records fetched from sources.");
        describe_counter!(
            DROPPED_TOTAL,
            "Records not alerted, labelled by the filter that stopped them."
        );
        describe_counter!(ALERTS_TOTAL, "Alerts delivered to at least one channel.");
        describe_counter!(
            DELIVERY_FAILURES_TOTAL,
            "Alerts no notifier channel accepted."
        );
        describe_counter!(SOURCE_ERRORS_TOTAL, "Source fetch/parse errors.");
        describe_counter!(
            UNPARSEABLE_TIMESTAMPS_TOTAL,
            "Records whose timestamp could not be resolved."
        );
        describe_gauge!(CYCLE_LAST_RUN_TS, "Unix ts when the last monitor cycle finished.");
    });
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global Prometheus recorder. Fails if one is already installed.
    pub fn init() -> Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        describe_all();
        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
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
