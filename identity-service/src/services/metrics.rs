//! Metrics collection for identity-service.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::future::Future;
use std::sync::OnceLock;
use std::time::Instant;

use super::connectors::ConnectorError;
use crate::models::Source;

pub static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder. Called once from `main`.
pub fn init_metrics() {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    if METRICS_HANDLE.set(handle).is_err() {
        panic!("failed to set metrics handle: already initialized");
    }
}

/// Get metrics output in Prometheus text format.
pub fn get_metrics() -> String {
    METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized\n".to_string())
}

/// Record one connector call.
pub fn record_connector_call(source: Source, operation: &'static str, status: &str, seconds: f64) {
    let labels = [
        ("source", source.as_str().to_string()),
        ("operation", operation.to_string()),
        ("status", status.to_string()),
    ];
    counter!("identity_connector_calls_total", &labels).increment(1);

    let duration_labels = [
        ("source", source.as_str().to_string()),
        ("operation", operation.to_string()),
    ];
    histogram!("identity_connector_call_duration_seconds", &duration_labels).record(seconds);
}

/// Time a connector call and record its outcome.
pub async fn observe<T, F>(source: Source, operation: &'static str, call: F) -> Result<T, ConnectorError>
where
    F: Future<Output = Result<T, ConnectorError>>,
{
    let start = Instant::now();
    let result = call.await;
    let status = match &result {
        Ok(_) => "ok",
        Err(e) => e.kind(),
    };
    record_connector_call(source, operation, status, start.elapsed().as_secs_f64());
    result
}
