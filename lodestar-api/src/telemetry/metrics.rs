//! Prometheus Metrics Definitions
//!
//! Defines all Lodestar metrics with appropriate labels and types.
//! Exposes a /metrics endpoint for Prometheus scraping.

use axum::{http::StatusCode, response::IntoResponse};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};

use crate::error::{ApiError, ApiResult};

/// HTTP request latency buckets (seconds)
/// Covers: 1ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 2.5s, 5s, 10s, 30s
const HTTP_LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0, 10.0, 30.0,
];

/// Global metrics instance - initialized once at startup
pub static METRICS: Lazy<ApiResult<LodestarMetrics>> = Lazy::new(LodestarMetrics::new);

/// Container for all Lodestar metrics.
#[derive(Clone)]
pub struct LodestarMetrics {
    /// HTTP request counter - labels: method, path, status
    pub http_requests_total: CounterVec,

    /// HTTP request duration histogram - labels: method, path
    pub http_request_duration_seconds: HistogramVec,

    /// Reconciliation outcomes - labels: outcome (noop/applied/failed)
    pub reconciliations_total: CounterVec,

    /// Artifact mutations - labels: change (created/updated/deleted)
    pub artifact_changes_total: CounterVec,

    /// Snapshot writes - labels: strategy (file/commit), status
    pub snapshot_writes_total: CounterVec,

    /// Refresh results per engagement - labels: status (loaded/empty/failed/skipped)
    pub refresh_engagements_total: CounterVec,

    /// Retried upstream calls - labels: operation
    pub remote_retries_total: CounterVec,
}

fn registration_error(name: &str, e: prometheus::Error) -> ApiError {
    ApiError::internal_error(format!("Failed to register {}: {}", name, e))
}

impl LodestarMetrics {
    /// Create and register all metrics with Prometheus.
    pub fn new() -> ApiResult<Self> {
        Ok(Self {
            http_requests_total: register_counter_vec!(
                "lodestar_http_requests_total",
                "Total number of HTTP requests",
                &["method", "path", "status"]
            )
            .map_err(|e| registration_error("http_requests_total", e))?,

            http_request_duration_seconds: register_histogram_vec!(
                "lodestar_http_request_duration_seconds",
                "HTTP request duration in seconds",
                &["method", "path"],
                HTTP_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| registration_error("http_request_duration_seconds", e))?,

            reconciliations_total: register_counter_vec!(
                "lodestar_reconciliations_total",
                "Engagement reconciliations by outcome",
                &["outcome"]
            )
            .map_err(|e| registration_error("reconciliations_total", e))?,

            artifact_changes_total: register_counter_vec!(
                "lodestar_artifact_changes_total",
                "Artifacts created, updated or deleted by reconciliation",
                &["change"]
            )
            .map_err(|e| registration_error("artifact_changes_total", e))?,

            snapshot_writes_total: register_counter_vec!(
                "lodestar_snapshot_writes_total",
                "Snapshot writes to the repository",
                &["strategy", "status"]
            )
            .map_err(|e| registration_error("snapshot_writes_total", e))?,

            refresh_engagements_total: register_counter_vec!(
                "lodestar_refresh_engagements_total",
                "Engagements processed by refresh",
                &["status"]
            )
            .map_err(|e| registration_error("refresh_engagements_total", e))?,

            remote_retries_total: register_counter_vec!(
                "lodestar_remote_retries_total",
                "Upstream calls retried after a transient failure",
                &["operation"]
            )
            .map_err(|e| registration_error("remote_retries_total", e))?,
        })
    }

    /// Record an HTTP request.
    pub fn record_http_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        let status_str = status.to_string();
        self.http_requests_total
            .with_label_values(&[method, path, &status_str])
            .inc();
        self.http_request_duration_seconds
            .with_label_values(&[method, path])
            .observe(duration_secs);
    }

    pub fn record_reconciliation(&self, outcome: &str, created: usize, updated: usize, deleted: usize) {
        self.reconciliations_total.with_label_values(&[outcome]).inc();
        for (change, count) in [("created", created), ("updated", updated), ("deleted", deleted)] {
            if count > 0 {
                self.artifact_changes_total
                    .with_label_values(&[change])
                    .inc_by(count as f64);
            }
        }
    }

    pub fn record_snapshot_write(&self, strategy: &str, success: bool) {
        let status = if success { "success" } else { "failure" };
        self.snapshot_writes_total
            .with_label_values(&[strategy, status])
            .inc();
    }

    pub fn record_refresh_engagement(&self, status: &str) {
        self.refresh_engagements_total
            .with_label_values(&[status])
            .inc();
    }

    pub fn record_remote_retry(&self, operation: &str) {
        self.remote_retries_total
            .with_label_values(&[operation])
            .inc();
    }
}

/// Run `f` against the global metrics if they registered.
pub fn with_metrics(f: impl FnOnce(&LodestarMetrics)) {
    if let Ok(metrics) = METRICS.as_ref() {
        f(metrics);
    }
}

/// Handler for GET /metrics endpoint.
///
/// Returns Prometheus text format metrics.
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/metrics",
    tag = "Observability",
    responses(
        (status = 200, description = "Prometheus metrics in text format", content_type = "text/plain"),
        (status = 500, description = "Failed to encode metrics"),
    ),
))]
pub async fn metrics_handler() -> impl IntoResponse {
    // Make sure our collectors are registered before the first scrape.
    Lazy::force(&METRICS);

    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                format!("Failed to encode metrics: {}", e).into_bytes(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::core::Collector;

    #[test]
    fn test_metrics_creation() -> Result<(), String> {
        let metrics = METRICS
            .as_ref()
            .map_err(|e| format!("Metrics init failed: {}", e.message))?;
        assert!(!metrics.http_requests_total.desc().is_empty());
        Ok(())
    }

    #[test]
    fn test_record_reconciliation() -> Result<(), String> {
        let metrics = METRICS
            .as_ref()
            .map_err(|e| format!("Metrics init failed: {}", e.message))?;
        metrics.record_reconciliation("applied", 1, 2, 0);
        assert!(
            metrics
                .artifact_changes_total
                .with_label_values(&["updated"])
                .get()
                >= 2.0
        );
        Ok(())
    }

    #[test]
    fn test_record_snapshot_and_refresh() -> Result<(), String> {
        let metrics = METRICS
            .as_ref()
            .map_err(|e| format!("Metrics init failed: {}", e.message))?;
        metrics.record_snapshot_write("commit", true);
        metrics.record_refresh_engagement("empty");
        metrics.record_remote_retry("get_file");
        Ok(())
    }
}
