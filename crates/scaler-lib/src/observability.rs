//! Observability infrastructure for the workload scaler
//!
//! Provides:
//! - Prometheus metrics (query latency, query errors, last observed pod count)
//! - Structured JSON logging with tracing

use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge_vec,
    Histogram, IntCounter, IntCounterVec, IntGaugeVec,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for cluster query latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<ScalerMetricsInner> = OnceLock::new();

struct ScalerMetricsInner {
    query_latency_seconds: Histogram,
    query_errors: IntCounterVec,
    active_pods: IntGaugeVec,
    polls: IntCounter,
}

impl ScalerMetricsInner {
    fn new() -> Self {
        Self {
            query_latency_seconds: register_histogram!(
                "workload_scaler_query_latency_seconds",
                "Time spent listing pods from the cluster",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register query_latency_seconds"),

            query_errors: register_int_counter_vec!(
                "workload_scaler_query_errors_total",
                "Total number of failed pod listing queries",
                &["kind"]
            )
            .expect("Failed to register query_errors"),

            active_pods: register_int_gauge_vec!(
                "workload_scaler_active_pods",
                "Non-terminal pods matching the selector at the last poll",
                &["namespace", "scaler_index"]
            )
            .expect("Failed to register active_pods"),

            polls: register_int_counter!(
                "workload_scaler_polls_total",
                "Total number of pod counting polls"
            )
            .expect("Failed to register polls"),
        }
    }
}

/// Scaler metrics for Prometheus exposition
///
/// Lightweight handle to the global metrics instance; clones share it.
#[derive(Clone)]
pub struct ScalerMetrics {
    _private: (),
}

impl Default for ScalerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ScalerMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(ScalerMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &ScalerMetricsInner {
        GLOBAL_METRICS.get_or_init(ScalerMetricsInner::new)
    }

    pub fn observe_query_latency(&self, duration_secs: f64) {
        self.inner().query_latency_seconds.observe(duration_secs);
    }

    /// Count a failed query; `kind` is `cluster`, `cancelled` or `deadline`
    pub fn inc_query_errors(&self, kind: &str) {
        self.inner().query_errors.with_label_values(&[kind]).inc();
    }

    pub fn set_active_pods(&self, namespace: &str, scaler_index: usize, count: i64) {
        self.inner()
            .active_pods
            .with_label_values(&[namespace, &scaler_index.to_string()])
            .set(count);
    }

    pub fn inc_polls(&self) {
        self.inner().polls.inc();
    }
}

/// Structured logger for scaler lifecycle events
#[derive(Clone)]
pub struct StructuredLogger {
    scaler: String,
}

impl StructuredLogger {
    /// `scaler` identifies the trigger in every event, usually its metric name
    pub fn new(scaler: impl Into<String>) -> Self {
        Self {
            scaler: scaler.into(),
        }
    }

    pub fn log_startup(&self, version: &str, namespace: &str, selector: &str, target: i64) {
        info!(
            event = "scaler_started",
            scaler = %self.scaler,
            version = %version,
            namespace = %namespace,
            selector = %selector,
            target_value = target,
            "Workload scaler started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "scaler_shutdown",
            scaler = %self.scaler,
            reason = %reason,
            "Workload scaler shutting down"
        );
    }

    pub fn log_activation(&self, active: bool) {
        info!(
            event = "activation_changed",
            scaler = %self.scaler,
            active = active,
            "Workload activation changed"
        );
    }

    pub fn log_query_failure(&self, operation: &str, error: &str) {
        warn!(
            event = "query_failed",
            scaler = %self.scaler,
            operation = %operation,
            error = %error,
            "Cluster query failed, metric temporarily unavailable"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scaler_metrics_creation() {
        let metrics = ScalerMetrics::new();

        metrics.observe_query_latency(0.01);
        metrics.inc_query_errors("cluster");
        metrics.set_active_pods("default", 0, 4);
        metrics.inc_polls();

        let families = prometheus::gather();
        assert!(families
            .iter()
            .any(|f| f.get_name() == "workload_scaler_active_pods"));
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("0-workload-default");
        assert_eq!(logger.scaler, "0-workload-default");
    }
}
