//! Metrics module for invoicemgmt-service.
//! Provides Prometheus metrics for invoice transitions and retries.

use once_cell::sync::Lazy;
use prometheus::{
    histogram_opts, opts, register_histogram_vec, register_int_counter,
    register_int_counter_vec, Encoder, HistogramVec, IntCounter, IntCounterVec, TextEncoder,
};
use service_core::error::AppError;

/// Database query duration histogram
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        histogram_opts!(
            "invoicemgmt_db_query_duration_seconds",
            "Database query duration"
        ),
        &["operation"]
    )
    .expect("Failed to register DB_QUERY_DURATION")
});

/// Lifecycle transitions by outcome
pub static TRANSITIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        opts!(
            "invoicemgmt_transitions_total",
            "Invoice lifecycle transitions by outcome"
        ),
        &["transition", "outcome"]
    )
    .expect("Failed to register TRANSITIONS_TOTAL")
});

/// Transactional attempts of retried operations
pub static ATTEMPTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        opts!(
            "invoicemgmt_operation_attempts_total",
            "Transactional attempts of retried operations"
        ),
        &["operation"]
    )
    .expect("Failed to register ATTEMPTS_TOTAL")
});

/// Void requests whose local commit succeeded but bill item restoration did not
pub static RECONCILIATION_FAILURES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "invoicemgmt_reconciliation_failures_total",
        "Bill item restorations that failed after the invoice was voided"
    )
    .expect("Failed to register RECONCILIATION_FAILURES_TOTAL")
});

/// Error counter for alerting
pub static ERRORS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        opts!("invoicemgmt_errors_total", "Total errors by type for alerting"),
        &["error_type", "operation"]
    )
    .expect("Failed to register ERRORS_TOTAL")
});

/// Initialize all metrics. Call once at startup.
pub fn init_metrics() {
    let _ = &*DB_QUERY_DURATION;
    let _ = &*TRANSITIONS_TOTAL;
    let _ = &*ATTEMPTS_TOTAL;
    let _ = &*RECONCILIATION_FAILURES_TOTAL;
    let _ = &*ERRORS_TOTAL;
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Record the outcome of a lifecycle operation.
pub fn record_transition<T>(transition: &str, result: &Result<T, AppError>) {
    match result {
        Ok(_) => TRANSITIONS_TOTAL
            .with_label_values(&[transition, "success"])
            .inc(),
        Err(err) => {
            let kind = err.kind().as_str();
            TRANSITIONS_TOTAL.with_label_values(&[transition, kind]).inc();
            ERRORS_TOTAL.with_label_values(&[kind, transition]).inc();
            if matches!(err, AppError::ReconciliationFailed(_)) {
                RECONCILIATION_FAILURES_TOTAL.inc();
            }
        }
    }
}

/// Record one transactional attempt of a retried operation.
pub fn record_attempt(operation: &str) {
    ATTEMPTS_TOTAL.with_label_values(&[operation]).inc();
}
