// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for the ldapy operator.
//!
//! All metrics carry the namespace prefix `ldap_firestoned_io_` (prometheus-safe
//! version of "ldap.firestoned.io") and are served on `/metrics`.
//!
//! # Metrics Categories
//!
//! - **Reconciliation Metrics** - Outcomes and durations of reconciliation passes
//! - **Directory Metrics** - LDAP operations by type and result code
//! - **Membership Metrics** - Group membership additions and removals by convention
//! - **Error Metrics** - Error conditions by category
//!
//! # Example
//!
//! ```rust,no_run
//! use ldapy::metrics::record_reconciliation_success;
//!
//! record_reconciliation_success("LDAPUser", std::time::Duration::from_millis(120));
//! ```

use prometheus::{CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use std::sync::LazyLock;
use std::time::Duration;

/// Namespace prefix for all ldapy metrics (prometheus-safe)
const METRICS_NAMESPACE: &str = "ldap_firestoned_io";

/// Global Prometheus metrics registry
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// ============================================================================
// Reconciliation Metrics
// ============================================================================

/// Total number of reconciliations by resource type and status
///
/// Labels:
/// - `resource_type`: Kind of resource (`LDAPServer`, `LDAPUser`, `LDAPGroup`)
/// - `status`: Outcome (`success`, `error`)
pub static RECONCILIATION_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_reconciliations_total"),
        "Total number of reconciliations by resource type and status",
    );
    let counter = CounterVec::new(opts, &["resource_type", "status"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Duration of reconciliations in seconds
pub static RECONCILIATION_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_reconciliation_duration_seconds"),
        "Duration of reconciliations in seconds by resource type",
    )
    .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]);
    let histogram = HistogramVec::new(opts, &["resource_type"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .unwrap();
    histogram
});

// ============================================================================
// Directory Metrics
// ============================================================================

/// Total number of LDAP operations
///
/// Labels:
/// - `operation`: `search`, `add`, `modify`, `delete`
/// - `result_code`: LDAP result code, or `transport` when the server never answered
pub static DIRECTORY_OPERATIONS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_directory_operations_total"),
        "Total number of LDAP operations by operation and result code",
    );
    let counter = CounterVec::new(opts, &["operation", "result_code"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Latency of LDAP operations in seconds
pub static DIRECTORY_OPERATION_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_directory_operation_duration_seconds"),
        "Latency of LDAP operations in seconds by operation",
    )
    .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0]);
    let histogram = HistogramVec::new(opts, &["operation"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .unwrap();
    histogram
});

// ============================================================================
// Membership Metrics
// ============================================================================

/// Total number of group membership changes
///
/// Labels:
/// - `change`: `add` or `remove`
/// - `attribute`: convention that accepted the change, `none` when all failed
/// - `status`: `success` or `failure`
pub static MEMBERSHIP_CHANGES_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_membership_changes_total"),
        "Total number of group membership changes by convention and status",
    );
    let counter = CounterVec::new(opts, &["change", "attribute", "status"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Error Metrics
// ============================================================================

/// Total number of errors by resource type and error category
///
/// Labels:
/// - `resource_type`: Kind of resource
/// - `error_type`: Category of error (`connection`, `directory`, `status`, `api`)
pub static ERRORS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_errors_total"),
        "Total number of errors by resource type and error category",
    );
    let counter = CounterVec::new(opts, &["resource_type", "error_type"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Helper Functions
// ============================================================================

/// Record a successful reconciliation
pub fn record_reconciliation_success(resource_type: &str, duration: Duration) {
    RECONCILIATION_TOTAL
        .with_label_values(&[resource_type, "success"])
        .inc();
    RECONCILIATION_DURATION_SECONDS
        .with_label_values(&[resource_type])
        .observe(duration.as_secs_f64());
}

/// Record a failed reconciliation
pub fn record_reconciliation_error(resource_type: &str, duration: Duration) {
    RECONCILIATION_TOTAL
        .with_label_values(&[resource_type, "error"])
        .inc();
    RECONCILIATION_DURATION_SECONDS
        .with_label_values(&[resource_type])
        .observe(duration.as_secs_f64());
}

/// Record an LDAP operation.
///
/// `result_code` is `None` when the request failed before the server answered.
pub fn record_directory_operation(operation: &str, result_code: Option<u32>, duration: Duration) {
    let code = result_code.map_or_else(|| "transport".to_string(), |rc| rc.to_string());
    DIRECTORY_OPERATIONS_TOTAL
        .with_label_values(&[operation, code.as_str()])
        .inc();
    DIRECTORY_OPERATION_DURATION_SECONDS
        .with_label_values(&[operation])
        .observe(duration.as_secs_f64());
}

/// Record a group membership change attempt
pub fn record_membership_change(change: &str, attribute: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    MEMBERSHIP_CHANGES_TOTAL
        .with_label_values(&[change, attribute, status])
        .inc();
}

/// Record an error
pub fn record_error(resource_type: &str, error_type: &str) {
    ERRORS_TOTAL
        .with_label_values(&[resource_type, error_type])
        .inc();
}

/// Gather and encode all metrics in Prometheus text format
///
/// # Errors
/// Returns error if encoding fails
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(format!("UTF-8 error: {e}")))
}
