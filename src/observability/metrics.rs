//! # Metrics
//!
//! Prometheus metrics for monitoring the controller.
//!
//! ## Metrics Exposed
//!
//! - `bucket_controller_reconciliations_total` - Total number of reconciliations
//! - `bucket_controller_reconciliation_errors_total` - Total number of reconciliation errors
//! - `bucket_controller_reconciliation_duration_seconds` - Duration of reconciliation operations
//! - `bucket_controller_requeues_total` - Requeues by reason (resync, session-expired, error-backoff)
//! - `bucket_controller_provider_operations_total` - Storage API calls by provider and operation
//! - `bucket_controller_provider_operation_duration_seconds` - Duration of storage API calls
//! - `bucket_controller_provider_operation_errors_total` - Failed storage API calls
//! - `bucket_controller_objects_purged_total` - Objects and versions deleted while emptying buckets
//! - `bucket_controller_client_cache_misses_total` - Provider client builds
//! - `bucket_controller_vault_logins_total` - Successful Vault logins
//! - `bucket_controller_vault_login_errors_total` - Failed Vault logins
//! - `bucket_controller_vault_login_duration_seconds` - Duration of Vault logins
//! - `bucket_controller_vault_session_expirations_total` - Expired Vault sessions evicted from cache

use anyhow::Result;
use prometheus::{Histogram, HistogramVec, IntCounter, IntCounterVec, Registry};
use std::sync::LazyLock;

// Metrics
pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "bucket_controller_reconciliations_total",
        "Total number of reconciliations",
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "bucket_controller_reconciliation_errors_total",
        "Total number of reconciliation errors",
    )
    .expect("Failed to create RECONCILIATION_ERRORS_TOTAL metric - this should never happen")
});

static RECONCILIATION_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "bucket_controller_reconciliation_duration_seconds",
            "Duration of reconciliation in seconds",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]),
    )
    .expect("Failed to create RECONCILIATION_DURATION metric - this should never happen")
});

static REQUEUES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "bucket_controller_requeues_total",
            "Total number of requeues by reason",
        ),
        &["reason"],
    )
    .expect("Failed to create REQUEUES_TOTAL metric - this should never happen")
});

static PROVIDER_OPERATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "bucket_controller_provider_operations_total",
            "Total number of storage provider operations by provider and operation",
        ),
        &["provider", "operation"],
    )
    .expect("Failed to create PROVIDER_OPERATIONS_TOTAL metric - this should never happen")
});

static PROVIDER_OPERATION_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        prometheus::HistogramOpts::new(
            "bucket_controller_provider_operation_duration_seconds",
            "Duration of storage provider operations in seconds",
        )
        .buckets(vec![0.05, 0.1, 0.5, 1.0, 2.0, 5.0]),
        &["provider", "operation"],
    )
    .expect("Failed to create PROVIDER_OPERATION_DURATION metric - this should never happen")
});

static PROVIDER_OPERATION_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "bucket_controller_provider_operation_errors_total",
            "Total number of failed storage provider operations",
        ),
        &["provider", "operation"],
    )
    .expect("Failed to create PROVIDER_OPERATION_ERRORS_TOTAL metric - this should never happen")
});

static OBJECTS_PURGED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "bucket_controller_objects_purged_total",
        "Total number of object versions deleted while emptying buckets",
    )
    .expect("Failed to create OBJECTS_PURGED_TOTAL metric - this should never happen")
});

static CLIENT_CACHE_MISSES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "bucket_controller_client_cache_misses_total",
            "Total number of provider clients built, by credential source",
        ),
        &["source"],
    )
    .expect("Failed to create CLIENT_CACHE_MISSES_TOTAL metric - this should never happen")
});

static VAULT_LOGINS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "bucket_controller_vault_logins_total",
        "Total number of successful Vault logins",
    )
    .expect("Failed to create VAULT_LOGINS_TOTAL metric - this should never happen")
});

static VAULT_LOGIN_ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "bucket_controller_vault_login_errors_total",
        "Total number of failed Vault logins",
    )
    .expect("Failed to create VAULT_LOGIN_ERRORS_TOTAL metric - this should never happen")
});

static VAULT_LOGIN_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "bucket_controller_vault_login_duration_seconds",
            "Duration of Vault logins in seconds",
        )
        .buckets(vec![0.05, 0.1, 0.5, 1.0, 2.0, 5.0]),
    )
    .expect("Failed to create VAULT_LOGIN_DURATION metric - this should never happen")
});

static VAULT_SESSION_EXPIRATIONS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "bucket_controller_vault_session_expirations_total",
        "Total number of expired Vault sessions evicted from the cache",
    )
    .expect("Failed to create VAULT_SESSION_EXPIRATIONS_TOTAL metric - this should never happen")
});

pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(REQUEUES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(PROVIDER_OPERATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(PROVIDER_OPERATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(PROVIDER_OPERATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(OBJECTS_PURGED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(CLIENT_CACHE_MISSES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(VAULT_LOGINS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(VAULT_LOGIN_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(VAULT_LOGIN_DURATION.clone()))?;
    REGISTRY.register(Box::new(VAULT_SESSION_EXPIRATIONS_TOTAL.clone()))?;

    Ok(())
}

pub fn increment_reconciliations() {
    RECONCILIATIONS_TOTAL.inc();
}

pub fn increment_reconciliation_errors() {
    RECONCILIATION_ERRORS_TOTAL.inc();
}

pub fn observe_reconciliation_duration(duration: f64) {
    RECONCILIATION_DURATION.observe(duration);
}

pub fn increment_requeues_total(reason: &str) {
    REQUEUES_TOTAL.with_label_values(&[reason]).inc();
}

/// Record a successful storage provider operation
pub fn record_provider_operation(provider: &str, operation: &str, duration: f64) {
    PROVIDER_OPERATIONS_TOTAL
        .with_label_values(&[provider, operation])
        .inc();
    PROVIDER_OPERATION_DURATION
        .with_label_values(&[provider, operation])
        .observe(duration);
}

pub fn increment_provider_operation_errors(provider: &str, operation: &str) {
    PROVIDER_OPERATION_ERRORS_TOTAL
        .with_label_values(&[provider, operation])
        .inc();
}

pub fn increment_objects_purged(count: u64) {
    OBJECTS_PURGED_TOTAL.inc_by(count);
}

pub fn increment_client_cache_misses(source: &str) {
    CLIENT_CACHE_MISSES_TOTAL.with_label_values(&[source]).inc();
}

pub fn increment_vault_login_errors() {
    VAULT_LOGIN_ERRORS_TOTAL.inc();
}

/// Record a successful Vault login
pub fn observe_vault_login_duration(duration: f64) {
    VAULT_LOGINS_TOTAL.inc();
    VAULT_LOGIN_DURATION.observe(duration);
}

pub fn increment_vault_session_expirations() {
    VAULT_SESSION_EXPIRATIONS_TOTAL.inc();
}
