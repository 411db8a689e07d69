//! # Metrics
//!
//! Prometheus metrics for monitoring the controller.
//!
//! ## Metrics Exposed
//!
//! - `vault_sync_passes_total` - Total number of reconciliation passes
//! - `vault_sync_pass_errors_total` - Total number of passes that failed
//! - `vault_sync_pass_duration_seconds` - Duration of reconciliation passes
//! - `vault_sync_records_discovered` - Records found in Vault by the last pass
//! - `vault_sync_upserts_total{kind}` - Objects written to Kubernetes
//! - `vault_sync_upsert_errors_total{kind}` - Failed object writes
//! - `vault_sync_unmanaged_skipped_total{kind}` - Records skipped because the object is not ours
//! - `vault_sync_orphans_deleted_total{kind}` - Orphaned objects deleted
//! - `vault_sync_store_request_duration_seconds{operation}` - Duration of Vault requests
//! - `vault_sync_store_request_errors_total` - Vault requests rejected with an error status

use crate::record::RecordKind;
use anyhow::Result;
use prometheus::{Histogram, HistogramVec, IntCounter, IntCounterVec, IntGauge, Registry};
use std::sync::LazyLock;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static PASSES_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new("vault_sync_passes_total", "Total number of reconciliation passes")
        .expect("Failed to create PASSES_TOTAL metric - this should never happen")
});

static PASS_ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "vault_sync_pass_errors_total",
        "Total number of reconciliation passes that failed",
    )
    .expect("Failed to create PASS_ERRORS_TOTAL metric - this should never happen")
});

static PASS_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "vault_sync_pass_duration_seconds",
            "Duration of reconciliation passes in seconds",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]),
    )
    .expect("Failed to create PASS_DURATION metric - this should never happen")
});

static RECORDS_DISCOVERED: LazyLock<IntGauge> = LazyLock::new(|| {
    IntGauge::new(
        "vault_sync_records_discovered",
        "Number of records discovered in Vault by the last pass",
    )
    .expect("Failed to create RECORDS_DISCOVERED metric - this should never happen")
});

static UPSERTS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new("vault_sync_upserts_total", "Total number of objects written"),
        &["kind"],
    )
    .expect("Failed to create UPSERTS_TOTAL metric - this should never happen")
});

static UPSERT_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "vault_sync_upsert_errors_total",
            "Total number of failed object writes",
        ),
        &["kind"],
    )
    .expect("Failed to create UPSERT_ERRORS_TOTAL metric - this should never happen")
});

static UNMANAGED_SKIPPED_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "vault_sync_unmanaged_skipped_total",
            "Total number of records skipped because the target object is not managed",
        ),
        &["kind"],
    )
    .expect("Failed to create UNMANAGED_SKIPPED_TOTAL metric - this should never happen")
});

static ORPHANS_DELETED_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "vault_sync_orphans_deleted_total",
            "Total number of orphaned objects deleted",
        ),
        &["kind"],
    )
    .expect("Failed to create ORPHANS_DELETED_TOTAL metric - this should never happen")
});

static STORE_REQUEST_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        prometheus::HistogramOpts::new(
            "vault_sync_store_request_duration_seconds",
            "Duration of Vault requests in seconds",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
        &["operation"],
    )
    .expect("Failed to create STORE_REQUEST_DURATION metric - this should never happen")
});

static STORE_REQUEST_ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "vault_sync_store_request_errors_total",
        "Total number of Vault requests rejected with an error status",
    )
    .expect("Failed to create STORE_REQUEST_ERRORS_TOTAL metric - this should never happen")
});

#[allow(
    clippy::missing_errors_doc,
    reason = "Registration only fails on duplicate registration"
)]
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(PASSES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(PASS_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(PASS_DURATION.clone()))?;
    REGISTRY.register(Box::new(RECORDS_DISCOVERED.clone()))?;
    REGISTRY.register(Box::new(UPSERTS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(UPSERT_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(UNMANAGED_SKIPPED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(ORPHANS_DELETED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(STORE_REQUEST_DURATION.clone()))?;
    REGISTRY.register(Box::new(STORE_REQUEST_ERRORS_TOTAL.clone()))?;

    Ok(())
}

pub fn increment_passes() {
    PASSES_TOTAL.inc();
}

pub fn increment_pass_errors() {
    PASS_ERRORS_TOTAL.inc();
}

pub fn observe_pass_duration(duration: f64) {
    PASS_DURATION.observe(duration);
}

pub fn set_records_discovered(count: usize) {
    RECORDS_DISCOVERED.set(i64::try_from(count).unwrap_or(i64::MAX));
}

pub fn increment_upserts(kind: RecordKind) {
    UPSERTS_TOTAL.with_label_values(&[kind.listing_name()]).inc();
}

pub fn increment_upsert_errors(kind: RecordKind) {
    UPSERT_ERRORS_TOTAL
        .with_label_values(&[kind.listing_name()])
        .inc();
}

pub fn increment_unmanaged_skipped(kind: RecordKind) {
    UNMANAGED_SKIPPED_TOTAL
        .with_label_values(&[kind.listing_name()])
        .inc();
}

pub fn increment_orphans_deleted(kind: RecordKind) {
    ORPHANS_DELETED_TOTAL
        .with_label_values(&[kind.listing_name()])
        .inc();
}

pub fn observe_store_request(operation: &str, duration: f64) {
    STORE_REQUEST_DURATION
        .with_label_values(&[operation])
        .observe(duration);
}

pub fn increment_store_request_errors() {
    STORE_REQUEST_ERRORS_TOTAL.inc();
}
