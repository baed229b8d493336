//! Prometheus metrics for descriptor pools
//!
//! Every pool reports under its own `pool` label:
//! - leased / free descriptor gauges
//! - acquire, release and exhaustion counters
//!
//! The label is the pool name, so pool names must be unique within a
//! process. Pools created through `MgmtTxRxContext` are suffixed with
//! their psoc id.

use prometheus::{Encoder, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder};
use std::sync::Once;
use tracing::{error, info};

lazy_static::lazy_static! {
    /// Global metrics registry
    pub static ref METRICS_REGISTRY: Registry = Registry::new();

    pub static ref DESC_LEASED: IntGaugeVec = IntGaugeVec::new(
        Opts::new("mgmt_txrx_desc_leased", "Descriptors currently in flight"),
        &["pool"]
    ).unwrap();

    pub static ref DESC_FREE: IntGaugeVec = IntGaugeVec::new(
        Opts::new("mgmt_txrx_desc_free", "Descriptors on the free list"),
        &["pool"]
    ).unwrap();

    pub static ref DESC_ACQUIRE_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("mgmt_txrx_desc_acquire_total", "Total descriptors acquired"),
        &["pool"]
    ).unwrap();

    pub static ref DESC_RELEASE_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("mgmt_txrx_desc_release_total", "Total descriptors released"),
        &["pool"]
    ).unwrap();

    pub static ref DESC_EXHAUSTED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("mgmt_txrx_desc_exhausted_total", "Acquires refused because the pool was empty"),
        &["pool"]
    ).unwrap();
}

static INIT: Once = Once::new();

/// Register all metrics with the global registry
pub fn init_metrics() {
    INIT.call_once(|| {
        info!("Initializing Prometheus metrics");

        METRICS_REGISTRY.register(Box::new(DESC_LEASED.clone())).ok();
        METRICS_REGISTRY.register(Box::new(DESC_FREE.clone())).ok();
        METRICS_REGISTRY.register(Box::new(DESC_ACQUIRE_TOTAL.clone())).ok();
        METRICS_REGISTRY.register(Box::new(DESC_RELEASE_TOTAL.clone())).ok();
        METRICS_REGISTRY.register(Box::new(DESC_EXHAUSTED_TOTAL.clone())).ok();
    });
}

/// Set the level gauges; called with the pool lock held so updates
/// from concurrent operations land in lock order
pub(crate) fn record_levels(pool: &str, leased: usize, free: usize) {
    DESC_LEASED.with_label_values(&[pool]).set(leased as i64);
    DESC_FREE.with_label_values(&[pool]).set(free as i64);
}

pub(crate) fn record_acquire(pool: &str) {
    DESC_ACQUIRE_TOTAL.with_label_values(&[pool]).inc();
}

pub(crate) fn record_release(pool: &str) {
    DESC_RELEASE_TOTAL.with_label_values(&[pool]).inc();
}

pub(crate) fn record_exhausted(pool: &str) {
    DESC_EXHAUSTED_TOTAL.with_label_values(&[pool]).inc();
}

/// Export all metrics in Prometheus text format
pub fn export_metrics() -> String {
    init_metrics();

    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return String::from("# Error encoding metrics\n");
    }

    String::from_utf8(buffer).unwrap_or_else(|_| String::from("# Error converting metrics\n"))
}
