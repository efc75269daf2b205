//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Transcoding engine lifecycle
//! - Conversions (counts by format and outcome, duration)
//! - Remote media resolution (info lookups and downloads)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts};

// =============================================================================
// Engine Metrics
// =============================================================================

/// Engine load attempts by result.
pub static ENGINE_LOADS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("transmux_engine_loads_total", "Total transcoding engine load attempts"),
        &["result"], // "success", "failure"
    )
    .unwrap()
});

// =============================================================================
// Conversion Metrics
// =============================================================================

/// Conversions total by target format and result.
pub static CONVERSIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("transmux_conversions_total", "Total conversions"),
        &["format", "result"], // result: "success", "rejected", "failed", "cancelled"
    )
    .unwrap()
});

/// Conversion duration in seconds.
pub static CONVERSION_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "transmux_conversion_duration_seconds",
            "Duration of media conversions",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 300.0, 900.0]),
        &["format"],
    )
    .unwrap()
});

// =============================================================================
// Remote Media Metrics
// =============================================================================

/// Remote fetches by operation and result.
pub static REMOTE_FETCHES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "transmux_remote_fetches_total",
            "Total remote media resolver calls",
        ),
        &["operation", "result"], // operation: "info", "media"
    )
    .unwrap()
});

/// Remote fetch duration in seconds.
pub static REMOTE_FETCH_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "transmux_remote_fetch_duration_seconds",
            "Duration of remote media resolver calls",
        )
        .buckets(vec![0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 180.0, 600.0]),
        &["operation"],
    )
    .unwrap()
});

/// Get all core metrics for registration.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(ENGINE_LOADS.clone()),
        Box::new(CONVERSIONS_TOTAL.clone()),
        Box::new(CONVERSION_DURATION.clone()),
        Box::new(REMOTE_FETCHES_TOTAL.clone()),
        Box::new(REMOTE_FETCH_DURATION.clone()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_register_cleanly() {
        let registry = prometheus::Registry::new();
        for metric in all_metrics() {
            registry.register(metric).unwrap();
        }
    }
}
