//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the transmux server:
//! - HTTP request metrics (latency, counts, in flight)
//! - Conversion and extraction status (collected dynamically)
//!
//! Conversion and remote fetch counters live in `transmux_core::metrics` and
//! are registered here alongside the HTTP metrics.

use axum::extract::MatchedPath;
use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use tracing::warn;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "transmux_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.005, 0.025, 0.1, 0.5, 1.0, 5.0, 15.0, 60.0, 300.0, 1800.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("transmux_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "transmux_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// Service Metrics (collected dynamically)
// =============================================================================

/// Conversions currently running.
pub static CONVERSIONS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "transmux_conversions_active",
        "Number of conversion jobs currently running",
    )
    .unwrap()
});

/// Transcoding engine readiness (1 = ready, 0 = not loaded or failed).
pub static ENGINE_READY: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "transmux_engine_ready",
        "Whether the transcoding engine is loaded (1) or not (0)",
    )
    .unwrap()
});

/// Remote extraction availability (1 = available, 0 = unavailable).
pub static EXTRACTION_AVAILABLE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "transmux_extraction_available",
        "Whether remote media extraction is available (1) or not (0)",
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();

    // Service status
    registry
        .register(Box::new(CONVERSIONS_ACTIVE.clone()))
        .unwrap();
    registry.register(Box::new(ENGINE_READY.clone())).unwrap();
    registry
        .register(Box::new(EXTRACTION_AVAILABLE.clone()))
        .unwrap();

    // Core metrics (engine loads, conversions, remote fetches)
    for metric in transmux_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!(error = %e, "Failed to encode metrics");
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Collect dynamic metrics from current application state.
///
/// Called before encoding so the gauges reflect the orchestrator and
/// resolver at scrape time.
pub fn collect_dynamic_metrics(state: &crate::state::AppState) {
    let orchestrator = state.orchestrator();
    CONVERSIONS_ACTIVE.set(orchestrator.active_jobs() as i64);
    ENGINE_READY.set(
        if orchestrator.session().state() == transmux_core::SessionState::Ready {
            1
        } else {
            0
        },
    );
    EXTRACTION_AVAILABLE.set(if state.resolver().is_available() { 1 } else { 0 });
}

/// Label for requests no route matched.
pub const UNMATCHED_ROUTE: &str = "unmatched";

/// Metric label for a request: its route template, never the raw URI.
pub fn route_label(matched: Option<&MatchedPath>) -> &str {
    matched.map(MatchedPath::as_str).unwrap_or(UNMATCHED_ROUTE)
}
