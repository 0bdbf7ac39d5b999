//! Prometheus metrics for the battle server.
//!
//! Metrics are exposed in Prometheus text format on a separate listener.
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use pb_server::metrics;
//! use std::net::SocketAddr;
//!
//! let addr: SocketAddr = "127.0.0.1:9090".parse().unwrap();
//! metrics::init_metrics(addr).unwrap();
//!
//! metrics::battle_requests_total("bet", "ok");
//! ```

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Initialize Prometheus metrics exporter.
///
/// Metrics will be available at `http://<addr>/metrics`.
///
/// # Arguments
///
/// - `addr`: Address to bind the metrics server to (e.g., `0.0.0.0:9090`)
///
/// # Returns
///
/// Result indicating success or error message
pub fn init_metrics(addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {}", e))
}

// ============================================================================
// Request Metrics
// ============================================================================

/// Count one battle request by endpoint and outcome code.
pub fn battle_requests_total(endpoint: &str, outcome: &str) {
    metrics::counter!("battle_requests_total",
        "endpoint" => endpoint.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record battle request duration in milliseconds.
pub fn battle_request_duration_ms(endpoint: &str, duration_ms: f64) {
    metrics::histogram!("battle_request_duration_ms",
        "endpoint" => endpoint.to_string()
    )
    .record(duration_ms);
}

// ============================================================================
// Game Metrics
// ============================================================================

/// Increment successful joins counter.
pub fn matches_total(template_id: i32) {
    metrics::counter!("battle_matches_total",
        "template" => template_id.to_string()
    )
    .increment(1);
}

/// Increment accepted bets counter.
pub fn bets_total() {
    metrics::counter!("battle_bets_total").increment(1);
}

/// Increment settlements counter, split by whether anything was credited.
pub fn settlements_total(credited: bool) {
    metrics::counter!("battle_settlements_total",
        "credited" => credited.to_string()
    )
    .increment(1);
}

/// Increment lock contention rejections counter.
pub fn lock_busy_total(endpoint: &str) {
    metrics::counter!("battle_lock_busy_total",
        "endpoint" => endpoint.to_string()
    )
    .increment(1);
}

// ============================================================================
// Auth Metrics
// ============================================================================

/// Increment rejected access tokens counter.
pub fn rejected_tokens_total() {
    metrics::counter!("rejected_tokens_total").increment(1);
}
