//! Prometheus metrics for monitoring bracket server health and usage.
//!
//! The recorder is installed once at startup and its handle renders the
//! Prometheus text format at `GET /metrics`.
//!
//! # Metrics Categories
//!
//! - **HTTP Metrics**: Request counts and duration by route
//! - **WebSocket Metrics**: Active and total subscriptions
//! - **Bracket Metrics**: Brackets built, results reported, resets
//! - **Auth Metrics**: Login attempts
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use bk_server::metrics;
//!
//! let handle = metrics::init_metrics().unwrap();
//! metrics::http_requests_total("POST", "/api/v1/auth/login", 200);
//! println!("{}", handle.render());
//! ```

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the global Prometheus recorder.
///
/// # Returns
///
/// Handle used to render the scrape output, or an error message if a
/// recorder is already installed
pub fn init_metrics() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {}", e))
}

// ============================================================================
// HTTP Metrics
// ============================================================================

/// Record HTTP request.
///
/// Increments the total HTTP request counter with method, path, and status labels.
pub fn http_requests_total(method: &str, path: &str, status: u16) {
    metrics::counter!("http_requests_total",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record HTTP request duration in milliseconds.
pub fn http_request_duration_ms(method: &str, path: &str, duration_ms: f64) {
    metrics::histogram!("http_request_duration_ms",
        "method" => method.to_string(),
        "path" => path.to_string()
    )
    .record(duration_ms);
}

// ============================================================================
// WebSocket Metrics
// ============================================================================

/// Track a subscription opening (+1) or closing (-1).
pub fn websocket_connections_active(delta: f64) {
    metrics::gauge!("websocket_connections_active").increment(delta);
}

/// Increment total WebSocket connections counter.
pub fn websocket_connections_total() {
    metrics::counter!("websocket_connections_total").increment(1);
}

/// Increment WebSocket messages sent counter.
pub fn websocket_messages_sent() {
    metrics::counter!("websocket_messages_sent").increment(1);
}

// ============================================================================
// Bracket Metrics
// ============================================================================

/// Increment brackets built counter.
pub fn brackets_built_total(format: &str) {
    metrics::counter!("brackets_built_total", "format" => format.to_string()).increment(1);
}

/// Increment results reported counter.
pub fn results_reported_total(finished: bool) {
    metrics::counter!("results_reported_total",
        "finished" => finished.to_string()
    )
    .increment(1);
}

/// Increment bracket resets counter.
pub fn bracket_resets_total() {
    metrics::counter!("bracket_resets_total").increment(1);
}

// ============================================================================
// Auth Metrics
// ============================================================================

/// Increment login attempts counter.
pub fn login_attempts_total(success: bool) {
    metrics::counter!("login_attempts_total",
        "success" => success.to_string()
    )
    .increment(1);
}
