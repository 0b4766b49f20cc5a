//! Structured logging configuration.
//!
//! The library logs through the `log` facade; those records are bridged into
//! the `tracing` subscriber installed here, so both end up in one stream.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Default filter when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "info,sqlx=warn,hyper=warn";

/// Initialize structured logging
///
/// Log levels are configurable via the `RUST_LOG` env var.
///
/// # Example
///
/// ```no_run
/// use bk_server::logging;
///
/// #[tokio::main]
/// async fn main() {
///     logging::init();
///     tracing::info!("Server starting");
/// }
/// ```
pub fn init() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    tracing::info!("Structured logging initialized");
}

/// Log security event with structured data
///
/// # Example
///
/// ```
/// use bk_server::logging::log_security_event;
///
/// log_security_event("failed_login", None, Some("organizer"), "Invalid password attempt");
/// ```
pub fn log_security_event(
    event_type: &str,
    admin_id: Option<i64>,
    username: Option<&str>,
    message: &str,
) {
    tracing::warn!(
        event_type = event_type,
        admin_id = admin_id,
        username = username,
        "SECURITY: {}",
        message
    );
}

/// Log API request/response
///
/// Requests slower than a second are logged at warn level.
pub fn log_api_request(
    request_id: &str,
    method: &str,
    path: &str,
    status_code: u16,
    duration_ms: u64,
) {
    if duration_ms > 1000 {
        tracing::warn!(
            request_id = request_id,
            http_method = method,
            http_path = path,
            http_status = status_code,
            duration_ms = duration_ms,
            "Slow API request"
        );
    } else {
        tracing::info!(
            request_id = request_id,
            http_method = method,
            http_path = path,
            http_status = status_code,
            duration_ms = duration_ms,
            "API request completed"
        );
    }
}

/// Log a bracket mutation performed by an admin
pub fn log_admin_action(admin_id: i64, action: &str, tournament_id: Option<i64>) {
    tracing::info!(
        admin_id = admin_id,
        action = action,
        tournament_id = tournament_id,
        "Admin action"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_security_event() {
        // Just ensure it doesn't panic
        log_security_event("test_event", Some(1), Some("admin"), "Test message");
    }

    #[test]
    fn test_log_api_request() {
        log_api_request("req-1", "GET", "/api/v1/tournaments", 200, 45);
        log_api_request("req-2", "POST", "/api/v1/auth/login", 401, 1500);
    }

    #[test]
    fn test_log_admin_action() {
        log_admin_action(1, "start_bracket", Some(7));
        log_admin_action(1, "create_tournament", None);
    }
}
