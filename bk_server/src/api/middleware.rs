//! Authentication middleware for admin endpoints.
//!
//! Validates the `Authorization: Bearer <token>` header and injects the
//! decoded [`AccessTokenClaims`] into request extensions.
//!
//! ```rust,no_run
//! use axum::extract::Extension;
//! use bracketeer::auth::AccessTokenClaims;
//!
//! async fn admin_handler(Extension(claims): Extension<AccessTokenClaims>) -> String {
//!     format!("Authenticated as {}", claims.username)
//! }
//! # let _ = admin_handler;
//! ```

use axum::{
    Json,
    extract::{Request, State},
    http::{StatusCode, header::AUTHORIZATION},
    middleware::Next,
    response::{IntoResponse, Response},
};
use bracketeer::auth::AccessTokenClaims;

use super::{AppState, ErrorResponse};
use crate::logging;

/// Authentication middleware that validates JWT tokens and injects the claims.
///
/// - **Success**: Token valid, claims inserted, next handler runs
/// - **Missing header / invalid format / invalid or expired token**: `401 Unauthorized`
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    // Extract token from Authorization header
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    let Some(token) = token else {
        return unauthorized("Missing bearer token");
    };

    match state.auth_manager.verify_access_token(token) {
        Ok(claims) => {
            request.extensions_mut().insert::<AccessTokenClaims>(claims);
            next.run(request).await
        }
        Err(e) => {
            logging::log_security_event(
                "invalid_token",
                None,
                None,
                &format!("Rejected token for {}: {}", request.uri().path(), e),
            );
            unauthorized("Invalid or expired token")
        }
    }
}

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
        .into_response()
}
