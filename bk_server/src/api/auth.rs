//! Admin login.
//!
//! ```bash
//! curl -X POST http://localhost:8080/api/v1/auth/login \
//!   -H "Content-Type: application/json" \
//!   -d '{"username": "organizer", "password": "SecurePass123"}'
//! ```

use axum::{Json, extract::State};
use bracketeer::auth::{AuthError, LoginRequest};
use serde::{Deserialize, Serialize};

use super::{ApiResult, AppState, auth_error, request_id::RequestId};
use crate::{logging, metrics};

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub token_type: String,
    pub admin_id: i64,
    pub username: String,
}

/// Exchange admin credentials for an access token.
///
/// # Errors
///
/// - `401 Unauthorized`: Unknown username or wrong password
/// - `403 Forbidden`: Account disabled
/// - `500 Internal Server Error`: Storage failure
pub async fn login(
    State(state): State<AppState>,
    request_id: RequestId,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<AuthResponse> {
    match state
        .auth_manager
        .login(&payload.username, &payload.password)
        .await
    {
        Ok((admin, token)) => {
            metrics::login_attempts_total(true);
            tracing::info!(
                request_id = request_id.as_str(),
                admin_id = admin.id,
                "Admin logged in"
            );
            Ok(Json(AuthResponse {
                access_token: token,
                token_type: "Bearer".to_string(),
                admin_id: admin.id,
                username: admin.username,
            }))
        }
        Err(e) => {
            metrics::login_attempts_total(false);
            if matches!(e, AuthError::InvalidCredentials | AuthError::AccountDisabled) {
                logging::log_security_event(
                    "failed_login",
                    None,
                    Some(&payload.username),
                    &e.to_string(),
                );
            }
            Err(auth_error(e))
        }
    }
}
