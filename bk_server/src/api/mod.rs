//! HTTP/WebSocket API for the bracket server.
//!
//! # Modules
//!
//! - [`auth`]: Admin login
//! - [`tournaments`]: Tournaments, teams, players and the wheel
//! - [`bracket`]: Bracket build/reset, match listing and result reporting
//! - [`websocket`]: Live bracket event feed
//! - [`middleware`]: Bearer token check for admin endpoints
//! - [`request_id`]: Request correlation, access logging and HTTP metrics
//!
//! # Endpoints Overview
//!
//! ## Public
//! - `GET /health`, `GET /metrics`
//! - `POST /api/v1/auth/login`
//! - `GET /api/v1/tournaments`, `GET /api/v1/tournaments/{id}`
//! - `GET /api/v1/tournaments/{id}/teams|players|matches|bracket`
//! - `GET /ws/tournaments/{id}`
//!
//! ## Admin (`Authorization: Bearer <jwt>`)
//! - `POST /api/v1/tournaments`
//! - `POST /api/v1/tournaments/{id}/teams`, `PATCH|DELETE .../teams/{team_id}`
//! - `POST .../players`, `PUT .../players/{player_id}/team`, `POST .../wheel`
//! - `POST .../bracket/start`, `POST .../bracket/reset`
//! - `POST .../matches/{match_id}/result`
//!
//! ## Legacy Routes
//! - `GET /api/bracket/teams?tournament_id=`, `GET /api/bracket/matches?tournament_id=`
//! - `POST /api/bracket/start?tournament_id=` (admin)
//!
//! # Errors
//!
//! Every failure is `{"error": "..."}`. Database details never reach clients.

pub mod auth;
pub mod bracket;
pub mod middleware;
pub mod request_id;
pub mod tournaments;
pub mod websocket;

use axum::{
    Router,
    extract::State,
    http::{StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Json, Response},
    routing::{get, post, put},
};
use bracketeer::{
    auth::{AuthError, AuthManager},
    bracket::{BracketError, BracketFormat, BracketManager},
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

/// Application state shared across all HTTP handlers and WebSocket connections.
///
/// - `pool`: present when running on PostgreSQL, used by the health check
/// - `metrics`: present when a Prometheus recorder was installed
#[derive(Clone)]
pub struct AppState {
    pub auth_manager: Arc<AuthManager>,
    pub bracket_manager: Arc<BracketManager>,
    pub pool: Option<PgPool>,
    pub metrics: Option<PrometheusHandle>,
    pub default_format: BracketFormat,
}

/// JSON error body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Handler error: status plus JSON body
pub type ApiError = (StatusCode, Json<ErrorResponse>);

/// Handler result
pub type ApiResult<T> = Result<Json<T>, ApiError>;

/// Map a bracket error to its HTTP status and client-safe message
pub fn bracket_error(err: BracketError) -> ApiError {
    let status = match &err {
        BracketError::InvalidTeamCount { .. }
        | BracketError::TiedScoreNotAllowed
        | BracketError::MatchNotReady(_)
        | BracketError::InvalidName(_)
        | BracketError::InvalidScore(_)
        | BracketError::NoTeams
        | BracketError::NoUnassignedPlayers => StatusCode::BAD_REQUEST,

        BracketError::NotBuilt(_)
        | BracketError::MatchNotFound(_)
        | BracketError::TeamNotFound(_)
        | BracketError::PlayerNotFound(_)
        | BracketError::TournamentNotFound(_) => StatusCode::NOT_FOUND,

        BracketError::AlreadyBuilt(_)
        | BracketError::ResultAlreadyCascaded(_)
        | BracketError::SlotAlreadyFilled(_)
        | BracketError::DuplicateSeed(_)
        | BracketError::TournamentLocked(_)
        | BracketError::RosterChanged => StatusCode::CONFLICT,

        BracketError::InvalidRecord(_) | BracketError::Database(_) | BracketError::Timeout(_) => {
            log::error!("Bracket operation failed: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    (
        status,
        Json(ErrorResponse {
            error: err.client_message(),
        }),
    )
}

/// Map an auth error to its HTTP status and client-safe message
pub fn auth_error(err: AuthError) -> ApiError {
    let status = match &err {
        AuthError::InvalidCredentials | AuthError::JwtError(_) => StatusCode::UNAUTHORIZED,
        AuthError::AccountDisabled => StatusCode::FORBIDDEN,
        AuthError::InvalidUsername(_) | AuthError::WeakPassword(_) => StatusCode::BAD_REQUEST,
        AuthError::UsernameTaken => StatusCode::CONFLICT,
        AuthError::Database(_) | AuthError::Timeout(_) | AuthError::HashingFailed => {
            log::error!("Auth operation failed: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    (
        status,
        Json(ErrorResponse {
            error: err.client_message(),
        }),
    )
}

/// Create the complete API router with all endpoints and middleware.
///
/// # Example
///
/// ```rust,no_run
/// # use bk_server::api::{create_router, AppState};
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// # let state: AppState = unimplemented!();
/// let app = create_router(state);
/// let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
/// axum::serve(listener, app).await?;
/// # Ok(())
/// # }
/// ```
pub fn create_router(state: AppState) -> Router {
    let v1_routes = create_v1_router(state.clone());

    // Root routes (health check, metrics, WebSocket - not versioned)
    let root_routes = Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(render_metrics))
        .route(
            "/ws/tournaments/{tournament_id}",
            get(websocket::websocket_handler),
        );

    // Legacy routes kept for existing bracket pages
    let legacy_routes = Router::new()
        .route("/api/bracket/teams", get(bracket::legacy_teams))
        .route("/api/bracket/matches", get(bracket::legacy_matches))
        .merge(
            Router::new()
                .route("/api/bracket/start", post(bracket::legacy_start))
                .route_layer(axum::middleware::from_fn_with_state(
                    state.clone(),
                    middleware::auth_middleware,
                )),
        );

    Router::new()
        .merge(root_routes)
        .merge(legacy_routes)
        .nest("/api/v1", v1_routes)
        .layer(axum::middleware::from_fn(request_id::request_id_middleware))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Create API v1 router with all versioned endpoints.
fn create_v1_router(state: AppState) -> Router<AppState> {
    // Public routes (read-only)
    let public_routes = Router::new()
        .route("/auth/login", post(auth::login))
        .route("/tournaments", get(tournaments::list_tournaments))
        .route(
            "/tournaments/{tournament_id}",
            get(tournaments::get_tournament),
        )
        .route(
            "/tournaments/{tournament_id}/teams",
            get(tournaments::list_teams),
        )
        .route(
            "/tournaments/{tournament_id}/players",
            get(tournaments::list_players),
        )
        .route(
            "/tournaments/{tournament_id}/matches",
            get(bracket::list_matches),
        )
        .route(
            "/tournaments/{tournament_id}/bracket",
            get(bracket::get_bracket),
        );

    // Admin routes (require a valid access token)
    let admin_routes = Router::new()
        .route("/tournaments", post(tournaments::create_tournament))
        .route(
            "/tournaments/{tournament_id}/teams",
            post(tournaments::add_team),
        )
        .route(
            "/tournaments/{tournament_id}/teams/{team_id}",
            axum::routing::patch(tournaments::rename_team).delete(tournaments::remove_team),
        )
        .route(
            "/tournaments/{tournament_id}/players",
            post(tournaments::add_player),
        )
        .route(
            "/tournaments/{tournament_id}/players/{player_id}/team",
            put(tournaments::assign_player),
        )
        .route(
            "/tournaments/{tournament_id}/wheel",
            post(tournaments::spin_wheel),
        )
        .route(
            "/tournaments/{tournament_id}/bracket/start",
            post(bracket::start_bracket),
        )
        .route(
            "/tournaments/{tournament_id}/bracket/reset",
            post(bracket::reset_bracket),
        )
        .route(
            "/tournaments/{tournament_id}/matches/{match_id}/result",
            post(bracket::report_result),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            state,
            middleware::auth_middleware,
        ));

    Router::new().merge(public_routes).merge(admin_routes)
}

/// Health check endpoint for monitoring and load balancers.
///
/// Returns `200 OK` when storage is reachable, `503 Service Unavailable` otherwise.
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let (storage, db_healthy) = match &state.pool {
        Some(pool) => (
            "postgres",
            sqlx::query("SELECT 1").fetch_one(pool).await.is_ok(),
        ),
        None => ("memory", true),
    };

    let status_code = if db_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = json!({
        "status": if db_healthy { "healthy" } else { "unhealthy" },
        "version": env!("CARGO_PKG_VERSION"),
        "storage": storage,
        "database": db_healthy,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    (status_code, Json(response))
}

/// Prometheus scrape endpoint.
async fn render_metrics(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => (
            StatusCode::OK,
            [(CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
