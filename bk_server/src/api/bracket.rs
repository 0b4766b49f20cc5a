//! Bracket handlers: build, reset, views and result reporting.

use axum::{
    Json,
    extract::{Extension, Path, Query, State},
    http::StatusCode,
};
use bracketeer::{
    auth::AccessTokenClaims,
    bracket::{
        BracketError, BracketFormat, BracketView, Match, MatchId, Team, TournamentId,
        TournamentState,
    },
};
use serde::{Deserialize, Serialize};

use super::{ApiError, ApiResult, AppState, bracket_error, request_id::RequestId};
use crate::{logging, metrics};

#[derive(Debug, Deserialize)]
pub struct StartPayload {
    /// Server default when omitted
    pub format: Option<BracketFormat>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultPayload {
    pub team1_score: i64,
    pub team2_score: i64,
}

#[derive(Debug, Deserialize)]
pub struct LegacyQuery {
    pub tournament_id: TournamentId,
    pub format: Option<BracketFormat>,
}

fn score(value: i64) -> Result<u32, ApiError> {
    u32::try_from(value).map_err(|_| bracket_error(BracketError::InvalidScore(value)))
}

async fn start(
    state: &AppState,
    claims: &AccessTokenClaims,
    tournament_id: TournamentId,
    format: Option<BracketFormat>,
) -> Result<Vec<Match>, ApiError> {
    let format = format.unwrap_or(state.default_format);
    let matches = state
        .bracket_manager
        .start_bracket(tournament_id, format)
        .await
        .map_err(bracket_error)?;

    metrics::brackets_built_total(format.as_str());
    logging::log_admin_action(claims.sub, "start_bracket", Some(tournament_id));
    Ok(matches)
}

/// Build the bracket; the body is optional and may only pick the format
pub async fn start_bracket(
    State(state): State<AppState>,
    Extension(claims): Extension<AccessTokenClaims>,
    Path(tournament_id): Path<TournamentId>,
    payload: Option<Json<StartPayload>>,
) -> Result<(StatusCode, Json<Vec<Match>>), ApiError> {
    let format = payload.and_then(|Json(payload)| payload.format);
    let matches = start(&state, &claims, tournament_id, format).await?;
    Ok((StatusCode::CREATED, Json(matches)))
}

pub async fn reset_bracket(
    State(state): State<AppState>,
    Extension(claims): Extension<AccessTokenClaims>,
    Path(tournament_id): Path<TournamentId>,
) -> Result<StatusCode, ApiError> {
    state
        .bracket_manager
        .reset_bracket(tournament_id)
        .await
        .map_err(bracket_error)?;

    metrics::bracket_resets_total();
    logging::log_admin_action(claims.sub, "reset_bracket", Some(tournament_id));
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_bracket(
    State(state): State<AppState>,
    Path(tournament_id): Path<TournamentId>,
) -> ApiResult<BracketView> {
    state
        .bracket_manager
        .get_bracket(tournament_id)
        .await
        .map(Json)
        .map_err(bracket_error)
}

pub async fn list_matches(
    State(state): State<AppState>,
    Path(tournament_id): Path<TournamentId>,
) -> ApiResult<Vec<Match>> {
    state
        .bracket_manager
        .list_matches(tournament_id)
        .await
        .map(Json)
        .map_err(bracket_error)
}

/// Report a result; the winner is advanced into every match it feeds
pub async fn report_result(
    State(state): State<AppState>,
    Extension(claims): Extension<AccessTokenClaims>,
    request_id: RequestId,
    Path((tournament_id, match_id)): Path<(TournamentId, MatchId)>,
    Json(payload): Json<ResultPayload>,
) -> ApiResult<Match> {
    let team1_score = score(payload.team1_score)?;
    let team2_score = score(payload.team2_score)?;

    let outcome = state
        .bracket_manager
        .report_result(tournament_id, match_id, team1_score, team2_score)
        .await
        .map_err(|e| {
            tracing::debug!(
                request_id = request_id.as_str(),
                tournament_id,
                match_id,
                "Result rejected: {}",
                e
            );
            bracket_error(e)
        })?;

    metrics::results_reported_total(outcome.state == TournamentState::Finished);
    logging::log_admin_action(claims.sub, "report_result", Some(tournament_id));
    Ok(Json(outcome.updated))
}

// ============================================================================
// Legacy routes
// ============================================================================

pub async fn legacy_teams(
    State(state): State<AppState>,
    Query(query): Query<LegacyQuery>,
) -> ApiResult<Vec<Team>> {
    state
        .bracket_manager
        .list_teams(query.tournament_id)
        .await
        .map(Json)
        .map_err(bracket_error)
}

pub async fn legacy_matches(
    State(state): State<AppState>,
    Query(query): Query<LegacyQuery>,
) -> ApiResult<Vec<Match>> {
    state
        .bracket_manager
        .list_matches(query.tournament_id)
        .await
        .map(Json)
        .map_err(bracket_error)
}

pub async fn legacy_start(
    State(state): State<AppState>,
    Extension(claims): Extension<AccessTokenClaims>,
    Query(query): Query<LegacyQuery>,
) -> Result<(StatusCode, Json<Vec<Match>>), ApiError> {
    let matches = start(&state, &claims, query.tournament_id, query.format).await?;
    Ok((StatusCode::CREATED, Json(matches)))
}
