//! Tournament, roster and wheel handlers.

use axum::{
    Json,
    extract::{Extension, Path, Query, State},
    http::StatusCode,
};
use bracketeer::{
    auth::AccessTokenClaims,
    bracket::{Player, PlayerId, Team, TeamId, Tournament, TournamentId},
    roster::Assignment,
};
use serde::{Deserialize, Serialize};

use super::{ApiError, ApiResult, AppState, bracket_error};
use crate::logging;

#[derive(Debug, Deserialize)]
pub struct CreateTournamentPayload {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct AddTeamPayload {
    pub name: String,
    /// Seed; defaults to the next free one
    pub position: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct RenameTeamPayload {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct AddPlayerPayload {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct AssignPlayerPayload {
    /// `null` takes the player off their team
    pub team_id: Option<TeamId>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SpinQuery {
    /// Keep spinning until every player has a team
    #[serde(default)]
    pub all: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SpinResponse {
    pub assignments: Vec<Assignment>,
}

pub async fn list_tournaments(State(state): State<AppState>) -> ApiResult<Vec<Tournament>> {
    state
        .bracket_manager
        .list_tournaments()
        .await
        .map(Json)
        .map_err(bracket_error)
}

pub async fn get_tournament(
    State(state): State<AppState>,
    Path(tournament_id): Path<TournamentId>,
) -> ApiResult<Tournament> {
    state
        .bracket_manager
        .get_tournament(tournament_id)
        .await
        .map(Json)
        .map_err(bracket_error)
}

pub async fn create_tournament(
    State(state): State<AppState>,
    Extension(claims): Extension<AccessTokenClaims>,
    Json(payload): Json<CreateTournamentPayload>,
) -> Result<(StatusCode, Json<Tournament>), ApiError> {
    let tournament = state
        .bracket_manager
        .create_tournament(&payload.name)
        .await
        .map_err(bracket_error)?;

    logging::log_admin_action(claims.sub, "create_tournament", Some(tournament.id));
    Ok((StatusCode::CREATED, Json(tournament)))
}

pub async fn list_teams(
    State(state): State<AppState>,
    Path(tournament_id): Path<TournamentId>,
) -> ApiResult<Vec<Team>> {
    state
        .bracket_manager
        .list_teams(tournament_id)
        .await
        .map(Json)
        .map_err(bracket_error)
}

pub async fn add_team(
    State(state): State<AppState>,
    Extension(claims): Extension<AccessTokenClaims>,
    Path(tournament_id): Path<TournamentId>,
    Json(payload): Json<AddTeamPayload>,
) -> Result<(StatusCode, Json<Team>), ApiError> {
    let team = state
        .bracket_manager
        .add_team(tournament_id, &payload.name, payload.position)
        .await
        .map_err(bracket_error)?;

    logging::log_admin_action(claims.sub, "add_team", Some(tournament_id));
    Ok((StatusCode::CREATED, Json(team)))
}

pub async fn rename_team(
    State(state): State<AppState>,
    Extension(claims): Extension<AccessTokenClaims>,
    Path((tournament_id, team_id)): Path<(TournamentId, TeamId)>,
    Json(payload): Json<RenameTeamPayload>,
) -> ApiResult<Team> {
    let team = state
        .bracket_manager
        .rename_team(tournament_id, team_id, &payload.name)
        .await
        .map_err(bracket_error)?;

    logging::log_admin_action(claims.sub, "rename_team", Some(tournament_id));
    Ok(Json(team))
}

pub async fn remove_team(
    State(state): State<AppState>,
    Extension(claims): Extension<AccessTokenClaims>,
    Path((tournament_id, team_id)): Path<(TournamentId, TeamId)>,
) -> Result<StatusCode, ApiError> {
    state
        .bracket_manager
        .remove_team(tournament_id, team_id)
        .await
        .map_err(bracket_error)?;

    logging::log_admin_action(claims.sub, "remove_team", Some(tournament_id));
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_players(
    State(state): State<AppState>,
    Path(tournament_id): Path<TournamentId>,
) -> ApiResult<Vec<Player>> {
    state
        .bracket_manager
        .list_players(tournament_id)
        .await
        .map(Json)
        .map_err(bracket_error)
}

pub async fn add_player(
    State(state): State<AppState>,
    Extension(claims): Extension<AccessTokenClaims>,
    Path(tournament_id): Path<TournamentId>,
    Json(payload): Json<AddPlayerPayload>,
) -> Result<(StatusCode, Json<Player>), ApiError> {
    let player = state
        .bracket_manager
        .add_player(tournament_id, &payload.name)
        .await
        .map_err(bracket_error)?;

    logging::log_admin_action(claims.sub, "add_player", Some(tournament_id));
    Ok((StatusCode::CREATED, Json(player)))
}

pub async fn assign_player(
    State(state): State<AppState>,
    Extension(claims): Extension<AccessTokenClaims>,
    Path((tournament_id, player_id)): Path<(TournamentId, PlayerId)>,
    Json(payload): Json<AssignPlayerPayload>,
) -> ApiResult<Player> {
    let player = state
        .bracket_manager
        .assign_player(tournament_id, player_id, payload.team_id)
        .await
        .map_err(bracket_error)?;

    logging::log_admin_action(claims.sub, "assign_player", Some(tournament_id));
    Ok(Json(player))
}

/// Spin the wheel once, or for everyone with `?all=true`
pub async fn spin_wheel(
    State(state): State<AppState>,
    Extension(claims): Extension<AccessTokenClaims>,
    Path(tournament_id): Path<TournamentId>,
    Query(query): Query<SpinQuery>,
) -> ApiResult<SpinResponse> {
    let assignments = state
        .bracket_manager
        .spin_wheel(tournament_id, query.all)
        .await
        .map_err(bracket_error)?;

    logging::log_admin_action(claims.sub, "spin_wheel", Some(tournament_id));
    Ok(Json(SpinResponse { assignments }))
}
