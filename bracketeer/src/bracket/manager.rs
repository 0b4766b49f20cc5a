//! Bracket manager: the entry point for every tournament operation.

use std::sync::Arc;

use super::builder::build;
use super::errors::{BracketError, BracketResult};
use super::events::{BracketEvent, BracketEvents};
use super::layout::Layout;
use super::models::{
    BracketFormat, BracketPlan, Match, MatchId, Player, PlayerId, ReportOutcome, StateTransition,
    Team, TeamId, Tournament, TournamentId, TournamentState, validate_name, validate_position,
};
use super::progression::Sheet;
use super::query::{BracketView, project};
use crate::db::repository::{
    MatchRepository, PgMatchRepository, PgTournamentRepository, TournamentRepository,
};
use crate::db::MemoryStore;
use crate::roster::{Assignment, Wheel};
use sqlx::PgPool;

/// Bracket manager
#[derive(Clone)]
pub struct BracketManager {
    tournaments: Arc<dyn TournamentRepository>,
    matches: Arc<dyn MatchRepository>,
    events: BracketEvents,
}

impl BracketManager {
    /// Create a manager over explicit repositories
    pub fn new(
        tournaments: Arc<dyn TournamentRepository>,
        matches: Arc<dyn MatchRepository>,
        events: BracketEvents,
    ) -> Self {
        Self {
            tournaments,
            matches,
            events,
        }
    }

    /// Manager backed by PostgreSQL
    pub fn postgres(pool: PgPool, events: BracketEvents) -> Self {
        Self::new(
            Arc::new(PgTournamentRepository::new(pool.clone())),
            Arc::new(PgMatchRepository::new(pool)),
            events,
        )
    }

    /// Manager backed by a shared in-memory store
    pub fn in_memory(store: Arc<MemoryStore>, events: BracketEvents) -> Self {
        Self::new(store.clone(), store, events)
    }

    pub fn events(&self) -> &BracketEvents {
        &self.events
    }

    /// Create a tournament
    pub async fn create_tournament(&self, name: &str) -> BracketResult<Tournament> {
        let name = validate_name(name)?;
        let tournament = self.tournaments.create_tournament(&name).await?;
        log::info!("Created tournament {} '{}'", tournament.id, tournament.name);
        Ok(tournament)
    }

    /// Get a tournament
    ///
    /// # Errors
    ///
    /// * `TournamentNotFound` - no such tournament
    pub async fn get_tournament(&self, tournament_id: TournamentId) -> BracketResult<Tournament> {
        self.tournaments
            .find_tournament(tournament_id)
            .await?
            .ok_or(BracketError::TournamentNotFound(tournament_id))
    }

    /// List all tournaments, newest first
    pub async fn list_tournaments(&self) -> BracketResult<Vec<Tournament>> {
        self.tournaments.list_tournaments().await
    }

    /// Add a team; `position` defaults to the next free seed
    pub async fn add_team(
        &self,
        tournament_id: TournamentId,
        name: &str,
        position: Option<u32>,
    ) -> BracketResult<Team> {
        let name = validate_name(name)?;
        if let Some(position) = position {
            validate_position(position)?;
        }

        let team = self
            .tournaments
            .insert_team(tournament_id, &name, position)
            .await?;

        log::info!(
            "Tournament {}: added team {} '{}' at seed {}",
            tournament_id,
            team.id,
            team.name,
            team.position
        );
        self.events
            .publish(BracketEvent::RosterChanged { tournament_id });
        Ok(team)
    }

    /// Rename a team
    pub async fn rename_team(
        &self,
        tournament_id: TournamentId,
        team_id: TeamId,
        name: &str,
    ) -> BracketResult<Team> {
        let name = validate_name(name)?;
        let team = self
            .tournaments
            .rename_team(tournament_id, team_id, &name)
            .await?;
        self.events
            .publish(BracketEvent::RosterChanged { tournament_id });
        Ok(team)
    }

    /// Remove a team before the bracket is built
    pub async fn remove_team(&self, tournament_id: TournamentId, team_id: TeamId) -> BracketResult<()> {
        self.tournaments.delete_team(tournament_id, team_id).await?;
        log::info!("Tournament {}: removed team {}", tournament_id, team_id);
        self.events
            .publish(BracketEvent::RosterChanged { tournament_id });
        Ok(())
    }

    /// Teams ordered by seed
    pub async fn list_teams(&self, tournament_id: TournamentId) -> BracketResult<Vec<Team>> {
        self.get_tournament(tournament_id).await?;
        self.tournaments.load_teams(tournament_id).await
    }

    /// Add a roster entry
    pub async fn add_player(&self, tournament_id: TournamentId, name: &str) -> BracketResult<Player> {
        let name = validate_name(name)?;
        self.get_tournament(tournament_id).await?;
        let player = self.tournaments.insert_player(tournament_id, &name).await?;
        self.events
            .publish(BracketEvent::RosterChanged { tournament_id });
        Ok(player)
    }

    pub async fn list_players(&self, tournament_id: TournamentId) -> BracketResult<Vec<Player>> {
        self.get_tournament(tournament_id).await?;
        self.tournaments.load_players(tournament_id).await
    }

    /// Put a player on a team, or take them off with `None`
    pub async fn assign_player(
        &self,
        tournament_id: TournamentId,
        player_id: PlayerId,
        team_id: Option<TeamId>,
    ) -> BracketResult<Player> {
        let players = self.list_players(tournament_id).await?;
        let mut player = players
            .into_iter()
            .find(|p| p.id == player_id)
            .ok_or(BracketError::PlayerNotFound(player_id))?;

        if let Some(team_id) = team_id {
            let teams = self.tournaments.load_teams(tournament_id).await?;
            if !teams.iter().any(|t| t.id == team_id) {
                return Err(BracketError::TeamNotFound(team_id));
            }
        }

        self.tournaments
            .assign_players(tournament_id, &[(player_id, team_id)])
            .await?;
        player.team_id = team_id;

        self.events
            .publish(BracketEvent::RosterChanged { tournament_id });
        Ok(player)
    }

    /// Spin the wheel once, or until every player has a team
    pub async fn spin_wheel(
        &self,
        tournament_id: TournamentId,
        all: bool,
    ) -> BracketResult<Vec<Assignment>> {
        let players = self.list_players(tournament_id).await?;
        let teams = self.tournaments.load_teams(tournament_id).await?;

        let mut wheel = Wheel::new();
        let assignments = if all {
            wheel.spin_all(&players, &teams)?
        } else {
            vec![wheel.spin(&players, &teams)?]
        };

        let updates: Vec<(PlayerId, Option<TeamId>)> = assignments
            .iter()
            .map(|a| (a.player_id, Some(a.team_id)))
            .collect();
        self.tournaments
            .assign_players(tournament_id, &updates)
            .await?;

        log::info!(
            "Tournament {}: wheel assigned {} player(s)",
            tournament_id,
            assignments.len()
        );
        self.events
            .publish(BracketEvent::RosterChanged { tournament_id });
        Ok(assignments)
    }

    /// Build the bracket from the current roster
    ///
    /// # Errors
    ///
    /// * `AlreadyBuilt` - the tournament already has a bracket
    /// * `InvalidTeamCount` - fewer than two or too many teams
    /// * `RosterChanged` - the roster changed between reading it and saving the bracket
    pub async fn start_bracket(
        &self,
        tournament_id: TournamentId,
        format: BracketFormat,
    ) -> BracketResult<Vec<Match>> {
        let tournament = self.get_tournament(tournament_id).await?;
        if tournament.plan.is_some() {
            return Err(BracketError::AlreadyBuilt(tournament_id));
        }

        let teams = self.tournaments.load_teams(tournament_id).await?;
        let new_matches = build(&teams, format)?;
        let plan = BracketPlan {
            format,
            team_count: teams.len() as u32,
        };

        let matches = self
            .matches
            .save_matches(tournament_id, plan, &teams, &new_matches)
            .await?;

        log::info!(
            "Tournament {}: built {} elimination bracket for {} teams ({} matches)",
            tournament_id,
            format.as_str(),
            teams.len(),
            matches.len()
        );
        self.events.publish(BracketEvent::BracketBuilt {
            tournament_id,
            format,
            match_count: matches.len(),
        });
        Ok(matches)
    }

    /// Report a result and advance the teams
    ///
    /// # Errors
    ///
    /// * `NotBuilt` - no bracket yet
    /// * `MatchNotFound` - no such match in this tournament
    /// * `MatchNotReady` / `TiedScoreNotAllowed` / `ResultAlreadyCascaded`
    /// * `SlotAlreadyFilled` - a concurrent write won the race
    pub async fn report_result(
        &self,
        tournament_id: TournamentId,
        match_id: MatchId,
        team1_score: u32,
        team2_score: u32,
    ) -> BracketResult<ReportOutcome> {
        // State is read before the matches so a write in between fails the commit
        let (tournament, layout) = self.built(tournament_id).await?;
        let matches = self.matches.load_matches(tournament_id).await?;
        let target = matches
            .iter()
            .find(|m| m.id == match_id)
            .ok_or(BracketError::MatchNotFound(match_id))?;
        let key = target.key();

        let mut sheet = Sheet::from_matches(&layout, &matches)?;
        sheet.report(key, team1_score, team2_score)?;

        let champion = sheet.champion();
        let transition = StateTransition {
            from: tournament.state,
            to: if champion.is_some() {
                TournamentState::Finished
            } else {
                TournamentState::InProgress
            },
        };

        let changes = sheet.changes(&matches);
        self.matches
            .update_matches(tournament_id, &changes, transition)
            .await?;

        let pairing = sheet
            .pairing(&key)
            .cloned()
            .ok_or_else(|| BracketError::InvalidRecord(format!("no match at {key}")))?;
        let updated = Match::from_parts(match_id, tournament_id, key, pairing)?;
        let winner = updated
            .winner
            .ok_or_else(|| BracketError::InvalidRecord(format!("{key} has no winner")))?;

        log::info!(
            "Tournament {}: {} won {} ({}-{}), {} match(es) updated",
            tournament_id,
            winner,
            key,
            team1_score,
            team2_score,
            changes.len()
        );
        if let Some(champion) = champion {
            log::info!("Tournament {}: team {} is champion", tournament_id, champion);
        }

        self.events.publish(BracketEvent::ResultReported {
            tournament_id,
            match_id,
            winner,
            champion,
        });
        Ok(ReportOutcome {
            updated,
            state: transition.to,
            champion,
        })
    }

    /// Bracket tree grouped by bracket and round
    ///
    /// # Errors
    ///
    /// * `NotBuilt` - no bracket yet
    pub async fn get_bracket(&self, tournament_id: TournamentId) -> BracketResult<BracketView> {
        let layout = self.layout(tournament_id).await?;
        let matches = self.matches.load_matches(tournament_id).await?;
        project(tournament_id, &layout, &matches)
    }

    /// Flat match list in bracket, round, position order
    pub async fn list_matches(&self, tournament_id: TournamentId) -> BracketResult<Vec<Match>> {
        self.get_tournament(tournament_id).await?;
        self.matches.load_matches(tournament_id).await
    }

    /// Delete the bracket and reopen the roster
    pub async fn reset_bracket(&self, tournament_id: TournamentId) -> BracketResult<()> {
        self.matches.delete_bracket(tournament_id).await?;
        log::info!("Tournament {}: bracket reset", tournament_id);
        self.events
            .publish(BracketEvent::BracketReset { tournament_id });
        Ok(())
    }

    async fn layout(&self, tournament_id: TournamentId) -> BracketResult<Layout> {
        self.built(tournament_id).await.map(|(_, layout)| layout)
    }

    async fn built(&self, tournament_id: TournamentId) -> BracketResult<(Tournament, Layout)> {
        let tournament = self.get_tournament(tournament_id).await?;
        let plan = tournament
            .plan
            .ok_or(BracketError::NotBuilt(tournament_id))?;
        let layout = Layout::from_plan(&plan)?;
        Ok((tournament, layout))
    }
}
