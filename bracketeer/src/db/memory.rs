//! Process-local storage backend.
//!
//! Implements every repository trait over a single mutex-guarded state, so
//! each call is atomic in the same way a PostgreSQL transaction is.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use tokio::sync::Mutex;

use super::repository::{AdminRepository, MatchRepository, TournamentRepository, stale_state};
use crate::auth::{Admin, AdminCredentials, AdminId, AuthError, AuthResult};
use crate::bracket::{
    BracketError, BracketPlan, BracketResult, Match, MatchChange, MatchId, NewMatch, Player,
    PlayerId, StateTransition, Team, TeamId, Tournament, TournamentId, TournamentState,
    same_seeding,
};

#[derive(Default)]
struct MemoryState {
    next_id: i64,
    tournaments: BTreeMap<TournamentId, Tournament>,
    teams: BTreeMap<TeamId, Team>,
    players: BTreeMap<PlayerId, Player>,
    matches: BTreeMap<MatchId, Match>,
    admins: BTreeMap<AdminId, AdminCredentials>,
}

impl MemoryState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn tournament_mut(&mut self, id: TournamentId) -> BracketResult<&mut Tournament> {
        self.tournaments
            .get_mut(&id)
            .ok_or(BracketError::TournamentNotFound(id))
    }

    fn require_setup(&self, id: TournamentId) -> BracketResult<()> {
        match self.tournaments.get(&id) {
            None => Err(BracketError::TournamentNotFound(id)),
            Some(t) if t.state != TournamentState::Setup => Err(BracketError::TournamentLocked(id)),
            Some(_) => Ok(()),
        }
    }

    fn teams_of(&self, id: TournamentId) -> impl Iterator<Item = &Team> {
        self.teams.values().filter(move |t| t.tournament_id == id)
    }
}

/// In-memory implementation of all repositories
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TournamentRepository for MemoryStore {
    async fn create_tournament(&self, name: &str) -> BracketResult<Tournament> {
        let mut state = self.state.lock().await;
        let tournament = Tournament {
            id: state.next_id(),
            name: name.to_string(),
            state: TournamentState::Setup,
            plan: None,
            created_at: Utc::now(),
        };
        state.tournaments.insert(tournament.id, tournament.clone());
        Ok(tournament)
    }

    async fn find_tournament(&self, id: TournamentId) -> BracketResult<Option<Tournament>> {
        Ok(self.state.lock().await.tournaments.get(&id).cloned())
    }

    async fn list_tournaments(&self) -> BracketResult<Vec<Tournament>> {
        let state = self.state.lock().await;
        Ok(state.tournaments.values().rev().cloned().collect())
    }

    async fn insert_team(
        &self,
        tournament_id: TournamentId,
        name: &str,
        position: Option<u32>,
    ) -> BracketResult<Team> {
        let mut state = self.state.lock().await;
        state.require_setup(tournament_id)?;

        let position = match position {
            Some(position) => position,
            None => {
                state
                    .teams_of(tournament_id)
                    .map(|t| t.position)
                    .max()
                    .unwrap_or(0)
                    + 1
            }
        };
        if state.teams_of(tournament_id).any(|t| t.position == position) {
            return Err(BracketError::DuplicateSeed(position));
        }

        let team = Team {
            id: state.next_id(),
            tournament_id,
            name: name.to_string(),
            position,
        };
        state.teams.insert(team.id, team.clone());
        Ok(team)
    }

    async fn rename_team(
        &self,
        tournament_id: TournamentId,
        team_id: TeamId,
        name: &str,
    ) -> BracketResult<Team> {
        let mut state = self.state.lock().await;
        let team = state
            .teams
            .get_mut(&team_id)
            .filter(|t| t.tournament_id == tournament_id)
            .ok_or(BracketError::TeamNotFound(team_id))?;
        team.name = name.to_string();
        Ok(team.clone())
    }

    async fn delete_team(
        &self,
        tournament_id: TournamentId,
        team_id: TeamId,
    ) -> BracketResult<()> {
        let mut state = self.state.lock().await;
        state.require_setup(tournament_id)?;

        match state.teams.get(&team_id) {
            Some(team) if team.tournament_id == tournament_id => {}
            _ => return Err(BracketError::TeamNotFound(team_id)),
        }
        state.teams.remove(&team_id);

        for player in state.players.values_mut() {
            if player.team_id == Some(team_id) {
                player.team_id = None;
            }
        }
        Ok(())
    }

    async fn load_teams(&self, tournament_id: TournamentId) -> BracketResult<Vec<Team>> {
        let state = self.state.lock().await;
        let mut teams: Vec<Team> = state.teams_of(tournament_id).cloned().collect();
        teams.sort_by_key(|t| t.position);
        Ok(teams)
    }

    async fn insert_player(
        &self,
        tournament_id: TournamentId,
        name: &str,
    ) -> BracketResult<Player> {
        let mut state = self.state.lock().await;
        if !state.tournaments.contains_key(&tournament_id) {
            return Err(BracketError::TournamentNotFound(tournament_id));
        }

        let player = Player {
            id: state.next_id(),
            tournament_id,
            name: name.to_string(),
            team_id: None,
        };
        state.players.insert(player.id, player.clone());
        Ok(player)
    }

    async fn load_players(&self, tournament_id: TournamentId) -> BracketResult<Vec<Player>> {
        let state = self.state.lock().await;
        Ok(state
            .players
            .values()
            .filter(|p| p.tournament_id == tournament_id)
            .cloned()
            .collect())
    }

    async fn assign_players(
        &self,
        tournament_id: TournamentId,
        assignments: &[(PlayerId, Option<TeamId>)],
    ) -> BracketResult<()> {
        let mut state = self.state.lock().await;

        // Validate everything first so a failure writes nothing
        for &(player_id, team_id) in assignments {
            match state.players.get(&player_id) {
                Some(p) if p.tournament_id == tournament_id => {}
                _ => return Err(BracketError::PlayerNotFound(player_id)),
            }
            if let Some(team_id) = team_id {
                match state.teams.get(&team_id) {
                    Some(t) if t.tournament_id == tournament_id => {}
                    _ => return Err(BracketError::TeamNotFound(team_id)),
                }
            }
        }

        for &(player_id, team_id) in assignments {
            if let Some(player) = state.players.get_mut(&player_id) {
                player.team_id = team_id;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl MatchRepository for MemoryStore {
    async fn load_matches(&self, tournament_id: TournamentId) -> BracketResult<Vec<Match>> {
        let state = self.state.lock().await;
        let mut matches: Vec<Match> = state
            .matches
            .values()
            .filter(|m| m.tournament_id == tournament_id)
            .cloned()
            .collect();
        matches.sort_by_key(Match::key);
        Ok(matches)
    }

    async fn save_matches(
        &self,
        tournament_id: TournamentId,
        plan: BracketPlan,
        roster: &[Team],
        matches: &[NewMatch],
    ) -> BracketResult<Vec<Match>> {
        let mut state = self.state.lock().await;

        let tournament = state
            .tournaments
            .get(&tournament_id)
            .ok_or(BracketError::TournamentNotFound(tournament_id))?;
        if tournament.state != TournamentState::Setup
            || state.matches.values().any(|m| m.tournament_id == tournament_id)
        {
            return Err(BracketError::AlreadyBuilt(tournament_id));
        }
        let stored: Vec<Team> = state.teams_of(tournament_id).cloned().collect();
        if !same_seeding(&stored, roster) {
            return Err(BracketError::RosterChanged);
        }

        let mut saved = Vec::with_capacity(matches.len());
        for m in matches {
            let id = state.next_id();
            saved.push(Match::from_parts(id, tournament_id, m.key, m.pairing.clone())?);
        }
        for m in &saved {
            state.matches.insert(m.id, m.clone());
        }

        let tournament = state.tournament_mut(tournament_id)?;
        tournament.state = TournamentState::InProgress;
        tournament.plan = Some(plan);

        Ok(saved)
    }

    async fn update_matches(
        &self,
        tournament_id: TournamentId,
        changes: &[MatchChange],
        transition: StateTransition,
    ) -> BracketResult<()> {
        let mut state = self.state.lock().await;
        if state.tournament_mut(tournament_id)?.state != transition.from {
            return stale_state(changes);
        }

        for change in changes {
            let current = state
                .matches
                .get(&change.id)
                .filter(|m| m.tournament_id == tournament_id)
                .ok_or(BracketError::MatchNotFound(change.id))?;
            if change.conflicts_with(&current.pairing()) {
                return Err(BracketError::SlotAlreadyFilled(change.key));
            }
        }

        for change in changes {
            if let Some(current) = state.matches.get_mut(&change.id) {
                let mut pairing = current.pairing();
                change.apply(&mut pairing);
                *current = Match::from_parts(current.id, tournament_id, change.key, pairing)?;
            }
        }

        state.tournament_mut(tournament_id)?.state = transition.to;
        Ok(())
    }

    async fn delete_bracket(&self, tournament_id: TournamentId) -> BracketResult<()> {
        let mut state = self.state.lock().await;
        let tournament = state.tournament_mut(tournament_id)?;
        tournament.state = TournamentState::Setup;
        tournament.plan = None;

        state.matches.retain(|_, m| m.tournament_id != tournament_id);
        Ok(())
    }
}

#[async_trait]
impl AdminRepository for MemoryStore {
    async fn create_admin(&self, username: &str, password_hash: &str) -> AuthResult<Admin> {
        let mut state = self.state.lock().await;
        if state.admins.values().any(|a| a.admin.username == username) {
            return Err(AuthError::UsernameTaken);
        }

        let admin = Admin {
            id: state.next_id(),
            username: username.to_string(),
            is_active: true,
            created_at: Utc::now(),
            last_login: None,
        };
        state.admins.insert(
            admin.id,
            AdminCredentials {
                admin: admin.clone(),
                password_hash: password_hash.to_string(),
            },
        );
        Ok(admin)
    }

    async fn find_by_username(&self, username: &str) -> AuthResult<Option<AdminCredentials>> {
        let state = self.state.lock().await;
        Ok(state
            .admins
            .values()
            .find(|a| a.admin.username == username)
            .cloned())
    }

    async fn update_last_login(&self, admin_id: AdminId) -> AuthResult<()> {
        let mut state = self.state.lock().await;
        if let Some(credentials) = state.admins.get_mut(&admin_id) {
            credentials.admin.last_login = Some(Utc::now());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bracket::{BracketFormat, BracketKind, MatchKey, Pairing};

    const PLAYING: StateTransition = StateTransition {
        from: TournamentState::InProgress,
        to: TournamentState::InProgress,
    };

    /// Tournament with teams A and B, ready to be built
    async fn two_team_tournament(store: &MemoryStore) -> (TournamentId, Vec<Team>) {
        let t = store.create_tournament("Cup").await.unwrap();
        store.insert_team(t.id, "A", None).await.unwrap();
        store.insert_team(t.id, "B", None).await.unwrap();
        (t.id, store.load_teams(t.id).await.unwrap())
    }

    fn two_team_plan() -> BracketPlan {
        BracketPlan {
            format: BracketFormat::Single,
            team_count: 2,
        }
    }

    #[tokio::test]
    async fn test_team_positions_default_to_next_seed() {
        let store = MemoryStore::new();
        let t = store.create_tournament("Cup").await.unwrap();
        store.insert_team(t.id, "A", Some(5)).await.unwrap();
        let b = store.insert_team(t.id, "B", None).await.unwrap();
        assert_eq!(b.position, 6);

        assert!(matches!(
            store.insert_team(t.id, "C", Some(5)).await,
            Err(BracketError::DuplicateSeed(5))
        ));
    }

    #[tokio::test]
    async fn test_second_save_is_already_built() {
        let store = MemoryStore::new();
        let (tid, roster) = two_team_tournament(&store).await;
        let plan = two_team_plan();

        let matches = vec![NewMatch {
            key: MatchKey::new(BracketKind::Winners, 1, 0),
            pairing: Pairing::default(),
        }];
        store.save_matches(tid, plan, &roster, &matches).await.unwrap();
        assert!(matches!(
            store.save_matches(tid, plan, &roster, &matches).await,
            Err(BracketError::AlreadyBuilt(_))
        ));

        let stored = store.find_tournament(tid).await.unwrap().unwrap();
        assert_eq!(stored.state, TournamentState::InProgress);
        assert_eq!(stored.plan, Some(plan));
    }

    #[tokio::test]
    async fn test_stale_change_is_rejected_without_partial_write() {
        let store = MemoryStore::new();
        let (tid, roster) = two_team_tournament(&store).await;
        let key = MatchKey::new(BracketKind::Winners, 1, 0);
        let saved = store
            .save_matches(
                tid,
                two_team_plan(),
                &roster,
                &[NewMatch { key, pairing: Pairing::default() }],
            )
            .await
            .unwrap();

        let fill = |team| MatchChange {
            id: saved[0].id,
            key,
            before: Pairing::default(),
            after: Pairing {
                team1: Some(team),
                ..Default::default()
            },
        };
        store.update_matches(tid, &[fill(1)], PLAYING).await.unwrap();
        let finishing = StateTransition {
            from: TournamentState::InProgress,
            to: TournamentState::Finished,
        };
        assert!(matches!(
            store.update_matches(tid, &[fill(2)], finishing).await,
            Err(BracketError::SlotAlreadyFilled(_))
        ));

        let stored = store.find_tournament(tid).await.unwrap().unwrap();
        assert_eq!(stored.state, TournamentState::InProgress);
        assert_eq!(store.load_matches(tid).await.unwrap()[0].team1, Some(1));
    }

    #[tokio::test]
    async fn test_change_computed_against_old_state_is_rejected() {
        let store = MemoryStore::new();
        let (tid, roster) = two_team_tournament(&store).await;
        let key = MatchKey::new(BracketKind::Winners, 1, 0);
        let saved = store
            .save_matches(
                tid,
                two_team_plan(),
                &roster,
                &[NewMatch { key, pairing: Pairing::default() }],
            )
            .await
            .unwrap();

        // Another writer finishes the tournament first
        let seat = MatchChange {
            id: saved[0].id,
            key,
            before: Pairing::default(),
            after: Pairing {
                team1: Some(roster[0].id),
                ..Default::default()
            },
        };
        let finish = StateTransition {
            from: TournamentState::InProgress,
            to: TournamentState::Finished,
        };
        store.update_matches(tid, &[seat.clone()], finish).await.unwrap();

        // A score-only change set computed while still in progress must not reopen it
        let rescore = MatchChange {
            before: seat.after.clone(),
            after: Pairing {
                team1_score: 4,
                ..seat.after.clone()
            },
            ..seat
        };
        assert!(matches!(
            store.update_matches(tid, &[rescore], PLAYING).await,
            Err(BracketError::SlotAlreadyFilled(_))
        ));
        let stored = store.find_tournament(tid).await.unwrap().unwrap();
        assert_eq!(stored.state, TournamentState::Finished);
        assert_eq!(store.load_matches(tid).await.unwrap()[0].team1_score, 0);

        // Nothing to write: the stored state stands
        store.update_matches(tid, &[], PLAYING).await.unwrap();
        let stored = store.find_tournament(tid).await.unwrap().unwrap();
        assert_eq!(stored.state, TournamentState::Finished);
    }

    #[tokio::test]
    async fn test_save_rejects_swapped_roster_of_same_size() {
        let store = MemoryStore::new();
        let (tid, roster) = two_team_tournament(&store).await;

        // Roster read, then A replaced by C before the commit
        store.delete_team(tid, roster[0].id).await.unwrap();
        store.insert_team(tid, "C", None).await.unwrap();

        let matches = vec![NewMatch {
            key: MatchKey::new(BracketKind::Winners, 1, 0),
            pairing: Pairing {
                team1: Some(roster[0].id),
                team2: Some(roster[1].id),
                ..Default::default()
            },
        }];
        assert!(matches!(
            store.save_matches(tid, two_team_plan(), &roster, &matches).await,
            Err(BracketError::RosterChanged)
        ));
        assert!(store.load_matches(tid).await.unwrap().is_empty());
        let stored = store.find_tournament(tid).await.unwrap().unwrap();
        assert_eq!(stored.state, TournamentState::Setup);
        assert_eq!(stored.plan, None);
    }

    #[tokio::test]
    async fn test_roster_locked_after_build() {
        let store = MemoryStore::new();
        let (tid, roster) = two_team_tournament(&store).await;
        let a = &roster[0];
        store.save_matches(tid, two_team_plan(), &roster, &[]).await.unwrap();

        assert!(matches!(
            store.delete_team(tid, a.id).await,
            Err(BracketError::TournamentLocked(_))
        ));
        store.rename_team(tid, a.id, "Renamed").await.unwrap();

        store.delete_bracket(tid).await.unwrap();
        store.delete_team(tid, a.id).await.unwrap();
    }
}
