//! Repository trait definitions for testability and dependency injection.
//!
//! This module provides trait-based abstractions over database operations.
//! The PostgreSQL implementations live here; [`super::MemoryStore`] implements
//! the same traits for tests and database-less deployments.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};

use super::timeouts::{DEFAULT_TRANSACTION_TIMEOUT, TimeoutError, bounded, with_default_timeout};
use crate::auth::{Admin, AdminCredentials, AdminId, AuthError, AuthResult};
use crate::bracket::{
    BracketError, BracketPlan, BracketResult, Match, MatchChange, MatchKey, NewMatch, Pairing,
    Player, PlayerId, StateTransition, Team, TeamId, Tournament, TournamentId, TournamentState,
    same_seeding,
};

/// Trait for tournament, team and player storage
#[async_trait]
pub trait TournamentRepository: Send + Sync {
    /// Create a tournament in `setup`
    async fn create_tournament(&self, name: &str) -> BracketResult<Tournament>;

    /// Find tournament by ID
    async fn find_tournament(&self, id: TournamentId) -> BracketResult<Option<Tournament>>;

    /// All tournaments, newest first
    async fn list_tournaments(&self) -> BracketResult<Vec<Tournament>>;

    /// Add a team while the tournament is in `setup`.
    ///
    /// Without an explicit position the team takes the next free seed.
    async fn insert_team(
        &self,
        tournament_id: TournamentId,
        name: &str,
        position: Option<u32>,
    ) -> BracketResult<Team>;

    /// Rename a team; allowed in every state
    async fn rename_team(
        &self,
        tournament_id: TournamentId,
        team_id: TeamId,
        name: &str,
    ) -> BracketResult<Team>;

    /// Remove a team while the tournament is in `setup`
    async fn delete_team(&self, tournament_id: TournamentId, team_id: TeamId)
    -> BracketResult<()>;

    /// Teams ordered by position
    async fn load_teams(&self, tournament_id: TournamentId) -> BracketResult<Vec<Team>>;

    /// Add a roster entry
    async fn insert_player(&self, tournament_id: TournamentId, name: &str)
    -> BracketResult<Player>;

    /// Roster ordered by ID
    async fn load_players(&self, tournament_id: TournamentId) -> BracketResult<Vec<Player>>;

    /// Set or clear the team of several players at once
    async fn assign_players(
        &self,
        tournament_id: TournamentId,
        assignments: &[(PlayerId, Option<TeamId>)],
    ) -> BracketResult<()>;
}

/// Trait for match storage
#[async_trait]
pub trait MatchRepository: Send + Sync {
    /// Matches ordered by bracket, round and position
    async fn load_matches(&self, tournament_id: TournamentId) -> BracketResult<Vec<Match>>;

    /// Persist a freshly built bracket and record its plan.
    ///
    /// `roster` is the team list the bracket was built from; the commit only
    /// goes through if the stored roster still seeds the same teams.
    ///
    /// # Errors
    ///
    /// * `AlreadyBuilt` - the tournament already has matches
    /// * `RosterChanged` - a team was added, removed or reseeded since `roster` was read
    async fn save_matches(
        &self,
        tournament_id: TournamentId,
        plan: BracketPlan,
        roster: &[Team],
        matches: &[NewMatch],
    ) -> BracketResult<Vec<Match>>;

    /// Apply a change set atomically and move the tournament state.
    ///
    /// # Errors
    ///
    /// * `SlotAlreadyFilled` - a changed field no longer holds its pre-image,
    ///   or the stored state is no longer `transition.from`
    async fn update_matches(
        &self,
        tournament_id: TournamentId,
        changes: &[MatchChange],
        transition: StateTransition,
    ) -> BracketResult<()>;

    /// Delete every match and return the tournament to `setup`
    async fn delete_bracket(&self, tournament_id: TournamentId) -> BracketResult<()>;
}

/// Trait for admin account storage
#[async_trait]
pub trait AdminRepository: Send + Sync {
    /// Create an admin account
    async fn create_admin(&self, username: &str, password_hash: &str) -> AuthResult<Admin>;

    /// Find admin by username, including the password hash
    async fn find_by_username(&self, username: &str) -> AuthResult<Option<AdminCredentials>>;

    /// Update admin's last login timestamp
    async fn update_last_login(&self, admin_id: AdminId) -> AuthResult<()>;
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// Outcome of a commit whose snapshot state was overtaken by another writer.
///
/// An empty change set has nothing left to write; anything else loses the race.
pub(crate) fn stale_state(changes: &[MatchChange]) -> BracketResult<()> {
    match changes.first() {
        Some(change) => Err(BracketError::SlotAlreadyFilled(change.key)),
        None => Ok(()),
    }
}

fn to_u32(value: i32, column: &str) -> BracketResult<u32> {
    u32::try_from(value)
        .map_err(|_| BracketError::InvalidRecord(format!("{column} out of range: {value}")))
}

fn to_i32(value: u32) -> BracketResult<i32> {
    i32::try_from(value).map_err(|_| BracketError::InvalidScore(i64::from(value)))
}

fn tournament_from_row(row: &PgRow) -> BracketResult<Tournament> {
    let state: String = row.try_get("state")?;
    let format: Option<String> = row.try_get("bracket_format")?;
    let team_count: Option<i32> = row.try_get("bracket_teams")?;

    let plan = match (format, team_count) {
        (Some(format), Some(count)) => Some(BracketPlan {
            format: format.parse()?,
            team_count: to_u32(count, "bracket_teams")?,
        }),
        _ => None,
    };

    Ok(Tournament {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        state: state.parse()?,
        plan,
        created_at: row.try_get::<chrono::NaiveDateTime, _>("created_at")?.and_utc(),
    })
}

fn team_from_row(row: &PgRow) -> BracketResult<Team> {
    Ok(Team {
        id: row.try_get("id")?,
        tournament_id: row.try_get("tournament_id")?,
        name: row.try_get("name")?,
        position: to_u32(row.try_get("position")?, "position")?,
    })
}

fn player_from_row(row: &PgRow) -> BracketResult<Player> {
    Ok(Player {
        id: row.try_get("id")?,
        tournament_id: row.try_get("tournament_id")?,
        name: row.try_get("name")?,
        team_id: row.try_get("team_id")?,
    })
}

fn match_from_row(row: &PgRow) -> BracketResult<Match> {
    let bracket: String = row.try_get("bracket")?;
    let key = MatchKey::new(
        bracket.parse()?,
        to_u32(row.try_get("round")?, "round")?,
        to_u32(row.try_get("position")?, "position")?,
    );
    let pairing = Pairing {
        team1: row.try_get("team1_id")?,
        team2: row.try_get("team2_id")?,
        winner: row.try_get("winner_id")?,
        team1_score: to_u32(row.try_get("team1_score")?, "team1_score")?,
        team2_score: to_u32(row.try_get("team2_score")?, "team2_score")?,
    };

    Match::from_parts(row.try_get("id")?, row.try_get("tournament_id")?, key, pairing)
}

const TOURNAMENT_COLUMNS: &str = "id, name, state, bracket_format, bracket_teams, created_at";
const MATCH_COLUMNS: &str = "id, tournament_id, bracket, round, position, team1_id, team2_id, \
                             winner_id, team1_score, team2_score";

/// Lock the tournament row for the rest of the transaction and return its state
async fn lock_tournament(
    tx: &mut Transaction<'_, Postgres>,
    tournament_id: TournamentId,
) -> BracketResult<TournamentState> {
    let row = sqlx::query("SELECT state FROM tournaments WHERE id = $1 FOR UPDATE")
        .bind(tournament_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(BracketError::TournamentNotFound(tournament_id))?;

    let state: String = row.try_get("state")?;
    state.parse()
}

async fn lock_setup_tournament(
    tx: &mut Transaction<'_, Postgres>,
    tournament_id: TournamentId,
) -> BracketResult<()> {
    match lock_tournament(tx, tournament_id).await? {
        TournamentState::Setup => Ok(()),
        _ => Err(BracketError::TournamentLocked(tournament_id)),
    }
}

/// PostgreSQL implementation of `TournamentRepository`
#[derive(Clone)]
pub struct PgTournamentRepository {
    pool: PgPool,
}

impl PgTournamentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert_team_tx(
        &self,
        tournament_id: TournamentId,
        name: &str,
        position: Option<u32>,
    ) -> BracketResult<Team> {
        let mut tx = self.pool.begin().await?;
        lock_setup_tournament(&mut tx, tournament_id).await?;

        let position = match position {
            Some(position) => position,
            None => {
                let row = sqlx::query(
                    "SELECT COALESCE(MAX(position), 0) + 1 AS next FROM teams WHERE tournament_id = $1",
                )
                .bind(tournament_id)
                .fetch_one(&mut *tx)
                .await?;
                to_u32(row.try_get("next")?, "position")?
            }
        };

        let row = sqlx::query(
            r#"
            INSERT INTO teams (tournament_id, name, position)
            VALUES ($1, $2, $3)
            RETURNING id, tournament_id, name, position
            "#,
        )
        .bind(tournament_id)
        .bind(name)
        .bind(to_i32(position)?)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                BracketError::DuplicateSeed(position)
            } else {
                BracketError::Database(e)
            }
        })?;

        let team = team_from_row(&row)?;
        tx.commit().await?;
        Ok(team)
    }

    async fn delete_team_tx(
        &self,
        tournament_id: TournamentId,
        team_id: TeamId,
    ) -> BracketResult<()> {
        let mut tx = self.pool.begin().await?;
        lock_setup_tournament(&mut tx, tournament_id).await?;

        let result = sqlx::query("DELETE FROM teams WHERE id = $1 AND tournament_id = $2")
            .bind(team_id)
            .bind(tournament_id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(BracketError::TeamNotFound(team_id));
        }

        tx.commit().await?;
        Ok(())
    }

    async fn assign_players_tx(
        &self,
        tournament_id: TournamentId,
        assignments: &[(PlayerId, Option<TeamId>)],
    ) -> BracketResult<()> {
        let mut tx = self.pool.begin().await?;

        for &(player_id, team_id) in assignments {
            let result =
                sqlx::query("UPDATE players SET team_id = $1 WHERE id = $2 AND tournament_id = $3")
                    .bind(team_id)
                    .bind(player_id)
                    .bind(tournament_id)
                    .execute(&mut *tx)
                    .await?;

            if result.rows_affected() == 0 {
                return Err(BracketError::PlayerNotFound(player_id));
            }
        }

        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl TournamentRepository for PgTournamentRepository {
    async fn create_tournament(&self, name: &str) -> BracketResult<Tournament> {
        let sql = format!(
            "INSERT INTO tournaments (name, state) VALUES ($1, 'setup') RETURNING {TOURNAMENT_COLUMNS}"
        );
        let row = with_default_timeout(sqlx::query(&sql).bind(name).fetch_one(&self.pool)).await?;

        tournament_from_row(&row)
    }

    async fn find_tournament(&self, id: TournamentId) -> BracketResult<Option<Tournament>> {
        let sql = format!("SELECT {TOURNAMENT_COLUMNS} FROM tournaments WHERE id = $1");
        let row =
            with_default_timeout(sqlx::query(&sql).bind(id).fetch_optional(&self.pool)).await?;

        row.as_ref().map(tournament_from_row).transpose()
    }

    async fn list_tournaments(&self) -> BracketResult<Vec<Tournament>> {
        let sql = format!(
            "SELECT {TOURNAMENT_COLUMNS} FROM tournaments ORDER BY created_at DESC, id DESC"
        );
        let rows = with_default_timeout(sqlx::query(&sql).fetch_all(&self.pool)).await?;

        rows.iter().map(tournament_from_row).collect()
    }

    async fn insert_team(
        &self,
        tournament_id: TournamentId,
        name: &str,
        position: Option<u32>,
    ) -> BracketResult<Team> {
        bounded(
            DEFAULT_TRANSACTION_TIMEOUT,
            self.insert_team_tx(tournament_id, name, position),
        )
        .await
    }

    async fn rename_team(
        &self,
        tournament_id: TournamentId,
        team_id: TeamId,
        name: &str,
    ) -> BracketResult<Team> {
        let row = with_default_timeout(
            sqlx::query(
                r#"
                UPDATE teams SET name = $1
                WHERE id = $2 AND tournament_id = $3
                RETURNING id, tournament_id, name, position
                "#,
            )
            .bind(name)
            .bind(team_id)
            .bind(tournament_id)
            .fetch_optional(&self.pool),
        )
        .await?
        .ok_or(BracketError::TeamNotFound(team_id))?;

        team_from_row(&row)
    }

    async fn delete_team(
        &self,
        tournament_id: TournamentId,
        team_id: TeamId,
    ) -> BracketResult<()> {
        bounded(
            DEFAULT_TRANSACTION_TIMEOUT,
            self.delete_team_tx(tournament_id, team_id),
        )
        .await
    }

    async fn load_teams(&self, tournament_id: TournamentId) -> BracketResult<Vec<Team>> {
        let rows = with_default_timeout(
            sqlx::query(
                "SELECT id, tournament_id, name, position FROM teams WHERE tournament_id = $1 ORDER BY position",
            )
            .bind(tournament_id)
            .fetch_all(&self.pool),
        )
        .await?;

        rows.iter().map(team_from_row).collect()
    }

    async fn insert_player(
        &self,
        tournament_id: TournamentId,
        name: &str,
    ) -> BracketResult<Player> {
        let row = with_default_timeout(
            sqlx::query(
                r#"
                INSERT INTO players (tournament_id, name)
                VALUES ($1, $2)
                RETURNING id, tournament_id, name, team_id
                "#,
            )
            .bind(tournament_id)
            .bind(name)
            .fetch_one(&self.pool),
        )
        .await?;

        player_from_row(&row)
    }

    async fn load_players(&self, tournament_id: TournamentId) -> BracketResult<Vec<Player>> {
        let rows = with_default_timeout(
            sqlx::query(
                "SELECT id, tournament_id, name, team_id FROM players WHERE tournament_id = $1 ORDER BY id",
            )
            .bind(tournament_id)
            .fetch_all(&self.pool),
        )
        .await?;

        rows.iter().map(player_from_row).collect()
    }

    async fn assign_players(
        &self,
        tournament_id: TournamentId,
        assignments: &[(PlayerId, Option<TeamId>)],
    ) -> BracketResult<()> {
        bounded(
            DEFAULT_TRANSACTION_TIMEOUT,
            self.assign_players_tx(tournament_id, assignments),
        )
        .await
    }
}

/// PostgreSQL implementation of `MatchRepository`
#[derive(Clone)]
pub struct PgMatchRepository {
    pool: PgPool,
}

impl PgMatchRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn save_matches_tx(
        &self,
        tournament_id: TournamentId,
        plan: BracketPlan,
        roster: &[Team],
        matches: &[NewMatch],
    ) -> BracketResult<Vec<Match>> {
        let mut tx = self.pool.begin().await?;
        if lock_tournament(&mut tx, tournament_id).await? != TournamentState::Setup {
            return Err(BracketError::AlreadyBuilt(tournament_id));
        }

        let existing: i64 = sqlx::query("SELECT COUNT(*) AS n FROM matches WHERE tournament_id = $1")
            .bind(tournament_id)
            .fetch_one(&mut *tx)
            .await?
            .try_get("n")?;
        if existing > 0 {
            return Err(BracketError::AlreadyBuilt(tournament_id));
        }

        let stored = sqlx::query(
            "SELECT id, tournament_id, name, position FROM teams WHERE tournament_id = $1",
        )
        .bind(tournament_id)
        .fetch_all(&mut *tx)
        .await?
        .iter()
        .map(team_from_row)
        .collect::<BracketResult<Vec<_>>>()?;
        if !same_seeding(&stored, roster) {
            return Err(BracketError::RosterChanged);
        }

        let insert = format!(
            r#"
            INSERT INTO matches
                (tournament_id, bracket, round, position, team1_id, team2_id,
                 winner_id, team1_score, team2_score)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {MATCH_COLUMNS}
            "#
        );

        let mut saved = Vec::with_capacity(matches.len());
        for m in matches {
            let row = sqlx::query(&insert)
                .bind(tournament_id)
                .bind(m.key.bracket.as_str())
                .bind(to_i32(m.key.round)?)
                .bind(to_i32(m.key.position)?)
                .bind(m.pairing.team1)
                .bind(m.pairing.team2)
                .bind(m.pairing.winner)
                .bind(to_i32(m.pairing.team1_score)?)
                .bind(to_i32(m.pairing.team2_score)?)
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| {
                    if is_unique_violation(&e) {
                        BracketError::AlreadyBuilt(tournament_id)
                    } else {
                        BracketError::Database(e)
                    }
                })?;
            saved.push(match_from_row(&row)?);
        }

        sqlx::query(
            r#"
            UPDATE tournaments
            SET state = 'in_progress', bracket_format = $2, bracket_teams = $3
            WHERE id = $1
            "#,
        )
        .bind(tournament_id)
        .bind(plan.format.as_str())
        .bind(to_i32(plan.team_count)?)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(saved)
    }

    async fn update_matches_tx(
        &self,
        tournament_id: TournamentId,
        changes: &[MatchChange],
        transition: StateTransition,
    ) -> BracketResult<()> {
        let mut tx = self.pool.begin().await?;
        if lock_tournament(&mut tx, tournament_id).await? != transition.from {
            return stale_state(changes);
        }

        for change in changes {
            let result = sqlx::query(
                r#"
                UPDATE matches SET
                    team1_id = CASE WHEN $3 THEN $4 ELSE team1_id END,
                    team2_id = CASE WHEN $5 THEN $6 ELSE team2_id END,
                    winner_id = CASE WHEN $7 THEN $8 ELSE winner_id END,
                    team1_score = CASE WHEN $9 THEN $10 ELSE team1_score END,
                    team2_score = CASE WHEN $9 THEN $11 ELSE team2_score END
                WHERE id = $1 AND tournament_id = $2
                  AND (NOT $3 OR team1_id IS NOT DISTINCT FROM $12)
                  AND (NOT $5 OR team2_id IS NOT DISTINCT FROM $13)
                  AND (NOT $7 OR winner_id IS NOT DISTINCT FROM $14)
                "#,
            )
            .bind(change.id)
            .bind(tournament_id)
            .bind(change.team1_changed())
            .bind(change.after.team1)
            .bind(change.team2_changed())
            .bind(change.after.team2)
            .bind(change.winner_changed())
            .bind(change.after.winner)
            .bind(change.scores_changed())
            .bind(to_i32(change.after.team1_score)?)
            .bind(to_i32(change.after.team2_score)?)
            .bind(change.before.team1)
            .bind(change.before.team2)
            .bind(change.before.winner)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                return Err(BracketError::SlotAlreadyFilled(change.key));
            }
        }

        sqlx::query("UPDATE tournaments SET state = $2 WHERE id = $1")
            .bind(tournament_id)
            .bind(transition.to.as_str())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn delete_bracket_tx(&self, tournament_id: TournamentId) -> BracketResult<()> {
        let mut tx = self.pool.begin().await?;
        lock_tournament(&mut tx, tournament_id).await?;

        sqlx::query("DELETE FROM matches WHERE tournament_id = $1")
            .bind(tournament_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            UPDATE tournaments
            SET state = 'setup', bracket_format = NULL, bracket_teams = NULL
            WHERE id = $1
            "#,
        )
        .bind(tournament_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl MatchRepository for PgMatchRepository {
    async fn load_matches(&self, tournament_id: TournamentId) -> BracketResult<Vec<Match>> {
        let sql = format!("SELECT {MATCH_COLUMNS} FROM matches WHERE tournament_id = $1");
        let rows = with_default_timeout(
            sqlx::query(&sql)
                .bind(tournament_id)
                .fetch_all(&self.pool),
        )
        .await?;

        let mut matches = rows
            .iter()
            .map(match_from_row)
            .collect::<BracketResult<Vec<_>>>()?;
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
        bounded(
            DEFAULT_TRANSACTION_TIMEOUT,
            self.save_matches_tx(tournament_id, plan, roster, matches),
        )
        .await
    }

    async fn update_matches(
        &self,
        tournament_id: TournamentId,
        changes: &[MatchChange],
        transition: StateTransition,
    ) -> BracketResult<()> {
        bounded(
            DEFAULT_TRANSACTION_TIMEOUT,
            self.update_matches_tx(tournament_id, changes, transition),
        )
        .await
    }

    async fn delete_bracket(&self, tournament_id: TournamentId) -> BracketResult<()> {
        bounded(
            DEFAULT_TRANSACTION_TIMEOUT,
            self.delete_bracket_tx(tournament_id),
        )
        .await
    }
}

/// PostgreSQL implementation of `AdminRepository`
#[derive(Clone)]
pub struct PgAdminRepository {
    pool: PgPool,
}

impl PgAdminRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn admin_from_row(row: &PgRow) -> Result<Admin, sqlx::Error> {
    Ok(Admin {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get::<chrono::NaiveDateTime, _>("created_at")?.and_utc(),
        last_login: row
            .try_get::<Option<chrono::NaiveDateTime>, _>("last_login")?
            .map(|dt| dt.and_utc()),
    })
}

#[async_trait]
impl AdminRepository for PgAdminRepository {
    async fn create_admin(&self, username: &str, password_hash: &str) -> AuthResult<Admin> {
        let row = with_default_timeout(
            sqlx::query(
                r#"
                INSERT INTO admins (username, password_hash)
                VALUES ($1, $2)
                RETURNING id, username, is_active, created_at, last_login
                "#,
            )
            .bind(username)
            .bind(password_hash)
            .fetch_one(&self.pool),
        )
        .await
        .map_err(|e| match e {
            TimeoutError::Database(db) if is_unique_violation(&db) => AuthError::UsernameTaken,
            other => other.into(),
        })?;

        Ok(admin_from_row(&row)?)
    }

    async fn find_by_username(&self, username: &str) -> AuthResult<Option<AdminCredentials>> {
        let row = with_default_timeout(
            sqlx::query(
                r#"
                SELECT id, username, password_hash, is_active, created_at, last_login
                FROM admins
                WHERE username = $1
                "#,
            )
            .bind(username)
            .fetch_optional(&self.pool),
        )
        .await?;

        match row {
            Some(row) => Ok(Some(AdminCredentials {
                admin: admin_from_row(&row)?,
                password_hash: row.try_get("password_hash")?,
            })),
            None => Ok(None),
        }
    }

    async fn update_last_login(&self, admin_id: AdminId) -> AuthResult<()> {
        with_default_timeout(
            sqlx::query("UPDATE admins SET last_login = NOW() WHERE id = $1")
                .bind(admin_id)
                .execute(&self.pool),
        )
        .await?;
        Ok(())
    }
}
