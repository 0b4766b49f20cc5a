//! Bracket data models: tournaments, teams, players and matches.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::errors::{BracketError, BracketResult};

/// Tournament ID type
pub type TournamentId = i64;

/// Team ID type
pub type TeamId = i64;

/// Player ID type
pub type PlayerId = i64;

/// Match ID type
pub type MatchId = i64;

/// Maximum length of tournament, team and player names
pub const MAX_NAME_LEN: usize = 64;

/// Elimination format of a bracket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BracketFormat {
    /// One loss and a team is out
    Single,
    /// Winners and losers brackets joined by a grand final
    Double,
}

impl BracketFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            BracketFormat::Single => "single",
            BracketFormat::Double => "double",
        }
    }
}

impl FromStr for BracketFormat {
    type Err = BracketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "single" => Ok(BracketFormat::Single),
            "double" => Ok(BracketFormat::Double),
            other => Err(BracketError::InvalidRecord(format!(
                "unknown bracket format '{other}'"
            ))),
        }
    }
}

/// Tournament lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TournamentState {
    /// Roster is open, no bracket yet
    Setup,
    /// Bracket built, results being reported
    InProgress,
    /// Champion decided
    Finished,
}

impl TournamentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TournamentState::Setup => "setup",
            TournamentState::InProgress => "in_progress",
            TournamentState::Finished => "finished",
        }
    }
}

impl FromStr for TournamentState {
    type Err = BracketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "setup" => Ok(TournamentState::Setup),
            "in_progress" => Ok(TournamentState::InProgress),
            "finished" => Ok(TournamentState::Finished),
            other => Err(BracketError::InvalidRecord(format!(
                "unknown tournament state '{other}'"
            ))),
        }
    }
}

/// Which elimination tree a match belongs to.
///
/// Declaration order is the display order: winners, losers, grand final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BracketKind {
    #[serde(rename = "winners")]
    Winners,
    #[serde(rename = "losers")]
    Losers,
    #[serde(rename = "grand-final")]
    GrandFinal,
}

impl BracketKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BracketKind::Winners => "winners",
            BracketKind::Losers => "losers",
            BracketKind::GrandFinal => "grand-final",
        }
    }
}

impl FromStr for BracketKind {
    type Err = BracketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "winners" => Ok(BracketKind::Winners),
            "losers" => Ok(BracketKind::Losers),
            "grand-final" => Ok(BracketKind::GrandFinal),
            other => Err(BracketError::InvalidRecord(format!(
                "unknown bracket '{other}'"
            ))),
        }
    }
}

/// One of the two team slots of a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Team1,
    Team2,
}

impl Side {
    /// Side for an upstream match at `position`: even feeds team1, odd feeds team2
    pub fn from_position(position: u32) -> Self {
        if position % 2 == 0 {
            Side::Team1
        } else {
            Side::Team2
        }
    }

    pub fn other(self) -> Self {
        match self {
            Side::Team1 => Side::Team2,
            Side::Team2 => Side::Team1,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Team1 => write!(f, "team1"),
            Side::Team2 => write!(f, "team2"),
        }
    }
}

/// Structural address of a match: bracket, 1-based round, 0-based position
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MatchKey {
    pub bracket: BracketKind,
    pub round: u32,
    pub position: u32,
}

impl MatchKey {
    pub fn new(bracket: BracketKind, round: u32, position: u32) -> Self {
        Self {
            bracket,
            round,
            position,
        }
    }
}

impl fmt::Display for MatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} round {} #{}",
            self.bracket.as_str(),
            self.round,
            self.position + 1
        )
    }
}

/// A team slot of a specific match
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Slot {
    pub key: MatchKey,
    pub side: Side,
}

impl Slot {
    pub fn new(key: MatchKey, side: Side) -> Self {
        Self { key, side }
    }
}

/// Mutable part of a match: who plays, who won, and the score.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pairing {
    pub team1: Option<TeamId>,
    pub team2: Option<TeamId>,
    pub winner: Option<TeamId>,
    pub team1_score: u32,
    pub team2_score: u32,
}

impl Pairing {
    pub fn team(&self, side: Side) -> Option<TeamId> {
        match side {
            Side::Team1 => self.team1,
            Side::Team2 => self.team2,
        }
    }

    pub fn set_team(&mut self, side: Side, team: Option<TeamId>) {
        match side {
            Side::Team1 => self.team1 = team,
            Side::Team2 => self.team2 = team,
        }
    }

    /// Side the winner occupies, if decided
    pub fn winning_side(&self) -> Option<Side> {
        let winner = self.winner?;
        if self.team1 == Some(winner) {
            Some(Side::Team1)
        } else if self.team2 == Some(winner) {
            Some(Side::Team2)
        } else {
            None
        }
    }

    /// Both teams are known
    pub fn is_ready(&self) -> bool {
        self.team1.is_some() && self.team2.is_some()
    }

    /// `winner`, when set, must be one of the two teams
    pub fn validate(&self) -> BracketResult<()> {
        match self.winner {
            Some(_) if self.winning_side().is_none() => Err(BracketError::InvalidRecord(
                "winner is neither team1 nor team2".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

/// Bracket parameters recorded when the bracket is built.
///
/// The whole match tree, including every feeder edge, is derived from these
/// two values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BracketPlan {
    pub format: BracketFormat,
    pub team_count: u32,
}

/// Tournament state change committed together with a result.
///
/// `from` is the state the change set was computed against; storage rejects
/// the commit when the stored state has moved on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateTransition {
    pub from: TournamentState,
    pub to: TournamentState,
}

/// Tournament information
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tournament {
    pub id: TournamentId,
    pub name: String,
    pub state: TournamentState,
    /// Set once the bracket is built
    pub plan: Option<BracketPlan>,
    pub created_at: DateTime<Utc>,
}

/// Team with its seed rank
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    pub tournament_id: TournamentId,
    pub name: String,
    /// 1-based seed rank, unique within the tournament
    pub position: u32,
}

impl Team {
    /// Create a team, validating name and position
    pub fn new(
        id: TeamId,
        tournament_id: TournamentId,
        name: &str,
        position: u32,
    ) -> BracketResult<Self> {
        let name = validate_name(name)?;
        validate_position(position)?;

        Ok(Self {
            id,
            tournament_id,
            name,
            position,
        })
    }
}

/// True when both rosters seed the same teams at the same positions.
///
/// Names are ignored since teams may be renamed at any time.
pub fn same_seeding(left: &[Team], right: &[Team]) -> bool {
    let seeds = |teams: &[Team]| {
        let mut seeds: Vec<(u32, TeamId)> = teams.iter().map(|t| (t.position, t.id)).collect();
        seeds.sort_unstable();
        seeds
    };
    seeds(left) == seeds(right)
}

/// Roster entry; players are distributed over teams manually or by the wheel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub tournament_id: TournamentId,
    pub name: String,
    pub team_id: Option<TeamId>,
}

/// Persisted match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    pub id: MatchId,
    pub tournament_id: TournamentId,
    pub bracket: BracketKind,
    pub round: u32,
    pub position: u32,
    pub team1: Option<TeamId>,
    pub team2: Option<TeamId>,
    pub winner: Option<TeamId>,
    pub team1_score: u32,
    pub team2_score: u32,
}

impl Match {
    /// Assemble a match from its key and pairing, enforcing the winner invariant
    pub fn from_parts(
        id: MatchId,
        tournament_id: TournamentId,
        key: MatchKey,
        pairing: Pairing,
    ) -> BracketResult<Self> {
        if key.round == 0 {
            return Err(BracketError::InvalidRecord(format!(
                "match {id} has round 0"
            )));
        }
        pairing.validate()?;

        Ok(Self {
            id,
            tournament_id,
            bracket: key.bracket,
            round: key.round,
            position: key.position,
            team1: pairing.team1,
            team2: pairing.team2,
            winner: pairing.winner,
            team1_score: pairing.team1_score,
            team2_score: pairing.team2_score,
        })
    }

    pub fn key(&self) -> MatchKey {
        MatchKey::new(self.bracket, self.round, self.position)
    }

    pub fn pairing(&self) -> Pairing {
        Pairing {
            team1: self.team1,
            team2: self.team2,
            winner: self.winner,
            team1_score: self.team1_score,
            team2_score: self.team2_score,
        }
    }
}

/// Match produced by the builder, not yet persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMatch {
    pub key: MatchKey,
    pub pairing: Pairing,
}

/// Update of one persisted match, carrying the state it was computed from.
///
/// Only fields that differ between `before` and `after` are written, and each
/// of them only if the stored value still equals `before`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchChange {
    pub id: MatchId,
    pub key: MatchKey,
    pub before: Pairing,
    pub after: Pairing,
}

impl MatchChange {
    pub fn team1_changed(&self) -> bool {
        self.before.team1 != self.after.team1
    }

    pub fn team2_changed(&self) -> bool {
        self.before.team2 != self.after.team2
    }

    pub fn winner_changed(&self) -> bool {
        self.before.winner != self.after.winner
    }

    pub fn scores_changed(&self) -> bool {
        self.before.team1_score != self.after.team1_score
            || self.before.team2_score != self.after.team2_score
    }

    /// Whether `current` no longer matches the pre-image on a changed field
    pub fn conflicts_with(&self, current: &Pairing) -> bool {
        (self.team1_changed() && current.team1 != self.before.team1)
            || (self.team2_changed() && current.team2 != self.before.team2)
            || (self.winner_changed() && current.winner != self.before.winner)
    }

    /// Write the changed fields into `current`
    pub fn apply(&self, current: &mut Pairing) {
        if self.team1_changed() {
            current.team1 = self.after.team1;
        }
        if self.team2_changed() {
            current.team2 = self.after.team2;
        }
        if self.winner_changed() {
            current.winner = self.after.winner;
        }
        if self.scores_changed() {
            current.team1_score = self.after.team1_score;
            current.team2_score = self.after.team2_score;
        }
    }
}

/// Result of a reported match as committed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportOutcome {
    /// The reported match after the update
    pub updated: Match,
    pub state: TournamentState,
    pub champion: Option<TeamId>,
}

/// Trim and validate a tournament, team or player name
pub fn validate_name(name: &str) -> BracketResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(BracketError::InvalidName("name must not be empty".to_string()));
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(BracketError::InvalidName(format!(
            "name must be at most {MAX_NAME_LEN} characters"
        )));
    }
    Ok(trimmed.to_string())
}

/// Seed positions are 1-based
pub fn validate_position(position: u32) -> BracketResult<()> {
    if position == 0 {
        return Err(BracketError::InvalidName(
            "seed position must be 1 or greater".to_string(),
        ));
    }
    Ok(())
}
