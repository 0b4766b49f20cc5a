//! Bracket error types.

use std::time::Duration;
use thiserror::Error;

use super::models::{MatchId, MatchKey, PlayerId, TeamId, TournamentId};
use crate::db::timeouts::TimeoutError;

/// Bracket errors
#[derive(Debug, Error)]
pub enum BracketError {
    /// Team count outside the supported range
    #[error("Invalid team count {count}: need between {min} and {max} teams")]
    InvalidTeamCount { count: usize, min: usize, max: usize },

    /// Bracket already exists for this tournament
    #[error("Bracket already built for tournament {0}")]
    AlreadyBuilt(TournamentId),

    /// No bracket yet
    #[error("Bracket not built for tournament {0}")]
    NotBuilt(TournamentId),

    /// Results must have a winner
    #[error("Tied scores are not allowed")]
    TiedScoreNotAllowed,

    /// Changing the winner would rewrite matches that already have the old result
    #[error("Result of {0} already advanced into later matches")]
    ResultAlreadyCascaded(MatchKey),

    /// Target slot already holds a different team
    #[error("Slot in {0} is already filled")]
    SlotAlreadyFilled(MatchKey),

    /// Match does not have both teams yet
    #[error("Match {0} is not ready: both teams must be known")]
    MatchNotReady(MatchKey),

    /// Match not found
    #[error("Match {0} not found")]
    MatchNotFound(MatchId),

    /// Team not found
    #[error("Team {0} not found")]
    TeamNotFound(TeamId),

    /// Player not found
    #[error("Player {0} not found")]
    PlayerNotFound(PlayerId),

    /// Tournament not found
    #[error("Tournament {0} not found")]
    TournamentNotFound(TournamentId),

    /// Two teams claim the same seed
    #[error("Seed position {0} is already taken")]
    DuplicateSeed(u32),

    /// Roster can only change before the bracket is built
    #[error("Tournament {0} is locked: bracket already built")]
    TournamentLocked(TournamentId),

    /// Roster changed while the bracket was being built
    #[error("Roster changed while building the bracket, try again")]
    RosterChanged,

    /// Invalid name or seed position
    #[error("Invalid input: {0}")]
    InvalidName(String),

    /// Scores must be non-negative
    #[error("Invalid score {0}: scores must be non-negative")]
    InvalidScore(i64),

    /// Wheel needs at least one team
    #[error("No teams to assign players to")]
    NoTeams,

    /// Wheel has nobody left to assign
    #[error("All players are already assigned")]
    NoUnassignedPlayers,

    /// Stored data violates bracket invariants
    #[error("Invalid bracket record: {0}")]
    InvalidRecord(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Database operation timed out
    #[error("Database operation timed out after {0:?}")]
    Timeout(Duration),
}

impl From<TimeoutError> for BracketError {
    fn from(err: TimeoutError) -> Self {
        match err {
            TimeoutError::Timeout(duration) => BracketError::Timeout(duration),
            TimeoutError::Database(e) => BracketError::Database(e),
        }
    }
}

impl BracketError {
    /// Get a client-safe error message
    ///
    /// Database and stored-record errors are sanitized; everything else
    /// describes a caller mistake and is safe to expose.
    pub fn client_message(&self) -> String {
        match self {
            BracketError::Database(_)
            | BracketError::Timeout(_)
            | BracketError::InvalidRecord(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

/// Result type for bracket operations
pub type BracketResult<T> = Result<T, BracketError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bracket::models::BracketKind;

    #[test]
    fn test_client_message_hides_database_details() {
        let err = BracketError::Database(sqlx::Error::RowNotFound);
        assert_eq!(err.client_message(), "Internal server error");
    }

    #[test]
    fn test_client_message_names_the_match() {
        let key = MatchKey::new(BracketKind::Winners, 1, 0);
        let msg = BracketError::ResultAlreadyCascaded(key).client_message();
        assert!(msg.contains("winners round 1 #1"));
    }

    #[test]
    fn test_timeout_conversion() {
        let err: BracketError = TimeoutError::Timeout(Duration::from_secs(5)).into();
        assert!(matches!(err, BracketError::Timeout(_)));
    }
}
