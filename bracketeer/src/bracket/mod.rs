//! Single and double elimination brackets.
//!
//! - [`layout`]: bracket shape and feeder edges derived from `(format, team_count)`
//! - [`builder`]: initial match set from a seeded roster
//! - [`progression`]: result reporting and cascading
//! - [`query`]: read-only projection grouped by bracket and round
//! - [`manager`]: async entry point tying these to storage and events

pub mod builder;
pub mod errors;
pub mod events;
pub mod layout;
pub mod manager;
pub mod models;
pub mod progression;
pub mod query;

pub use builder::build;
pub use errors::{BracketError, BracketResult};
pub use events::{BracketEvent, BracketEvents};
pub use layout::{Layout, MAX_TEAMS, MIN_TEAMS};
pub use manager::BracketManager;
pub use models::{
    BracketFormat, BracketKind, BracketPlan, Match, MatchChange, MatchId, MatchKey, NewMatch,
    Pairing, Player, PlayerId, ReportOutcome, Side, Slot, StateTransition, Team, TeamId,
    Tournament, TournamentId, TournamentState, same_seeding,
};
pub use progression::Sheet;
pub use query::{BracketView, MatchStatus, MatchView, RoundView, project};
