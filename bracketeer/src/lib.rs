//! # Bracketeer
//!
//! Tournament bracket management: rosters, seeding, and single or double
//! elimination brackets that advance deterministically as results come in.
//!
//! ## Architecture
//!
//! The bracket tree is never stored. Only the match rows are persisted; every
//! feeder edge is derived from the tournament's `(format, team_count)` plan by
//! [`bracket::Layout`]. Building a bracket and reporting a result both run as
//! pure computations over an in-memory [`bracket::Sheet`], and the resulting
//! change set is committed atomically by a repository.
//!
//! ## Core Modules
//!
//! - [`bracket`]: models, builder, progression engine, query projection, events
//! - [`roster`]: random player-to-team wheel
//! - [`auth`]: admin accounts and JWT access tokens
//! - [`db`]: PostgreSQL pool, repositories, and the in-memory store
//!
//! ## Example
//!
//! ```
//! use bracketeer::bracket::{build, BracketFormat, BracketKind, Team};
//!
//! let teams: Vec<Team> = ["A", "B", "C", "D"]
//!     .iter()
//!     .enumerate()
//!     .map(|(i, name)| Team::new(i as i64 + 1, 1, name, i as u32 + 1).unwrap())
//!     .collect();
//!
//! let matches = build(&teams, BracketFormat::Single).unwrap();
//! let first_round = matches
//!     .iter()
//!     .filter(|m| m.key.bracket == BracketKind::Winners && m.key.round == 1)
//!     .count();
//! assert_eq!(first_round, 2);
//! ```

/// Admin authentication.
pub mod auth;

/// Bracket construction, progression, and queries.
pub mod bracket;

/// Storage backends.
pub mod db;

/// Roster tools.
pub mod roster;

pub use bracket::{
    BracketError, BracketEvent, BracketEvents, BracketFormat, BracketManager, BracketResult,
    BracketView,
};
