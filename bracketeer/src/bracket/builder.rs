//! Bracket builder: teams in, initial match set out.

use std::collections::BTreeSet;

use super::errors::{BracketError, BracketResult};
use super::layout::Layout;
use super::models::{BracketFormat, BracketKind, MatchKey, NewMatch, Side, Slot, Team};
use super::progression::Sheet;

/// Build every match of a new bracket.
///
/// Teams are seeded by `position`. Round-1 pairings follow standard seeding
/// and byes are advanced immediately, so the returned set already contains
/// the walkover results. Matches are returned winners first, then losers,
/// then grand final, each by round and position.
///
/// # Errors
///
/// - `InvalidTeamCount` for fewer than two or more than `MAX_TEAMS` teams
/// - `DuplicateSeed` if two teams share a position
pub fn build(teams: &[Team], format: BracketFormat) -> BracketResult<Vec<NewMatch>> {
    let layout = Layout::new(format, teams.len())?;

    let mut seeded: Vec<&Team> = teams.iter().collect();
    seeded.sort_by_key(|team| team.position);

    let mut seen = BTreeSet::new();
    for team in &seeded {
        if !seen.insert(team.position) {
            return Err(BracketError::DuplicateSeed(team.position));
        }
    }

    let mut sheet = Sheet::empty(&layout);
    for position in 0..layout.matches_in_round(BracketKind::Winners, 1) {
        let key = MatchKey::new(BracketKind::Winners, 1, position);
        for side in [Side::Team1, Side::Team2] {
            let seed = layout.seed_at(position, side);
            if let Some(team) = seeded.get(seed - 1) {
                sheet.seat(Slot::new(key, side), team.id)?;
            }
        }
    }

    Ok(sheet
        .into_pairings()
        .into_iter()
        .map(|(key, pairing)| NewMatch { key, pairing })
        .collect())
}
