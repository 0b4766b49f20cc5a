//! Random player-to-team assignment.

use rand::rngs::StdRng;
use rand::seq::{IndexedRandom, SliceRandom};
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::bracket::{BracketError, BracketResult, Player, PlayerId, Team, TeamId};

/// One player placed on one team
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub player_id: PlayerId,
    pub team_id: TeamId,
}

/// Wheel that balances team sizes
pub struct Wheel<R: Rng = StdRng> {
    rng: R,
}

impl Wheel<StdRng> {
    /// Wheel seeded from the thread-local generator
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_rng(&mut rand::rng()),
        }
    }
}

impl Default for Wheel<StdRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng> Wheel<R> {
    /// Wheel driven by a caller-supplied generator
    pub fn with_rng(rng: R) -> Self {
        Self { rng }
    }

    /// Assign one random unassigned player to a random least-filled team
    ///
    /// # Errors
    ///
    /// * `NoTeams` - there is no team to assign to
    /// * `NoUnassignedPlayers` - every player already has a team
    pub fn spin(&mut self, players: &[Player], teams: &[Team]) -> BracketResult<Assignment> {
        let mut load = team_load(players, teams)?;
        let unassigned = unassigned(players, &load)?;

        let player_id = *unassigned
            .choose(&mut self.rng)
            .ok_or(BracketError::NoUnassignedPlayers)?;
        let team_id = self.pick_team(&mut load)?;

        Ok(Assignment { player_id, team_id })
    }

    /// Assign every unassigned player, keeping team sizes within one of each other
    /// as far as the existing assignments allow
    pub fn spin_all(&mut self, players: &[Player], teams: &[Team]) -> BracketResult<Vec<Assignment>> {
        let mut load = team_load(players, teams)?;
        let mut unassigned = unassigned(players, &load)?;
        unassigned.shuffle(&mut self.rng);

        unassigned
            .into_iter()
            .map(|player_id| {
                let team_id = self.pick_team(&mut load)?;
                Ok(Assignment { player_id, team_id })
            })
            .collect()
    }

    fn pick_team(&mut self, load: &mut BTreeMap<TeamId, usize>) -> BracketResult<TeamId> {
        let fewest = load.values().copied().min().ok_or(BracketError::NoTeams)?;
        let candidates: Vec<TeamId> = load
            .iter()
            .filter(|&(_, &count)| count == fewest)
            .map(|(&id, _)| id)
            .collect();

        let team_id = *candidates.choose(&mut self.rng).ok_or(BracketError::NoTeams)?;
        *load.entry(team_id).or_default() += 1;
        Ok(team_id)
    }
}

/// Members per team; players on unknown teams count as unassigned
fn team_load(players: &[Player], teams: &[Team]) -> BracketResult<BTreeMap<TeamId, usize>> {
    if teams.is_empty() {
        return Err(BracketError::NoTeams);
    }

    let mut load: BTreeMap<TeamId, usize> = teams.iter().map(|t| (t.id, 0)).collect();
    for team_id in players.iter().filter_map(|p| p.team_id) {
        if let Some(count) = load.get_mut(&team_id) {
            *count += 1;
        }
    }
    Ok(load)
}

fn unassigned(players: &[Player], load: &BTreeMap<TeamId, usize>) -> BracketResult<Vec<PlayerId>> {
    let ids: Vec<PlayerId> = players
        .iter()
        .filter(|p| p.team_id.is_none_or(|team_id| !load.contains_key(&team_id)))
        .map(|p| p.id)
        .collect();

    if ids.is_empty() {
        return Err(BracketError::NoUnassignedPlayers);
    }
    Ok(ids)
}
