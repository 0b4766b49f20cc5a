//! Match progression: reporting results and cascading teams downstream.
//!
//! A [`Sheet`] is an in-memory snapshot of every pairing of one bracket. The
//! builder fills an empty sheet; the manager loads one from storage, applies
//! a result, and persists only the pairings that changed.

use std::collections::BTreeMap;

use super::errors::{BracketError, BracketResult};
use super::layout::Layout;
use super::models::{
    BracketFormat, BracketKind, Match, MatchChange, MatchKey, Pairing, Side, Slot, TeamId,
};

/// Snapshot of all pairings of a bracket
#[derive(Debug, Clone)]
pub struct Sheet<'a> {
    layout: &'a Layout,
    pairings: BTreeMap<MatchKey, Pairing>,
}

impl<'a> Sheet<'a> {
    /// Sheet with every match of `layout` present and empty
    pub fn empty(layout: &'a Layout) -> Self {
        let pairings = layout
            .keys()
            .into_iter()
            .map(|key| (key, Pairing::default()))
            .collect();
        Self { layout, pairings }
    }

    /// Sheet loaded from persisted matches
    ///
    /// # Errors
    ///
    /// Returns `InvalidRecord` if the stored match set does not match the layout.
    pub fn from_matches(layout: &'a Layout, matches: &[Match]) -> BracketResult<Self> {
        let mut pairings = BTreeMap::new();
        for m in matches {
            let key = m.key();
            if !layout.contains(&key) {
                return Err(BracketError::InvalidRecord(format!(
                    "match {} at {key} is outside the bracket",
                    m.id
                )));
            }
            let pairing = m.pairing();
            pairing.validate()?;
            if pairings.insert(key, pairing).is_some() {
                return Err(BracketError::InvalidRecord(format!("duplicate match at {key}")));
            }
        }

        if pairings.len() != layout.match_count() {
            return Err(BracketError::InvalidRecord(format!(
                "expected {} matches, found {}",
                layout.match_count(),
                pairings.len()
            )));
        }

        Ok(Self { layout, pairings })
    }

    pub fn layout(&self) -> &Layout {
        self.layout
    }

    pub fn pairing(&self, key: &MatchKey) -> Option<&Pairing> {
        self.pairings.get(key)
    }

    fn pairing_mut(&mut self, key: &MatchKey) -> BracketResult<&mut Pairing> {
        self.pairings
            .get_mut(key)
            .ok_or_else(|| BracketError::InvalidRecord(format!("no match at {key}")))
    }

    /// Put `team` into `slot`, then auto-advance if the match is a walkover.
    ///
    /// Seating the team already in the slot is a no-op.
    pub fn seat(&mut self, slot: Slot, team: TeamId) -> BracketResult<()> {
        let pairing = self.pairing_mut(&slot.key)?;
        match pairing.team(slot.side) {
            Some(existing) if existing == team => return Ok(()),
            Some(_) => return Err(BracketError::SlotAlreadyFilled(slot.key)),
            None => pairing.set_team(slot.side, Some(team)),
        }

        self.resolve_walkover(slot.key)
    }

    /// A lone team facing a structurally dead slot wins without playing
    fn resolve_walkover(&mut self, key: MatchKey) -> BracketResult<()> {
        if key.bracket == BracketKind::GrandFinal {
            return Ok(());
        }

        let layout = self.layout;
        let pairing = self.pairing_mut(&key)?;
        if pairing.winner.is_some() {
            return Ok(());
        }

        let lone = [Side::Team1, Side::Team2].into_iter().find(|&side| {
            pairing.team(side).is_some()
                && pairing.team(side.other()).is_none()
                && layout.is_dead(&Slot::new(key, side.other()))
        });

        let Some(side) = lone else {
            return Ok(());
        };
        let Some(team) = pairing.team(side) else {
            return Ok(());
        };
        pairing.winner = Some(team);
        pairing.team1_score = 0;
        pairing.team2_score = 0;

        log::trace!("Walkover for team {} at {}", team, key);

        if let Some(next) = layout.next_slots(key, side).winner {
            self.seat(next, team)?;
        }
        Ok(())
    }

    /// Record a result and cascade winner and loser.
    ///
    /// # Errors
    ///
    /// - `MatchNotReady` if a team is missing
    /// - `TiedScoreNotAllowed` if the scores are equal
    /// - `ResultAlreadyCascaded` if the winner changes after the previous
    ///   result already reached a downstream slot
    pub fn report(&mut self, key: MatchKey, team1_score: u32, team2_score: u32) -> BracketResult<()> {
        let layout = self.layout;
        let current = self.pairing(&key).cloned().ok_or_else(|| {
            BracketError::InvalidRecord(format!("no match at {key}"))
        })?;

        let (Some(team1), Some(team2)) = (current.team1, current.team2) else {
            return Err(BracketError::MatchNotReady(key));
        };
        if team1_score == team2_score {
            return Err(BracketError::TiedScoreNotAllowed);
        }

        let (side, winner, loser) = if team1_score > team2_score {
            (Side::Team1, team1, team2)
        } else {
            (Side::Team2, team2, team1)
        };

        if let Some(previous_side) = current.winning_side() {
            if previous_side != side {
                let previous = layout.next_slots(key, previous_side);
                let fed = [previous.winner, previous.loser]
                    .into_iter()
                    .flatten()
                    .any(|slot| self.slot_team(&slot).is_some());
                if fed {
                    return Err(BracketError::ResultAlreadyCascaded(key));
                }
            }
        }

        let pairing = self.pairing_mut(&key)?;
        pairing.winner = Some(winner);
        pairing.team1_score = team1_score;
        pairing.team2_score = team2_score;

        let advance = layout.next_slots(key, side);
        if let Some(slot) = advance.winner {
            self.seat(slot, winner)?;
        }
        if let Some(slot) = advance.loser {
            self.seat(slot, loser)?;
        }

        Ok(())
    }

    fn slot_team(&self, slot: &Slot) -> Option<TeamId> {
        self.pairings.get(&slot.key).and_then(|p| p.team(slot.side))
    }

    /// Overall winner, once decided
    pub fn champion(&self) -> Option<TeamId> {
        match self.layout.format() {
            BracketFormat::Single => {
                let rounds = self.layout.rounds(BracketKind::Winners);
                self.pairing(&MatchKey::new(BracketKind::Winners, rounds, 0))?
                    .winner
            }
            BracketFormat::Double => {
                let first = self.pairing(&MatchKey::new(BracketKind::GrandFinal, 1, 0))?;
                match first.winning_side()? {
                    Side::Team1 => first.winner,
                    Side::Team2 => {
                        self.pairing(&MatchKey::new(BracketKind::GrandFinal, 2, 0))?
                            .winner
                    }
                }
            }
        }
    }

    /// Differences between this sheet and the `matches` it was loaded from
    pub fn changes(&self, matches: &[Match]) -> Vec<MatchChange> {
        matches
            .iter()
            .filter_map(|m| {
                let key = m.key();
                let after = self.pairings.get(&key)?;
                let before = m.pairing();
                (before != *after).then(|| MatchChange {
                    id: m.id,
                    key,
                    before,
                    after: after.clone(),
                })
            })
            .collect()
    }

    pub fn into_pairings(self) -> BTreeMap<MatchKey, Pairing> {
        self.pairings
    }
}
