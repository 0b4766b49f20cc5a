//! Bracket shape derived from `(format, team_count)`.
//!
//! Matches never store their feeder edges. Every structural question (how
//! many rounds, where a winner or loser goes next, which slots can never
//! receive a team) is answered here from the two numbers recorded in a
//! [`BracketPlan`].

use std::collections::BTreeSet;

use super::errors::{BracketError, BracketResult};
use super::models::{BracketFormat, BracketKind, BracketPlan, MatchKey, Side, Slot};

/// Smallest playable bracket
pub const MIN_TEAMS: usize = 2;

/// Largest supported bracket
pub const MAX_TEAMS: usize = 256;

/// Where the two teams of a decided match go next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Advance {
    pub winner: Option<Slot>,
    pub loser: Option<Slot>,
}

/// Structural description of a bracket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    format: BracketFormat,
    team_count: usize,
    /// Bracket size `S`, the next power of two at or above `team_count`
    size: usize,
    /// `k` with `S = 2^k`
    winners_rounds: u32,
    /// Slots that can never receive a team because of byes
    dead: BTreeSet<Slot>,
}

impl Layout {
    /// Compute the layout for `team_count` teams
    ///
    /// # Errors
    ///
    /// Returns `InvalidTeamCount` outside `MIN_TEAMS..=MAX_TEAMS`.
    pub fn new(format: BracketFormat, team_count: usize) -> BracketResult<Self> {
        if !(MIN_TEAMS..=MAX_TEAMS).contains(&team_count) {
            return Err(BracketError::InvalidTeamCount {
                count: team_count,
                min: MIN_TEAMS,
                max: MAX_TEAMS,
            });
        }

        let size = team_count.next_power_of_two();
        let mut layout = Self {
            format,
            team_count,
            size,
            winners_rounds: size.trailing_zeros(),
            dead: BTreeSet::new(),
        };
        layout.dead = layout.compute_dead_slots();

        Ok(layout)
    }

    /// Rebuild the layout recorded for a built bracket
    pub fn from_plan(plan: &BracketPlan) -> BracketResult<Self> {
        Self::new(plan.format, plan.team_count as usize)
    }

    pub fn plan(&self) -> BracketPlan {
        BracketPlan {
            format: self.format,
            team_count: self.team_count as u32,
        }
    }

    pub fn format(&self) -> BracketFormat {
        self.format
    }

    pub fn team_count(&self) -> usize {
        self.team_count
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of rounds in `bracket`
    pub fn rounds(&self, bracket: BracketKind) -> u32 {
        match (bracket, self.format) {
            (BracketKind::Winners, _) => self.winners_rounds,
            (BracketKind::Losers, BracketFormat::Double) => 2 * (self.winners_rounds - 1),
            (BracketKind::GrandFinal, BracketFormat::Double) => 2,
            (_, BracketFormat::Single) => 0,
        }
    }

    /// Number of matches in `round` of `bracket`; zero for rounds that do not exist
    pub fn matches_in_round(&self, bracket: BracketKind, round: u32) -> u32 {
        if round == 0 || round > self.rounds(bracket) {
            return 0;
        }
        let count = match bracket {
            BracketKind::Winners => self.size >> round,
            BracketKind::Losers => self.size >> (round.div_ceil(2) + 1),
            BracketKind::GrandFinal => 1,
        };
        count as u32
    }

    /// Whether `key` addresses a match of this bracket
    pub fn contains(&self, key: &MatchKey) -> bool {
        key.position < self.matches_in_round(key.bracket, key.round)
    }

    /// All match keys, winners first, then losers, then grand final
    pub fn keys(&self) -> Vec<MatchKey> {
        let mut keys = Vec::new();
        for bracket in [
            BracketKind::Winners,
            BracketKind::Losers,
            BracketKind::GrandFinal,
        ] {
            for round in 1..=self.rounds(bracket) {
                for position in 0..self.matches_in_round(bracket, round) {
                    keys.push(MatchKey::new(bracket, round, position));
                }
            }
        }
        keys
    }

    /// Total number of matches created at build time
    pub fn match_count(&self) -> usize {
        self.keys().len()
    }

    /// Seed (1-based) placed in a winners round-1 slot
    pub fn seed_at(&self, position: u32, side: Side) -> usize {
        let order = seed_order(self.size);
        let index = 2 * position as usize + usize::from(side == Side::Team2);
        order[index]
    }

    /// Slot that can never receive a team
    pub fn is_dead(&self, slot: &Slot) -> bool {
        self.dead.contains(slot)
    }

    /// Target slots of the winner and loser of `key` when `winning_side` wins
    pub fn next_slots(&self, key: MatchKey, winning_side: Side) -> Advance {
        if key.bracket == BracketKind::GrandFinal {
            // A win for the losers-bracket champion forces the reset match,
            // both teams keep their sides
            return if key.round == 1 && winning_side == Side::Team2 {
                let reset = MatchKey::new(BracketKind::GrandFinal, 2, 0);
                Advance {
                    winner: Some(Slot::new(reset, Side::Team2)),
                    loser: Some(Slot::new(reset, Side::Team1)),
                }
            } else {
                Advance {
                    winner: None,
                    loser: None,
                }
            };
        }

        Advance {
            winner: self.winner_slot(key),
            loser: self.loser_slot(key),
        }
    }

    fn winner_slot(&self, key: MatchKey) -> Option<Slot> {
        let k = self.winners_rounds;
        match key.bracket {
            BracketKind::Winners if key.round < k => Some(Slot::new(
                MatchKey::new(BracketKind::Winners, key.round + 1, key.position / 2),
                Side::from_position(key.position),
            )),
            BracketKind::Winners => match self.format {
                BracketFormat::Single => None,
                BracketFormat::Double => Some(Slot::new(grand_final(), Side::Team1)),
            },
            BracketKind::Losers if key.round == self.rounds(BracketKind::Losers) => {
                Some(Slot::new(grand_final(), Side::Team2))
            }
            // Survivors of an odd round meet the next batch of drop-downs
            BracketKind::Losers if key.round % 2 == 1 => Some(Slot::new(
                MatchKey::new(BracketKind::Losers, key.round + 1, key.position),
                Side::Team1,
            )),
            BracketKind::Losers => Some(Slot::new(
                MatchKey::new(BracketKind::Losers, key.round + 1, key.position / 2),
                Side::from_position(key.position),
            )),
            BracketKind::GrandFinal => None,
        }
    }

    fn loser_slot(&self, key: MatchKey) -> Option<Slot> {
        if self.format == BracketFormat::Single || key.bracket != BracketKind::Winners {
            return None;
        }

        if self.winners_rounds == 1 {
            return Some(Slot::new(grand_final(), Side::Team2));
        }

        if key.round == 1 {
            return Some(Slot::new(
                MatchKey::new(BracketKind::Losers, 1, key.position / 2),
                Side::from_position(key.position),
            ));
        }

        let j = key.round - 1;
        let count = self.matches_in_round(BracketKind::Winners, key.round);
        let position = if j % 2 == 1 {
            count - 1 - key.position
        } else {
            key.position
        };
        Some(Slot::new(
            MatchKey::new(BracketKind::Losers, 2 * j, position),
            Side::Team2,
        ))
    }

    /// Walk the tree in dependency order: a winner output is live when at
    /// least one side is live, a loser output only when both are.
    fn compute_dead_slots(&self) -> BTreeSet<Slot> {
        let mut dead = BTreeSet::new();

        for position in 0..self.matches_in_round(BracketKind::Winners, 1) {
            let key = MatchKey::new(BracketKind::Winners, 1, position);
            for side in [Side::Team1, Side::Team2] {
                if self.seed_at(position, side) > self.team_count {
                    dead.insert(Slot::new(key, side));
                }
            }
        }

        for key in self.keys() {
            if key.bracket == BracketKind::GrandFinal {
                continue;
            }
            let team1_live = !dead.contains(&Slot::new(key, Side::Team1));
            let team2_live = !dead.contains(&Slot::new(key, Side::Team2));

            // Either side may win; the targets only depend on the key
            let advance = self.next_slots(key, Side::Team1);
            if let Some(slot) = advance.winner {
                if !(team1_live || team2_live) && slot.key.bracket != BracketKind::GrandFinal {
                    dead.insert(slot);
                }
            }
            if let Some(slot) = advance.loser {
                if !(team1_live && team2_live) && slot.key.bracket != BracketKind::GrandFinal {
                    dead.insert(slot);
                }
            }
        }

        dead
    }
}

fn grand_final() -> MatchKey {
    MatchKey::new(BracketKind::GrandFinal, 1, 0)
}

/// Standard seeding order for a bracket of `size` slots.
///
/// Built by repeatedly pairing every seed `s` with its mirror `2m + 1 - s`,
/// so seeds 1 and 2 can only meet in the final. For 8 slots:
/// `1, 8, 4, 5, 2, 7, 3, 6`.
pub fn seed_order(size: usize) -> Vec<usize> {
    let mut order = vec![1];
    while order.len() < size {
        let mirror = 2 * order.len() + 1;
        order = order.iter().flat_map(|&s| [s, mirror - s]).collect();
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_order() {
        assert_eq!(seed_order(1), vec![1]);
        assert_eq!(seed_order(2), vec![1, 2]);
        assert_eq!(seed_order(4), vec![1, 4, 2, 3]);
        assert_eq!(seed_order(8), vec![1, 8, 4, 5, 2, 7, 3, 6]);
    }

    #[test]
    fn test_rejects_team_counts_out_of_range() {
        for count in [0, 1, MAX_TEAMS + 1] {
            assert!(matches!(
                Layout::new(BracketFormat::Single, count),
                Err(BracketError::InvalidTeamCount { .. })
            ));
        }
    }

    #[test]
    fn test_single_elimination_shape() {
        let layout = Layout::new(BracketFormat::Single, 8).unwrap();
        assert_eq!(layout.rounds(BracketKind::Winners), 3);
        assert_eq!(layout.rounds(BracketKind::Losers), 0);
        assert_eq!(layout.rounds(BracketKind::GrandFinal), 0);
        assert_eq!(layout.match_count(), 7);
    }

    #[test]
    fn test_double_elimination_shape() {
        let layout = Layout::new(BracketFormat::Double, 8).unwrap();
        assert_eq!(layout.rounds(BracketKind::Losers), 4);
        let losers: Vec<u32> = (1..=4)
            .map(|r| layout.matches_in_round(BracketKind::Losers, r))
            .collect();
        assert_eq!(losers, vec![2, 2, 1, 1]);
        // 7 winners + 6 losers + 2 grand final
        assert_eq!(layout.match_count(), 15);
    }

    #[test]
    fn test_two_team_double_elimination_skips_losers_bracket() {
        let layout = Layout::new(BracketFormat::Double, 2).unwrap();
        assert_eq!(layout.rounds(BracketKind::Losers), 0);
        let advance = layout.next_slots(MatchKey::new(BracketKind::Winners, 1, 0), Side::Team1);
        assert_eq!(advance.winner, Some(Slot::new(grand_final(), Side::Team1)));
        assert_eq!(advance.loser, Some(Slot::new(grand_final(), Side::Team2)));
    }

    #[test]
    fn test_winners_advance_by_halving_position() {
        let layout = Layout::new(BracketFormat::Single, 8).unwrap();
        let advance = layout.next_slots(MatchKey::new(BracketKind::Winners, 1, 3), Side::Team2);
        assert_eq!(
            advance.winner,
            Some(Slot::new(MatchKey::new(BracketKind::Winners, 2, 1), Side::Team2))
        );
        assert_eq!(advance.loser, None);

        let final_key = MatchKey::new(BracketKind::Winners, 3, 0);
        assert_eq!(layout.next_slots(final_key, Side::Team1).winner, None);
    }

    #[test]
    fn test_losers_drop_order_is_mirrored() {
        let layout = Layout::new(BracketFormat::Double, 8).unwrap();
        // Winners round 2 losers land in losers round 2, reversed
        let first = layout.next_slots(MatchKey::new(BracketKind::Winners, 2, 0), Side::Team1);
        assert_eq!(
            first.loser,
            Some(Slot::new(MatchKey::new(BracketKind::Losers, 2, 1), Side::Team2))
        );
        // Winners final loser meets the losers-bracket finalist
        let last = layout.next_slots(MatchKey::new(BracketKind::Winners, 3, 0), Side::Team1);
        assert_eq!(
            last.loser,
            Some(Slot::new(MatchKey::new(BracketKind::Losers, 4, 0), Side::Team2))
        );
        assert_eq!(last.winner, Some(Slot::new(grand_final(), Side::Team1)));
    }

    #[test]
    fn test_grand_final_reset_keeps_sides() {
        let layout = Layout::new(BracketFormat::Double, 4).unwrap();
        let advance = layout.next_slots(grand_final(), Side::Team2);
        let reset = MatchKey::new(BracketKind::GrandFinal, 2, 0);
        assert_eq!(advance.winner, Some(Slot::new(reset, Side::Team2)));
        assert_eq!(advance.loser, Some(Slot::new(reset, Side::Team1)));
        assert_eq!(layout.next_slots(grand_final(), Side::Team1).winner, None);
    }

    #[test]
    fn test_byes_mark_dead_slots() {
        let layout = Layout::new(BracketFormat::Double, 5).unwrap();
        // Seeds 6, 7 and 8 are byes
        let dead_first_round: Vec<_> = (0..4)
            .flat_map(|p| [Side::Team1, Side::Team2].map(move |s| (p, s)))
            .filter(|&(p, s)| {
                layout.is_dead(&Slot::new(MatchKey::new(BracketKind::Winners, 1, p), s))
            })
            .collect();
        assert_eq!(dead_first_round.len(), 3);

        // Losers round 1 match 1 is fed by two bye matches
        let key = MatchKey::new(BracketKind::Losers, 1, 1);
        assert!(layout.is_dead(&Slot::new(key, Side::Team1)));
        assert!(layout.is_dead(&Slot::new(key, Side::Team2)));

        // Grand final slots are always live
        assert!(!layout.is_dead(&Slot::new(grand_final(), Side::Team2)));
    }
}
