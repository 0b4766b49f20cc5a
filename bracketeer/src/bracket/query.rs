//! Read-only bracket projection grouped by bracket and round.

use serde::{Deserialize, Serialize};

use super::errors::BracketResult;
use super::layout::Layout;
use super::models::{BracketFormat, BracketKind, Match, MatchKey, Side, Slot, TeamId, TournamentId};
use super::progression::Sheet;

/// Derived state of a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    /// Waiting for at least one team
    Pending,
    /// Both teams known, no result
    Ready,
    /// Result reported
    Decided,
    /// Decided by walkover
    Bye,
    /// Will never be played
    Void,
}

/// Match with its derived status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchView {
    #[serde(flatten)]
    pub game: Match,
    pub status: MatchStatus,
}

/// Matches of one round in position order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundView {
    pub round: u32,
    pub matches: Vec<MatchView>,
}

/// Full bracket tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BracketView {
    pub tournament_id: TournamentId,
    pub format: BracketFormat,
    pub winners_bracket: Vec<RoundView>,
    pub losers_bracket: Vec<RoundView>,
    pub grand_final: Vec<RoundView>,
    pub champion: Option<TeamId>,
}

/// Project persisted matches into a [`BracketView`]
pub fn project(
    tournament_id: TournamentId,
    layout: &Layout,
    matches: &[Match],
) -> BracketResult<BracketView> {
    let sheet = Sheet::from_matches(layout, matches)?;

    let mut ordered: Vec<&Match> = matches.iter().collect();
    ordered.sort_by_key(|m| m.key());

    let rounds_of = |bracket: BracketKind| -> Vec<RoundView> {
        (1..=layout.rounds(bracket))
            .map(|round| RoundView {
                round,
                matches: ordered
                    .iter()
                    .filter(|m| m.bracket == bracket && m.round == round)
                    .map(|m| MatchView {
                        game: (*m).clone(),
                        status: status(layout, &sheet, m),
                    })
                    .collect(),
            })
            .collect()
    };

    Ok(BracketView {
        tournament_id,
        format: layout.format(),
        winners_bracket: rounds_of(BracketKind::Winners),
        losers_bracket: rounds_of(BracketKind::Losers),
        grand_final: rounds_of(BracketKind::GrandFinal),
        champion: sheet.champion(),
    })
}

fn status(layout: &Layout, sheet: &Sheet<'_>, game: &Match) -> MatchStatus {
    let key = game.key();

    if key.bracket == BracketKind::GrandFinal && key.round == 2 && game.winner.is_none() {
        let first = sheet.pairing(&MatchKey::new(BracketKind::GrandFinal, 1, 0));
        if first.and_then(|p| p.winning_side()) == Some(Side::Team1) {
            return MatchStatus::Void;
        }
    }

    let dead = [Side::Team1, Side::Team2]
        .into_iter()
        .filter(|&side| layout.is_dead(&Slot::new(key, side)))
        .count();

    match (dead, game.winner, game.team1.is_some() && game.team2.is_some()) {
        (2, _, _) => MatchStatus::Void,
        (1, Some(_), _) => MatchStatus::Bye,
        (_, Some(_), _) => MatchStatus::Decided,
        (_, None, true) => MatchStatus::Ready,
        (_, None, false) => MatchStatus::Pending,
    }
}
