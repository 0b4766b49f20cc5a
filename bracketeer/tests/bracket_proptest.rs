/// Property-based tests for bracket construction and progression
///
/// These tests build brackets for arbitrary team counts and play them to
/// completion with random results, checking the structural invariants hold.
use bracketeer::bracket::{
    BracketFormat, BracketKind, Layout, Match, MatchKey, Sheet, Team, TeamId, build,
};
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;
use std::collections::{BTreeMap, BTreeSet};

fn teams(count: usize) -> Vec<Team> {
    (1..=count)
        .map(|i| Team::new(i as i64, 1, &format!("Team {i}"), i as u32).unwrap())
        .collect()
}

fn built(count: usize, format: BracketFormat) -> Vec<Match> {
    build(&teams(count), format)
        .unwrap()
        .into_iter()
        .enumerate()
        .map(|(i, m)| Match::from_parts(i as i64 + 1, 1, m.key, m.pairing).unwrap())
        .collect()
}

/// No team is seated twice within one round of any bracket
fn check_rounds(sheet: &Sheet<'_>) -> Result<(), TestCaseError> {
    let mut rounds: BTreeMap<(BracketKind, u32), BTreeSet<TeamId>> = BTreeMap::new();
    for key in sheet.layout().keys() {
        let Some(pairing) = sheet.pairing(&key) else {
            continue;
        };
        let seated = rounds.entry((key.bracket, key.round)).or_default();
        for team in [pairing.team1, pairing.team2].into_iter().flatten() {
            prop_assert!(
                seated.insert(team),
                "team {} seated twice in {} round {}",
                team,
                key.bracket.as_str(),
                key.round
            );
        }
    }
    Ok(())
}

/// Report random results until no match is playable; returns games played.
///
/// Round invariants are checked after the build and after every report.
fn play_out(sheet: &mut Sheet<'_>, coin: &[bool]) -> Result<usize, TestCaseError> {
    check_rounds(sheet)?;
    let mut played = 0;
    loop {
        let next: Option<MatchKey> = sheet
            .layout()
            .keys()
            .into_iter()
            .find(|key| {
                sheet
                    .pairing(key)
                    .is_some_and(|p| p.is_ready() && p.winner.is_none())
            });
        let Some(key) = next else {
            return Ok(played);
        };

        let team1_wins = coin[played % coin.len()];
        let (s1, s2) = if team1_wins { (2, 1) } else { (0, 3) };
        sheet.report(key, s1, s2).unwrap();
        played += 1;
        check_rounds(sheet)?;
    }
}

proptest! {
    #[test]
    fn test_power_of_two_single_elimination(exp in 1u32..=4) {
        let count = 1usize << exp;
        let matches = built(count, BracketFormat::Single);
        prop_assert_eq!(matches.len(), count - 1);

        let mut seen = BTreeSet::new();
        for m in matches.iter().filter(|m| m.round == 1) {
            for team in [m.team1, m.team2] {
                let team = team.expect("no byes in a full bracket");
                prop_assert!(seen.insert(team), "team {} appears twice", team);
            }
        }
        prop_assert_eq!(seen.len(), count);
    }

    #[test]
    fn test_first_round_has_every_team_and_no_double_byes(count in 2usize..=100) {
        let size = count.next_power_of_two();
        let matches = built(count, BracketFormat::Single);
        let first_round: Vec<&Match> = matches.iter().filter(|m| m.round == 1).collect();
        prop_assert_eq!(first_round.len() * 2, size);

        let seated: usize = first_round
            .iter()
            .map(|m| usize::from(m.team1.is_some()) + usize::from(m.team2.is_some()))
            .sum();
        prop_assert_eq!(seated, count);
        prop_assert!(first_round.iter().all(|m| m.team1.is_some() || m.team2.is_some()));
    }

    #[test]
    fn test_double_elimination_losers_bracket_size(count in 2usize..=100) {
        let size = count.next_power_of_two();
        let matches = built(count, BracketFormat::Double);
        let losers = matches.iter().filter(|m| m.bracket == BracketKind::Losers).count();
        prop_assert_eq!(losers, size - 2);

        let grand_final = matches.iter().filter(|m| m.bracket == BracketKind::GrandFinal).count();
        prop_assert_eq!(grand_final, 2);
    }

    #[test]
    fn test_single_elimination_playthrough(
        count in 2usize..=40,
        coin in prop::collection::vec(any::<bool>(), 1..64),
    ) {
        let layout = Layout::new(BracketFormat::Single, count).unwrap();
        let matches = built(count, BracketFormat::Single);
        let mut sheet = Sheet::from_matches(&layout, &matches).unwrap();

        let played = play_out(&mut sheet, &coin)?;
        prop_assert_eq!(played, count - 1);
        prop_assert!(sheet.champion().is_some());
    }

    #[test]
    fn test_double_elimination_playthrough(
        count in 2usize..=40,
        coin in prop::collection::vec(any::<bool>(), 1..64),
    ) {
        let layout = Layout::new(BracketFormat::Double, count).unwrap();
        let matches = built(count, BracketFormat::Double);
        let mut sheet = Sheet::from_matches(&layout, &matches).unwrap();

        let played = play_out(&mut sheet, &coin)?;
        prop_assert!(
            played == 2 * count - 2 || played == 2 * count - 1,
            "{} teams played {} games",
            count,
            played
        );
        prop_assert!(sheet.champion().is_some());
    }

    #[test]
    fn test_changes_replay_to_the_same_sheet(
        count in 2usize..=24,
        coin in prop::collection::vec(any::<bool>(), 1..32),
    ) {
        let layout = Layout::new(BracketFormat::Double, count).unwrap();
        let matches = built(count, BracketFormat::Double);
        let mut sheet = Sheet::from_matches(&layout, &matches).unwrap();
        play_out(&mut sheet, &coin)?;

        let mut replayed = matches.clone();
        for change in sheet.changes(&matches) {
            let stored = replayed.iter_mut().find(|m| m.id == change.id).unwrap();
            prop_assert!(!change.conflicts_with(&stored.pairing()));
            let mut pairing = stored.pairing();
            change.apply(&mut pairing);
            *stored = Match::from_parts(stored.id, 1, change.key, pairing).unwrap();
        }

        let replayed_sheet = Sheet::from_matches(&layout, &replayed).unwrap();
        prop_assert_eq!(replayed_sheet.into_pairings(), sheet.into_pairings());
    }
}
