use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use bracketeer::bracket::{BracketFormat, Layout, Match, Sheet, Team, build, project};

/// Helper to create a seeded roster of N teams
fn roster(n_teams: usize) -> Vec<Team> {
    (1..=n_teams)
        .map(|i| Team::new(i as i64, 1, &format!("team{}", i), i as u32).unwrap())
        .collect()
}

/// Helper to turn builder output into stored matches
fn stored(n_teams: usize, format: BracketFormat) -> Vec<Match> {
    build(&roster(n_teams), format)
        .unwrap()
        .into_iter()
        .enumerate()
        .map(|(i, m)| Match::from_parts(i as i64 + 1, 1, m.key, m.pairing).unwrap())
        .collect()
}

/// Benchmark building a double elimination bracket
fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_double");

    for n_teams in [8, 64, 256].iter() {
        let teams = roster(*n_teams);
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}_teams", n_teams)),
            &teams,
            |b, teams| {
                b.iter(|| build(teams, BracketFormat::Double).unwrap());
            },
        );
    }

    group.finish();
}

/// Benchmark playing a full double elimination bracket, top seed always winning
fn bench_playthrough(c: &mut Criterion) {
    let mut group = c.benchmark_group("playthrough_double");

    for n_teams in [8, 64, 256].iter() {
        let layout = Layout::new(BracketFormat::Double, *n_teams).unwrap();
        let matches = stored(*n_teams, BracketFormat::Double);
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}_teams", n_teams)),
            &matches,
            |b, matches| {
                b.iter(|| {
                    let mut sheet = Sheet::from_matches(&layout, matches).unwrap();
                    for key in layout.keys() {
                        let ready = sheet
                            .pairing(&key)
                            .is_some_and(|p| p.is_ready() && p.winner.is_none());
                        if ready {
                            sheet.report(key, 1, 0).unwrap();
                        }
                    }
                    sheet.champion()
                });
            },
        );
    }

    group.finish();
}

/// Benchmark projecting a fresh bracket into its read model
fn bench_project(c: &mut Criterion) {
    let layout = Layout::new(BracketFormat::Double, 256).unwrap();
    let matches = stored(256, BracketFormat::Double);

    c.bench_function("project_256_teams", |b| {
        b.iter(|| project(1, &layout, &matches).unwrap());
    });
}

criterion_group!(bracket_operations, bench_build, bench_playthrough, bench_project);

criterion_main!(bracket_operations);
