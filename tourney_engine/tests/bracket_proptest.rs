/// Property-based tests for bracket generation and result propagation
///
/// Brackets are generated for random field sizes and played out with random
/// winners; structural properties must hold at every step.
use proptest::prelude::*;
use std::collections::{HashMap, HashSet};
use tourney_engine::bracket::{
    Bracket, MatchStatus, Score, SeedingStrategy, compute_standings, generate_bracket,
    round_robin, single_elimination,
};
use tourney_engine::tournament::{Format, FormatSettings, ParticipantId};

fn participants(n: usize) -> Vec<ParticipantId> {
    (1..=n as ParticipantId).map(|p| p * 10).collect()
}

// Every link points at an existing match one round later, and no slot is fed twice
fn assert_links_consistent(bracket: &Bracket) -> Result<(), TestCaseError> {
    let mut fed = HashSet::new();
    for m in bracket.matches() {
        if let Some(next) = m.next_match_id {
            let target = bracket.get(next);
            prop_assert!(target.is_some(), "dangling link from match {}", m.id);
            prop_assert_eq!(target.map(|t| t.round), Some(m.round + 1));
            prop_assert!(fed.insert((next, m.next_match_slot)), "slot fed twice");
        }
    }
    Ok(())
}

// Play every ready match, picking winners with `pick`, until nothing is ready
fn play_out(bracket: &mut Bracket, mut pick: impl FnMut(usize) -> bool) -> (usize, Vec<ParticipantId>) {
    let mut played = 0;
    let mut champions = Vec::new();

    while let Some(m) = bracket
        .matches()
        .iter()
        .find(|m| m.status == MatchStatus::Ready)
        .cloned()
    {
        let winner = if pick(played) { m.participant_a } else { m.participant_b };
        let outcome = bracket.apply_result(m.id, winner, Score::new(1, 0)).unwrap();
        played += 1;
        champions.extend(outcome.champion);
    }

    (played, champions)
}

proptest! {
    #[test]
    fn test_single_elimination_shape(n in 2usize..=64) {
        let bracket = generate_bracket(
            1,
            &Format::single_elimination(1),
            &participants(n),
            SeedingStrategy::default(),
        ).unwrap();

        let size = n.next_power_of_two();
        prop_assert_eq!(bracket.matches().len(), size - 1);
        prop_assert_eq!(bracket.rounds().len() as u32, single_elimination::round_count(n));

        let sinks = bracket.matches().iter().filter(|m| m.next_match_id.is_none()).count();
        prop_assert_eq!(sinks, 1);

        let byes = bracket.matches().iter().filter(|m| m.is_bye()).count();
        prop_assert_eq!(byes, size - n);
        // byes never face each other, so every first-round match has a real entrant
        for m in &bracket.rounds()[&1] {
            prop_assert!(m.participant_a.is_some());
        }

        assert_links_consistent(&bracket)?;
    }

    #[test]
    fn test_single_elimination_plays_out(n in 2usize..=40, seed in any::<u64>()) {
        let mut bracket = generate_bracket(
            1,
            &Format::single_elimination(1),
            &participants(n),
            SeedingStrategy::default(),
        ).unwrap();

        let (played, champions) = play_out(&mut bracket, |i| (seed >> (i % 64)) & 1 == 0);

        // every entrant but the champion is eliminated exactly once
        prop_assert_eq!(played, n - 1);
        prop_assert_eq!(champions.len(), 1);
        prop_assert_eq!(bracket.champion(), Some(champions[0]));
        prop_assert!(bracket.matches().iter().all(|m| m.is_completed()));
        prop_assert!(participants(n).contains(&champions[0]));

        let mut losses: HashMap<ParticipantId, usize> = HashMap::new();
        for m in bracket.matches().iter().filter(|m| !m.is_bye()) {
            let loser = m.opponent_of(m.winner.unwrap()).unwrap();
            *losses.entry(loser).or_default() += 1;
        }
        prop_assert!(losses.values().all(|&l| l == 1));
        prop_assert!(!losses.contains_key(&champions[0]));
    }

    #[test]
    fn test_participant_at_most_once_per_round(n in 2usize..=32, legs in 1u32..=2) {
        let formats = [
            Format::single_elimination(1),
            Format::round_robin(2, FormatSettings { legs, ..FormatSettings::default() }),
        ];

        for format in formats {
            let bracket = generate_bracket(1, &format, &participants(n), SeedingStrategy::default()).unwrap();
            for (_, matches) in bracket.rounds() {
                let mut seen = HashSet::new();
                for p in matches.iter().flat_map(|m| [m.participant_a, m.participant_b]).flatten() {
                    prop_assert!(seen.insert(p));
                }
            }
        }
    }

    #[test]
    fn test_round_robin_fixture_count(n in 2usize..=24, legs in 1u32..=3) {
        let settings = FormatSettings { legs, ..FormatSettings::default() };
        let bracket = generate_bracket(
            1,
            &Format::round_robin(1, settings),
            &participants(n),
            SeedingStrategy::default(),
        ).unwrap();

        prop_assert_eq!(bracket.matches().len(), round_robin::fixture_count(n, legs));
        prop_assert_eq!(bracket.rounds().len() as u32, round_robin::rounds_per_leg(n) * legs);
        prop_assert!(bracket.matches().iter().all(|m| m.status == MatchStatus::Ready));
    }

    #[test]
    fn test_standings_points_never_decrease(n in 2usize..=8, outcomes in prop::collection::vec(0u8..3, 0..40)) {
        let settings = FormatSettings::default();
        let mut bracket = generate_bracket(
            1,
            &Format::round_robin(1, settings.clone()),
            &participants(n),
            SeedingStrategy::default(),
        ).unwrap();

        let ids: Vec<_> = bracket.matches().iter().map(|m| m.id).collect();
        let mut previous: HashMap<ParticipantId, u32> = HashMap::new();

        for (id, outcome) in ids.into_iter().zip(outcomes) {
            let m = bracket.get(id).unwrap().clone();
            let winner = match outcome {
                0 => m.participant_a,
                1 => m.participant_b,
                _ => None,
            };
            bracket.apply_result(id, winner, Score::new(u32::from(outcome), 1)).unwrap();

            let rows = compute_standings(bracket.matches(), &settings);
            prop_assert_eq!(rows.len(), n);
            for row in rows {
                let before = previous.insert(row.participant_id, row.points).unwrap_or(0);
                prop_assert!(row.points >= before);
            }
        }
    }

    #[test]
    fn test_standings_ignore_match_order(
        n in 2usize..=8,
        legs in 1u32..=2,
        outcomes in prop::collection::vec((0u8..3, 0u32..4, 0u32..4), 0..56),
        keys in prop::collection::vec(any::<u64>(), 56),
    ) {
        let settings = FormatSettings { legs, ..FormatSettings::default() };
        let mut bracket = generate_bracket(
            1,
            &Format::round_robin(1, settings.clone()),
            &participants(n),
            SeedingStrategy::default(),
        ).unwrap();

        let ids: Vec<_> = bracket.matches().iter().map(|m| m.id).collect();
        for (id, (outcome, a, b)) in ids.into_iter().zip(outcomes) {
            let m = bracket.get(id).unwrap().clone();
            let winner = match outcome {
                0 => m.participant_a,
                1 => m.participant_b,
                _ => None,
            };
            bracket.apply_result(id, winner, Score::new(a, b)).unwrap();
        }

        let rows = compute_standings(bracket.matches(), &settings);
        prop_assert_eq!(&compute_standings(bracket.matches(), &settings), &rows);

        let matches = bracket.matches();
        let mut order: Vec<_> = (0..matches.len()).collect();
        order.sort_by_key(|&i| keys[i]);
        let shuffled: Vec<_> = order.into_iter().map(|i| matches[i].clone()).collect();
        prop_assert_eq!(compute_standings(&shuffled, &settings), rows);
    }
}
