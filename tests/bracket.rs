//! Integration tests for bracket generation.

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashSet;
use tourney::{
    generate_bracket, generate_bracket_with_rng, BracketId, PlayerId, Resolver, RoundOwner,
    Store, TournamentError,
};

fn bracket_with_players(n: usize) -> (Store, BracketId, Vec<PlayerId>) {
    let mut store = Store::new();
    let t = store.create_tournament("Spring Open").unwrap();
    let b = store.create_bracket(t, "Main").unwrap();
    let players = (0..n)
        .map(|i| {
            store
                .create_player(&format!("P{i}"), &format!("p{i}@example.com"))
                .unwrap()
        })
        .collect();
    (store, b, players)
}

fn matches_per_round(store: &Store, b: BracketId) -> Vec<usize> {
    store
        .rounds_of(RoundOwner::Bracket(b))
        .iter()
        .map(|r| store.matches_in_round(r.id).len())
        .collect()
}

#[test]
fn sixteen_players_make_four_rounds() {
    let (mut store, b, players) = bracket_with_players(16);
    generate_bracket(&mut store, b, &players).unwrap();
    assert_eq!(matches_per_round(&store, b), vec![8, 4, 2, 1]);
}

#[test]
fn power_of_two_brackets_have_n_minus_one_matches() {
    for k in 1..=6u32 {
        let n = 2usize.pow(k);
        let (mut store, b, players) = bracket_with_players(n);
        let schedule = generate_bracket(&mut store, b, &players).unwrap();

        assert_eq!(schedule.rounds.len(), k as usize);
        assert_eq!(store.match_count(RoundOwner::Bracket(b)), n - 1);
        let per_round = matches_per_round(&store, b);
        assert_eq!(per_round[0], n / 2);
        assert_eq!(*per_round.last().unwrap(), 1);

        let last_round = store.rounds_of(RoundOwner::Bracket(b)).last().unwrap().id;
        assert_eq!(store.matches_in_round(last_round)[0].id, schedule.final_match);
    }
}

#[test]
fn round_indexes_are_contiguous_within_each_round() {
    let (mut store, b, players) = bracket_with_players(8);
    generate_bracket(&mut store, b, &players).unwrap();
    for round in store.rounds_of(RoundOwner::Bracket(b)) {
        let indexes: Vec<u32> = store
            .matches_in_round(round.id)
            .iter()
            .map(|m| m.round_index)
            .collect();
        let expected: Vec<u32> = (0..indexes.len() as u32).collect();
        assert_eq!(indexes, expected, "round {}", round.number);
    }
}

#[test]
fn first_round_seats_every_player_once_and_later_rounds_are_derived() {
    let (mut store, b, players) = bracket_with_players(8);
    generate_bracket(&mut store, b, &players).unwrap();

    let mut seated = HashSet::new();
    for (round, m) in store.matches_of(RoundOwner::Bracket(b)) {
        if round.number == 1 {
            assert!(m.participants.is_leaf());
            assert!(seated.insert(m.player_1_init().unwrap()));
            assert!(seated.insert(m.player_2_init().unwrap()));
        } else {
            assert!(!m.participants.is_leaf());
            let previous_1 = store.game_match(m.previous_match_1().unwrap()).unwrap();
            let previous_2 = store.game_match(m.previous_match_2().unwrap()).unwrap();
            let previous_round = store.round(previous_1.round).unwrap().number;
            assert_eq!(previous_round, round.number - 1);
            assert_eq!(previous_2.round, previous_1.round);
        }
    }
    assert_eq!(seated, players.into_iter().collect::<HashSet<_>>());
}

#[test]
fn every_match_feeds_at_most_one_later_match() {
    let (mut store, b, players) = bracket_with_players(16);
    generate_bracket(&mut store, b, &players).unwrap();
    let mut fed = HashSet::new();
    for (_, m) in store.matches_of(RoundOwner::Bracket(b)) {
        for previous in [m.previous_match_1(), m.previous_match_2()].into_iter().flatten() {
            assert!(fed.insert(previous));
        }
    }
    assert_eq!(fed.len(), 14);
}

#[test]
fn seeding_is_reproducible_with_the_same_rng() {
    let (mut store_a, b_a, players) = bracket_with_players(8);
    let mut store_b = store_a.clone();
    generate_bracket_with_rng(&mut store_a, b_a, &players, &mut StdRng::seed_from_u64(7)).unwrap();
    generate_bracket_with_rng(&mut store_b, b_a, &players, &mut StdRng::seed_from_u64(7)).unwrap();

    let seats = |store: &Store| -> Vec<(PlayerId, PlayerId)> {
        store
            .matches_of(RoundOwner::Bracket(b_a))
            .iter()
            .filter_map(|(_, m)| Some((m.player_1_init()?, m.player_2_init()?)))
            .collect()
    };
    assert_eq!(seats(&store_a), seats(&store_b));
}

#[test]
fn non_power_of_two_is_rejected_without_writes() {
    for n in [0, 1, 3, 6, 12] {
        let (mut store, b, players) = bracket_with_players(n);
        assert!(matches!(
            generate_bracket(&mut store, b, &players),
            Err(TournamentError::InvalidBracketSize(size)) if size == n
        ));
        assert!(!store.has_rounds(RoundOwner::Bracket(b)));
    }
}

#[test]
fn duplicate_and_unknown_players_are_rejected() {
    let (mut store, b, mut players) = bracket_with_players(4);
    players[3] = players[0];
    assert!(matches!(
        generate_bracket(&mut store, b, &players),
        Err(TournamentError::DuplicatePlayer(_))
    ));

    players[3] = uuid::Uuid::new_v4();
    assert!(matches!(
        generate_bracket(&mut store, b, &players),
        Err(TournamentError::PlayerNotFound(_))
    ));
    assert!(!store.has_rounds(RoundOwner::Bracket(b)));
}

#[test]
fn generating_twice_is_rejected() {
    let (mut store, b, players) = bracket_with_players(4);
    generate_bracket(&mut store, b, &players).unwrap();
    assert!(matches!(
        generate_bracket(&mut store, b, &players),
        Err(TournamentError::AlreadyScheduled)
    ));
    assert_eq!(store.match_count(RoundOwner::Bracket(b)), 3);
}

#[test]
fn champion_resolves_through_the_whole_tree() {
    let (mut store, b, players) = bracket_with_players(8);
    let schedule = generate_bracket(&mut store, b, &players).unwrap();

    // Side one wins every match.
    let ids: Vec<_> = store
        .matches_of(RoundOwner::Bracket(b))
        .iter()
        .map(|(_, m)| m.id)
        .collect();
    for id in &ids {
        store.record_score(*id, 3, 1).unwrap();
    }

    let mut resolver = Resolver::new(&store);
    let champion = resolver.winner(schedule.final_match).unwrap().unwrap();
    assert!(players.contains(&champion));

    // The champion won every match on the way: follow side one back to round 1.
    let mut current = store.game_match(schedule.final_match).unwrap();
    while let Some(previous) = current.previous_match_1() {
        assert_eq!(resolver.winner(previous).unwrap(), Some(champion));
        current = store.game_match(previous).unwrap();
    }
    assert_eq!(current.player_1_init(), Some(champion));
}
