//! Integration tests for the persistence store: validated writes, queries, snapshots.

use chrono::{Duration, Utc};
use tourney::{
    GameMatch, MatchNotification, Participants, Round, RoundOwner, Store, TournamentError,
};
use uuid::Uuid;

fn store_with_bracket() -> (Store, Uuid) {
    let mut store = Store::new();
    let t = store.create_tournament("Spring Open").unwrap();
    let b = store.create_bracket(t, "Main").unwrap();
    (store, b)
}

#[test]
fn create_player_validates_name_and_email() {
    let mut store = Store::new();
    assert!(matches!(
        store.create_player("   ", "a@example.com"),
        Err(TournamentError::Validation(_))
    ));
    assert!(matches!(
        store.create_player("Ada", "not an email"),
        Err(TournamentError::Validation(_))
    ));
    let id = store.create_player(" Ada ", "ada@example.com").unwrap();
    assert_eq!(store.player(id).unwrap().name, "Ada");
    assert_eq!(store.players().len(), 1);
}

#[test]
fn import_players_from_csv() {
    let mut store = Store::new();
    let csv = "name,email\nAda, ada@example.com\nGrace,grace@example.com\n";
    let ids = store.import_players_csv(csv.as_bytes()).unwrap();
    assert_eq!(ids.len(), 2);
    assert_eq!(store.player(ids[1]).unwrap().email, "grace@example.com");
}

#[test]
fn import_with_a_bad_row_creates_nobody() {
    let mut store = Store::new();
    let csv = "name,email\nAda,ada@example.com\nGrace,nope\n";
    assert!(store.import_players_csv(csv.as_bytes()).is_err());
    assert!(store.players().is_empty());
}

#[test]
fn tournament_slugs_are_unique() {
    let mut store = Store::new();
    let t = store.create_tournament("Spring Open").unwrap();
    assert_eq!(store.tournament_by_slug("spring-open").unwrap().id, t);
    assert!(matches!(
        store.create_tournament("spring open"),
        Err(TournamentError::DuplicateSlug(_))
    ));
    assert!(store.tournament_by_slug("autumn-open").unwrap_err().is_not_found());
}

#[test]
fn bracket_slugs_are_unique_per_tournament() {
    let mut store = Store::new();
    let t1 = store.create_tournament("One").unwrap();
    let t2 = store.create_tournament("Two").unwrap();
    store.create_bracket(t1, "Main").unwrap();
    store.create_bracket(t2, "Main").unwrap();
    assert!(matches!(
        store.create_bracket(t1, "main"),
        Err(TournamentError::DuplicateSlug(_))
    ));
    assert_eq!(store.brackets_of(t1).len(), 1);
}

#[test]
fn rounds_need_an_existing_owner_and_unique_number() {
    let (mut store, b) = store_with_bracket();
    assert!(store
        .create_round(Round::new(RoundOwner::Pool(Uuid::new_v4()), 1))
        .unwrap_err()
        .is_not_found());

    let r1 = store.get_or_create_round(RoundOwner::Bracket(b), 1).unwrap();
    assert_eq!(store.get_or_create_round(RoundOwner::Bracket(b), 1).unwrap(), r1);
    assert!(store
        .create_round(Round::new(RoundOwner::Bracket(b), 1))
        .is_err());
    assert_eq!(store.rounds_of(RoundOwner::Bracket(b)).len(), 1);
}

#[test]
fn create_match_rejects_unknown_references() {
    let (mut store, b) = store_with_bracket();
    let r = store.get_or_create_round(RoundOwner::Bracket(b), 1).unwrap();
    let p1 = store.create_player("Ada", "ada@example.com").unwrap();

    let unknown_player = GameMatch::direct(r, 0, p1, Uuid::new_v4());
    assert!(store.create_match(unknown_player).unwrap_err().is_not_found());

    let unknown_match = GameMatch::from_matches(r, 0, Uuid::new_v4(), Uuid::new_v4());
    assert!(store.create_match(unknown_match).unwrap_err().is_not_found());

    let unknown_round = GameMatch::direct(Uuid::new_v4(), 0, p1, p1);
    assert!(store.create_match(unknown_round).is_err());
}

#[test]
fn create_match_rejects_half_or_tied_scores() {
    let (mut store, b) = store_with_bracket();
    let r = store.get_or_create_round(RoundOwner::Bracket(b), 1).unwrap();
    let p1 = store.create_player("Ada", "ada@example.com").unwrap();
    let p2 = store.create_player("Grace", "grace@example.com").unwrap();

    let mut half = GameMatch::direct(r, 0, p1, p2);
    half.player_1_score = Some(1);
    assert!(store.create_match(half).is_err());

    let mut tied = GameMatch::direct(r, 0, p1, p2);
    tied.player_1_score = Some(1);
    tied.player_2_score = Some(1);
    assert!(store.create_match(tied).is_err());

    assert_eq!(store.match_count(RoundOwner::Bracket(b)), 0);
}

#[test]
fn record_score_rejects_ties_and_leaves_match_untouched() {
    let (mut store, b) = store_with_bracket();
    let r = store.get_or_create_round(RoundOwner::Bracket(b), 1).unwrap();
    let p1 = store.create_player("Ada", "ada@example.com").unwrap();
    let p2 = store.create_player("Grace", "grace@example.com").unwrap();
    let m = store.create_match(GameMatch::direct(r, 0, p1, p2)).unwrap();

    assert!(matches!(
        store.record_score(m, 2, 2),
        Err(TournamentError::Validation(_))
    ));
    assert_eq!(store.game_match(m).unwrap().scores(), None);

    store.record_score(m, 2, 0).unwrap();
    assert_eq!(store.game_match(m).unwrap().scores(), Some((2, 0)));

    store.clear_score(m).unwrap();
    assert_eq!(store.game_match(m).unwrap().scores(), None);
}

#[test]
fn set_participants_revalidates() {
    let (mut store, b) = store_with_bracket();
    let r = store.get_or_create_round(RoundOwner::Bracket(b), 1).unwrap();
    let p1 = store.create_player("Ada", "ada@example.com").unwrap();
    let p2 = store.create_player("Grace", "grace@example.com").unwrap();
    let m1 = store.create_match(GameMatch::direct(r, 0, p1, p2)).unwrap();
    let m2 = store.create_match(GameMatch::direct(r, 1, p2, p1)).unwrap();

    let self_loop = Participants::FromMatches {
        previous_match_1: m1,
        previous_match_2: m2,
    };
    assert!(store.set_participants(m1, self_loop).is_err());
    assert!(store.game_match(m1).unwrap().participants.is_leaf());

    let swapped = Participants::Direct {
        player_1: p2,
        player_2: p1,
    };
    store.set_participants(m1, swapped).unwrap();
    assert_eq!(store.game_match(m1).unwrap().player_1_init(), Some(p2));
}

#[test]
fn current_matches_follow_round_windows() {
    let (mut store, b) = store_with_bracket();
    let now = Utc::now();
    let p1 = store.create_player("Ada", "ada@example.com").unwrap();
    let p2 = store.create_player("Grace", "grace@example.com").unwrap();
    let past = store.get_or_create_round(RoundOwner::Bracket(b), 1).unwrap();
    let current = store.get_or_create_round(RoundOwner::Bracket(b), 2).unwrap();
    store
        .set_round_window(past, now - Duration::days(8), now - Duration::days(1))
        .unwrap();
    store
        .set_round_window(current, now - Duration::days(1), now + Duration::days(6))
        .unwrap();
    store.create_match(GameMatch::direct(past, 0, p1, p2)).unwrap();
    let live = store.create_match(GameMatch::direct(current, 0, p1, p2)).unwrap();

    let ids: Vec<_> = store.current_matches(now).iter().map(|m| m.id).collect();
    assert_eq!(ids, vec![live]);
}

#[test]
fn notifications_are_looked_up_by_match() {
    let (mut store, b) = store_with_bracket();
    let r = store.get_or_create_round(RoundOwner::Bracket(b), 1).unwrap();
    let p1 = store.create_player("Ada", "ada@example.com").unwrap();
    let p2 = store.create_player("Grace", "grace@example.com").unwrap();
    let m = store.create_match(GameMatch::direct(r, 0, p1, p2)).unwrap();

    assert!(!store.has_notification(m));
    store
        .create_notification(MatchNotification::new(m, Utc::now()))
        .unwrap();
    assert!(store.has_notification(m));
    assert_eq!(store.notifications_for(m).len(), 1);
    assert!(store
        .create_notification(MatchNotification::new(Uuid::new_v4(), Utc::now()))
        .is_err());
}

#[test]
fn snapshot_save_and_load() {
    let (mut store, b) = store_with_bracket();
    let r = store.get_or_create_round(RoundOwner::Bracket(b), 1).unwrap();
    let p1 = store.create_player("Ada", "ada@example.com").unwrap();
    let p2 = store.create_player("Grace", "grace@example.com").unwrap();
    let m = store.create_match(GameMatch::direct(r, 0, p1, p2)).unwrap();
    store.record_score(m, 3, 1).unwrap();

    let path = std::env::temp_dir().join(format!("tourney-{}.json", Uuid::new_v4()));
    store.save(&path).unwrap();
    let loaded = Store::load(&path).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(loaded.game_match(m).unwrap(), store.game_match(m).unwrap());
    assert_eq!(loaded.bracket(b).unwrap().slug, "main");
    assert_eq!(loaded.players().len(), 2);
}

/// A bracket with two first-round leaves and a pool round, all in one tournament.
fn bracket_leaves_and_pool_round() -> (Store, Uuid, Uuid, Uuid, Uuid) {
    let (mut store, b) = store_with_bracket();
    let t = store.bracket(b).unwrap().tournament;
    let players: Vec<_> = (0..4)
        .map(|i| {
            store
                .create_player(&format!("P{i}"), &format!("p{i}@example.com"))
                .unwrap()
        })
        .collect();
    let r1 = store.get_or_create_round(RoundOwner::Bracket(b), 1).unwrap();
    let leaf_0 = store
        .create_match(GameMatch::direct(r1, 0, players[0], players[1]))
        .unwrap();
    let leaf_1 = store
        .create_match(GameMatch::direct(r1, 1, players[2], players[3]))
        .unwrap();
    let pool = store.create_pool(t).unwrap();
    let pool_round = store.get_or_create_round(RoundOwner::Pool(pool), 2).unwrap();
    (store, b, leaf_0, leaf_1, pool_round)
}

#[test]
fn pool_matches_must_name_their_players() {
    let (mut store, _, leaf_0, leaf_1, pool_round) = bracket_leaves_and_pool_round();
    assert!(matches!(
        store.create_match(GameMatch::from_matches(pool_round, 0, leaf_0, leaf_1)),
        Err(TournamentError::Validation(_))
    ));
    assert!(store.matches_in_round(pool_round).is_empty());
}

#[test]
fn derived_matches_follow_earlier_rounds_of_the_same_bracket() {
    let (mut store, b, leaf_0, leaf_1, _) = bracket_leaves_and_pool_round();
    let t = store.bracket(b).unwrap().tournament;

    // Another bracket's round 2 cannot take these leaves.
    let other = store.create_bracket(t, "Consolation").unwrap();
    let other_r2 = store.get_or_create_round(RoundOwner::Bracket(other), 2).unwrap();
    assert!(store
        .create_match(GameMatch::from_matches(other_r2, 0, leaf_0, leaf_1))
        .is_err());

    // Nor can the leaves' own round.
    let r1 = store.game_match(leaf_0).unwrap().round;
    assert!(store
        .create_match(GameMatch::from_matches(r1, 2, leaf_0, leaf_1))
        .is_err());

    let r2 = store.get_or_create_round(RoundOwner::Bracket(b), 2).unwrap();
    let next = store
        .create_match(GameMatch::from_matches(r2, 0, leaf_0, leaf_1))
        .unwrap();
    assert_eq!(store.game_match(next).unwrap().previous_match_1(), Some(leaf_0));
}

#[test]
fn set_participants_cannot_point_forward() {
    let (mut store, b, leaf_0, leaf_1, _) = bracket_leaves_and_pool_round();
    let r2 = store.get_or_create_round(RoundOwner::Bracket(b), 2).unwrap();
    let r3 = store.get_or_create_round(RoundOwner::Bracket(b), 3).unwrap();
    let semi = store
        .create_match(GameMatch::from_matches(r2, 0, leaf_0, leaf_1))
        .unwrap();
    let other_semi = store
        .create_match(GameMatch::from_matches(r2, 1, leaf_1, leaf_0))
        .unwrap();
    let final_match = store
        .create_match(GameMatch::from_matches(r3, 0, semi, other_semi))
        .unwrap();

    // semi -> final -> semi would be a cycle.
    let backwards = Participants::FromMatches {
        previous_match_1: final_match,
        previous_match_2: other_semi,
    };
    assert!(store.set_participants(semi, backwards).is_err());
    assert_eq!(store.game_match(semi).unwrap().previous_match_1(), Some(leaf_0));
}

#[test]
fn a_match_is_notified_once() {
    let (mut store, b) = store_with_bracket();
    let r = store.get_or_create_round(RoundOwner::Bracket(b), 1).unwrap();
    let p1 = store.create_player("Ada", "ada@example.com").unwrap();
    let p2 = store.create_player("Grace", "grace@example.com").unwrap();
    let m = store.create_match(GameMatch::direct(r, 0, p1, p2)).unwrap();

    store
        .create_notification(MatchNotification::new(m, Utc::now()))
        .unwrap();
    assert!(store
        .create_notification(MatchNotification::new(m, Utc::now()))
        .is_err());
    assert_eq!(store.notifications_for(m).len(), 1);
}

#[test]
fn dispatch_claims_are_exclusive() {
    let mut store = Store::new();
    let m = Uuid::new_v4();
    assert!(store.begin_dispatch(m));
    assert!(store.is_dispatching(m));
    assert!(!store.begin_dispatch(m));
    store.end_dispatch(m);
    assert!(!store.is_dispatching(m));
}

/// Save `store`, apply `edit` to the JSON text, and load it back.
fn reload_edited(store: &Store, edit: impl Fn(String) -> String) -> Result<Store, TournamentError> {
    let path = std::env::temp_dir().join(format!("tourney-{}.json", Uuid::new_v4()));
    store.save(&path).unwrap();
    let text = std::fs::read_to_string(&path).unwrap();
    std::fs::write(&path, edit(text)).unwrap();
    let loaded = Store::load(&path);
    std::fs::remove_file(&path).ok();
    loaded
}

#[test]
fn loading_rejects_invalid_records() {
    let (mut store, b) = store_with_bracket();
    let r = store.get_or_create_round(RoundOwner::Bracket(b), 1).unwrap();
    let p1 = store.create_player("Ada", "ada@example.com").unwrap();
    let p2 = store.create_player("Grace", "grace@example.com").unwrap();
    let m = store.create_match(GameMatch::direct(r, 0, p1, p2)).unwrap();
    store.record_score(m, 2, 1).unwrap();

    assert!(reload_edited(&store, |text| text).is_ok());

    let round_zero = reload_edited(&store, |text| text.replace("\"number\":1", "\"number\":0"));
    assert!(matches!(round_zero, Err(TournamentError::Validation(_))));

    let tied = reload_edited(&store, |text| {
        text.replace("\"player_1_score\":2", "\"player_1_score\":1")
    });
    assert!(matches!(tied, Err(TournamentError::Validation(_))));

    let bad_email = reload_edited(&store, |text| text.replace("grace@example.com", "grace"));
    assert!(matches!(bad_email, Err(TournamentError::Validation(_))));
}

#[test]
fn deserializing_a_store_validates_it() {
    let (store, _) = store_with_bracket();
    let text = serde_json::to_string(&store).unwrap();
    assert!(serde_json::from_str::<Store>(&text).is_ok());

    let broken = text.replace("\"slug\":\"main\"", "\"slug\":\"\"");
    assert!(serde_json::from_str::<Store>(&broken).is_err());
}

#[test]
fn loaded_store_answers_queries() {
    let (mut store, b) = store_with_bracket();
    let players: Vec<_> = (0..8)
        .map(|i| {
            store
                .create_player(&format!("P{i}"), &format!("p{i}@example.com"))
                .unwrap()
        })
        .collect();
    tourney::generate_bracket(&mut store, b, &players).unwrap();

    let loaded = reload_edited(&store, |text| text).unwrap();
    let owner = RoundOwner::Bracket(b);
    assert_eq!(loaded.match_count(owner), 7);
    assert_eq!(loaded.rounds_of(owner).len(), 3);
    let ids = |s: &Store| -> Vec<Uuid> { s.matches_of(owner).iter().map(|(_, m)| m.id).collect() };
    assert_eq!(ids(&loaded), ids(&store));
    assert_eq!(loaded.player(players[5]).unwrap().name, "P5");
}

#[test]
fn links_made_after_creation_survive_a_reload() {
    let (mut store, b) = store_with_bracket();
    let players: Vec<_> = (0..4)
        .map(|i| {
            store
                .create_player(&format!("P{i}"), &format!("p{i}@example.com"))
                .unwrap()
        })
        .collect();
    let r2 = store.get_or_create_round(RoundOwner::Bracket(b), 2).unwrap();
    let r1 = store.get_or_create_round(RoundOwner::Bracket(b), 1).unwrap();
    // The final exists before the matches it will follow.
    let final_match = store
        .create_match(GameMatch::direct(r2, 0, players[0], players[2]))
        .unwrap();
    let a = store
        .create_match(GameMatch::direct(r1, 0, players[0], players[1]))
        .unwrap();
    let c = store
        .create_match(GameMatch::direct(r1, 1, players[2], players[3]))
        .unwrap();
    store
        .set_participants(
            final_match,
            Participants::FromMatches {
                previous_match_1: a,
                previous_match_2: c,
            },
        )
        .unwrap();

    let loaded = reload_edited(&store, |text| text).unwrap();
    assert_eq!(loaded.game_match(final_match).unwrap().previous_match_1(), Some(a));
    assert_eq!(loaded.matches_in_round(r1).len(), 2);
}
