//! Single-elimination bracket: build the whole match tree from a player list.

use crate::models::{
    BracketId, GameMatch, MatchId, PlayerId, RoundId, RoundOwner, TournamentError,
};
use crate::store::Store;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use std::collections::HashSet;

/// What [`generate_bracket`] created.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct BracketSchedule {
    /// Round ids, first round first.
    pub rounds: Vec<RoundId>,
    pub final_match: MatchId,
}

/// Generate every round and match of a bracket. Seeds randomly.
///
/// Needs a power of two players (at least 2), all distinct and registered, and
/// a bracket without rounds. Produces `n - 1` matches over `log2(n)` rounds.
pub fn generate_bracket(
    store: &mut Store,
    bracket: BracketId,
    players: &[PlayerId],
) -> Result<BracketSchedule, TournamentError> {
    generate_bracket_with_rng(store, bracket, players, &mut rand::thread_rng())
}

/// [`generate_bracket`] with the seeding shuffle drawn from `rng`.
pub fn generate_bracket_with_rng<R: Rng + ?Sized>(
    store: &mut Store,
    bracket: BracketId,
    players: &[PlayerId],
    rng: &mut R,
) -> Result<BracketSchedule, TournamentError> {
    store.bracket(bracket)?;
    let owner = RoundOwner::Bracket(bracket);
    if store.has_rounds(owner) {
        return Err(TournamentError::AlreadyScheduled);
    }
    if players.len() < 2 || !players.len().is_power_of_two() {
        return Err(TournamentError::InvalidBracketSize(players.len()));
    }
    let mut seen = HashSet::with_capacity(players.len());
    for &pid in players {
        store.player(pid)?;
        if !seen.insert(pid) {
            return Err(TournamentError::DuplicatePlayer(pid));
        }
    }

    let mut seeded = players.to_vec();
    seeded.shuffle(rng);

    let first_round = store.get_or_create_round(owner, 1)?;
    let mut rounds = vec![first_round];
    let mut leaves = Vec::with_capacity(seeded.len() / 2);
    for (round_index, (player_1, player_2)) in take_pairs(seeded).into_iter().enumerate() {
        let m = GameMatch::direct(first_round, round_index as u32, player_1, player_2);
        leaves.push(store.create_match(m)?);
    }

    let final_match = build_rounds(store, owner, 1, leaves, &mut rounds)?;
    log::info!(
        "Generated bracket {} with {} players: {} rounds, {} matches",
        bracket,
        players.len(),
        rounds.len(),
        players.len() - 1
    );
    Ok(BracketSchedule { rounds, final_match })
}

/// Pair the matches of round `number` into round `number + 1`, recursing until
/// a single match (the final) is left.
fn build_rounds(
    store: &mut Store,
    owner: RoundOwner,
    number: u32,
    previous: Vec<MatchId>,
    rounds: &mut Vec<RoundId>,
) -> Result<MatchId, TournamentError> {
    if let [final_match] = previous.as_slice() {
        return Ok(*final_match);
    }
    let round = store.get_or_create_round(owner, number + 1)?;
    rounds.push(round);
    let mut next = Vec::with_capacity(previous.len() / 2);
    for (round_index, (match_1, match_2)) in take_pairs(previous).into_iter().enumerate() {
        let m = GameMatch::from_matches(round, round_index as u32, match_1, match_2);
        next.push(store.create_match(m)?);
    }
    build_rounds(store, owner, number + 1, next, rounds)
}

/// Repeatedly remove two items from the end of the list. Needs an even length.
fn take_pairs<T>(mut items: Vec<T>) -> Vec<(T, T)> {
    let mut pairs = Vec::with_capacity(items.len() / 2);
    while items.len() >= 2 {
        if let (Some(first), Some(second)) = (items.pop(), items.pop()) {
            pairs.push((first, second));
        }
    }
    pairs
}
