//! Round-robin pools: schedule every pairing without double-booking a player within a round.

use crate::models::{
    GameMatch, MatchId, PlayerId, PoolId, Round, RoundId, RoundOwner, TournamentError,
};
use crate::store::Store;
use serde::Serialize;
use std::collections::HashSet;

/// What [`generate_pool_matches`] created.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct PoolSchedule {
    /// Round ids, round 1 first.
    pub rounds: Vec<RoundId>,
    pub matches: Vec<MatchId>,
    /// Pairings that found no round with both players free.
    pub unscheduled: Vec<(PlayerId, PlayerId)>,
}

/// Generate the round-robin schedule of a pool.
///
/// 1. Pad an odd player count with a bye so the count `n` is even.
/// 2. Create rounds 1 to `n - 1` up front.
/// 3. Walk every ordered pair of distinct players in pool order; a pair not
///    yet scheduled (either way round) goes into the first round where neither
///    player is playing yet. Pairs with the bye are skipped.
///
/// This single greedy pass does not find a complete schedule for every player
/// count (5 players leave pairs over, for example). Such pairs are returned in
/// [`PoolSchedule::unscheduled`] instead of forcing an extra round.
pub fn generate_pool_matches(
    store: &mut Store,
    pool: PoolId,
) -> Result<PoolSchedule, TournamentError> {
    let players = store.pool(pool)?.players.clone();
    if players.len() < 2 {
        return Err(TournamentError::NotEnoughPlayers);
    }
    let owner = RoundOwner::Pool(pool);
    if store.has_rounds(owner) {
        return Err(TournamentError::AlreadyScheduled);
    }

    // None is the bye.
    let mut slots: Vec<Option<PlayerId>> = players.iter().copied().map(Some).collect();
    if slots.len() % 2 == 1 {
        slots.push(None);
    }

    let mut schedule = PoolSchedule::default();
    for number in 1..slots.len() as u32 {
        schedule.rounds.push(store.create_round(Round::new(owner, number))?);
    }
    let mut busy: Vec<HashSet<PlayerId>> = vec![HashSet::new(); schedule.rounds.len()];
    let mut paired: HashSet<(PlayerId, PlayerId)> = HashSet::new();

    for &x in &slots {
        for &y in &slots {
            let (Some(x), Some(y)) = (x, y) else {
                continue;
            };
            if x == y || paired.contains(&(x, y)) || paired.contains(&(y, x)) {
                continue;
            }
            let free = busy
                .iter()
                .position(|used| !used.contains(&x) && !used.contains(&y));
            match free {
                Some(i) => {
                    let m = GameMatch::direct(schedule.rounds[i], 0, x, y);
                    schedule.matches.push(store.create_match(m)?);
                    busy[i].insert(x);
                    busy[i].insert(y);
                    paired.insert((x, y));
                }
                None => {
                    log::warn!("Pool {pool}: no free round for {x} vs {y}, leaving it unscheduled");
                    schedule.unscheduled.push((x, y));
                    paired.insert((x, y));
                }
            }
        }
    }

    log::info!(
        "Generated pool {} schedule: {} players, {} rounds, {} matches",
        pool,
        players.len(),
        schedule.rounds.len(),
        schedule.matches.len()
    );
    Ok(schedule)
}
