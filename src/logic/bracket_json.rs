//! Bracket export in the shape the bracket display widget reads.
//!
//! ```text
//! {
//!   "teams":   [[p1, p2], ...],         one pair per first-round match
//!   "results": [[ [[s1, s2] | [], ...],  one list per round
//!                 ... ]]                  outer list: one entry per bracket
//! }
//! ```

use crate::logic::resolve::Resolver;
use crate::models::{BracketId, PlayerId, RoundOwner, Team, TournamentError};
use crate::store::Store;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct BracketJson {
    /// Names of the first-round pairings, by position. `None` is an undecided slot.
    pub teams: Vec<[Option<String>; 2]>,
    /// Always exactly one element: this bracket's rounds. Each result is
    /// `[score_1, score_2]`, or empty when no result is recorded.
    pub results: Vec<Vec<Vec<Vec<u32>>>>,
}

/// Walk the bracket's matches by round and position and collect teams and results.
pub fn bracket_json(store: &Store, bracket: BracketId) -> Result<BracketJson, TournamentError> {
    store.bracket(bracket)?;
    let mut resolver = Resolver::new(store);
    let mut teams = Vec::new();
    let mut rounds: Vec<Vec<Vec<u32>>> = Vec::new();

    for (round, m) in store.matches_of(RoundOwner::Bracket(bracket)) {
        if round.number == 1 {
            let player_1 = resolver.player(m.id, Team::One)?;
            let player_2 = resolver.player(m.id, Team::Two)?;
            teams.push([name_of(store, player_1)?, name_of(store, player_2)?]);
        }

        while rounds.len() < round.number as usize {
            rounds.push(Vec::new());
        }
        let result = match m.scores() {
            Some((s1, s2)) => vec![s1, s2],
            None => Vec::new(),
        };
        rounds[round.number as usize - 1].push(result);
    }

    Ok(BracketJson {
        teams,
        results: vec![rounds],
    })
}

/// [`bracket_json`] rendered as a JSON string.
pub fn bracket_json_string(store: &Store, bracket: BracketId) -> Result<String, TournamentError> {
    Ok(serde_json::to_string(&bracket_json(store, bracket)?)?)
}

fn name_of(store: &Store, player: Option<PlayerId>) -> Result<Option<String>, TournamentError> {
    player
        .map(|pid| store.player(pid).map(|p| p.name.clone()))
        .transpose()
}
