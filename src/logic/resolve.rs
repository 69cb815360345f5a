//! Lazy winner resolution over the match graph.
//!
//! A match's players are either named directly or are the winners of two
//! earlier matches, which may themselves depend on earlier matches. Nothing is
//! stored: players and winners are recomputed from scores on every read.

use crate::models::{GameMatch, MatchId, PlayerId, Team, TournamentError};
use crate::store::Store;
use std::collections::HashMap;

/// Resolves players and winners for one read pass, caching winners so that a
/// whole bracket is walked in linear time.
pub struct Resolver<'a> {
    store: &'a Store,
    winners: HashMap<MatchId, Option<PlayerId>>,
}

impl<'a> Resolver<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self {
            store,
            winners: HashMap::new(),
        }
    }

    /// The player on `team`'s side of the match, `None` while an earlier match is undecided.
    pub fn player(&mut self, match_id: MatchId, team: Team) -> Result<Option<PlayerId>, TournamentError> {
        let store = self.store;
        let m = store.game_match(match_id)?;
        let mut path = vec![match_id];
        self.player_of(m, team, &mut path)
    }

    pub fn player_1(&mut self, match_id: MatchId) -> Result<Option<PlayerId>, TournamentError> {
        self.player(match_id, Team::One)
    }

    pub fn player_2(&mut self, match_id: MatchId) -> Result<Option<PlayerId>, TournamentError> {
        self.player(match_id, Team::Two)
    }

    /// The winner of the match, `None` without a decisive recorded result.
    pub fn winner(&mut self, match_id: MatchId) -> Result<Option<PlayerId>, TournamentError> {
        let mut path = Vec::new();
        self.winner_of(match_id, &mut path)
    }

    /// The loser of the match, under the same conditions as [`Resolver::winner`].
    pub fn loser(&mut self, match_id: MatchId) -> Result<Option<PlayerId>, TournamentError> {
        let winning_team = self.store.game_match(match_id)?.winning_team();
        match winning_team {
            Some(Team::One) => self.player(match_id, Team::Two),
            Some(Team::Two) => self.player(match_id, Team::One),
            None => Ok(None),
        }
    }

    fn player_of(
        &mut self,
        m: &GameMatch,
        team: Team,
        path: &mut Vec<MatchId>,
    ) -> Result<Option<PlayerId>, TournamentError> {
        if let Some(player) = m.participants.player_init(team) {
            return Ok(Some(player));
        }
        match m.participants.previous_match(team) {
            Some(previous) => self.winner_of(previous, path),
            None => Ok(None),
        }
    }

    // `path` holds the matches currently being resolved; meeting one again is a cycle.
    fn winner_of(
        &mut self,
        match_id: MatchId,
        path: &mut Vec<MatchId>,
    ) -> Result<Option<PlayerId>, TournamentError> {
        if let Some(winner) = self.winners.get(&match_id) {
            return Ok(*winner);
        }
        if path.contains(&match_id) {
            log::debug!("Cycle through match {match_id} while resolving winners");
            return Err(TournamentError::ResolutionCycle(match_id));
        }
        let store = self.store;
        let m = store.game_match(match_id)?;
        let winner = match m.winning_team() {
            Some(team) => {
                path.push(match_id);
                let winner = self.player_of(m, team, path)?;
                path.pop();
                winner
            }
            None => None,
        };
        self.winners.insert(match_id, winner);
        Ok(winner)
    }
}

/// The player on side one of a match (see [`Resolver::player`]).
pub fn player_1(store: &Store, match_id: MatchId) -> Result<Option<PlayerId>, TournamentError> {
    Resolver::new(store).player_1(match_id)
}

/// The player on side two of a match (see [`Resolver::player`]).
pub fn player_2(store: &Store, match_id: MatchId) -> Result<Option<PlayerId>, TournamentError> {
    Resolver::new(store).player_2(match_id)
}

/// The winner of a match (see [`Resolver::winner`]).
pub fn winner(store: &Store, match_id: MatchId) -> Result<Option<PlayerId>, TournamentError> {
    Resolver::new(store).winner(match_id)
}
