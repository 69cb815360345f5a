//! Pool standings: wins and losses per player.

use crate::logic::resolve::Resolver;
use crate::models::{PlayerId, PlayerStanding, PoolId, RoundOwner, Team, TournamentError};
use crate::store::Store;

/// Win/loss table for a pool, most wins first.
///
/// Every player who appears in a pool match gets a row, even without a
/// decided match. Rows with equal wins keep the order in which their players
/// were first seen (rounds by number, matches by position).
pub fn pool_standings(store: &Store, pool: PoolId) -> Result<Vec<PlayerStanding>, TournamentError> {
    store.pool(pool)?;
    let mut resolver = Resolver::new(store);
    let mut standings: Vec<PlayerStanding> = Vec::new();

    for (_, m) in store.matches_of(RoundOwner::Pool(pool)) {
        let player_1 = resolver.player(m.id, Team::One)?;
        let player_2 = resolver.player(m.id, Team::Two)?;
        for pid in [player_1, player_2].into_iter().flatten() {
            if !standings.iter().any(|s| s.player_id == pid) {
                standings.push(PlayerStanding::from_player(store.player(pid)?));
            }
        }

        let (winner, loser) = match m.winning_team() {
            Some(Team::One) => (player_1, player_2),
            Some(Team::Two) => (player_2, player_1),
            None => continue,
        };
        if let Some(row) = row_mut(&mut standings, winner) {
            row.add_win();
        }
        if let Some(row) = row_mut(&mut standings, loser) {
            row.add_loss();
        }
    }

    standings.sort_by(|a, b| b.wins.cmp(&a.wins));
    Ok(standings)
}

fn row_mut(standings: &mut [PlayerStanding], player: Option<PlayerId>) -> Option<&mut PlayerStanding> {
    let player = player?;
    standings.iter_mut().find(|s| s.player_id == player)
}
