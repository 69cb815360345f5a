//! Data structures for tournament play: players, brackets, pools, rounds, matches.

mod error;
mod game;
mod player;
mod round;
mod tournament;

pub use error::TournamentError;
pub use game::{GameMatch, MatchId, MatchNotification, NotificationId, Participants, Team};
pub use player::{Player, PlayerId, PlayerStanding};
pub use round::{Round, RoundId, RoundOwner};
pub use tournament::{slugify, Bracket, BracketId, Pool, PoolId, Tournament, TournamentId};
