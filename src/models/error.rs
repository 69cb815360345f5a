//! Errors that can occur during tournament operations.

use crate::models::{BracketId, MatchId, PlayerId, PoolId, RoundId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TournamentError {
    /// A write would leave an entity in an invalid state. Nothing was written.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Single-elimination brackets need a power of two (at least 2) players.
    #[error("A bracket needs a power of two players (at least 2), got {0}")]
    InvalidBracketSize(usize),

    /// Round-robin pools need at least 2 players.
    #[error("Need at least 2 players to generate matches")]
    NotEnoughPlayers,

    /// Rounds were already generated for this bracket or pool.
    #[error("Matches have already been generated")]
    AlreadyScheduled,

    #[error("Player {0} appears more than once")]
    DuplicatePlayer(PlayerId),

    #[error("The slug '{0}' is already in use")]
    DuplicateSlug(String),

    #[error("Player {0} not found")]
    PlayerNotFound(PlayerId),

    #[error("Tournament '{0}' not found")]
    TournamentNotFound(String),

    #[error("Bracket {0} not found")]
    BracketNotFound(BracketId),

    #[error("Pool {0} not found")]
    PoolNotFound(PoolId),

    #[error("Round {0} not found")]
    RoundNotFound(RoundId),

    #[error("Match {0} not found")]
    MatchNotFound(MatchId),

    /// A chain of previous matches leads back to itself.
    #[error("Match {0} depends on itself through its previous matches")]
    ResolutionCycle(MatchId),

    /// The players of the match are not known yet (earlier matches undecided).
    #[error("The players in match {0} are not determined yet")]
    PlayersUndetermined(MatchId),

    /// The notification sender failed; the notification can be retried.
    #[error("Could not deliver notification: {0}")]
    Delivery(String),

    /// A thread panicked while holding the shared store.
    #[error("The store lock is poisoned")]
    LockPoisoned,

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TournamentError {
    /// Whether the error means the requested entity does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            TournamentError::PlayerNotFound(_)
                | TournamentError::TournamentNotFound(_)
                | TournamentError::BracketNotFound(_)
                | TournamentError::PoolNotFound(_)
                | TournamentError::RoundNotFound(_)
                | TournamentError::MatchNotFound(_)
        )
    }
}
