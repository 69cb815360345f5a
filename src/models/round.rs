//! Round: a numbered stage of exactly one bracket or pool.

use crate::models::error::TournamentError;
use crate::models::tournament::{BracketId, PoolId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a round.
pub type RoundId = Uuid;

/// The schedule a round belongs to.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundOwner {
    Bracket(BracketId),
    Pool(PoolId),
}

impl RoundOwner {
    /// Build an owner from optional bracket and pool references.
    /// Exactly one of them must be set.
    pub fn from_parts(
        bracket: Option<BracketId>,
        pool: Option<PoolId>,
    ) -> Result<Self, TournamentError> {
        match (bracket, pool) {
            (Some(b), None) => Ok(RoundOwner::Bracket(b)),
            (None, Some(p)) => Ok(RoundOwner::Pool(p)),
            (Some(_), Some(_)) => Err(TournamentError::Validation(
                "A round cannot belong to both a bracket and a pool".into(),
            )),
            (None, None) => Err(TournamentError::Validation(
                "A round must belong to a bracket or a pool".into(),
            )),
        }
    }

    pub fn bracket(&self) -> Option<BracketId> {
        match self {
            RoundOwner::Bracket(id) => Some(*id),
            RoundOwner::Pool(_) => None,
        }
    }

    pub fn pool(&self) -> Option<PoolId> {
        match self {
            RoundOwner::Pool(id) => Some(*id),
            RoundOwner::Bracket(_) => None,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Round {
    pub id: RoundId,
    /// 1-based, meaningful only within the owner.
    pub number: u32,
    pub owner: RoundOwner,
    /// Notification window; both set or both unset.
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl Round {
    pub fn new(owner: RoundOwner, number: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            number,
            owner,
            start: None,
            end: None,
        }
    }

    /// Build a round from optional owner references (see [`RoundOwner::from_parts`]).
    pub fn from_parts(
        number: u32,
        bracket: Option<BracketId>,
        pool: Option<PoolId>,
    ) -> Result<Self, TournamentError> {
        if number == 0 {
            return Err(TournamentError::Validation(
                "Round numbers start at 1".into(),
            ));
        }
        Ok(Self::new(RoundOwner::from_parts(bracket, pool)?, number))
    }

    /// Set the notification window. `start` must be before `end`.
    pub fn set_window(
        &mut self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<(), TournamentError> {
        if start >= end {
            return Err(TournamentError::Validation(
                "A round must start before it ends".into(),
            ));
        }
        self.start = Some(start);
        self.end = Some(end);
        Ok(())
    }

    /// True if the round has a window and `now` lies within it (inclusive).
    pub fn is_current(&self, now: DateTime<Utc>) -> bool {
        match (self.start, self.end) {
            (Some(start), Some(end)) => start <= now && now <= end,
            _ => false,
        }
    }
}
