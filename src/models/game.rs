//! Match (game), its participant source, and match notifications.

use crate::models::error::TournamentError;
use crate::models::player::PlayerId;
use crate::models::round::RoundId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a match.
pub type MatchId = Uuid;

/// Unique identifier for a sent notification.
pub type NotificationId = Uuid;

/// One side of a match.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Team {
    #[default]
    One,
    Two,
}

/// Where a match gets its two players from.
///
/// A leaf match names its players directly (first bracket round, every pool
/// match). A derived match takes the winners of two earlier matches.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Participants {
    Direct {
        player_1: PlayerId,
        player_2: PlayerId,
    },
    FromMatches {
        previous_match_1: MatchId,
        previous_match_2: MatchId,
    },
}

impl Participants {
    /// Build from the four optional references.
    ///
    /// Accepted: both players and no matches, or both matches and no players.
    /// Every other combination is a validation error.
    pub fn from_parts(
        player_1_init: Option<PlayerId>,
        player_2_init: Option<PlayerId>,
        previous_match_1: Option<MatchId>,
        previous_match_2: Option<MatchId>,
    ) -> Result<Self, TournamentError> {
        let participants = match (player_1_init, player_2_init, previous_match_1, previous_match_2) {
            (Some(player_1), Some(player_2), None, None) => Participants::Direct { player_1, player_2 },
            (None, None, Some(previous_match_1), Some(previous_match_2)) => Participants::FromMatches {
                previous_match_1,
                previous_match_2,
            },
            _ => {
                return Err(TournamentError::Validation(
                    "Either both player fields or both match fields must be set".into(),
                ))
            }
        };
        participants.validate()?;
        Ok(participants)
    }

    /// Both sides must be distinct.
    pub fn validate(&self) -> Result<(), TournamentError> {
        match self {
            Participants::Direct { player_1, player_2 } if player_1 == player_2 => Err(
                TournamentError::Validation("A player cannot play against themselves".into()),
            ),
            Participants::FromMatches {
                previous_match_1,
                previous_match_2,
            } if previous_match_1 == previous_match_2 => Err(TournamentError::Validation(
                "Both previous matches must be different".into(),
            )),
            _ => Ok(()),
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Participants::Direct { .. })
    }

    pub fn player_init(&self, team: Team) -> Option<PlayerId> {
        match (self, team) {
            (Participants::Direct { player_1, .. }, Team::One) => Some(*player_1),
            (Participants::Direct { player_2, .. }, Team::Two) => Some(*player_2),
            _ => None,
        }
    }

    pub fn previous_match(&self, team: Team) -> Option<MatchId> {
        match (self, team) {
            (Participants::FromMatches { previous_match_1, .. }, Team::One) => Some(*previous_match_1),
            (Participants::FromMatches { previous_match_2, .. }, Team::Two) => Some(*previous_match_2),
            _ => None,
        }
    }
}

/// A single match between two players.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct GameMatch {
    pub id: MatchId,
    pub round: RoundId,
    /// Position within the round (pairing and display order).
    pub round_index: u32,
    pub participants: Participants,
    /// None until a result is recorded.
    pub player_1_score: Option<u32>,
    pub player_2_score: Option<u32>,
}

impl GameMatch {
    pub fn new(round: RoundId, round_index: u32, participants: Participants) -> Self {
        Self {
            id: Uuid::new_v4(),
            round,
            round_index,
            participants,
            player_1_score: None,
            player_2_score: None,
        }
    }

    /// Leaf match between two known players.
    pub fn direct(round: RoundId, round_index: u32, player_1: PlayerId, player_2: PlayerId) -> Self {
        Self::new(round, round_index, Participants::Direct { player_1, player_2 })
    }

    /// Derived match between the winners of two earlier matches.
    pub fn from_matches(
        round: RoundId,
        round_index: u32,
        previous_match_1: MatchId,
        previous_match_2: MatchId,
    ) -> Self {
        Self::new(
            round,
            round_index,
            Participants::FromMatches {
                previous_match_1,
                previous_match_2,
            },
        )
    }

    pub fn player_1_init(&self) -> Option<PlayerId> {
        self.participants.player_init(Team::One)
    }

    pub fn player_2_init(&self) -> Option<PlayerId> {
        self.participants.player_init(Team::Two)
    }

    pub fn previous_match_1(&self) -> Option<MatchId> {
        self.participants.previous_match(Team::One)
    }

    pub fn previous_match_2(&self) -> Option<MatchId> {
        self.participants.previous_match(Team::Two)
    }

    /// Both scores, if a result has been recorded.
    pub fn scores(&self) -> Option<(u32, u32)> {
        Some((self.player_1_score?, self.player_2_score?))
    }

    /// Which side won: requires both scores, strictly higher wins, equal is undecided.
    pub fn winning_team(&self) -> Option<Team> {
        let (s1, s2) = self.scores()?;
        if s1 > s2 {
            Some(Team::One)
        } else if s2 > s1 {
            Some(Team::Two)
        } else {
            None
        }
    }
}

/// Record that the players of a match were notified.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct MatchNotification {
    pub id: NotificationId,
    pub match_id: MatchId,
    pub sent: DateTime<Utc>,
}

impl MatchNotification {
    pub fn new(match_id: MatchId, sent: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            match_id,
            sent,
        }
    }
}
