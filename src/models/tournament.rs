//! Tournament, Bracket and Pool.

use crate::models::player::PlayerId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a tournament.
pub type TournamentId = Uuid;

/// Unique identifier for a single-elimination bracket.
pub type BracketId = Uuid;

/// Unique identifier for a round-robin pool.
pub type PoolId = Uuid;

/// URL-safe form of a name: "My Test Tournament" becomes "my-test-tournament".
///
/// Alphanumerics are lowercased, runs of whitespace, `-` or `_` collapse into a
/// single `-`, everything else is dropped. Leading and trailing dashes are trimmed.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for c in name.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(c.to_lowercase());
        } else if c.is_whitespace() || c == '-' || c == '_' {
            pending_dash = true;
        }
    }
    slug
}

/// A tournament: a named set of participating players.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Tournament {
    pub id: TournamentId,
    pub name: String,
    pub slug: String,
    /// Participating players (unordered; kept in the order they were added).
    pub players: Vec<PlayerId>,
}

impl Tournament {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: Uuid::new_v4(),
            slug: slugify(&name),
            name,
            players: Vec::new(),
        }
    }

    /// Add a participant. Returns false if the player was already in.
    pub fn add_player(&mut self, player_id: PlayerId) -> bool {
        if self.players.contains(&player_id) {
            return false;
        }
        self.players.push(player_id);
        true
    }
}

/// A single-elimination bracket. Its matches hang off rounds owned by it.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Bracket {
    pub id: BracketId,
    pub tournament: TournamentId,
    pub name: String,
    pub slug: String,
}

impl Bracket {
    pub fn new(tournament: TournamentId, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: Uuid::new_v4(),
            tournament,
            slug: slugify(&name),
            name,
        }
    }
}

/// A round-robin pool within a tournament.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Pool {
    pub id: PoolId,
    pub tournament: TournamentId,
    pub players: Vec<PlayerId>,
}

impl Pool {
    pub fn new(tournament: TournamentId) -> Self {
        Self {
            id: Uuid::new_v4(),
            tournament,
            players: Vec::new(),
        }
    }

    /// Add a participant. Returns false if the player was already in.
    pub fn add_player(&mut self, player_id: PlayerId) -> bool {
        if self.players.contains(&player_id) {
            return false;
        }
        self.players.push(player_id);
        true
    }
}
