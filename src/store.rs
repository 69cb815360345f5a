//! In-memory persistence store.
//!
//! Holds every entity in creation order and validates each write before it
//! lands, so an invalid record is never stored. Lookups by id go through a
//! per-kind index. The whole store serializes to a JSON snapshot for
//! durability between restarts; loading a snapshot replays it through the
//! same validated writes.

use crate::models::{
    Bracket, BracketId, GameMatch, MatchId, MatchNotification, NotificationId, Participants,
    Player, PlayerId, Pool, PoolId, Round, RoundId, RoundOwner, Tournament, TournamentError,
    TournamentId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use uuid::Uuid;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(try_from = "Snapshot")]
pub struct Store {
    players: Vec<Player>,
    tournaments: Vec<Tournament>,
    brackets: Vec<Bracket>,
    pools: Vec<Pool>,
    rounds: Vec<Round>,
    matches: Vec<GameMatch>,
    notifications: Vec<MatchNotification>,
    #[serde(skip)]
    index: Index,
    /// Matches whose notification is being sent right now.
    #[serde(skip)]
    dispatching: HashSet<MatchId>,
}

/// Positions in the entity vectors, rebuilt on load.
#[derive(Clone, Debug, Default)]
struct Index {
    players: HashMap<PlayerId, usize>,
    tournaments: HashMap<TournamentId, usize>,
    brackets: HashMap<BracketId, usize>,
    pools: HashMap<PoolId, usize>,
    rounds: HashMap<RoundId, usize>,
    matches: HashMap<MatchId, usize>,
    notifications: HashMap<NotificationId, usize>,
    owner_rounds: HashMap<RoundOwner, Vec<usize>>,
    round_matches: HashMap<RoundId, Vec<usize>>,
    match_notifications: HashMap<MatchId, Vec<usize>>,
}

/// The serialized form of a [`Store`], not yet validated.
#[derive(Deserialize)]
struct Snapshot {
    players: Vec<Player>,
    tournaments: Vec<Tournament>,
    brackets: Vec<Bracket>,
    pools: Vec<Pool>,
    rounds: Vec<Round>,
    matches: Vec<GameMatch>,
    notifications: Vec<MatchNotification>,
}

impl TryFrom<Snapshot> for Store {
    type Error = TournamentError;

    fn try_from(snapshot: Snapshot) -> Result<Self, Self::Error> {
        let mut store = Store::new();
        for player in snapshot.players {
            store.insert_player(player)?;
        }
        for tournament in snapshot.tournaments {
            store.insert_tournament(tournament)?;
        }
        for bracket in snapshot.brackets {
            store.insert_bracket(bracket)?;
        }
        for pool in snapshot.pools {
            store.insert_pool(pool)?;
        }
        for round in snapshot.rounds {
            store.create_round(round)?;
        }
        // A derived match may have been linked after the matches it follows
        // were created; earlier rounds go first.
        let mut matches = snapshot.matches;
        matches.sort_by_key(|m| store.round(m.round).map(|r| r.number).unwrap_or(0));
        for game_match in matches {
            store.create_match(game_match)?;
        }
        for notification in snapshot.notifications {
            store.create_notification(notification)?;
        }
        Ok(store)
    }
}

/// One row of a roster CSV.
#[derive(Debug, Deserialize)]
struct PlayerRow {
    name: String,
    email: String,
}

fn get<'a, T>(items: &'a [T], index: &HashMap<Uuid, usize>, id: Uuid) -> Option<&'a T> {
    index.get(&id).and_then(|&at| items.get(at))
}

fn check_new_id(index: &HashMap<Uuid, usize>, id: Uuid) -> Result<(), TournamentError> {
    if index.contains_key(&id) {
        return Err(TournamentError::Validation(format!("Duplicate id {id}")));
    }
    Ok(())
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a snapshot written by [`Store::save`]. Every record is validated
    /// as if it were written again; the first invalid one fails the load.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, TournamentError> {
        let file = File::open(path)?;
        let snapshot: Snapshot = serde_json::from_reader(BufReader::new(file))?;
        Store::try_from(snapshot)
    }

    /// Write a snapshot. Goes through a temporary file so a crash mid-write
    /// leaves the previous snapshot intact.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), TournamentError> {
        let path = path.as_ref();
        let tmp = path.with_extension("tmp");
        {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            serde_json::to_writer(&mut writer, self)?;
            writer.flush()?;
        }
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    // Players

    /// Register a player. The name must be non-empty and the email a valid address.
    pub fn create_player(
        &mut self,
        name: &str,
        email: &str,
    ) -> Result<PlayerId, TournamentError> {
        self.insert_player(Player::new(name.trim(), email.trim()))
    }

    fn insert_player(&mut self, player: Player) -> Result<PlayerId, TournamentError> {
        check_player(&player.name, &player.email)?;
        check_new_id(&self.index.players, player.id)?;
        let id = player.id;
        self.index.players.insert(id, self.players.len());
        self.players.push(player);
        Ok(id)
    }

    /// Register every `name,email` row of a CSV roster (with header line).
    /// Rows are all validated before any player is created.
    pub fn import_players_csv<R: Read>(
        &mut self,
        reader: R,
    ) -> Result<Vec<PlayerId>, TournamentError> {
        let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let players = csv_reader
            .deserialize::<PlayerRow>()
            .map(|row| -> Result<Player, TournamentError> {
                let row = row?;
                check_player(&row.name, &row.email)?;
                Ok(Player::new(row.name, row.email))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let ids = players
            .into_iter()
            .map(|p| self.insert_player(p))
            .collect::<Result<Vec<_>, _>>()?;
        log::info!("Imported {} player(s) from CSV", ids.len());
        Ok(ids)
    }

    pub fn player(&self, id: PlayerId) -> Result<&Player, TournamentError> {
        get(&self.players, &self.index.players, id).ok_or(TournamentError::PlayerNotFound(id))
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    // Tournaments

    /// Create a tournament; its slug must be non-empty and unused.
    pub fn create_tournament(&mut self, name: &str) -> Result<TournamentId, TournamentError> {
        self.insert_tournament(Tournament::new(name.trim()))
    }

    fn insert_tournament(&mut self, tournament: Tournament) -> Result<TournamentId, TournamentError> {
        if tournament.slug.is_empty() {
            return Err(TournamentError::Validation(
                "Tournament name must contain letters or digits".into(),
            ));
        }
        if self.tournaments.iter().any(|t| t.slug == tournament.slug) {
            return Err(TournamentError::DuplicateSlug(tournament.slug));
        }
        for &player in &tournament.players {
            self.player(player)?;
        }
        check_new_id(&self.index.tournaments, tournament.id)?;
        let id = tournament.id;
        self.index.tournaments.insert(id, self.tournaments.len());
        self.tournaments.push(tournament);
        Ok(id)
    }

    pub fn add_tournament_player(
        &mut self,
        tournament: TournamentId,
        player: PlayerId,
    ) -> Result<(), TournamentError> {
        self.player(player)?;
        self.tournament_mut(tournament)?.add_player(player);
        Ok(())
    }

    pub fn tournament(&self, id: TournamentId) -> Result<&Tournament, TournamentError> {
        get(&self.tournaments, &self.index.tournaments, id)
            .ok_or_else(|| TournamentError::TournamentNotFound(id.to_string()))
    }

    fn tournament_mut(&mut self, id: TournamentId) -> Result<&mut Tournament, TournamentError> {
        let at = self.index.tournaments.get(&id).copied();
        at.and_then(|at| self.tournaments.get_mut(at))
            .ok_or_else(|| TournamentError::TournamentNotFound(id.to_string()))
    }

    pub fn tournament_by_slug(&self, slug: &str) -> Result<&Tournament, TournamentError> {
        self.tournaments
            .iter()
            .find(|t| t.slug == slug)
            .ok_or_else(|| TournamentError::TournamentNotFound(slug.to_string()))
    }

    // Brackets and pools

    /// Create a bracket; its slug must be unique within the tournament.
    pub fn create_bracket(
        &mut self,
        tournament: TournamentId,
        name: &str,
    ) -> Result<BracketId, TournamentError> {
        self.insert_bracket(Bracket::new(tournament, name.trim()))
    }

    fn insert_bracket(&mut self, bracket: Bracket) -> Result<BracketId, TournamentError> {
        self.tournament(bracket.tournament)?;
        if bracket.slug.is_empty() {
            return Err(TournamentError::Validation(
                "Bracket name must contain letters or digits".into(),
            ));
        }
        if self
            .brackets
            .iter()
            .any(|b| b.tournament == bracket.tournament && b.slug == bracket.slug)
        {
            return Err(TournamentError::DuplicateSlug(bracket.slug));
        }
        check_new_id(&self.index.brackets, bracket.id)?;
        let id = bracket.id;
        self.index.brackets.insert(id, self.brackets.len());
        self.brackets.push(bracket);
        Ok(id)
    }

    pub fn bracket(&self, id: BracketId) -> Result<&Bracket, TournamentError> {
        get(&self.brackets, &self.index.brackets, id).ok_or(TournamentError::BracketNotFound(id))
    }

    pub fn brackets_of(&self, tournament: TournamentId) -> Vec<&Bracket> {
        self.brackets
            .iter()
            .filter(|b| b.tournament == tournament)
            .collect()
    }

    pub fn create_pool(&mut self, tournament: TournamentId) -> Result<PoolId, TournamentError> {
        self.insert_pool(Pool::new(tournament))
    }

    fn insert_pool(&mut self, pool: Pool) -> Result<PoolId, TournamentError> {
        self.tournament(pool.tournament)?;
        for &player in &pool.players {
            self.player(player)?;
        }
        check_new_id(&self.index.pools, pool.id)?;
        let id = pool.id;
        self.index.pools.insert(id, self.pools.len());
        self.pools.push(pool);
        Ok(id)
    }

    pub fn add_pool_player(&mut self, pool: PoolId, player: PlayerId) -> Result<(), TournamentError> {
        self.player(player)?;
        let at = self.index.pools.get(&pool).copied();
        at.and_then(|at| self.pools.get_mut(at))
            .ok_or(TournamentError::PoolNotFound(pool))?
            .add_player(player);
        Ok(())
    }

    pub fn pool(&self, id: PoolId) -> Result<&Pool, TournamentError> {
        get(&self.pools, &self.index.pools, id).ok_or(TournamentError::PoolNotFound(id))
    }

    pub fn pools_of(&self, tournament: TournamentId) -> Vec<&Pool> {
        self.pools
            .iter()
            .filter(|p| p.tournament == tournament)
            .collect()
    }

    // Rounds

    fn check_owner(&self, owner: RoundOwner) -> Result<(), TournamentError> {
        match owner {
            RoundOwner::Bracket(id) => self.bracket(id).map(|_| ()),
            RoundOwner::Pool(id) => self.pool(id).map(|_| ()),
        }
    }

    /// Store a round. Its owner must exist and its number be unused within the owner.
    pub fn create_round(&mut self, round: Round) -> Result<RoundId, TournamentError> {
        self.check_owner(round.owner)?;
        if round.number == 0 {
            return Err(TournamentError::Validation("Round numbers start at 1".into()));
        }
        match (round.start, round.end) {
            (Some(start), Some(end)) if start < end => {}
            (None, None) => {}
            _ => {
                return Err(TournamentError::Validation(
                    "A round window needs a start before its end".into(),
                ))
            }
        }
        if self.rounds_of(round.owner).iter().any(|r| r.number == round.number) {
            return Err(TournamentError::Validation(format!(
                "Round {} already exists",
                round.number
            )));
        }
        check_new_id(&self.index.rounds, round.id)?;
        let id = round.id;
        let at = self.rounds.len();
        self.index.rounds.insert(id, at);
        self.index.owner_rounds.entry(round.owner).or_default().push(at);
        self.rounds.push(round);
        Ok(id)
    }

    /// The round with this number for the owner, created if missing.
    pub fn get_or_create_round(
        &mut self,
        owner: RoundOwner,
        number: u32,
    ) -> Result<RoundId, TournamentError> {
        if let Some(r) = self.rounds_of(owner).into_iter().find(|r| r.number == number) {
            return Ok(r.id);
        }
        self.create_round(Round::new(owner, number))
    }

    pub fn round(&self, id: RoundId) -> Result<&Round, TournamentError> {
        get(&self.rounds, &self.index.rounds, id).ok_or(TournamentError::RoundNotFound(id))
    }

    /// Rounds of a bracket or pool, by number.
    pub fn rounds_of(&self, owner: RoundOwner) -> Vec<&Round> {
        let mut rounds: Vec<&Round> = self
            .index
            .owner_rounds
            .get(&owner)
            .into_iter()
            .flatten()
            .filter_map(|&at| self.rounds.get(at))
            .collect();
        rounds.sort_by_key(|r| r.number);
        rounds
    }

    pub fn has_rounds(&self, owner: RoundOwner) -> bool {
        self.index
            .owner_rounds
            .get(&owner)
            .is_some_and(|rounds| !rounds.is_empty())
    }

    pub fn set_round_window(
        &mut self,
        id: RoundId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<(), TournamentError> {
        let at = self.index.rounds.get(&id).copied();
        at.and_then(|at| self.rounds.get_mut(at))
            .ok_or(TournamentError::RoundNotFound(id))?
            .set_window(start, end)
    }

    // Matches

    /// Participants must be distinct and reference existing players or
    /// matches. Pool matches name their players directly; a derived match
    /// follows two matches from earlier rounds of its own bracket, so the
    /// links can never form a cycle.
    fn check_participants(
        &self,
        match_id: MatchId,
        round: &Round,
        participants: &Participants,
    ) -> Result<(), TournamentError> {
        participants.validate()?;
        match *participants {
            Participants::Direct { player_1, player_2 } => {
                self.player(player_1)?;
                self.player(player_2)?;
            }
            Participants::FromMatches {
                previous_match_1,
                previous_match_2,
            } => {
                if let RoundOwner::Pool(_) = round.owner {
                    return Err(TournamentError::Validation(
                        "Pool matches must name their players directly".into(),
                    ));
                }
                for previous in [previous_match_1, previous_match_2] {
                    if previous == match_id {
                        return Err(TournamentError::Validation(
                            "A match cannot follow itself".into(),
                        ));
                    }
                    let earlier = self.round(self.game_match(previous)?.round)?;
                    if earlier.owner != round.owner || earlier.number >= round.number {
                        return Err(TournamentError::Validation(format!(
                            "Match {previous} is not in an earlier round of the same bracket"
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    pub fn create_match(&mut self, game_match: GameMatch) -> Result<MatchId, TournamentError> {
        let round = self.round(game_match.round)?;
        self.check_participants(game_match.id, round, &game_match.participants)?;
        if let (Some(s1), Some(s2)) = (game_match.player_1_score, game_match.player_2_score) {
            check_scores(s1, s2)?;
        } else if game_match.player_1_score.is_some() || game_match.player_2_score.is_some() {
            return Err(TournamentError::Validation(
                "Both scores must be recorded together".into(),
            ));
        }
        check_new_id(&self.index.matches, game_match.id)?;
        let id = game_match.id;
        let at = self.matches.len();
        self.index.matches.insert(id, at);
        self.index.round_matches.entry(game_match.round).or_default().push(at);
        self.matches.push(game_match);
        Ok(id)
    }

    pub fn game_match(&self, id: MatchId) -> Result<&GameMatch, TournamentError> {
        get(&self.matches, &self.index.matches, id).ok_or(TournamentError::MatchNotFound(id))
    }

    fn game_match_mut(&mut self, id: MatchId) -> Result<&mut GameMatch, TournamentError> {
        let at = self.index.matches.get(&id).copied();
        at.and_then(|at| self.matches.get_mut(at))
            .ok_or(TournamentError::MatchNotFound(id))
    }

    /// Matches of a round by `round_index` (creation order breaks ties).
    pub fn matches_in_round(&self, round: RoundId) -> Vec<&GameMatch> {
        let mut matches: Vec<&GameMatch> = self
            .index
            .round_matches
            .get(&round)
            .into_iter()
            .flatten()
            .filter_map(|&at| self.matches.get(at))
            .collect();
        matches.sort_by_key(|m| m.round_index);
        matches
    }

    /// Every match of a bracket or pool with its round, ordered by
    /// `(round number, round_index)`.
    pub fn matches_of(&self, owner: RoundOwner) -> Vec<(&Round, &GameMatch)> {
        let mut matches = Vec::new();
        for round in self.rounds_of(owner) {
            for m in self.matches_in_round(round.id) {
                matches.push((round, m));
            }
        }
        matches
    }

    pub fn match_count(&self, owner: RoundOwner) -> usize {
        self.matches_of(owner).len()
    }

    /// Matches whose round window contains `now`.
    pub fn current_matches(&self, now: DateTime<Utc>) -> Vec<&GameMatch> {
        self.matches
            .iter()
            .filter(|m| {
                self.round(m.round)
                    .map(|r| r.is_current(now))
                    .unwrap_or(false)
            })
            .collect()
    }

    /// Replace where a match gets its players from, under the same rules as
    /// [`Store::create_match`].
    pub fn set_participants(
        &mut self,
        id: MatchId,
        participants: Participants,
    ) -> Result<(), TournamentError> {
        let round = self.round(self.game_match(id)?.round)?;
        self.check_participants(id, round, &participants)?;
        self.game_match_mut(id)?.participants = participants;
        Ok(())
    }

    /// Record a result. Equal scores are rejected: a match needs a winner.
    pub fn record_score(
        &mut self,
        id: MatchId,
        player_1_score: u32,
        player_2_score: u32,
    ) -> Result<(), TournamentError> {
        check_scores(player_1_score, player_2_score)?;
        let m = self.game_match_mut(id)?;
        m.player_1_score = Some(player_1_score);
        m.player_2_score = Some(player_2_score);
        Ok(())
    }

    pub fn clear_score(&mut self, id: MatchId) -> Result<(), TournamentError> {
        let m = self.game_match_mut(id)?;
        m.player_1_score = None;
        m.player_2_score = None;
        Ok(())
    }

    // Notifications

    pub fn has_notification(&self, match_id: MatchId) -> bool {
        self.index
            .match_notifications
            .get(&match_id)
            .is_some_and(|sent| !sent.is_empty())
    }

    pub fn notifications_for(&self, match_id: MatchId) -> Vec<&MatchNotification> {
        self.index
            .match_notifications
            .get(&match_id)
            .into_iter()
            .flatten()
            .filter_map(|&at| self.notifications.get(at))
            .collect()
    }

    /// Record a sent notification. A match is notified at most once.
    pub fn create_notification(
        &mut self,
        notification: MatchNotification,
    ) -> Result<NotificationId, TournamentError> {
        self.game_match(notification.match_id)?;
        if self.has_notification(notification.match_id) {
            return Err(TournamentError::Validation(format!(
                "Match {} has already been notified",
                notification.match_id
            )));
        }
        check_new_id(&self.index.notifications, notification.id)?;
        let id = notification.id;
        let at = self.notifications.len();
        self.index.notifications.insert(id, at);
        self.index
            .match_notifications
            .entry(notification.match_id)
            .or_default()
            .push(at);
        self.notifications.push(notification);
        Ok(id)
    }

    /// Mark a notification as being sent. False if one is already in flight.
    /// Claims live in memory only and are not part of the snapshot.
    pub fn begin_dispatch(&mut self, match_id: MatchId) -> bool {
        self.dispatching.insert(match_id)
    }

    pub fn end_dispatch(&mut self, match_id: MatchId) {
        self.dispatching.remove(&match_id);
    }

    pub fn is_dispatching(&self, match_id: MatchId) -> bool {
        self.dispatching.contains(&match_id)
    }
}

fn check_player(name: &str, email: &str) -> Result<(), TournamentError> {
    if name.trim().is_empty() {
        return Err(TournamentError::Validation("Player name cannot be empty".into()));
    }
    if email.trim().parse::<lettre::Address>().is_err() {
        return Err(TournamentError::Validation(format!(
            "'{}' is not a valid email address",
            email.trim()
        )));
    }
    Ok(())
}

fn check_scores(player_1_score: u32, player_2_score: u32) -> Result<(), TournamentError> {
    if player_1_score == player_2_score {
        return Err(TournamentError::Validation(
            "Scores cannot be equal: a match needs a winner".into(),
        ));
    }
    Ok(())
}
