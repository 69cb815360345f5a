//! Tournament organizer: library with models, persistence store and scheduling logic.

pub mod config;
pub mod logic;
pub mod models;
pub mod store;

pub use config::{ConfigError, Settings, SmtpSettings};
pub use logic::{
    bracket_json, bracket_json_string, generate_bracket, generate_bracket_with_rng,
    generate_pool_matches, notify_players, notify_players_shared, pool_standings,
    send_current_matchups, send_current_matchups_shared, BracketJson, BracketSchedule, Mailer,
    MatchupReport, NotifyOutcome, NotifySettings, Outbox, OutgoingEmail, PoolSchedule, Resolver,
    SmtpMailer,
};
pub use models::{
    slugify, Bracket, BracketId, GameMatch, MatchId, MatchNotification, Participants, Player,
    PlayerId, PlayerStanding, Pool, PoolId, Round, RoundId, RoundOwner, Team, Tournament,
    TournamentError, TournamentId,
};
pub use store::Store;
