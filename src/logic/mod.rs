//! Scheduling and resolution logic: brackets, pools, winners, standings, notifications.

mod bracket;
mod bracket_json;
mod notify;
mod pool;
mod resolve;
mod standings;

pub use bracket::{generate_bracket, generate_bracket_with_rng, BracketSchedule};
pub use bracket_json::{bracket_json, bracket_json_string, BracketJson};
pub use notify::{
    notify_players, notify_players_shared, send_current_matchups, send_current_matchups_shared,
    Mailer, MatchupReport, NotifyOutcome, NotifySettings, Outbox, OutgoingEmail, SmtpMailer,
    SUBJECT,
};
pub use pool::{generate_pool_matches, PoolSchedule};
pub use resolve::{player_1, player_2, winner, Resolver};
pub use standings::pool_standings;
