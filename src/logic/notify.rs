//! Matchup notifications: email both players of a match once.

use crate::config::SmtpSettings;
use crate::logic::resolve::Resolver;
use crate::models::{MatchId, MatchNotification, NotificationId, Team, TournamentError};
use crate::store::Store;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use serde::Serialize;
use std::sync::{Mutex, RwLock, RwLockWriteGuard};

pub const SUBJECT: &str = "Your Next Matchup";

/// A rendered email, ready for a [`Mailer`].
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct OutgoingEmail {
    pub to: Vec<String>,
    pub from: String,
    pub bcc: Vec<String>,
    pub reply_to: Vec<String>,
    pub subject: String,
    pub body: String,
}

/// Delivers emails. Failures are [`TournamentError::Delivery`].
pub trait Mailer: Send + Sync {
    fn send(&self, email: &OutgoingEmail) -> Result<(), TournamentError>;
}

/// Sends through an SMTP relay.
pub struct SmtpMailer {
    transport: SmtpTransport,
}

impl SmtpMailer {
    pub fn new(smtp: &SmtpSettings) -> Result<Self, TournamentError> {
        let credentials = Credentials::new(smtp.username.clone(), smtp.password.clone());
        let transport = SmtpTransport::relay(&smtp.host)
            .map_err(|e| TournamentError::Delivery(e.to_string()))?
            .port(smtp.port)
            .credentials(credentials)
            .build();
        Ok(Self { transport })
    }
}

fn mailbox(address: &str) -> Result<Mailbox, TournamentError> {
    address
        .parse()
        .map_err(|e| TournamentError::Delivery(format!("invalid address {address}: {e}")))
}

impl Mailer for SmtpMailer {
    fn send(&self, email: &OutgoingEmail) -> Result<(), TournamentError> {
        let mut builder = Message::builder()
            .from(mailbox(&email.from)?)
            .subject(email.subject.as_str())
            .header(ContentType::TEXT_PLAIN);
        for to in &email.to {
            builder = builder.to(mailbox(to)?);
        }
        for bcc in &email.bcc {
            builder = builder.bcc(mailbox(bcc)?);
        }
        for reply_to in &email.reply_to {
            builder = builder.reply_to(mailbox(reply_to)?);
        }
        let message = builder
            .body(email.body.clone())
            .map_err(|e| TournamentError::Delivery(e.to_string()))?;

        match self.transport.send(&message) {
            Ok(_) => {
                log::info!("email sent to {} successfully!", email.to.join(", "));
                Ok(())
            }
            Err(err) => {
                log::error!("could not send email to {}: {err}", email.to.join(", "));
                Err(TournamentError::Delivery(err.to_string()))
            }
        }
    }
}

/// Keeps sent emails in memory. Used when no SMTP relay is configured, and in tests.
#[derive(Debug, Default)]
pub struct Outbox {
    sent: Mutex<Vec<OutgoingEmail>>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything sent so far, oldest first.
    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.sent.lock().map(|sent| sent.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Mailer for Outbox {
    fn send(&self, email: &OutgoingEmail) -> Result<(), TournamentError> {
        log::info!(
            "outbox: '{}' to {}\n{}",
            email.subject,
            email.to.join(", "),
            email.body
        );
        self.sent
            .lock()
            .map_err(|_| TournamentError::Delivery("outbox lock poisoned".into()))?
            .push(email.clone());
        Ok(())
    }
}

/// Addresses and display zone for notifications.
#[derive(Clone, Debug)]
pub struct NotifySettings {
    pub from_email: String,
    /// Blind-copied on every notification.
    pub organizer_email: String,
    /// Zone round deadlines are shown in.
    pub time_zone: Tz,
}

/// Result of [`notify_players`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum NotifyOutcome {
    Sent(NotificationId),
    /// A notification was recorded earlier; nothing was sent.
    AlreadyNotified(MatchId),
    /// Another caller is sending this notification right now; nothing was sent.
    InProgress(MatchId),
}

impl NotifyOutcome {
    pub fn message(&self) -> String {
        match self {
            NotifyOutcome::Sent(_) => "The players have been notified".to_string(),
            NotifyOutcome::AlreadyNotified(id) => {
                format!("The players in match {id} have already been notified")
            }
            NotifyOutcome::InProgress(id) => {
                format!("The players in match {id} are being notified")
            }
        }
    }
}

/// An email claimed for sending, between [`claim`] and [`finish`].
struct Claimed {
    match_id: MatchId,
    email: OutgoingEmail,
    names: (String, String),
}

enum Claim {
    Send(Claimed),
    Done(NotifyOutcome),
}

/// Render the email and mark the match as being dispatched, unless it was
/// notified already or is being notified by someone else.
fn claim(
    store: &mut Store,
    settings: &NotifySettings,
    match_id: MatchId,
) -> Result<Claim, TournamentError> {
    if store.has_notification(match_id) {
        store.game_match(match_id)?;
        return Ok(Claim::Done(NotifyOutcome::AlreadyNotified(match_id)));
    }
    if store.is_dispatching(match_id) {
        return Ok(Claim::Done(NotifyOutcome::InProgress(match_id)));
    }
    let (email, names) = matchup_email(store, settings, match_id)?;
    store.begin_dispatch(match_id);
    Ok(Claim::Send(Claimed {
        match_id,
        email,
        names,
    }))
}

/// Release the claim and, if the email went out, record the notification.
fn finish(
    store: &mut Store,
    claimed: Claimed,
    delivered: Result<(), TournamentError>,
    now: DateTime<Utc>,
) -> Result<NotifyOutcome, TournamentError> {
    store.end_dispatch(claimed.match_id);
    delivered?;
    let id = store.create_notification(MatchNotification::new(claimed.match_id, now))?;
    log::info!(
        "Notified {} and {} of match {}",
        claimed.names.0,
        claimed.names.1,
        claimed.match_id
    );
    Ok(NotifyOutcome::Sent(id))
}

/// Email both players of a match about their matchup, once.
///
/// If any notification is recorded for the match this is a no-op. Otherwise
/// the email is sent first and the notification recorded after, so a failed
/// delivery leaves nothing behind and can be retried.
pub fn notify_players(
    store: &mut Store,
    mailer: &dyn Mailer,
    settings: &NotifySettings,
    match_id: MatchId,
    now: DateTime<Utc>,
) -> Result<NotifyOutcome, TournamentError> {
    let claimed = match claim(store, settings, match_id)? {
        Claim::Send(claimed) => claimed,
        Claim::Done(outcome) => return Ok(outcome),
    };
    let delivered = mailer.send(&claimed.email);
    finish(store, claimed, delivered, now)
}

fn write(store: &RwLock<Store>) -> Result<RwLockWriteGuard<'_, Store>, TournamentError> {
    store.write().map_err(|_| TournamentError::LockPoisoned)
}

/// [`notify_players`] over a shared store.
///
/// The write lock is held while the email is rendered and while the
/// notification is recorded, but not while the mailer sends. Other readers
/// and writers carry on during a slow delivery; a concurrent call for the
/// same match gets [`NotifyOutcome::InProgress`].
pub fn notify_players_shared(
    store: &RwLock<Store>,
    mailer: &dyn Mailer,
    settings: &NotifySettings,
    match_id: MatchId,
    now: DateTime<Utc>,
) -> Result<NotifyOutcome, TournamentError> {
    let claimed = match claim(&mut *write(store)?, settings, match_id)? {
        Claim::Send(claimed) => claimed,
        Claim::Done(outcome) => return Ok(outcome),
    };
    let delivered = mailer.send(&claimed.email);
    finish(&mut *write(store)?, claimed, delivered, now)
}

/// Render the matchup email, along with both player names.
fn matchup_email(
    store: &Store,
    settings: &NotifySettings,
    match_id: MatchId,
) -> Result<(OutgoingEmail, (String, String)), TournamentError> {
    let m = store.game_match(match_id)?;
    let round = store.round(m.round)?;

    let mut resolver = Resolver::new(store);
    let (Some(player_1), Some(player_2)) = (
        resolver.player(match_id, Team::One)?,
        resolver.player(match_id, Team::Two)?,
    ) else {
        return Err(TournamentError::PlayersUndetermined(match_id));
    };
    let player_1 = store.player(player_1)?;
    let player_2 = store.player(player_2)?;

    let deadline = round.end.map(|end| end.with_timezone(&settings.time_zone));
    let email = OutgoingEmail {
        to: vec![player_1.email.clone(), player_2.email.clone()],
        from: settings.from_email.clone(),
        bcc: vec![settings.organizer_email.clone()],
        reply_to: vec![player_1.email.clone(), player_2.email.clone()],
        subject: SUBJECT.to_string(),
        body: render_body(&player_1.name, &player_2.name, round.number, deadline),
    };
    Ok((email, (player_1.name.clone(), player_2.name.clone())))
}

fn render_body(
    player_1: &str,
    player_2: &str,
    round: u32,
    deadline: Option<DateTime<Tz>>,
) -> String {
    let deadline = match deadline {
        Some(end) => format!("Please play your match by {}.", end.format("%A, %B %-d at %-I:%M %p %Z")),
        None => "No deadline has been set for this round yet.".to_string(),
    };
    format!(
        "Hi {player_1} and {player_2},\n\n\
         You are matched up against each other in round {round}.\n\
         {deadline}\n\n\
         Reply to this email to arrange a time with your opponent, and let the \
         organizer know the result once you have played.\n"
    )
}

/// Per-match outcome of [`send_current_matchups`].
pub type MatchupReport = Vec<(MatchId, Result<NotifyOutcome, TournamentError>)>;

fn log_outcome(match_id: MatchId, outcome: &Result<NotifyOutcome, TournamentError>) {
    match outcome {
        Ok(NotifyOutcome::Sent(_)) => {}
        Ok(outcome) => log::debug!("{}", outcome.message()),
        Err(e) => log::warn!("Skipping match {match_id}: {e}"),
    }
}

/// Notify the players of every match whose round window contains `now`.
/// A failed match is logged and reported; the rest are still processed.
pub fn send_current_matchups(
    store: &mut Store,
    mailer: &dyn Mailer,
    settings: &NotifySettings,
    now: DateTime<Utc>,
) -> MatchupReport {
    let current: Vec<MatchId> = store.current_matches(now).iter().map(|m| m.id).collect();
    let mut report = Vec::with_capacity(current.len());
    for match_id in current {
        let outcome = notify_players(store, mailer, settings, match_id, now);
        log_outcome(match_id, &outcome);
        report.push((match_id, outcome));
    }
    report
}

/// [`send_current_matchups`] over a shared store, one match at a time
/// through [`notify_players_shared`].
pub fn send_current_matchups_shared(
    store: &RwLock<Store>,
    mailer: &dyn Mailer,
    settings: &NotifySettings,
    now: DateTime<Utc>,
) -> Result<MatchupReport, TournamentError> {
    let current: Vec<MatchId> = store
        .read()
        .map_err(|_| TournamentError::LockPoisoned)?
        .current_matches(now)
        .iter()
        .map(|m| m.id)
        .collect();
    let mut report = Vec::with_capacity(current.len());
    for match_id in current {
        let outcome = notify_players_shared(store, mailer, settings, match_id, now);
        log_outcome(match_id, &outcome);
        report.push((match_id, outcome));
    }
    Ok(report)
}
