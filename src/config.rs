//! Settings from environment variables.
//!
//! Every value has a default except the SMTP relay, which is only used when
//! `EMAIL_HOST` is set.

use crate::logic::NotifySettings;
use chrono_tz::Tz;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: '{value}'")]
    Invalid { name: &'static str, value: String },
}

/// SMTP relay credentials.
#[derive(Clone, Debug)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

#[derive(Clone, Debug)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub site_name: String,
    pub from_email: String,
    pub organizer_email: String,
    pub time_zone: Tz,
    /// None: emails go to the in-memory outbox.
    pub smtp: Option<SmtpSettings>,
    /// JSON snapshot of the store.
    pub data_file: Option<PathBuf>,
    /// How often current matchups are notified.
    pub notify_interval: Duration,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

const DEFAULT_SMTP_PORT: u16 = 587;
const DEFAULT_NOTIFY_INTERVAL_SECS: u64 = 15 * 60;

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build settings from any variable source (`from_env` uses the process environment).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let port = match var("PORT") {
            Some(v) => parse(&v, "PORT")?,
            None => default_port(),
        };
        let time_zone = match var("TIME_ZONE") {
            Some(v) => v
                .parse::<Tz>()
                .map_err(|_| ConfigError::Invalid { name: "TIME_ZONE", value: v })?,
            None => Tz::UTC,
        };
        let notify_interval = match var("NOTIFY_INTERVAL_SECS") {
            Some(v) => match parse::<u64>(&v, "NOTIFY_INTERVAL_SECS")? {
                0 => {
                    return Err(ConfigError::Invalid {
                        name: "NOTIFY_INTERVAL_SECS",
                        value: v,
                    })
                }
                secs => Duration::from_secs(secs),
            },
            None => Duration::from_secs(DEFAULT_NOTIFY_INTERVAL_SECS),
        };
        let smtp = match var("EMAIL_HOST") {
            Some(host) => Some(SmtpSettings {
                host,
                port: match var("EMAIL_PORT") {
                    Some(v) => parse(&v, "EMAIL_PORT")?,
                    None => DEFAULT_SMTP_PORT,
                },
                username: var("EMAIL_HOST_USER").unwrap_or_default(),
                password: var("EMAIL_HOST_PASSWORD").unwrap_or_default(),
            }),
            None => None,
        };

        Ok(Self {
            host: var("HOST").unwrap_or_else(default_host),
            port,
            site_name: var("SITE_NAME").unwrap_or_else(|| "Tourney".to_string()),
            from_email: var("DEFAULT_FROM_EMAIL").unwrap_or_else(|| "tourney@localhost".to_string()),
            organizer_email: var("DEFAULT_ORGANIZER_EMAIL")
                .unwrap_or_else(|| "organizer@localhost".to_string()),
            time_zone,
            smtp,
            data_file: var("DATA_FILE").map(PathBuf::from),
            notify_interval,
        })
    }

    pub fn notify_settings(&self) -> NotifySettings {
        NotifySettings {
            from_email: self.from_email.clone(),
            organizer_email: self.organizer_email.clone(),
            time_zone: self.time_zone,
        }
    }
}

fn parse<T: std::str::FromStr>(value: &str, name: &'static str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        name,
        value: value.to_string(),
    })
}
