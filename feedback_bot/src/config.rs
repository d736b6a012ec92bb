use std::{path::PathBuf, time::Duration};

use teloxide::types::UserId;
use thiserror::Error;

pub const DEFAULT_REMINDER_INTERVAL_SECS: u64 = 7200;
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_DATABASE_URL: &str = "sqlite:feedback_bot.sqlite";
pub const DEFAULT_LOG_FILE: &str = "feedback_bot.log";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),
    #[error("{name} has an invalid value {value:?}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: &'static str,
    },
}

/// Process-wide settings, read once at startup and never changed afterwards.
#[derive(Clone, Debug)]
pub struct Config {
    pub bot_token: String,
    pub owner_id: UserId,
    pub reminder_interval: Duration,
    pub port: u16,
    pub database_url: String,
    pub log_file: PathBuf,
    /// Hour of the day (UTC) at which yesterday's contest winners are announced.
    pub contest_hour_utc: u32,
}

impl Config {
    /// Read configuration from the process environment, after loading `.env` if there is one.
    pub fn from_env() -> Result<Config, ConfigError> {
        let _ = dotenvy::dotenv();
        Config::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Config, ConfigError> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let bot_token = get("BOT_TOKEN").ok_or(ConfigError::Missing("BOT_TOKEN"))?;

        let owner_id = get("OWNER_ID").ok_or(ConfigError::Missing("OWNER_ID"))?;
        let owner_id = match owner_id.trim().parse::<u64>() {
            Ok(0) => return Err(invalid("OWNER_ID", owner_id, "must not be zero")),
            Ok(id) => UserId(id),
            Err(_) => return Err(invalid("OWNER_ID", owner_id, "not a user ID")),
        };

        let reminder_interval = match get("REMINDER_INTERVAL") {
            None => DEFAULT_REMINDER_INTERVAL_SECS,
            Some(v) => match v.trim().parse::<u64>() {
                Ok(0) => return Err(invalid("REMINDER_INTERVAL", v, "must be positive")),
                Ok(secs) => secs,
                Err(_) => return Err(invalid("REMINDER_INTERVAL", v, "not a number of seconds")),
            },
        };

        let port = match get("PORT") {
            None => DEFAULT_PORT,
            Some(v) => v
                .trim()
                .parse()
                .map_err(|_| invalid("PORT", v.clone(), "not a port number"))?,
        };

        let contest_hour_utc = match get("CONTEST_HOUR_UTC") {
            None => 0,
            Some(v) => match v.trim().parse::<u32>() {
                Ok(hour) if hour < 24 => hour,
                _ => return Err(invalid("CONTEST_HOUR_UTC", v, "must be an hour from 0 to 23")),
            },
        };

        Ok(Config {
            bot_token,
            owner_id,
            reminder_interval: Duration::from_secs(reminder_interval),
            port,
            database_url: get("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            log_file: get("LOG_FILE")
                .unwrap_or_else(|| DEFAULT_LOG_FILE.to_string())
                .into(),
            contest_hour_utc,
        })
    }
}

fn invalid(name: &'static str, value: String, reason: &'static str) -> ConfigError {
    ConfigError::Invalid {
        name,
        value,
        reason,
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults_apply() {
        let config =
            Config::from_lookup(lookup(&[("BOT_TOKEN", "123:abc"), ("OWNER_ID", "42")])).unwrap();
        assert_eq!(config.bot_token, "123:abc");
        assert_eq!(config.owner_id, UserId(42));
        assert_eq!(config.reminder_interval, Duration::from_secs(7200));
        assert_eq!(config.port, 8080);
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(config.log_file, PathBuf::from(DEFAULT_LOG_FILE));
        assert_eq!(config.contest_hour_utc, 0);
    }

    #[test]
    fn overrides_apply() {
        let config = Config::from_lookup(lookup(&[
            ("BOT_TOKEN", "t"),
            ("OWNER_ID", "7"),
            ("REMINDER_INTERVAL", "60"),
            ("PORT", "9000"),
            ("CONTEST_HOUR_UTC", "21"),
        ]))
        .unwrap();
        assert_eq!(config.reminder_interval, Duration::from_secs(60));
        assert_eq!(config.port, 9000);
        assert_eq!(config.contest_hour_utc, 21);
    }

    #[test]
    fn missing_token_or_owner_is_fatal() {
        assert_eq!(
            Config::from_lookup(lookup(&[("OWNER_ID", "42")])).unwrap_err(),
            ConfigError::Missing("BOT_TOKEN")
        );
        assert_eq!(
            Config::from_lookup(lookup(&[("BOT_TOKEN", "t"), ("OWNER_ID", " ")])).unwrap_err(),
            ConfigError::Missing("OWNER_ID")
        );
        assert!(matches!(
            Config::from_lookup(lookup(&[("BOT_TOKEN", "t"), ("OWNER_ID", "0")])),
            Err(ConfigError::Invalid {
                name: "OWNER_ID",
                ..
            })
        ));
    }

    #[test]
    fn garbage_values_are_rejected() {
        let base = [("BOT_TOKEN", "t"), ("OWNER_ID", "1")];
        for (name, value) in [
            ("REMINDER_INTERVAL", "soon"),
            ("REMINDER_INTERVAL", "0"),
            ("PORT", "70000"),
            ("CONTEST_HOUR_UTC", "24"),
        ] {
            let mut vars = base.to_vec();
            vars.push((name, value));
            let err = Config::from_lookup(lookup(&vars)).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid { name: n, .. } if n == name));
        }
    }
}
