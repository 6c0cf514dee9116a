use anyhow::{anyhow, Result};
use chrono_tz::Tz;
use std::env;
use std::time::Duration;

use crate::utils::validation::{parse_seconds, parse_time_offsets, parse_whitelist, validate_username};

pub const DEFAULT_DATABASE_URL: &str = "sqlite:./data/bot.db";
pub const DEFAULT_USER_TIMEZONE: &str = "America/Argentina/Buenos_Aires";
pub const DEFAULT_SERVER_TIMEZONE: &str = "UTC";
pub const DEFAULT_TIME_OFFSETS: &str = "0,5,10,15,30,45,60";

/// Usernames allowed to talk to the bot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Whitelist(Vec<String>);

impl Whitelist {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(names.into_iter().map(Into::into).collect())
    }

    pub fn contains(&self, username: Option<&str>) -> bool {
        match username {
            Some(name) => self.0.iter().any(|n| n == name),
            None => false,
        }
    }

    pub fn names(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// How the reminder job behaves while a feeding stays overdue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReminderMode {
    /// Send a reminder on every tick while the threshold is exceeded.
    #[default]
    EveryTick,
    /// Send one reminder per last feeding; logging a new feeding re-arms it.
    OncePerFeeding,
}

impl ReminderMode {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_lowercase().as_str() {
            "" | "every_tick" => Ok(Self::EveryTick),
            "once_per_feeding" | "once" => Ok(Self::OncePerFeeding),
            other => Err(anyhow!(
                "Invalid REMINDER_MODE '{}': expected every_tick or once_per_feeding",
                other
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReminderSettings {
    pub first_delay: Duration,
    pub interval: Duration,
    pub threshold: chrono::Duration,
    pub mode: ReminderMode,
}

impl Default for ReminderSettings {
    fn default() -> Self {
        Self {
            first_delay: Duration::from_secs(10),
            interval: Duration::from_secs(600),
            threshold: chrono::Duration::hours(3),
            mode: ReminderMode::EveryTick,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub telegram_bot_token: String,
    pub database_url: String,
    pub http_port: u16,
    pub whitelist: Whitelist,
    pub reminders: ReminderSettings,
    pub user_timezone: Tz,
    pub server_timezone: Tz,
    pub time_offsets: Vec<u32>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let token = env::var("TELEGRAM_BOT_TOKEN")
            .or_else(|_| env::var("TELEGRAM_TOKEN"))
            .map_err(|_| anyhow!("TELEGRAM_BOT_TOKEN must be set"))?;

        if token.trim().is_empty() {
            return Err(anyhow!("TELEGRAM_BOT_TOKEN must be set"));
        }

        let database_url = database_url_from_env();

        let port_str = env::var("HTTP_PORT")
            .unwrap_or_else(|_| "3000".to_string());
        let http_port = port_str.trim()
            .parse()
            .map_err(|_| anyhow!("Invalid HTTP_PORT"))?;

        let whitelist_raw = env::var("TELEGRAM_USERNAME_WHITELIST").unwrap_or_default();
        let names = parse_whitelist(&whitelist_raw);
        for name in &names {
            validate_username(name)
                .map_err(|e| anyhow!("Invalid TELEGRAM_USERNAME_WHITELIST: {}", e))?;
        }

        let defaults = ReminderSettings::default();
        let interval = seconds_from_env(
            "NOTIFICATION_JOB_QUEUE_INTERVAL_SECONDS",
            defaults.interval.as_secs(),
        )?;
        let first_delay = seconds_from_env(
            "NOTIFICATION_JOB_QUEUE_FIRST_SECONDS",
            defaults.first_delay.as_secs(),
        )?;
        let threshold = seconds_from_env(
            "NOTIFY_IF_UNFED_FOR_SECONDS",
            defaults.threshold.num_seconds().unsigned_abs(),
        )?;
        let threshold = i64::try_from(threshold)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .ok_or_else(|| anyhow!("Invalid NOTIFY_IF_UNFED_FOR_SECONDS: {} is out of range", threshold))?;
        let mode = ReminderMode::parse(&env::var("REMINDER_MODE").unwrap_or_default())?;

        let user_timezone = timezone_from_env("USER_TIMEZONE", DEFAULT_USER_TIMEZONE)?;
        let server_timezone = timezone_from_env("SERVER_TIMEZONE", DEFAULT_SERVER_TIMEZONE)?;

        let offsets_raw = non_empty_var("TIME_OFFSETS_MINUTES")
            .unwrap_or_else(|| DEFAULT_TIME_OFFSETS.to_string());
        let time_offsets = parse_time_offsets(&offsets_raw)
            .map_err(|e| anyhow!("Invalid TIME_OFFSETS_MINUTES: {}", e))?;

        Ok(Config {
            telegram_bot_token: token,
            database_url,
            http_port,
            whitelist: Whitelist(names),
            reminders: ReminderSettings {
                first_delay: Duration::from_secs(first_delay),
                interval: Duration::from_secs(interval),
                threshold,
                mode,
            },
            user_timezone,
            server_timezone,
            time_offsets,
        })
    }
}

/// Reads `DATABASE_URL` alone, for tools that do not need the bot token.
pub fn database_url_from_env() -> String {
    non_empty_var("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string())
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn seconds_from_env(name: &str, default: u64) -> Result<u64> {
    match non_empty_var(name) {
        Some(raw) => parse_seconds(name, &raw),
        None => Ok(default),
    }
}

fn timezone_from_env(name: &str, default: &str) -> Result<Tz> {
    let raw = non_empty_var(name).unwrap_or_else(|| default.to_string());
    raw.trim()
        .parse::<Tz>()
        .map_err(|e| anyhow!("Invalid {} '{}': {}", name, raw.trim(), e))
}
