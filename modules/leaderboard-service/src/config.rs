//! Service configuration loaded from the environment.

use crate::aggregator::DegradedPolicy;
use std::env;
use std::str::FromStr;
use std::time::Duration;

pub mod env_vars {
    pub const PORT: &str = "LEADERBOARD_PORT";
    pub const DB_PATH: &str = "LEADERBOARD_DB_PATH";
    pub const UPDATE_INTERVAL: &str = "LEADERBOARD_UPDATE_INTERVAL";
    pub const FETCH_TIMEOUT: &str = "LEADERBOARD_FETCH_TIMEOUT";
    pub const FETCH_DELAY_MS: &str = "LEADERBOARD_FETCH_DELAY_MS";
    pub const DEGRADED_POLICY: &str = "LEADERBOARD_DEGRADED_POLICY";
    pub const SUMMARY_GRACE_DAYS: &str = "LEADERBOARD_SUMMARY_GRACE_DAYS";
    pub const CODECHEF_BASE_URL: &str = "CODECHEF_BASE_URL";
    pub const DISCORD_BOT_TOKEN: &str = "DISCORD_BOT_TOKEN";
    pub const DISCORD_CHANNEL_ID: &str = "DISCORD_CHANNEL_ID";
}

const DEFAULT_CODECHEF_BASE_URL: &str = "https://www.codechef.com/users";

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub port: u16,
    pub db_path: String,
    pub update_interval_secs: u64,
    pub fetch_timeout_secs: u64,
    pub fetch_delay_ms: u64,
    pub degraded_policy: DegradedPolicy,
    pub summary_grace_days: u32,
    pub codechef_base_url: String,
    pub discord: Option<DiscordTarget>,
}

#[derive(Debug, Clone)]
pub struct DiscordTarget {
    pub token: String,
    pub channel_id: u64,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, String> {
        let discord = match (
            env::var(env_vars::DISCORD_BOT_TOKEN).ok(),
            env::var(env_vars::DISCORD_CHANNEL_ID).ok(),
        ) {
            (Some(token), Some(channel)) if !token.is_empty() => Some(DiscordTarget {
                token,
                channel_id: channel.trim().parse().map_err(|_| {
                    format!("{} must be a numeric channel id", env_vars::DISCORD_CHANNEL_ID)
                })?,
            }),
            _ => None,
        };

        let summary_grace_days: u32 = parse_var(env_vars::SUMMARY_GRACE_DAYS, 1)?;
        if summary_grace_days == 0 {
            return Err(format!("{} must be at least 1", env_vars::SUMMARY_GRACE_DAYS));
        }

        let update_interval_secs: u64 = parse_var(env_vars::UPDATE_INTERVAL, 86_400)?;
        if update_interval_secs == 0 {
            return Err(format!("{} must be at least 1", env_vars::UPDATE_INTERVAL));
        }

        Ok(Self {
            port: parse_var(env_vars::PORT, 9103)?,
            db_path: env::var(env_vars::DB_PATH).unwrap_or_else(|_| "./leaderboard.db".to_string()),
            update_interval_secs,
            fetch_timeout_secs: parse_var(env_vars::FETCH_TIMEOUT, 10)?,
            fetch_delay_ms: parse_var(env_vars::FETCH_DELAY_MS, 500)?,
            degraded_policy: parse_var(env_vars::DEGRADED_POLICY, DegradedPolicy::Zero)?,
            summary_grace_days,
            codechef_base_url: env::var(env_vars::CODECHEF_BASE_URL)
                .unwrap_or_else(|_| DEFAULT_CODECHEF_BASE_URL.to_string()),
            discord,
        })
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn fetch_delay(&self) -> Duration {
        Duration::from_millis(self.fetch_delay_ms)
    }
}

/// Unset falls back to `default`; set but malformed is an error
fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T, String> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| format!("{} has an invalid value: '{}'", name, raw)),
        Err(_) => Ok(default),
    }
}
