use std::{str::FromStr, time::Duration};

use anyhow::Context;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    /// Browser origin allowed through CORS. Unset means any origin.
    pub client_url: Option<String>,
    pub ping_interval: Duration,
    pub session_expiry_minutes: i64,
    pub max_db_connections: u32,
}

impl Config {
    /// Reads the process environment (after `.env` has been loaded).
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| dotenv::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let database_url = lookup("DATABASE_URL").context("DATABASE_URL must be set")?;

        let ping_secs: u64 = parse_or(&lookup, "RELAY_PING_SECS", 25)?;
        anyhow::ensure!(ping_secs > 0, "RELAY_PING_SECS must be at least 1");

        Ok(Config {
            database_url,
            bind_addr: lookup("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8800".to_owned()),
            client_url: lookup("CLIENT_URL").filter(|url| !url.is_empty()),
            ping_interval: Duration::from_secs(ping_secs),
            session_expiry_minutes: parse_or(&lookup, "SESSION_EXPIRY_MINUTES", 60)?,
            max_db_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", 16)?,
        })
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key}={raw} is not a valid value")),
        None => Ok(default),
    }
}
