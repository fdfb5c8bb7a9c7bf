use std::fmt;
use std::time::Duration;

use anyhow::Context;

const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
const DEFAULT_BATCH_SIZE: i64 = 25;
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Clone)]
pub enum EmailCredentials {
    ApiKey(String),
    Basic { username: String, password: String },
}

impl fmt::Debug for EmailCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmailCredentials::ApiKey(_) => f.write_str("ApiKey(***)"),
            EmailCredentials::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"***")
                .finish(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub api_url: String,
    pub from: String,
    pub credentials: EmailCredentials,
}

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub poll_interval: Duration,
    pub batch_size: i64,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl DatabaseConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let url = lookup("DATABASE_URL")
            .context("DATABASE_URL must be set to a Postgres instance")?;
        let max_connections = parse_or(&lookup, "DB_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?;
        Ok(Self {
            url,
            max_connections,
        })
    }
}

impl EmailConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let api_url = lookup("EMAIL_API_URL").context("EMAIL_API_URL must be set to run the relay")?;
        let user = lookup("EMAIL_USER");

        let credentials = match (lookup("EMAIL_API_KEY"), &user, lookup("EMAIL_PASSWORD")) {
            (Some(key), _, _) => EmailCredentials::ApiKey(key),
            (None, Some(username), Some(password)) => EmailCredentials::Basic {
                username: username.clone(),
                password,
            },
            _ => anyhow::bail!("set EMAIL_API_KEY or both EMAIL_USER and EMAIL_PASSWORD"),
        };

        let from = lookup("EMAIL_FROM")
            .or(user)
            .context("EMAIL_FROM (or EMAIL_USER) must name the sender address")?;

        Ok(Self {
            api_url,
            from,
            credentials,
        })
    }
}

impl RelayConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let secs = parse_or(&lookup, "RELAY_POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL_SECS)?;
        let batch_size = parse_or(&lookup, "RELAY_BATCH_SIZE", DEFAULT_BATCH_SIZE)?;
        anyhow::ensure!(secs > 0, "RELAY_POLL_INTERVAL_SECS must be positive");
        anyhow::ensure!(batch_size > 0, "RELAY_BATCH_SIZE must be positive");
        Ok(Self {
            poll_interval: Duration::from_secs(secs),
            batch_size,
        })
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value `{raw}`")),
        None => Ok(default),
    }
}
