use std::env;
use std::str::FromStr;
use std::time::Duration;

use tracing::info;

use crate::error::{LaunchpadError, Result};

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Storage
    pub database_url: Option<String>,

    // Enrichment
    pub openai_api_key: String,
    pub openai_model: String,
    pub enrich_timeout: Duration,
    pub keyword_max_attempts: u32,

    // Upstream feed
    pub feed_base_url: String,
    pub fetch_timeout: Duration,
    pub fetch_max_attempts: u32,
    pub fetch_retry_base: Duration,

    // Scheduling
    pub sync_interval: Duration,
    pub repair_interval: Duration,
    pub sync_rate_limit_per_hour: usize,

    // Web server
    pub web_host: String,
    pub web_port: u16,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database_url: env::var("DATABASE_URL").ok().filter(|v| !v.is_empty()),
            openai_api_key: required_env("OPENAI_API_KEY")?,
            openai_model: env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-3.5-turbo".to_string()),
            enrich_timeout: Duration::from_secs(parsed_env("ENRICH_TIMEOUT_SECS", 60)?),
            keyword_max_attempts: parsed_env("KEYWORD_MAX_ATTEMPTS", 5)?,
            feed_base_url: env::var("FEED_BASE_URL")
                .unwrap_or_else(|_| "https://ll.thespacedevs.com".to_string()),
            fetch_timeout: Duration::from_secs(parsed_env("FETCH_TIMEOUT_SECS", 30)?),
            fetch_max_attempts: parsed_env("FETCH_MAX_ATTEMPTS", 3)?,
            fetch_retry_base: Duration::from_secs(parsed_env("FETCH_RETRY_BASE_SECS", 15 * 60)?),
            sync_interval: Duration::from_secs(60 * parsed_env::<u64>("SYNC_INTERVAL_MINUTES", 5)?),
            repair_interval: Duration::from_secs(
                60 * parsed_env::<u64>("REPAIR_INTERVAL_MINUTES", 60)?,
            ),
            sync_rate_limit_per_hour: parsed_env("SYNC_RATE_LIMIT_PER_HOUR", 15)?,
            web_host: env::var("WEB_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            web_port: parsed_env("WEB_PORT", 3000)?,
        })
    }

    /// Log the effective configuration without secrets.
    pub fn log_redacted(&self) {
        let database = if self.database_url.is_some() { "postgres" } else { "memory" };
        let api_key = if self.openai_api_key.is_empty() { "missing" } else { "set" };
        info!(
            database,
            openai_model = %self.openai_model,
            openai_api_key = api_key,
            feed_base_url = %self.feed_base_url,
            fetch_max_attempts = self.fetch_max_attempts,
            fetch_retry_base_secs = self.fetch_retry_base.as_secs(),
            keyword_max_attempts = self.keyword_max_attempts,
            sync_interval_secs = self.sync_interval.as_secs(),
            repair_interval_secs = self.repair_interval.as_secs(),
            sync_rate_limit_per_hour = self.sync_rate_limit_per_hour,
            "Configuration loaded"
        );
    }
}

fn required_env(key: &str) -> Result<String> {
    env::var(key).map_err(|_| LaunchpadError::Config(format!("{key} environment variable is required")))
}

fn parsed_env<T: FromStr>(key: &str, default: T) -> Result<T> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| LaunchpadError::Config(format!("{key} must be a number, got '{raw}'"))),
        Err(_) => Ok(default),
    }
}
