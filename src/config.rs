use std::env;
use std::fmt;
use std::time::Duration;

use anyhow::{Result, anyhow};

pub const DEFAULT_BASE_URL: &str = "https://skillcorner.com/api";
const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_RETRY_BACKOFF_MS: u64 = 500;

#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
        }
    }

    /// Delay before attempt `attempt + 1`, doubling per failed attempt.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(8);
        self.base_delay.saturating_mul(factor)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventsFormat {
    Csv,
    Json,
}

impl EventsFormat {
    pub fn as_query(self) -> &'static str {
        match self {
            EventsFormat::Csv => "csv",
            EventsFormat::Json => "json",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    pub credentials: Credentials,
    pub timeout: Duration,
    pub retry: RetryPolicy,
    pub cache_ttl: Option<Duration>,
    pub events_format: EventsFormat,
}

impl ApiConfig {
    pub fn new(base_url: &str, username: &str, password: &str) -> Self {
        Self {
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            credentials: Credentials {
                username: username.to_string(),
                password: password.to_string(),
            },
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            retry: RetryPolicy::none(),
            cache_ttl: None,
            events_format: EventsFormat::Csv,
        }
    }

    pub fn from_env() -> Result<Self> {
        let username = required_env("SKILLCORNER_USERNAME")?;
        let password = required_env("SKILLCORNER_PASSWORD")?;
        let base_url = opt_env("SKILLCORNER_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let mut config = Self::new(&base_url, &username, &password);
        config.timeout = Duration::from_secs(
            env_u64("HTTP_TIMEOUT_SECS")
                .unwrap_or(DEFAULT_TIMEOUT_SECS)
                .clamp(1, 120),
        );
        config.retry = RetryPolicy {
            max_attempts: env_u64("FETCH_RETRY_ATTEMPTS").unwrap_or(1).clamp(1, 6) as u32,
            base_delay: Duration::from_millis(
                env_u64("FETCH_RETRY_BACKOFF_MS").unwrap_or(DEFAULT_RETRY_BACKOFF_MS),
            ),
        };
        config.cache_ttl = env_u64("CACHE_TTL_SECS")
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);
        config.events_format = parse_events_format(opt_env("DYNAMIC_EVENTS_FORMAT").as_deref());
        Ok(config)
    }
}

fn parse_events_format(raw: Option<&str>) -> EventsFormat {
    match raw.map(|v| v.trim().to_ascii_lowercase()) {
        Some(v) if v == "json" => EventsFormat::Json,
        _ => EventsFormat::Csv,
    }
}

fn required_env(key: &str) -> Result<String> {
    opt_env(key).ok_or_else(|| anyhow!("{key} is not set (add it to .env or the environment)"))
}

fn opt_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|val| val.trim().to_string())
        .filter(|val| !val.is_empty())
}

fn env_u64(key: &str) -> Option<u64> {
    env::var(key).ok().and_then(|val| val.trim().parse::<u64>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_trims_trailing_slash() {
        let config = ApiConfig::new("https://example.com/api/", "u", "p");
        assert_eq!(config.base_url, "https://example.com/api");
        assert_eq!(config.retry, RetryPolicy::none());
    }

    #[test]
    fn debug_hides_password() {
        let config = ApiConfig::new(DEFAULT_BASE_URL, "analyst", "hunter2");
        let out = format!("{config:?}");
        assert!(out.contains("analyst"));
        assert!(!out.contains("hunter2"));
    }

    #[test]
    fn backoff_doubles() {
        let policy = RetryPolicy {
            max_attempts: 4,
            base_delay: Duration::from_millis(100),
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(400));
    }

    #[test]
    fn events_format_defaults_to_csv() {
        assert_eq!(parse_events_format(None), EventsFormat::Csv);
        assert_eq!(parse_events_format(Some("JSON ")), EventsFormat::Json);
        assert_eq!(parse_events_format(Some("parquet")), EventsFormat::Csv);
    }
}
