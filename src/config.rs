// src/config.rs
use log::warn;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub api_base_url: String,
    pub quote_interval: Duration,
    pub search_delay: Duration,
    pub health_interval: Duration,
    pub session_check_interval: Duration,
    pub request_timeout: Duration,
    /// When set, the signed-in user is persisted to this file instead of
    /// being re-read from the session endpoint.
    pub session_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            quote_interval: Duration::from_secs(20),
            search_delay: Duration::from_millis(250),
            health_interval: Duration::from_secs(30),
            session_check_interval: Duration::from_secs(60),
            request_timeout: Duration::from_secs(10),
            session_file: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let secs = |key: &str, default: Duration| {
            duration(&lookup, key, default, Duration::from_secs)
        };
        let millis = |key: &str, default: Duration| {
            duration(&lookup, key, default, Duration::from_millis)
        };

        Config {
            api_base_url: lookup("TRADELAB_API_BASE_URL")
                .map(|url| normalize_base_url(&url))
                .filter(|url| !url.is_empty())
                .unwrap_or(defaults.api_base_url),
            quote_interval: secs("TRADELAB_QUOTE_INTERVAL_SECS", defaults.quote_interval),
            search_delay: millis("TRADELAB_SEARCH_DELAY_MS", defaults.search_delay),
            health_interval: secs("TRADELAB_HEALTH_INTERVAL_SECS", defaults.health_interval),
            session_check_interval: secs(
                "TRADELAB_SESSION_CHECK_SECS",
                defaults.session_check_interval,
            ),
            request_timeout: secs("TRADELAB_REQUEST_TIMEOUT_SECS", defaults.request_timeout),
            session_file: lookup("TRADELAB_SESSION_FILE")
                .filter(|path| !path.trim().is_empty())
                .map(PathBuf::from),
        }
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.api_base_url = normalize_base_url(url);
        self
    }
}

pub fn normalize_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

fn duration<F>(lookup: &F, key: &str, default: Duration, unit: fn(u64) -> Duration) -> Duration
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => default,
        Some(raw) => match raw.trim().parse::<u64>() {
            Ok(value) if value > 0 => unit(value),
            _ => {
                warn!("Ignoring invalid {}={:?}, using {:?}", key, raw, default);
                default
            }
        },
    }
}
