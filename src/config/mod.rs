//! Configuration module - environment variable parsing

use std::env;
use std::time::Duration;

use reqwest::Url;

/// Client configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Page origin every HTTP and socket URL is derived from
    pub origin: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Bearer token attached to API calls
    pub access_token: Option<String>,
    /// Value sent as `X-CSRFToken`
    pub csrf_token: Option<String>,

    /// Inactivity window; `None` disables the watchdog
    pub watchdog: Option<Duration>,
    /// Render loop interval
    pub frame_interval: Duration,
    /// Pause between bracket/preview display and the next step
    pub tournament_delay: Duration,
    /// Invitation polling interval
    pub invite_poll_interval: Duration,
    /// Use touch controls instead of the keyboard
    pub touch: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to its value
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let origin = lookup("PONG_ORIGIN").ok_or(ConfigError::Missing("PONG_ORIGIN"))?;
        let parsed = Url::parse(&origin).map_err(|_| ConfigError::InvalidOrigin(origin.clone()))?;
        if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
            return Err(ConfigError::InvalidOrigin(origin));
        }

        let millis = |key: &'static str, default: u64| -> Result<u64, ConfigError> {
            match lookup(key) {
                Some(raw) => raw
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidNumber { key, value: raw }),
                None => Ok(default),
            }
        };

        let watchdog_ms = millis("PONG_WATCHDOG_MS", 3_000)?;

        Ok(Self {
            origin: origin.trim_end_matches('/').to_string(),
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),

            access_token: lookup("PONG_ACCESS_TOKEN").filter(|t| !t.is_empty()),
            csrf_token: lookup("PONG_CSRF_TOKEN").filter(|t| !t.is_empty()),

            watchdog: (watchdog_ms > 0).then(|| Duration::from_millis(watchdog_ms)),
            frame_interval: Duration::from_millis(millis("PONG_FRAME_MS", 16)?.max(1)),
            tournament_delay: Duration::from_millis(millis("PONG_TOURNAMENT_DELAY_MS", 3_000)?),
            invite_poll_interval: Duration::from_millis(millis("PONG_INVITE_POLL_MS", 3_000)?.max(1)),
            touch: lookup("PONG_TOUCH")
                .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid origin, expected http(s)://host[:port]: {0}")]
    InvalidOrigin(String),

    #[error("Invalid number for {key}: {value}")]
    InvalidNumber { key: &'static str, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let config = load(&[("PONG_ORIGIN", "https://pong.example/")]).unwrap();
        assert_eq!(config.origin, "https://pong.example");
        assert_eq!(config.log_level, "info");
        assert_eq!(config.watchdog, Some(Duration::from_secs(3)));
        assert_eq!(config.frame_interval, Duration::from_millis(16));
        assert_eq!(config.tournament_delay, Duration::from_secs(3));
        assert_eq!(config.invite_poll_interval, Duration::from_secs(3));
        assert!(config.access_token.is_none());
        assert!(!config.touch);
    }

    #[test]
    fn overrides() {
        let config = load(&[
            ("PONG_ORIGIN", "http://localhost:8000"),
            ("PONG_WATCHDOG_MS", "0"),
            ("PONG_TOURNAMENT_DELAY_MS", "10"),
            ("PONG_TOUCH", "TRUE"),
            ("PONG_ACCESS_TOKEN", "abc"),
        ])
        .unwrap();
        assert_eq!(config.watchdog, None);
        assert_eq!(config.tournament_delay, Duration::from_millis(10));
        assert!(config.touch);
        assert_eq!(config.access_token.as_deref(), Some("abc"));
    }

    #[test]
    fn errors() {
        assert!(matches!(load(&[]), Err(ConfigError::Missing("PONG_ORIGIN"))));
        assert!(matches!(
            load(&[("PONG_ORIGIN", "ftp://x")]),
            Err(ConfigError::InvalidOrigin(_))
        ));
        assert!(matches!(
            load(&[("PONG_ORIGIN", "http://x"), ("PONG_FRAME_MS", "fast")]),
            Err(ConfigError::InvalidNumber { key: "PONG_FRAME_MS", .. })
        ));
    }
}
