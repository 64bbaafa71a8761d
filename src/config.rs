//! Client configuration parsed from environment variables.

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";
pub const DEFAULT_TOKEN_FILE: &str = ".social-session.json";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_RETRY_MAX: u32 = 3;
pub const DEFAULT_RETRY_BASE_MS: u64 = 1000;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} must be a non-negative integer, got {value:?}")]
    InvalidNumber { key: &'static str, value: String },
    #[error("{key} must not be empty")]
    Empty { key: &'static str },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub request_secs: u64,
    /// Bounds both the TCP connect of HTTP calls and the socket handshake.
    pub connect_secs: u64,
}

impl Timeouts {
    #[must_use]
    pub fn request(&self) -> Duration {
        Duration::from_secs(self.request_secs)
    }

    #[must_use]
    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }
}

/// Exponential backoff schedule for the conversation-list fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub base_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retries: DEFAULT_RETRY_MAX, base_delay_ms: DEFAULT_RETRY_BASE_MS }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (0-based): `base · 2^attempt`.
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1_u64.checked_shl(attempt).unwrap_or(u64::MAX);
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// HTTP origin of the backend, without a trailing slash.
    pub base_url: String,
    /// Bearer token override. When absent the token file is consulted.
    pub token: Option<String>,
    pub token_file: PathBuf,
    pub timeouts: Timeouts,
    pub retry: RetryPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            token: None,
            token_file: PathBuf::from(DEFAULT_TOKEN_FILE),
            timeouts: Timeouts {
                request_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
                connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            },
            retry: RetryPolicy::default(),
        }
    }
}

impl ClientConfig {
    /// Build typed client config from environment variables.
    ///
    /// Optional:
    /// - `SOCIAL_BASE_URL`: default `http://localhost:3000`
    /// - `SOCIAL_TOKEN`: bearer token, overrides the token file
    /// - `SOCIAL_TOKEN_FILE`: default `.social-session.json`
    /// - `SOCIAL_REQUEST_TIMEOUT_SECS`: default 30
    /// - `SOCIAL_CONNECT_TIMEOUT_SECS`: default 10
    /// - `SOCIAL_RETRY_MAX`: default 3
    /// - `SOCIAL_RETRY_BASE_MS`: default 1000
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a numeric variable does not parse or the
    /// base URL is set but blank.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ClientConfig::from_env`] but reads values through `lookup`.
    ///
    /// # Errors
    ///
    /// See [`ClientConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let base_url = match lookup("SOCIAL_BASE_URL") {
            Some(raw) if raw.trim().is_empty() => return Err(ConfigError::Empty { key: "SOCIAL_BASE_URL" }),
            Some(raw) => raw.trim().trim_end_matches('/').to_owned(),
            None => DEFAULT_BASE_URL.to_owned(),
        };
        let token = lookup("SOCIAL_TOKEN").filter(|token| !token.trim().is_empty());
        let token_file = lookup("SOCIAL_TOKEN_FILE").map_or_else(|| PathBuf::from(DEFAULT_TOKEN_FILE), PathBuf::from);

        let timeouts = Timeouts {
            request_secs: parse_u64(&lookup, "SOCIAL_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS)?,
            connect_secs: parse_u64(&lookup, "SOCIAL_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS)?,
        };
        let max_retries = parse_u64(&lookup, "SOCIAL_RETRY_MAX", u64::from(DEFAULT_RETRY_MAX))?;
        let retry = RetryPolicy {
            max_retries: u32::try_from(max_retries)
                .map_err(|_| ConfigError::InvalidNumber { key: "SOCIAL_RETRY_MAX", value: max_retries.to_string() })?,
            base_delay_ms: parse_u64(&lookup, "SOCIAL_RETRY_BASE_MS", DEFAULT_RETRY_BASE_MS)?,
        };

        Ok(Self { base_url, token, token_file, timeouts, retry })
    }

    /// Socket URL derived from the HTTP base URL, or `None` for a non-HTTP scheme.
    #[must_use]
    pub fn socket_url(&self) -> Option<String> {
        let rest = if let Some(host) = self.base_url.strip_prefix("https://") {
            format!("wss://{host}")
        } else if let Some(host) = self.base_url.strip_prefix("http://") {
            format!("ws://{host}")
        } else {
            return None;
        };
        Some(format!("{rest}/socket.io/?EIO=4&transport=websocket"))
    }
}

fn parse_u64(lookup: &impl Fn(&str) -> Option<String>, key: &'static str, default: u64) -> Result<u64, ConfigError> {
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidNumber { key, value: raw }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
