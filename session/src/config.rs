//! Client configuration parsed from environment variables.

use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://localhost:8000";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_LOGIN_PATH: &str = "/login";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Backend origin, without a trailing slash.
    pub api_url: String,
    /// Route prefix joined between origin and endpoint path.
    pub api_prefix: String,
    /// Per-request timeout; chat answers can take minutes.
    pub timeout: Duration,
    /// Where the navigator sends the user when the session is gone.
    pub login_path: String,
}

impl ClientConfig {
    #[must_use]
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into().trim_end_matches('/').to_owned(),
            api_prefix: frames::DEFAULT_API_PREFIX.to_owned(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            login_path: DEFAULT_LOGIN_PATH.to_owned(),
        }
    }

    /// Build config from environment variables.
    ///
    /// Optional:
    /// - `API_URL`: default `http://localhost:8000`
    /// - `API_PREFIX`: default `/api/v1`
    /// - `API_TIMEOUT_SECS`: default 120
    /// - `LOGIN_PATH`: default `/login`
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ClientConfig::from_env`] over an arbitrary variable source.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::new(lookup("API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_owned()));
        if let Some(prefix) = lookup("API_PREFIX") {
            config.api_prefix = prefix.trim_end_matches('/').to_owned();
        }
        let timeout = lookup("API_TIMEOUT_SECS")
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        config.timeout = Duration::from_secs(timeout);
        if let Some(path) = lookup("LOGIN_PATH") {
            config.login_path = path;
        }
        config
    }

    /// Absolute URL of a backend endpoint path such as `/auth/refresh`.
    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}{}", self.api_url, self.api_prefix, path)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_API_URL)
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
