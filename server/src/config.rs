//! Edge server configuration parsed from environment variables.

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";
pub const DEFAULT_VERIFY_TIMEOUT_MS: u64 = 3000;
pub const DEFAULT_PROTECTED_PREFIXES: &str = "/dashboard";
pub const DEFAULT_LOGIN_PATH: &str = "/login";
pub const DEFAULT_LANDING_PATH: &str = "/dashboard";
pub const DEFAULT_SITE_DIR: &str = "site";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateConfig {
    pub port: u16,
    /// Backend origin, without a trailing slash.
    pub backend_url: String,
    /// Route prefix joined between origin and endpoint path.
    pub api_prefix: String,
    /// Upper bound on the guard's verification call.
    pub verify_timeout: Duration,
    /// Path prefixes that require a verified session.
    pub protected_prefixes: Vec<String>,
    pub login_path: String,
    /// Where an already signed-in visitor of the login page is sent.
    pub landing_path: String,
    /// Static dashboard bundle served behind the guard.
    pub site_dir: PathBuf,
    /// `Secure` flag for cookies the edge sets or expires.
    pub cookie_secure: bool,
}

impl GateConfig {
    /// Defaults pointed at the given backend origin.
    #[must_use]
    pub fn new(backend_url: impl Into<String>) -> Self {
        let backend_url = backend_url.into().trim_end_matches('/').to_owned();
        Self {
            port: DEFAULT_PORT,
            cookie_secure: backend_url.starts_with("https://"),
            backend_url,
            api_prefix: frames::DEFAULT_API_PREFIX.to_owned(),
            verify_timeout: Duration::from_millis(DEFAULT_VERIFY_TIMEOUT_MS),
            protected_prefixes: split_prefixes(DEFAULT_PROTECTED_PREFIXES),
            login_path: DEFAULT_LOGIN_PATH.to_owned(),
            landing_path: DEFAULT_LANDING_PATH.to_owned(),
            site_dir: PathBuf::from(DEFAULT_SITE_DIR),
        }
    }

    /// Build config from environment variables.
    ///
    /// Optional:
    /// - `PORT`: default 3000
    /// - `BACKEND_URL` (then `API_URL`): default `http://localhost:8000`
    /// - `BACKEND_API_PREFIX`: default `/api/v1`
    /// - `VERIFY_TIMEOUT_MS`: default 3000
    /// - `PROTECTED_PREFIXES`: comma-separated, default `/dashboard`
    /// - `LOGIN_PATH`: default `/login`
    /// - `LANDING_PATH`: default `/dashboard`
    /// - `SITE_DIR`: default `site`
    /// - `COOKIE_SECURE`: default inferred from the backend scheme
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let backend_url = lookup("BACKEND_URL")
            .or_else(|| lookup("API_URL"))
            .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_owned());
        let mut config = Self::new(backend_url);

        config.port = parse_or(lookup("PORT"), DEFAULT_PORT);
        if let Some(prefix) = lookup("BACKEND_API_PREFIX") {
            config.api_prefix = prefix.trim_end_matches('/').to_owned();
        }
        config.verify_timeout =
            Duration::from_millis(parse_or(lookup("VERIFY_TIMEOUT_MS"), DEFAULT_VERIFY_TIMEOUT_MS));
        if let Some(raw) = lookup("PROTECTED_PREFIXES") {
            let prefixes = split_prefixes(&raw);
            if !prefixes.is_empty() {
                config.protected_prefixes = prefixes;
            }
        }
        if let Some(path) = lookup("LOGIN_PATH") {
            config.login_path = path;
        }
        if let Some(path) = lookup("LANDING_PATH") {
            config.landing_path = path;
        }
        if let Some(dir) = lookup("SITE_DIR") {
            config.site_dir = PathBuf::from(dir);
        }
        if let Some(secure) = lookup("COOKIE_SECURE").as_deref().and_then(parse_bool) {
            config.cookie_secure = secure;
        }
        config
    }

    /// Absolute URL of a backend endpoint path such as `/auth/verify`.
    #[must_use]
    pub fn backend_endpoint(&self, path: &str) -> String {
        format!("{}{}{}", self.backend_url, self.api_prefix, path)
    }
}

impl Default for GateConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BACKEND_URL)
    }
}

fn split_prefixes(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_owned)
        .collect()
}

fn parse_or<T: std::str::FromStr>(raw: Option<String>, default: T) -> T {
    raw.and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

pub(crate) fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
