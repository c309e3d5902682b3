//! Error taxonomy for calls made through the session client.
//!
//! Every failed call is classified into one of four kinds, mirroring what the
//! UI layer distinguishes: authentication failures end in a login redirect,
//! rate limits carry a retry hint, other API failures carry the best message
//! the backend offered, and network errors mean the request never arrived.

use reqwest::StatusCode;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use serde::Deserialize;

/// Seconds to wait when a 429 carries no usable `Retry-After` header.
pub const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

const RATE_LIMIT_MESSAGE: &str = "Rate limit exceeded. Please wait before making more requests.";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// 401, or a refresh that could not restore the session.
    #[error("authentication failed: {message}")]
    Auth { message: String },

    /// 429 from the backend.
    #[error("{message} (retry after {retry_after}s)")]
    RateLimit { message: String, retry_after: u64 },

    /// Any other non-success response, or a body that could not be decoded.
    #[error("api error: {message}")]
    Api { message: String, status: Option<u16> },

    /// The request never reached the backend.
    #[error("network error: {0}")]
    Network(String),
}

impl ApiError {
    /// Stable kind label, as surfaced to the UI.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Auth { .. } => "auth_error",
            Self::RateLimit { .. } => "rate_limit",
            Self::Api { .. } => "api_error",
            Self::Network(_) => "network_error",
        }
    }

    #[must_use]
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth { .. })
    }

    /// The human-readable message without the kind prefix.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Auth { message } | Self::RateLimit { message, .. } | Self::Api { message, .. } => message.clone(),
            Self::Network(message) => message.clone(),
        }
    }

    pub(crate) fn auth(message: impl Into<String>) -> Self {
        Self::Auth { message: message.into() }
    }

    /// Classify a non-success response from its status, headers and raw body.
    #[must_use]
    pub fn from_response(status: StatusCode, headers: &HeaderMap, body: &str) -> Self {
        match status {
            StatusCode::UNAUTHORIZED => Self::Auth { message: error_message(status, body) },
            StatusCode::TOO_MANY_REQUESTS => Self::RateLimit {
                message: RATE_LIMIT_MESSAGE.to_owned(),
                retry_after: retry_after_secs(headers),
            },
            _ => Self::Api { message: error_message(status, body), status: Some(status.as_u16()) },
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Api { message: err.to_string(), status: err.status().map(|s| s.as_u16()) }
        } else {
            Self::Network(err.to_string())
        }
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    detail: Option<serde_json::Value>,
    error: Option<String>,
    message: Option<String>,
}

/// Pick the best message from an error body: `detail`, then `error`, then
/// `message`, then the status text.
fn error_message(status: StatusCode, body: &str) -> String {
    let parsed = serde_json::from_str::<ErrorBody>(body).ok();
    parsed
        .and_then(|b| {
            let detail = b.detail.and_then(|d| match d {
                serde_json::Value::String(s) => Some(s),
                serde_json::Value::Null => None,
                other => Some(other.to_string()),
            });
            detail.or(b.error).or(b.message)
        })
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| {
            format!("Request failed with status code {}", status.as_u16())
        })
}

fn retry_after_secs(headers: &HeaderMap) -> u64 {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(DEFAULT_RETRY_AFTER_SECS)
}

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;
