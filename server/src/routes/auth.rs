//! Auth relays: same-origin `/api/auth/*` routes forwarded to the backend.
//!
//! Each route is one [`Relay`] row: which backend endpoint it reaches, what
//! it forwards, and what the browser gets when the backend cannot be reached
//! or answers with something other than JSON. Backend status and JSON body
//! pass through unchanged and every `Set-Cookie` value is appended
//! individually.

use axum::extract::State;
use axum::http::header::COOKIE;
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use serde_json::{Value, json};

use crate::cookies::forward_set_cookies;
use crate::state::AppState;

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("backend unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("backend answered with a non-JSON body: {0}")]
    InvalidBody(#[from] serde_json::Error),
}

/// What a relay carries over from the browser request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Forward {
    /// The JSON body; login-style routes have no session yet.
    Body,
    /// The raw `Cookie` header.
    Cookies,
}

struct Relay {
    name: &'static str,
    method: Method,
    endpoint: &'static str,
    forward: Forward,
    fallback_status: StatusCode,
    fallback_body: fn() -> Value,
}

const LOGIN: Relay = Relay {
    name: "login",
    method: Method::POST,
    endpoint: frames::AUTH_LOGIN,
    forward: Forward::Body,
    fallback_status: StatusCode::BAD_GATEWAY,
    fallback_body: || json!({ "authenticated": false, "message": "Failed to connect to server" }),
};

const LOGOUT: Relay = Relay {
    name: "logout",
    method: Method::POST,
    endpoint: frames::AUTH_LOGOUT,
    forward: Forward::Cookies,
    fallback_status: StatusCode::OK,
    fallback_body: || json!({ "message": "Logged out" }),
};

const REFRESH: Relay = Relay {
    name: "refresh",
    method: Method::POST,
    endpoint: frames::AUTH_REFRESH,
    forward: Forward::Cookies,
    fallback_status: StatusCode::BAD_GATEWAY,
    fallback_body: || json!({ "authenticated": false }),
};

const VERIFY: Relay = Relay {
    name: "verify",
    method: Method::GET,
    endpoint: frames::AUTH_VERIFY,
    forward: Forward::Cookies,
    fallback_status: StatusCode::BAD_GATEWAY,
    fallback_body: || json!({ "authenticated": false, "message": "Failed to verify" }),
};

const ACADEMIC_STATUS: Relay = Relay {
    name: "academic-status",
    method: Method::GET,
    endpoint: frames::AUTH_ACADEMIC_STATUS,
    forward: Forward::Cookies,
    fallback_status: StatusCode::BAD_GATEWAY,
    fallback_body: || json!({ "authenticated": false }),
};

const REGISTER_ACADEMIC: Relay = Relay {
    name: "register-academic",
    method: Method::POST,
    endpoint: frames::AUTH_REGISTER_ACADEMIC,
    forward: Forward::Body,
    fallback_status: StatusCode::BAD_GATEWAY,
    fallback_body: || json!({ "authenticated": false, "message": "Failed to register" }),
};

/// A backend answer ready to hand back to the browser.
struct Relayed {
    status: StatusCode,
    backend_headers: HeaderMap,
    body: Value,
}

impl IntoResponse for Relayed {
    fn into_response(self) -> Response {
        let mut response = (self.status, Json(self.body)).into_response();
        forward_set_cookies(&self.backend_headers, response.headers_mut());
        response
    }
}

impl Relay {
    async fn run(&self, state: &AppState, cookies: Option<&HeaderValue>, body: Option<Value>) -> Response {
        match self.send(state, cookies, body).await {
            Ok(relayed) => {
                tracing::debug!(route = self.name, status = %relayed.status, "auth relay answered");
                relayed.into_response()
            }
            Err(e) => {
                tracing::error!(route = self.name, error = %e, "auth relay failed");
                (self.fallback_status, Json((self.fallback_body)())).into_response()
            }
        }
    }

    async fn send(&self, state: &AppState, cookies: Option<&HeaderValue>, body: Option<Value>) -> Result<Relayed, RelayError> {
        let mut request = state
            .http
            .request(self.method.clone(), state.config.backend_endpoint(self.endpoint));
        match self.forward {
            Forward::Body => {
                if let Some(body) = &body {
                    request = request.json(body);
                }
            }
            Forward::Cookies => {
                if let Some(cookies) = cookies {
                    request = request.header(COOKIE, cookies.clone());
                }
            }
        }

        let response = request.send().await?;
        let status = response.status();
        let backend_headers = response.headers().clone();
        let bytes = response.bytes().await?;
        let body = serde_json::from_slice(&bytes)?;
        Ok(Relayed { status, backend_headers, body })
    }
}

// =============================================================================
// HANDLERS
// =============================================================================

/// `POST /api/auth/login`
pub async fn login(State(state): State<AppState>, Json(body): Json<Value>) -> Response {
    LOGIN.run(&state, None, Some(body)).await
}

/// `POST /api/auth/logout`
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    LOGOUT.run(&state, headers.get(COOKIE), None).await
}

/// `POST /api/auth/refresh`
pub async fn refresh(State(state): State<AppState>, headers: HeaderMap) -> Response {
    REFRESH.run(&state, headers.get(COOKIE), None).await
}

/// `GET /api/auth/verify`
pub async fn verify(State(state): State<AppState>, headers: HeaderMap) -> Response {
    VERIFY.run(&state, headers.get(COOKIE), None).await
}

/// `GET /api/auth/academic-status`
pub async fn academic_status(State(state): State<AppState>, headers: HeaderMap) -> Response {
    ACADEMIC_STATUS.run(&state, headers.get(COOKIE), None).await
}

/// `POST /api/auth/register-academic`
pub async fn register_academic(State(state): State<AppState>, Json(body): Json<Value>) -> Response {
    REGISTER_ACADEMIC.run(&state, None, Some(body)).await
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
