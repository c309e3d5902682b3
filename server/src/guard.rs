//! Edge guard: gates page navigations before anything renders.
//!
//! SYSTEM CONTEXT
//! ==============
//! Runs as Axum middleware in front of every route, including the static
//! dashboard bundle. Each request is classified by path, then:
//!
//! - static assets and `/api/` routes pass through untouched (the relays do
//!   their own auth forwarding);
//! - protected pages need a session cookie and a backend `/auth/verify`
//!   answer of 2xx before they are served;
//! - the login page bounces visitors that already carry session cookies to
//!   the landing area.
//!
//! FAILURE MODES
//! =============
//! A rejected verification redirects to login and expires both cookies. A
//! verification that cannot complete (connect error, timeout) is logged and
//! the request goes through; the client-side coordinator handles any 401s
//! that follow.

use axum::extract::{Request, State};
use axum::http::header::COOKIE;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::cookie::CookieJar;

use crate::config::GateConfig;
use crate::cookies::{expired_session_jar, forward_set_cookies, has_session_cookies};
use crate::state::AppState;

const STATIC_PREFIXES: [&str; 5] = ["/_next/", "/favicon", "/images/", "/fonts/", "/assets/"];
const STATIC_EXTENSIONS: [&str; 7] = ["svg", "png", "jpg", "jpeg", "gif", "webp", "ico"];
const API_PREFIX: &str = "/api/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathClass {
    Static,
    Api,
    Protected,
    Public,
    Other,
}

/// Classify a request path. Rules are checked in declaration order of
/// [`PathClass`], so `/api/dashboard` is `Api`, never `Protected`.
#[must_use]
pub fn classify(path: &str, config: &GateConfig) -> PathClass {
    if is_static(path) {
        PathClass::Static
    } else if path.starts_with(API_PREFIX) {
        PathClass::Api
    } else if config
        .protected_prefixes
        .iter()
        .any(|prefix| path.starts_with(prefix.as_str()))
    {
        PathClass::Protected
    } else if matches!(normalize(path), "/") || is_login_path(path, config) {
        PathClass::Public
    } else {
        PathClass::Other
    }
}

fn is_static(path: &str) -> bool {
    if STATIC_PREFIXES.iter().any(|prefix| path.starts_with(prefix)) {
        return true;
    }
    let file = path.rsplit('/').next().unwrap_or(path);
    file.rsplit_once('.')
        .is_some_and(|(_, ext)| STATIC_EXTENSIONS.contains(&ext))
}

/// Strip one trailing slash, keeping the root as `/`.
fn normalize(path: &str) -> &str {
    match path.strip_suffix('/') {
        Some("") | None => path,
        Some(trimmed) => trimmed,
    }
}

fn is_login_path(path: &str, config: &GateConfig) -> bool {
    normalize(path) == config.login_path
}

/// `/login?redirect=<path>` with the path form-encoded.
#[must_use]
pub fn login_location(config: &GateConfig, path: &str) -> String {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("redirect", path)
        .finish();
    format!("{}?{query}", config.login_path)
}

// =============================================================================
// VERIFICATION
// =============================================================================

#[derive(Debug)]
pub enum VerifyOutcome {
    /// 2xx; carries the backend headers so renewed cookies can be forwarded.
    Valid(HeaderMap),
    /// Any other status.
    Rejected(StatusCode),
    /// Connect error or timeout.
    Unreachable(reqwest::Error),
}

/// Ask the backend whether the raw cookie header forms a valid session.
pub async fn verify_session(state: &AppState, cookie_header: Option<&HeaderValue>) -> VerifyOutcome {
    let config = &state.config;
    let mut request = state
        .http
        .get(config.backend_endpoint(frames::AUTH_VERIFY))
        .timeout(config.verify_timeout);
    if let Some(cookies) = cookie_header {
        request = request.header(COOKIE, cookies.clone());
    }

    match request.send().await {
        Ok(response) if response.status().is_success() => VerifyOutcome::Valid(response.headers().clone()),
        Ok(response) => VerifyOutcome::Rejected(response.status()),
        Err(e) => VerifyOutcome::Unreachable(e),
    }
}

// =============================================================================
// MIDDLEWARE
// =============================================================================

/// Axum middleware; install with `middleware::from_fn_with_state`.
pub async fn edge_guard(State(state): State<AppState>, jar: CookieJar, request: Request, next: Next) -> Response {
    let path = request.uri().path().to_owned();

    match classify(&path, &state.config) {
        PathClass::Static | PathClass::Api | PathClass::Other => next.run(request).await,
        PathClass::Public => {
            if is_login_path(&path, &state.config) && has_session_cookies(&jar) {
                tracing::debug!(%path, "session cookies on login page; redirecting to landing");
                return Redirect::temporary(&state.config.landing_path).into_response();
            }
            next.run(request).await
        }
        PathClass::Protected => guard_protected(&state, &jar, &path, request, next).await,
    }
}

async fn guard_protected(state: &AppState, jar: &CookieJar, path: &str, request: Request, next: Next) -> Response {
    let config = &state.config;
    if !has_session_cookies(jar) {
        tracing::debug!(%path, "no session cookies; redirecting to login");
        return Redirect::temporary(&login_location(config, path)).into_response();
    }

    let cookie_header = request.headers().get(COOKIE).cloned();
    match verify_session(state, cookie_header.as_ref()).await {
        VerifyOutcome::Valid(backend_headers) => {
            let mut response = next.run(request).await;
            let renewed = forward_set_cookies(&backend_headers, response.headers_mut());
            tracing::debug!(%path, renewed, "session verified");
            response
        }
        VerifyOutcome::Rejected(status) => {
            tracing::debug!(%path, %status, "session rejected; clearing cookies");
            let redirect = Redirect::temporary(&login_location(config, path));
            (expired_session_jar(config.cookie_secure), redirect).into_response()
        }
        VerifyOutcome::Unreachable(e) => {
            tracing::error!(%path, error = %e, "session verification failed; letting request through");
            next.run(request).await
        }
    }
}

#[cfg(test)]
#[path = "guard_test.rs"]
mod tests;
