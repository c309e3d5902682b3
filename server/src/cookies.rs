//! Session cookie helpers shared by the guard and the relays.
//!
//! The edge never reads token values. It only checks whether a session cookie
//! is present, expires both cookies when the backend rejects them, and copies
//! backend `Set-Cookie` headers onto its own responses one value at a time,
//! since a single `Expires=Wed, 21 Oct ...` attribute already contains a comma.

use axum::http::HeaderMap;
use axum::http::header::SET_COOKIE;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use frames::SESSION_COOKIES;
use time::Duration;

/// True when the request carries either session cookie.
#[must_use]
pub fn has_session_cookies(jar: &CookieJar) -> bool {
    SESSION_COOKIES.iter().any(|name| jar.get(name).is_some())
}

/// Append every `Set-Cookie` value from `from` onto `to`.
/// Returns how many values were forwarded.
pub fn forward_set_cookies(from: &HeaderMap, to: &mut HeaderMap) -> usize {
    let mut forwarded = 0;
    for value in from.get_all(SET_COOKIE) {
        to.append(SET_COOKIE, value.clone());
        forwarded += 1;
    }
    forwarded
}

/// A jar that expires both session cookies on the response it is attached to.
#[must_use]
pub fn expired_session_jar(secure: bool) -> CookieJar {
    SESSION_COOKIES.iter().fold(CookieJar::new(), |jar, name| {
        let cookie = Cookie::build((*name, ""))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(secure)
            .max_age(Duration::ZERO);
        jar.add(cookie)
    })
}

#[cfg(test)]
#[path = "cookies_test.rs"]
mod tests;
