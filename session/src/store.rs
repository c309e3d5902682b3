//! Observable auth state for the current application instance.
//!
//! DESIGN
//! ======
//! The state lives in a `tokio::sync::watch` channel: mutations go through
//! `send_modify`, and a host UI holds a [`watch::Receiver`] from
//! [`AuthStore::subscribe`] to re-render on change. Cloning the store clones
//! the handle, not the state.

use serde::Serialize;
use tokio::sync::watch;

/// Snapshot of the session as the UI sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthState {
    pub is_authenticated: bool,
    pub is_loading: bool,
    pub error: Option<String>,
    pub email: Option<String>,
    pub tier: Option<String>,
    pub queries_remaining: Option<i64>,
    pub daily_limit: Option<i64>,
}

impl AuthState {
    /// State at application start: not authenticated, verification pending.
    #[must_use]
    pub fn initial() -> Self {
        Self { is_loading: true, ..Self::signed_out() }
    }

    /// State after logout or a failed refresh.
    #[must_use]
    pub fn signed_out() -> Self {
        Self {
            is_authenticated: false,
            is_loading: false,
            error: None,
            email: None,
            tier: None,
            queries_remaining: None,
            daily_limit: None,
        }
    }
}

impl Default for AuthState {
    fn default() -> Self {
        Self::initial()
    }
}

/// Academic quota details, as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcademicUser {
    pub email: String,
    pub tier: String,
    pub queries_remaining: i64,
    pub daily_limit: i64,
}

#[derive(Clone)]
pub struct AuthStore {
    tx: watch::Sender<AuthState>,
}

impl AuthStore {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(AuthState::initial());
        Self { tx }
    }

    #[must_use]
    pub fn snapshot(&self) -> AuthState {
        self.tx.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.tx.subscribe()
    }

    pub fn set_authenticated(&self, authenticated: bool) {
        self.tx.send_modify(|s| s.is_authenticated = authenticated);
    }

    pub fn set_loading(&self, loading: bool) {
        self.tx.send_modify(|s| s.is_loading = loading);
    }

    pub fn set_error(&self, error: Option<String>) {
        self.tx.send_modify(|s| s.error = error);
    }

    pub fn set_academic_user(&self, user: AcademicUser) {
        self.tx.send_modify(|s| {
            s.email = Some(user.email);
            s.tier = Some(user.tier);
            s.queries_remaining = Some(user.queries_remaining);
            s.daily_limit = Some(user.daily_limit);
        });
    }

    pub fn update_queries_remaining(&self, remaining: i64) {
        self.tx.send_modify(|s| s.queries_remaining = Some(remaining));
    }

    /// Back to signed-out values. Always succeeds, whatever the backend said.
    pub fn reset(&self) {
        self.tx.send_replace(AuthState::signed_out());
    }
}

impl Default for AuthStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;
