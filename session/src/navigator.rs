//! Routing the user to the login entry point once the session is gone.

use std::sync::{Mutex, PoisonError};

/// Host-provided navigation. A UI installs one that pushes a route; a CLI can
/// print a hint instead.
pub trait Navigator: Send + Sync {
    fn navigate(&self, location: &str);
}

/// Fallback used when the host installs no navigator: records the location a
/// full navigation would load and logs it.
#[derive(Debug, Default)]
pub struct FullNavigation {
    last: Mutex<Option<String>>,
}

impl FullNavigation {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Location of the most recent navigation, if any.
    #[must_use]
    pub fn last_location(&self) -> Option<String> {
        self.last.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl Navigator for FullNavigation {
    fn navigate(&self, location: &str) {
        tracing::warn!(%location, "session expired; navigating to login");
        *self.last.lock().unwrap_or_else(PoisonError::into_inner) = Some(location.to_owned());
    }
}

#[cfg(test)]
#[path = "navigator_test.rs"]
mod tests;
