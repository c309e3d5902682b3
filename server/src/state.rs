//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers and the guard middleware via the
//! `State` extractor. It holds the parsed config and one pooled HTTP client
//! used for every backend call. The edge keeps no per-session state.

use std::sync::Arc;

use crate::config::GateConfig;

/// Clone is required by Axum; inner fields are Arc-backed.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GateConfig>,
    pub http: reqwest::Client,
}

impl AppState {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: GateConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self { config: Arc::new(config), http })
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================

#[cfg(test)]
pub mod test_helpers {
    use super::*;

    /// State pointed at a fake backend.
    #[must_use]
    pub fn test_app_state(backend_url: &str) -> AppState {
        AppState::new(GateConfig::new(backend_url)).expect("client builds")
    }

    /// State whose backend refuses connections.
    #[must_use]
    pub fn unreachable_app_state() -> AppState {
        test_app_state("http://127.0.0.1:1")
    }
}
