//! Client-side session coordination for the gatehouse backend.
//!
//! ARCHITECTURE
//! ============
//! [`ApiClient`] is the single way to talk to the backend. It keeps the
//! session cookies in its own store, classifies failures into [`ApiError`],
//! and funnels every 401 through one [`gate::RefreshGate`] so that a burst of
//! expired calls produces exactly one `/auth/refresh`. The observable login
//! state lives in an [`AuthStore`] that UI layers subscribe to.

pub mod client;
pub mod config;
pub mod error;
pub mod gate;
pub mod navigator;
pub mod store;

pub use client::{ApiClient, ApiClientBuilder, ChatStream, SESSION_ID_HEADER};
pub use config::ClientConfig;
pub use error::ApiError;
pub use gate::{RefreshOutcome, RefreshState};
pub use navigator::{FullNavigation, Navigator};
pub use store::{AcademicUser, AuthState, AuthStore};
