//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! One Axum router serves the dashboard: the same-origin API relays under
//! `/api/`, a health probe, and the static dashboard bundle as the fallback.
//! The edge guard wraps all of it, so page navigations into protected areas
//! are verified before the bundle is served.

pub mod auth;
pub mod chat;

use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Router, middleware};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::guard::edge_guard;
use crate::state::AppState;

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let site = ServeDir::new(&state.config.site_dir).append_index_html_on_directories(true);

    Router::new()
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/refresh", post(auth::refresh))
        .route("/api/auth/verify", get(auth::verify))
        .route("/api/auth/academic-status", get(auth::academic_status))
        .route("/api/auth/register-academic", post(auth::register_academic))
        .route("/api/chat", post(chat::chat))
        .route("/healthz", get(healthz))
        .fallback_service(site)
        .layer(middleware::from_fn_with_state(state.clone(), edge_guard))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
