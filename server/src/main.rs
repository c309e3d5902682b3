mod config;
mod cookies;
mod guard;
mod routes;
mod state;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = config::GateConfig::from_env();
    let port = config.port;
    tracing::info!(
        backend = %config.backend_url,
        protected = ?config.protected_prefixes,
        site_dir = %config.site_dir.display(),
        "edge config loaded"
    );

    let state = state::AppState::new(config).expect("http client init failed");
    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, "gatehouse listening");
    axum::serve(listener, app).await.expect("server failed");
}
