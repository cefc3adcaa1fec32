pub mod auth;
pub mod error;
pub mod routes;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use bolt_core::config::Config;
use std::path::PathBuf;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the axum Router with all API routes and middleware.
/// Used by `serve()` and available for integration testing.
pub fn build_router(root: PathBuf, config: Config) -> Router {
    let app_state = state::AppState::new(root, config);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Sessions
        .route("/api/authenticate", post(routes::auth::authenticate))
        .route("/api/logout", post(routes::auth::logout))
        // Discovery (SSE)
        .route("/api/fetch", get(routes::fetch::fetch_servers))
        .route(
            "/api/download/{filename}",
            get(routes::download::download_export),
        )
        // Descriptors
        .route(
            "/api/descriptors",
            post(routes::descriptors::create_descriptor),
        )
        // Config
        .route("/api/config", get(routes::config::get_config))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

/// Start the discovery API server on `0.0.0.0:{port}`.
pub async fn serve(
    root: PathBuf,
    config: Config,
    port: u16,
    open_browser: bool,
) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
    serve_on(root, config, listener, open_browser).await
}

/// Start the server on a pre-bound listener.
///
/// Lets the caller bind port 0 and read the chosen port before serving.
pub async fn serve_on(
    root: PathBuf,
    config: Config,
    listener: tokio::net::TcpListener,
    open_browser: bool,
) -> anyhow::Result<()> {
    let actual_port = listener.local_addr()?.port();
    let app = build_router(root, config);

    tracing::info!("bolt server listening on http://localhost:{actual_port}");

    if open_browser {
        let url = format!("http://localhost:{actual_port}/api/config");
        let _ = open::that(&url);
    }

    axum::serve(listener, app).await?;
    Ok(())
}
