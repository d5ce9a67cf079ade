//! HTTP surface: upload, search, chat and health.

pub mod error;
pub mod routes;
pub mod state;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::ServerSettings;
use state::AppState;

/// Routes that live under the API prefix.
///
/// The upload limit is enforced while the multipart body is read, so an
/// oversized upload surfaces as a multipart error with a `detail` body.
fn api_routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route(
            "/upload",
            post(routes::upload).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route("/search", post(routes::search))
        .route("/chat", post(routes::chat))
}

/// `"api/v1/"` becomes `"/api/v1"`; a bare `"/"` becomes empty.
fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

pub fn build_router(state: AppState, api_prefix: &str, max_upload_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let prefix = normalize_prefix(api_prefix);
    let api = api_routes(max_upload_bytes);
    let router = Router::new().route("/health", get(routes::health));
    let router = if prefix.is_empty() {
        router.merge(api)
    } else {
        router.nest(&prefix, api)
    };

    router
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

pub async fn serve(state: AppState, settings: &ServerSettings) -> anyhow::Result<()> {
    let addr = settings.address()?;
    let router = build_router(state, &settings.api_prefix, settings.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(
        address = %addr,
        api_prefix = %normalize_prefix(&settings.api_prefix),
        "http server listening"
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("http server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
