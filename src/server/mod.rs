//! HTTP front end

pub mod extract;
pub mod handlers;
pub mod state;

pub use extract::{ClientIdentity, JsonOrForm};
pub use state::AppState;

use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Build the application router
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/preview", post(handlers::preview))
        .route("/api/download", post(handlers::download))
        .route("/download", post(handlers::download_attachment))
        .route("/api/file/{name}", get(handlers::get_file))
        .route("/api/cleanup", post(handlers::cleanup))
        .route("/api/purge", post(handlers::purge))
        .route("/health", get(handlers::health))
        .fallback(handlers::not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until ctrl-c, then stop background work
pub async fn serve(state: Arc<AppState>, addr: SocketAddr) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Listening on {}", listener.local_addr()?);

    let app = router(Arc::clone(&state));
    let shutdown = state.shutdown.clone();

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("Shutdown requested"),
            _ = shutdown.cancelled() => {}
        }
    })
    .await?;

    state.shutdown().await;
    Ok(())
}
