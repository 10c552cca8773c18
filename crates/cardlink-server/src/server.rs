//! HTTP server implementation using Axum.

use crate::handler::{
    handle_check_status, handle_health, handle_index, handle_link_rfid, handle_register,
};
use axum::{
    routing::{get, post},
    Router,
};
use cardlink_core::CardlinkApi;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Application state shared across handlers.
pub struct AppState {
    /// Linking API (registry, notifier, row store)
    pub api: CardlinkApi,
}

/// Build the router with all routes and layers.
pub fn build_router(state: Arc<AppState>) -> Router {
    // The scanner posts from another origin on the LAN.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_index))
        .route("/health", get(handle_health))
        .route("/register", post(handle_register))
        .route("/check_status/:reg_no", get(handle_check_status))
        .route("/link_rfid", post(handle_link_rfid))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// Start the HTTP server.
///
/// Returns the actual address the server is bound to (useful when port=0).
pub async fn start_server(api: CardlinkApi, host: &str, port: u16) -> anyhow::Result<SocketAddr> {
    let state = Arc::new(AppState { api });
    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    info!("Server listening on {}", actual_addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Server error: {}", e);
        }
    });

    Ok(actual_addr)
}
