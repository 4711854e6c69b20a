//! HTTP server for browser clients
//!
//! Exposes sessions, the generation event stream and the sandbox command
//! stream that a browser-hosted sandbox consumes.

pub mod routes;
pub mod state;

pub use state::ServerAppState;

use axum::{
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue,
    },
    routing::{delete, get, post},
    Json, Router,
};
use routes::{generation_routes, session_routes};
use std::future::Future;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

/// Version information for the server
#[derive(serde::Serialize)]
struct VersionInfo {
    version: String,
}

fn cors_layer(cors_origins: &[String]) -> CorsLayer {
    if cors_origins.is_empty() {
        // Permissive CORS: allow any origin (default for development)
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);
    }
    let allowed_origins: Vec<HeaderValue> =
        cors_origins.iter().filter_map(|o| o.parse().ok()).collect();
    CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods(Any)
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT])
}

/// Build the router with all routes and layers
pub fn router(state: ServerAppState, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/version", get(version_handler))
        .route(
            "/api/sessions",
            get(session_routes::list_sessions).post(session_routes::create_session),
        )
        .route("/api/sessions/:id", delete(session_routes::delete_session))
        .route(
            "/api/sessions/:id/files",
            get(session_routes::get_files).put(session_routes::write_file),
        )
        .route(
            "/api/sessions/:id/files/delete",
            post(session_routes::delete_file),
        )
        .route("/api/sessions/:id/sync", post(session_routes::flush_sync))
        .route(
            "/api/sessions/:id/cancel",
            post(session_routes::cancel_generation),
        )
        .route(
            "/api/sessions/:id/generate",
            post(generation_routes::generate),
        )
        .route(
            "/api/sessions/:id/sandbox",
            get(generation_routes::sandbox_stream),
        )
        .layer(cors_layer(cors_origins))
        .with_state(state)
}

/// Run the HTTP server until `shutdown` resolves
pub async fn run_server<F>(
    port: u16,
    bind: &str,
    state: ServerAppState,
    cors_origins: &[String],
    shutdown: F,
) -> Result<(), String>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr: SocketAddr = format!("{}:{}", bind, port)
        .parse()
        .map_err(|e| format!("Invalid address: {}", e))?;

    let sessions = state.sessions.clone();
    let app = router(state, cors_origins);

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| format!("Failed to bind to {}: {}", addr, e))?;

    let cors_display = if cors_origins.is_empty() {
        "*".to_string()
    } else {
        cors_origins.join(", ")
    };
    log::info!("Server listening on http://{} (CORS: {})", addr, cors_display);

    let result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| format!("Server error: {}", e));

    sessions.teardown_all().await;
    log::info!("Server stopped");
    result
}

/// Health check endpoint
async fn health_handler() -> &'static str {
    "OK"
}

async fn version_handler() -> Json<VersionInfo> {
    Json(VersionInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
