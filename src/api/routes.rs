//! API Routes
//!
//! Configures the Axum router with the peer protocol and the public API.

use axum::{
    routing::{get, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    delete_handler, get_handler, health_handler, peer_get_handler, set_handler, stats_handler,
    AppState,
};

/// Creates the full router: peer protocol plus the public API.
///
/// # Endpoints
/// - `GET /_hive/:group/:key` - Peer-to-peer fetch (raw bytes)
/// - `GET /api/:group/:key` - Retrieve a value by key
/// - `PUT /api/:group` - Store a key-value pair
/// - `DELETE /api/:group/:key` - Drop a key from the group's caches
/// - `GET /stats/:group` - Get a group's cache statistics
/// - `GET /health` - Health check endpoint
///
/// # Middleware
/// - CORS: Allows any origin (configurable for production)
/// - Tracing: Logs all requests for debugging
pub fn create_router(state: AppState) -> Router {
    // Configure CORS middleware
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/_hive/:group/:key", get(peer_get_handler))
        .route("/api/:group/:key", get(get_handler).delete(delete_handler))
        .route("/api/:group", put(set_handler))
        .route("/stats/:group", get(stats_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Creates a router serving only the peer protocol and the health check,
/// for nodes that participate in the cluster without a public API.
pub fn peer_router(state: AppState) -> Router {
    Router::new()
        .route("/_hive/:group/:key", get(peer_get_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
