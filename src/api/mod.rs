//! API Module
//!
//! HTTP handlers and routing for the cache server.
//!
//! # Endpoints
//! - `GET /_hive/:group/:key` - Peer-to-peer fetch (raw bytes)
//! - `GET /api/:group/:key` - Retrieve a value by key (JSON)
//! - `PUT /api/:group` - Store a key-value pair
//! - `DELETE /api/:group/:key` - Drop a key from the group's caches
//! - `GET /stats/:group` - Get a group's cache statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::AppState;
pub use routes::{create_router, peer_router};
