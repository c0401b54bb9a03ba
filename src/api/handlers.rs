//! API Handlers
//!
//! HTTP request handlers for the peer protocol and the public API.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
    Json,
};

use crate::error::{GroupError, Result};
use crate::group::Registry;
use crate::models::{
    DeleteResponse, GetResponse, HealthResponse, SetRequest, SetResponse, StatsResponse,
};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Every group of this process, by name
    pub registry: Arc<Registry>,
}

impl AppState {
    /// Creates a new AppState over the given registry.
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }
}

/// Handler for GET /_hive/:group/:key
///
/// The peer-to-peer fetch path: other nodes call this for keys the hash
/// ring assigns to us. Answers with the raw value bytes.
pub async fn peer_get_handler(
    State(state): State<AppState>,
    Path((group, key)): Path<(String, String)>,
) -> Result<impl IntoResponse> {
    let group = state
        .registry
        .get_group(&group)
        .ok_or(GroupError::NoSuchGroup(group))?;

    let view = group.get(&key).await?;
    Ok((
        [(header::CONTENT_TYPE, "application/octet-stream")],
        view.byte_slice(),
    ))
}

/// Handler for GET /api/:group/:key
///
/// Retrieves a value through the full read path: local caches, then the
/// owning peer, then the local source.
pub async fn get_handler(
    State(state): State<AppState>,
    Path((group_name, key)): Path<(String, String)>,
) -> Result<Json<GetResponse>> {
    let group = state
        .registry
        .get_group(&group_name)
        .ok_or(GroupError::NoSuchGroup(group_name.clone()))?;

    let view = group.get(&key).await?;
    Ok(Json(GetResponse::new(group_name, key, view.to_string())))
}

/// Handler for PUT /api/:group
///
/// Stores a key-value pair in the group's main cache with optional TTL.
pub async fn set_handler(
    State(state): State<AppState>,
    Path(group_name): Path<String>,
    Json(req): Json<SetRequest>,
) -> Result<Json<SetResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(GroupError::InvalidRequest(error_msg));
    }

    let group = state
        .registry
        .get_group(&group_name)
        .ok_or(GroupError::NoSuchGroup(group_name))?;

    let ttl = req.ttl.map(Duration::from_secs);
    group.set(&req.key, req.value.into_bytes(), ttl)?;

    Ok(Json(SetResponse::new(req.key)))
}

/// Handler for DELETE /api/:group/:key
///
/// Drops a key from the group's caches. Idempotent: deleting an absent
/// key succeeds. The source of truth behind the group is not touched.
pub async fn delete_handler(
    State(state): State<AppState>,
    Path((group_name, key)): Path<(String, String)>,
) -> Result<Json<DeleteResponse>> {
    let group = state
        .registry
        .get_group(&group_name)
        .ok_or(GroupError::NoSuchGroup(group_name))?;

    group.remove(&key);
    Ok(Json(DeleteResponse::new(key)))
}

/// Handler for GET /stats/:group
///
/// Returns the byte and entry counts of the group's two caches.
pub async fn stats_handler(
    State(state): State<AppState>,
    Path(group_name): Path<String>,
) -> Result<Json<StatsResponse>> {
    let group = state
        .registry
        .get_group(&group_name)
        .ok_or(GroupError::NoSuchGroup(group_name.clone()))?;

    Ok(Json(StatsResponse::new(group_name, group.stats())))
}

/// Handler for GET /health
///
/// Returns health status of the server.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
