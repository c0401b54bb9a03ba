//! Error types for the cache
//!
//! Provides unified error handling using thiserror. The enum is cloneable
//! so the call deduplicator can fan one failure out to every waiter.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Group Error Enum ==
/// Unified error type for group loads and the HTTP surface.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GroupError {
    /// Caller passed an empty key
    #[error("key is required")]
    EmptyKey,

    /// The local source has no value for the key
    #[error("key not found: {0}")]
    NotFound(String),

    /// The local source failed
    #[error("source error: {0}")]
    Source(String),

    /// A remote peer fetch failed; recovered internally by falling back
    /// to the local source
    #[error("peer fetch failed: {0}")]
    Peer(String),

    /// Request referenced a group that was never created
    #[error("no such group: {0}")]
    NoSuchGroup(String),

    /// Invalid request data
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for GroupError {
    fn into_response(self) -> Response {
        let status = match &self {
            GroupError::EmptyKey | GroupError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            GroupError::NotFound(_) | GroupError::NoSuchGroup(_) => StatusCode::NOT_FOUND,
            GroupError::Peer(_) => StatusCode::BAD_GATEWAY,
            GroupError::Source(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for group operations.
pub type Result<T> = std::result::Result<T, GroupError>;
