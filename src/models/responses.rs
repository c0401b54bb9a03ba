//! Response DTOs for the HTTP API
//!
//! Defines the structure of outgoing HTTP response bodies. The peer
//! endpoint answers with raw bytes instead and has no DTO here.

use serde::Serialize;

use crate::group::GroupStats;

/// Response body for the GET operation (GET /api/:group/:key)
#[derive(Debug, Clone, Serialize)]
pub struct GetResponse {
    /// The group the key was looked up in
    pub group: String,
    /// The requested key
    pub key: String,
    /// The stored value, rendered as UTF-8
    pub value: String,
}

impl GetResponse {
    /// Creates a new GetResponse
    pub fn new(group: impl Into<String>, key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Response body for the SET operation (PUT /api/:group)
#[derive(Debug, Clone, Serialize)]
pub struct SetResponse {
    /// Success message
    pub message: String,
    /// The key that was set
    pub key: String,
}

impl SetResponse {
    /// Creates a new SetResponse
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' set successfully", key),
            key,
        }
    }
}

/// Response body for the DELETE operation (DELETE /api/:group/:key)
#[derive(Debug, Clone, Serialize)]
pub struct DeleteResponse {
    /// Success message
    pub message: String,
    /// The key that was deleted
    pub key: String,
}

impl DeleteResponse {
    /// Creates a new DeleteResponse
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' deleted", key),
            key,
        }
    }
}

/// Response body for the stats endpoint (GET /stats/:group)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    /// The group the stats belong to
    pub group: String,
    /// Byte and entry counts of the group's two caches
    #[serde(flatten)]
    pub stats: GroupStats,
}

impl StatsResponse {
    /// Creates a new StatsResponse
    pub fn new(group: impl Into<String>, stats: GroupStats) -> Self {
        Self {
            group: group.into(),
            stats,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}
