//! API Models Module
//!
//! Server configuration and the request/response bodies that are specific to
//! the HTTP surface. Domain payloads come from `familytree-core`.

use familytree_core::{PersonId, PositionInput};
use familytree_databases::EntityKind;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Largest accepted request body (uploads included)
pub const MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

/// API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Host address to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Version reported by `/health`
    pub version: String,
    /// Where uploaded photos and documents are stored
    pub upload_dir: PathBuf,
    /// Allowed CORS origins; empty allows any origin
    pub cors_origins: Vec<String>,
    pub auth: AuthConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            version: env!("CARGO_PKG_VERSION").to_string(),
            upload_dir: PathBuf::from("data/uploads"),
            cors_origins: Vec::new(),
            auth: AuthConfig::default(),
        }
    }
}

/// Password login settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Require a session for every API call except login and status
    pub required: bool,
    /// Accepted while no password hash has been stored yet
    pub default_password: String,
    /// Session lifetime in days
    pub session_days: i64,
    /// PBKDF2 iteration count for new hashes
    pub hash_rounds: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            required: false,
            default_password: "familytree".to_string(),
            session_days: 31,
            hash_rounds: 100_000,
        }
    }
}

/// Body of `/api/trash/restore` and `/api/trash/delete`
#[derive(Debug, Deserialize)]
pub struct TrashRequest {
    pub entity_type: Option<String>,
    pub entity_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct TrashResponse {
    pub status: &'static str,
    pub entity_type: EntityKind,
    pub entity_id: i64,
}

/// `?person_id=` filter
#[derive(Debug, Default, Deserialize)]
pub struct PersonFilter {
    pub person_id: Option<PersonId>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Deserialize)]
pub struct PositionsRequest {
    pub positions: Vec<PositionInput>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BackupRequest {
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    #[serde(default)]
    pub current_password: String,
    #[serde(default)]
    pub new_password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthStatus {
    pub authenticated: bool,
    pub auth_required: bool,
}

/// Generic acknowledgement
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: String,
}
