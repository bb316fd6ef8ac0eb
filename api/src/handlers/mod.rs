//! API Handlers Module
//!
//! Request handlers grouped by resource. All of them share [`ApiState`].

use axum::{debug_handler, extract::State, response::Json};
use chrono::{NaiveDate, Utc};
use familytree_databases::{BackupManager, FamilyStore};
use std::sync::Arc;

use crate::auth::SessionStore;
use crate::models::{ApiConfig, HealthResponse};

pub mod auth;
pub mod backups;
pub mod families;
pub mod media;
pub mod persons;
pub mod trash;
pub mod tree;

/// Represents the state of the API server
pub struct ApiState {
    /// Record store
    pub store: FamilyStore,
    /// Backup manager over the same database
    pub backups: Arc<BackupManager>,
    /// Logged-in sessions
    pub sessions: SessionStore,
    pub config: ApiConfig,
}

impl ApiState {
    pub fn new(config: ApiConfig, store: FamilyStore, backups: Arc<BackupManager>) -> Self {
        Self {
            sessions: SessionStore::new(config.auth.session_days),
            store,
            backups,
            config,
        }
    }

    /// Kick off a throttled automatic backup after a successful change.
    /// Failures are logged and never reach the client.
    pub fn after_change(&self, description: impl Into<String>) {
        let backups = Arc::clone(&self.backups);
        let description = description.into();
        tokio::task::spawn_blocking(move || match backups.auto_backup(Some(&description)) {
            Ok(Some(backup)) => tracing::debug!("Automatic backup {}", backup.filename),
            Ok(None) => {}
            Err(e) => tracing::warn!("Automatic backup failed: {e}"),
        });
    }
}

pub(crate) fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Health check endpoint
#[debug_handler]
pub async fn health_check(State(state): State<Arc<ApiState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "familytree-api",
        version: state.config.version.clone(),
    })
}
