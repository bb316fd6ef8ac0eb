//! API Server Module
//!
//! Router construction and the listener loop.

use anyhow::Result;
use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware,
    routing::{delete, get, post},
    Router,
};
use familytree_databases::{BackupManager, FamilyStore};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::auth::require_session;
use crate::handlers::{
    auth, backups, families, health_check, media, persons, trash, tree, ApiState,
};
use crate::models::{ApiConfig, MAX_UPLOAD_BYTES};

fn cors_layer(config: &ApiConfig) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if config.cors_origins.is_empty() {
        return layer.allow_origin(Any);
    }
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Ignoring invalid CORS origin {origin:?}: {e}");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}

/// Routes that need a session when login is required
fn protected_routes() -> Router<Arc<ApiState>> {
    Router::new()
        // Persons
        .route("/persons", get(persons::list_persons).post(persons::create_person))
        .route(
            "/persons/:id",
            get(persons::get_person)
                .put(persons::update_person)
                .delete(persons::delete_person),
        )
        .route("/persons/:id/photo", post(media::upload_photo))
        // Families, also under their older name
        .route("/families", get(families::list_families).post(families::create_family))
        .route(
            "/families/:id",
            get(families::get_family)
                .put(families::update_family)
                .delete(families::delete_family),
        )
        .route("/marriages", get(families::list_families).post(families::create_family))
        .route(
            "/marriages/:id",
            get(families::get_family)
                .put(families::update_family)
                .delete(families::delete_family),
        )
        // Events and documents
        .route("/events", get(media::list_events).post(media::create_event))
        .route("/events/:id", delete(media::delete_event))
        .route("/documents", get(media::list_documents).post(media::upload_document))
        .route("/documents/:id", delete(media::delete_document))
        // Whole tree
        .route("/tree/data", get(tree::tree_data))
        .route("/settings", get(tree::get_settings).put(tree::update_settings))
        .route("/export/gedcom", get(tree::export_gedcom_file))
        .route("/export/json", get(tree::export_json))
        .route("/import/json", post(tree::import_json))
        .route("/search", get(tree::search))
        .route("/stats", get(tree::stats))
        .route(
            "/positions/:root_id",
            get(tree::get_positions)
                .put(tree::save_positions)
                .delete(tree::reset_positions),
        )
        // Trash
        .route("/trash", get(trash::list_trash))
        .route("/trash/restore", post(trash::restore_item))
        .route("/trash/delete", post(trash::purge_item))
        // Backups
        .route("/backups", get(backups::list_backups).post(backups::create_backup))
        .route("/backups/stats", get(backups::backup_stats))
        .route("/backups/:id/restore", post(backups::restore_backup))
        .route("/backups/:id", delete(backups::delete_backup))
        // Account
        .route("/auth/password", post(auth::update_password))
}

/// The full application router
pub fn build_router(state: Arc<ApiState>) -> Router {
    let open = Router::new()
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/status", get(auth::status));

    let api = protected_routes()
        .route_layer(middleware::from_fn_with_state(state.clone(), require_session))
        .merge(open);

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api)
        .nest_service("/static/uploads", ServeDir::new(&state.config.upload_dir))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors_layer(&state.config))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Main API server
pub struct ApiServer {
    /// Server configuration
    config: ApiConfig,
    /// Shared state
    state: Arc<ApiState>,
}

impl ApiServer {
    pub fn new(config: ApiConfig, store: FamilyStore, backups: Arc<BackupManager>) -> Self {
        let state = Arc::new(ApiState::new(config.clone(), store, backups));
        Self { config, state }
    }

    pub fn state(&self) -> Arc<ApiState> {
        Arc::clone(&self.state)
    }

    /// Start the API server and serve until Ctrl-C
    pub async fn start(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.config.upload_dir)
            .await
            .map_err(|e| {
                anyhow::anyhow!(
                    "Failed to create upload directory {}: {e}",
                    self.config.upload_dir.display()
                )
            })?;

        let app = build_router(self.state());
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind {addr}: {e}"))?;
        info!(
            "Family tree API listening on {addr} (login required: {})",
            self.config.auth.required
        );

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| anyhow::anyhow!("Failed to start API server: {e}"))?;

        info!("API server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
