//! Trash endpoints

use axum::{debug_handler, extract::State, response::Json};
use familytree_databases::{EntityKind, TrashEntry};
use std::sync::Arc;
use tracing::warn;

use super::media::upload_file;
use super::ApiState;
use crate::error::{ApiError, ApiJson, ApiResult};
use crate::models::{TrashRequest, TrashResponse};

fn target(request: &TrashRequest) -> ApiResult<(EntityKind, i64)> {
    let (Some(entity_type), Some(entity_id)) = (request.entity_type.as_deref(), request.entity_id)
    else {
        return Err(ApiError::bad_request("entity_type and entity_id are required"));
    };
    Ok((entity_type.parse::<EntityKind>()?, entity_id))
}

#[debug_handler]
pub async fn list_trash(State(state): State<Arc<ApiState>>) -> ApiResult<Json<Vec<TrashEntry>>> {
    Ok(Json(state.store.list_trash()?))
}

#[debug_handler]
pub async fn restore_item(
    State(state): State<Arc<ApiState>>,
    ApiJson(request): ApiJson<TrashRequest>,
) -> ApiResult<Json<TrashResponse>> {
    let (kind, id) = target(&request)?;
    state.store.restore_deleted(kind, id)?;
    state.after_change(format!("Restored {kind} #{id}"));
    Ok(Json(TrashResponse {
        status: "restored",
        entity_type: kind,
        entity_id: id,
    }))
}

/// Delete a record for good; a document's upload goes with it
#[debug_handler]
pub async fn purge_item(
    State(state): State<Arc<ApiState>>,
    ApiJson(request): ApiJson<TrashRequest>,
) -> ApiResult<Json<TrashResponse>> {
    let (kind, id) = target(&request)?;
    if let Some(path) = state.store.purge(kind, id)? {
        match upload_file(&state, &path) {
            Some(file) => {
                if let Err(e) = tokio::fs::remove_file(&file).await {
                    warn!("Failed to remove upload {}: {e}", file.display());
                }
            }
            None => warn!("Document {id} has no removable upload path: {path}"),
        }
    }
    state.after_change(format!("Permanently deleted {kind} #{id}"));
    Ok(Json(TrashResponse {
        status: "deleted",
        entity_type: kind,
        entity_id: id,
    }))
}
