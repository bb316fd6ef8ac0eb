//! Backup endpoints

use axum::{
    debug_handler,
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use familytree_databases::{BackupInfo, BackupStats, BackupTrigger, RestoreOutcome};
use std::sync::Arc;

use super::ApiState;
use crate::error::{ApiError, ApiJson, ApiResult};
use crate::models::{BackupRequest, MessageResponse};

fn unknown_backup(id: i64) -> ApiError {
    ApiError::not_found(format!("backup {id} not found"))
}

#[debug_handler]
pub async fn list_backups(State(state): State<Arc<ApiState>>) -> ApiResult<Json<Vec<BackupInfo>>> {
    Ok(Json(state.backups.list_backups()?))
}

/// Manual backup. The JSON body with a `description` may be omitted.
#[debug_handler]
pub async fn create_backup(
    State(state): State<Arc<ApiState>>,
    body: Option<ApiJson<BackupRequest>>,
) -> ApiResult<(StatusCode, Json<BackupInfo>)> {
    let request = body.map(|ApiJson(request)| request).unwrap_or_default();
    let backup = state
        .backups
        .create_backup(BackupTrigger::Manual, request.description.as_deref())?;
    Ok((StatusCode::CREATED, Json(backup)))
}

#[debug_handler]
pub async fn backup_stats(State(state): State<Arc<ApiState>>) -> ApiResult<Json<BackupStats>> {
    Ok(Json(state.backups.stats()?))
}

#[debug_handler]
pub async fn restore_backup(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i64>,
) -> ApiResult<Json<RestoreOutcome>> {
    let outcome = state
        .backups
        .restore_backup(id)?
        .ok_or_else(|| unknown_backup(id))?;
    Ok(Json(outcome))
}

#[debug_handler]
pub async fn delete_backup(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i64>,
) -> ApiResult<Json<MessageResponse>> {
    if !state.backups.delete_backup(id)? {
        return Err(unknown_backup(id));
    }
    Ok(Json(MessageResponse::ok(format!("Backup {id} deleted"))))
}
