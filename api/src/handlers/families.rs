//! Family endpoints, also served under `/marriages`

use axum::{
    debug_handler,
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use chrono::Utc;
use familytree_core::{FamilyId, FamilyInput, FamilyPatch, FamilyView};
use familytree_databases::EntityKind;
use std::sync::Arc;

use super::ApiState;
use crate::error::{ApiError, ApiJson, ApiResult};

fn view_of(state: &ApiState, id: FamilyId) -> ApiResult<FamilyView> {
    state
        .store
        .load_graph()?
        .family_view(id)
        .ok_or_else(|| ApiError::not_found(format!("family {id} not found")))
}

#[debug_handler]
pub async fn list_families(State(state): State<Arc<ApiState>>) -> ApiResult<Json<Vec<FamilyView>>> {
    let graph = state.store.load_graph()?;
    Ok(Json(graph.family_views()))
}

#[debug_handler]
pub async fn get_family(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<FamilyId>,
) -> ApiResult<Json<FamilyView>> {
    Ok(Json(view_of(&state, id)?))
}

#[debug_handler]
pub async fn create_family(
    State(state): State<Arc<ApiState>>,
    ApiJson(input): ApiJson<FamilyInput>,
) -> ApiResult<(StatusCode, Json<FamilyView>)> {
    let family = state.store.create_family(input, Utc::now())?;
    state.after_change(format!("Family added: #{}", family.id));
    Ok((StatusCode::CREATED, Json(view_of(&state, family.id)?)))
}

#[debug_handler]
pub async fn update_family(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<FamilyId>,
    ApiJson(patch): ApiJson<FamilyPatch>,
) -> ApiResult<Json<FamilyView>> {
    state.store.update_family(id, patch)?;
    state.after_change(format!("Family updated: #{id}"));
    Ok(Json(view_of(&state, id)?))
}

#[debug_handler]
pub async fn delete_family(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<FamilyId>,
) -> ApiResult<StatusCode> {
    state.store.soft_delete(EntityKind::Family, id, Utc::now())?;
    state.after_change(format!("Family deleted: #{id}"));
    Ok(StatusCode::NO_CONTENT)
}
