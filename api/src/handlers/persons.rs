//! Person endpoints

use axum::{
    debug_handler,
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use chrono::Utc;
use familytree_core::{PersonId, PersonInput, PersonPatch, PersonView, Relations};
use familytree_databases::EntityKind;
use serde::Serialize;
use std::sync::Arc;

use super::{today, ApiState};
use crate::error::{ApiError, ApiJson, ApiResult};

/// A person with its one-hop relatives
#[derive(Debug, Serialize)]
pub struct PersonDetail {
    #[serde(flatten)]
    pub view: PersonView,
    pub relations: Relations,
}

fn view_of(state: &ApiState, id: PersonId) -> ApiResult<PersonView> {
    state
        .store
        .load_graph()?
        .person_view(id, today())
        .ok_or_else(|| ApiError::not_found(format!("person {id} not found")))
}

/// List every active person
#[debug_handler]
pub async fn list_persons(State(state): State<Arc<ApiState>>) -> ApiResult<Json<Vec<PersonView>>> {
    let graph = state.store.load_graph()?;
    Ok(Json(graph.person_views(today())))
}

#[debug_handler]
pub async fn get_person(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<PersonId>,
) -> ApiResult<Json<PersonDetail>> {
    tracing::debug!("Getting person: {id}");
    let graph = state.store.load_graph()?;
    let view = graph
        .person_view(id, today())
        .ok_or_else(|| ApiError::not_found(format!("person {id} not found")))?;
    Ok(Json(PersonDetail {
        view,
        relations: graph.relations(id),
    }))
}

#[debug_handler]
pub async fn create_person(
    State(state): State<Arc<ApiState>>,
    ApiJson(input): ApiJson<PersonInput>,
) -> ApiResult<(StatusCode, Json<PersonView>)> {
    let person = state.store.create_person(input, Utc::now())?;
    state.after_change(format!("Person added: {}", person.full_name()));
    Ok((StatusCode::CREATED, Json(view_of(&state, person.id)?)))
}

#[debug_handler]
pub async fn update_person(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<PersonId>,
    ApiJson(patch): ApiJson<PersonPatch>,
) -> ApiResult<Json<PersonView>> {
    let person = state.store.update_person(id, patch, Utc::now())?;
    state.after_change(format!("Person updated: {}", person.full_name()));
    Ok(Json(view_of(&state, id)?))
}

/// Move a person to the trash
#[debug_handler]
pub async fn delete_person(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<PersonId>,
) -> ApiResult<StatusCode> {
    state.store.soft_delete(EntityKind::Person, id, Utc::now())?;
    state.after_change(format!("Person deleted: #{id}"));
    Ok(StatusCode::NO_CONTENT)
}
