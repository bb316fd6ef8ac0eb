//! Whole-tree endpoints: tree data, settings, export/import, search, stats
//! and saved node positions

use axum::{
    debug_handler,
    extract::{Path, State},
    http::header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    response::{IntoResponse, Json},
};
use chrono::Utc;
use familytree_core::exchange::ImportBundle;
use familytree_core::gedcom::export_gedcom;
use familytree_core::{
    ExportBundle, ImportSummary, NodePosition, PersonId, PersonView, TreeData, TreeSettings,
    TreeSettingsPatch, TreeStats,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use super::{today, ApiState};
use crate::error::{ApiJson, ApiQuery, ApiResult};
use crate::models::{MessageResponse, PositionsRequest, SearchQuery};

pub const GEDCOM_FILENAME: &str = "family_tree.ged";

#[derive(Debug, Serialize)]
pub struct ImportResponse {
    pub success: bool,
    pub message: String,
    #[serde(flatten)]
    pub summary: ImportSummary,
}

/// Nodes and links for the tree view
#[debug_handler]
pub async fn tree_data(State(state): State<Arc<ApiState>>) -> ApiResult<Json<TreeData>> {
    let graph = state.store.load_graph()?;
    Ok(Json(graph.tree_data(today())))
}

#[debug_handler]
pub async fn get_settings(State(state): State<Arc<ApiState>>) -> ApiResult<Json<TreeSettings>> {
    Ok(Json(state.store.tree_settings(Utc::now())?))
}

#[debug_handler]
pub async fn update_settings(
    State(state): State<Arc<ApiState>>,
    ApiJson(patch): ApiJson<TreeSettingsPatch>,
) -> ApiResult<Json<TreeSettings>> {
    let settings = state.store.update_tree_settings(patch, Utc::now())?;
    state.after_change("Tree settings updated");
    Ok(Json(settings))
}

/// GEDCOM 5.5.1 download
#[debug_handler]
pub async fn export_gedcom_file(State(state): State<Arc<ApiState>>) -> ApiResult<impl IntoResponse> {
    let graph = state.store.load_graph()?;
    let body = export_gedcom(&graph);
    info!(
        "GEDCOM export: {} persons, {} families",
        graph.persons().count(),
        graph.families().count()
    );
    Ok((
        [
            (CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (
                CONTENT_DISPOSITION,
                format!("attachment; filename=\"{GEDCOM_FILENAME}\""),
            ),
        ],
        body,
    ))
}

#[debug_handler]
pub async fn export_json(State(state): State<Arc<ApiState>>) -> ApiResult<Json<ExportBundle>> {
    Ok(Json(state.store.export_bundle(Utc::now())?))
}

/// Add the records of a JSON export to the tree
#[debug_handler]
pub async fn import_json(
    State(state): State<Arc<ApiState>>,
    ApiJson(bundle): ApiJson<ImportBundle>,
) -> ApiResult<Json<ImportResponse>> {
    let summary = state.store.import_bundle(bundle, Utc::now())?;
    let message = format!("Imported {} records", summary.imported_count());
    info!("{message} ({} skipped)", summary.skipped);
    state.after_change("JSON import");
    Ok(Json(ImportResponse {
        success: true,
        message,
        summary,
    }))
}

#[debug_handler]
pub async fn search(
    State(state): State<Arc<ApiState>>,
    ApiQuery(query): ApiQuery<SearchQuery>,
) -> ApiResult<Json<Vec<PersonView>>> {
    let hits = state.store.search_persons(&query.q)?;
    if hits.is_empty() {
        return Ok(Json(Vec::new()));
    }
    let graph = state.store.load_graph()?;
    let today = today();
    Ok(Json(
        hits.iter()
            .filter_map(|person| graph.person_view(person.id, today))
            .collect(),
    ))
}

#[debug_handler]
pub async fn stats(State(state): State<Arc<ApiState>>) -> ApiResult<Json<TreeStats>> {
    let graph = state.store.load_graph()?;
    Ok(Json(TreeStats::compute(&graph, today())))
}

#[debug_handler]
pub async fn get_positions(
    State(state): State<Arc<ApiState>>,
    Path(root_id): Path<PersonId>,
) -> ApiResult<Json<Vec<NodePosition>>> {
    Ok(Json(state.store.positions(root_id)?))
}

#[debug_handler]
pub async fn save_positions(
    State(state): State<Arc<ApiState>>,
    Path(root_id): Path<PersonId>,
    ApiJson(request): ApiJson<PositionsRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let saved = state
        .store
        .save_positions(root_id, &request.positions, Utc::now())?;
    Ok(Json(MessageResponse::ok(format!("Saved {saved} positions"))))
}

#[debug_handler]
pub async fn reset_positions(
    State(state): State<Arc<ApiState>>,
    Path(root_id): Path<PersonId>,
) -> ApiResult<Json<MessageResponse>> {
    let removed = state.store.reset_positions(root_id)?;
    Ok(Json(MessageResponse::ok(format!("Removed {removed} positions"))))
}
