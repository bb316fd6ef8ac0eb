//! Events, documents and photo uploads

use axum::{
    debug_handler,
    extract::{multipart::Field, Multipart, Path, State},
    http::StatusCode,
    response::Json,
};
use chrono::Utc;
use familytree_core::document::{is_allowed_file, secure_filename};
use familytree_core::{Document, DocumentInput, Event, EventInput, PersonId, PersonView};
use familytree_databases::EntityKind;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::info;

use super::{today, ApiState};
use crate::error::{ApiError, ApiJson, ApiQuery, ApiResult};
use crate::models::PersonFilter;

/// Public URL prefix of stored uploads
pub const UPLOAD_URL_PREFIX: &str = "/static/uploads";

/// An uploaded file held in memory
struct Upload {
    filename: String,
    bytes: Vec<u8>,
}

async fn read_upload(field: Field<'_>) -> ApiResult<Upload> {
    let filename = field.file_name().unwrap_or_default().to_string();
    let bytes = field
        .bytes()
        .await
        .map_err(|e| ApiError::bad_request(e.body_text()))?;
    Ok(Upload {
        filename,
        bytes: bytes.to_vec(),
    })
}

async fn read_text(field: Field<'_>) -> ApiResult<String> {
    field
        .text()
        .await
        .map_err(|e| ApiError::bad_request(e.body_text()))
}

/// Sanitise, check the extension and build the stored name
fn stored_name(upload: &Upload, prefix: &str) -> ApiResult<String> {
    if upload.filename.is_empty() {
        return Err(ApiError::bad_request("No file selected"));
    }
    let safe = secure_filename(&upload.filename);
    if safe.is_empty() || !is_allowed_file(&safe) {
        return Err(ApiError::bad_request(format!(
            "File type not allowed: {}",
            upload.filename
        )));
    }
    Ok(format!("{prefix}_{safe}"))
}

/// `name` with `_n` before the extension
fn numbered_name(name: &str, n: u32) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) => format!("{stem}_{n}.{ext}"),
        None => format!("{name}_{n}"),
    }
}

/// Write an upload into the upload directory without replacing an existing
/// file. Returns the name it was stored under and its public path.
async fn save_upload(state: &ApiState, filename: &str, bytes: &[u8]) -> ApiResult<(String, String)> {
    let dir = &state.config.upload_dir;
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create upload directory: {e}"))?;

    let mut name = filename.to_string();
    let mut n = 1;
    let (target, mut file) = loop {
        let target: PathBuf = dir.join(&name);
        match OpenOptions::new().write(true).create_new(true).open(&target).await {
            Ok(file) => break (target, file),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                name = numbered_name(filename, n);
                n += 1;
            }
            Err(e) => {
                return Err(
                    anyhow::anyhow!("Failed to create upload {}: {e}", target.display()).into(),
                )
            }
        }
    };
    file.write_all(bytes)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to write upload {}: {e}", target.display()))?;
    file.flush()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to write upload {}: {e}", target.display()))?;
    info!("Stored upload {} ({} bytes)", target.display(), bytes.len());

    let public_path = format!("{UPLOAD_URL_PREFIX}/{name}");
    Ok((name, public_path))
}

/// Upload directory path of a public `/static/uploads/...` path
pub(crate) fn upload_file(state: &ApiState, public_path: &str) -> Option<PathBuf> {
    let name = public_path.strip_prefix(UPLOAD_URL_PREFIX)?.trim_start_matches('/');
    if name.is_empty() || name.contains('/') || name.contains("..") {
        return None;
    }
    Some(state.config.upload_dir.join(name))
}

#[debug_handler]
pub async fn list_events(
    State(state): State<Arc<ApiState>>,
    ApiQuery(filter): ApiQuery<PersonFilter>,
) -> ApiResult<Json<Vec<Event>>> {
    Ok(Json(state.store.list_events(filter.person_id)?))
}

#[debug_handler]
pub async fn create_event(
    State(state): State<Arc<ApiState>>,
    ApiJson(input): ApiJson<EventInput>,
) -> ApiResult<(StatusCode, Json<Event>)> {
    let event = state.store.create_event(input)?;
    state.after_change(format!("Event added: {}", event.event_type));
    Ok((StatusCode::CREATED, Json(event)))
}

#[debug_handler]
pub async fn delete_event(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    state.store.soft_delete(EntityKind::Event, id, Utc::now())?;
    state.after_change(format!("Event deleted: #{id}"));
    Ok(StatusCode::NO_CONTENT)
}

#[debug_handler]
pub async fn list_documents(
    State(state): State<Arc<ApiState>>,
    ApiQuery(filter): ApiQuery<PersonFilter>,
) -> ApiResult<Json<Vec<Document>>> {
    Ok(Json(state.store.list_documents(filter.person_id)?))
}

/// Multipart upload: a `file` part plus optional `person_id`,
/// `document_type`, `title` and `description` fields
#[debug_handler]
pub async fn upload_document(
    State(state): State<Arc<ApiState>>,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<Document>)> {
    let mut upload = None;
    let mut input = DocumentInput::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(e.body_text()))?
    {
        match field.name().unwrap_or_default() {
            "file" => upload = Some(read_upload(field).await?),
            "person_id" => {
                let raw = read_text(field).await?;
                let raw = raw.trim();
                if !raw.is_empty() {
                    let id = raw
                        .parse::<PersonId>()
                        .map_err(|_| ApiError::bad_request(format!("Invalid person_id: {raw}")))?;
                    input.person_id = Some(id);
                }
            }
            "document_type" => input.document_type = Some(read_text(field).await?),
            "title" => input.title = Some(read_text(field).await?),
            "description" => input.description = Some(read_text(field).await?),
            _ => {}
        }
    }

    let upload = upload.ok_or_else(|| ApiError::bad_request("No file part in the request"))?;
    let now = Utc::now();
    let filename = stored_name(&upload, &format!("doc_{}", now.format("%Y%m%d%H%M%S")))?;
    if let Some(person_id) = input.person_id {
        if state.store.get_person(person_id)?.is_none() {
            return Err(ApiError::bad_request(format!("Person {person_id} does not exist")));
        }
    }

    let (filename, public_path) = save_upload(&state, &filename, &upload.bytes).await?;
    let document = state
        .store
        .create_document(input.build(&filename, public_path, now))?;
    state.after_change(format!("Document uploaded: {}", document.title));
    Ok((StatusCode::CREATED, Json(document)))
}

#[debug_handler]
pub async fn delete_document(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    state.store.soft_delete(EntityKind::Document, id, Utc::now())?;
    state.after_change(format!("Document deleted: #{id}"));
    Ok(StatusCode::NO_CONTENT)
}

/// Multipart upload of a person's portrait in the `photo` part
#[debug_handler]
pub async fn upload_photo(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<PersonId>,
    mut multipart: Multipart,
) -> ApiResult<Json<PersonView>> {
    if state.store.get_person(id)?.is_none() {
        return Err(ApiError::not_found(format!("person {id} not found")));
    }

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(e.body_text()))?
    {
        if field.name() == Some("photo") {
            upload = Some(read_upload(field).await?);
        }
    }
    let upload = upload.ok_or_else(|| ApiError::bad_request("No photo part in the request"))?;
    let filename = stored_name(&upload, &format!("person_{id}"))?;

    let (_, public_path) = save_upload(&state, &filename, &upload.bytes).await?;
    state.store.set_person_photo(id, &public_path, Utc::now())?;
    state.after_change(format!("Photo uploaded for person #{id}"));

    let view = state
        .store
        .load_graph()?
        .person_view(id, today())
        .ok_or_else(|| ApiError::not_found(format!("person {id} not found")))?;
    Ok(Json(view))
}
