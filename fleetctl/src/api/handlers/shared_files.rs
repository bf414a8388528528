use crate::api::models::shared_files::{SharedFileCreatedResponse, SharedFileUpload};
use crate::api::handlers::missing;
use crate::auth::ApiCaller;
use crate::db::handlers::{SharedFiles, ownership::OwnedRow};
use crate::db::models::shared_files::SharedFileCreateDBRequest;
use crate::errors::{Error, Result};
use crate::types::{Operation, SharedFileId};
use crate::AppState;
use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::{
        HeaderValue, StatusCode,
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    },
    response::{IntoResponse, Response},
};

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Store a file for the caller's organization.
///
/// Takes the multipart field named `file`. Files older than the retention window are purged as a
/// side effect.
#[utoipa::path(
    post,
    path = "/files",
    tag = "files",
    summary = "Upload shared file",
    request_body(content = SharedFileUpload, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "File stored", body = SharedFileCreatedResponse),
        (status = 400, description = "No `file` field in the form"),
    ),
    security(("ApiToken" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn upload_file(
    State(state): State<AppState>,
    caller: ApiCaller,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<SharedFileCreatedResponse>)> {
    let mut upload = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| Error::BadRequest {
        message: format!("Invalid multipart body: {e}"),
    })? {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field.file_name().unwrap_or("file").to_string();
        let content_type = field.content_type().unwrap_or(DEFAULT_CONTENT_TYPE).to_string();
        let content = field.bytes().await.map_err(|e| Error::BadRequest {
            message: format!("Failed to read file content: {e}"),
        })?;

        upload = Some(SharedFileCreateDBRequest {
            file_name,
            content_type,
            content,
        });
        break;
    }

    let Some(request) = upload else {
        return Err(Error::BadRequest {
            message: "Missing `file` field".to_string(),
        });
    };
    tracing::debug!(file_name = %request.file_name, size = request.content.len(), "Storing shared file");

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let id = SharedFiles::new(&mut conn)
        .add(caller.organization_id, &request, state.config.retention.data_retention_days)
        .await?;

    Ok((StatusCode::CREATED, Json(SharedFileCreatedResponse { id })))
}

#[utoipa::path(
    get,
    path = "/files/{id}",
    tag = "files",
    summary = "Download shared file",
    params(("id" = uuid::Uuid, Path, description = "Shared file ID")),
    responses(
        (status = 200, description = "File content with its stored content type"),
        (status = 401, description = "File belongs to another organization"),
        (status = 404, description = "File not found"),
    ),
    security(("ApiToken" = []))
)]
#[tracing::instrument(skip_all, fields(file_id = %id))]
pub async fn download_file(State(state): State<AppState>, caller: ApiCaller, Path(id): Path<SharedFileId>) -> Result<Response> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let Some(file) = SharedFiles::new(&mut conn).get(caller.organization_id, id).await? else {
        return Err(missing(&mut conn, caller.organization_id, OwnedRow::SharedFile(id), Operation::Read).await);
    };

    let content_type = HeaderValue::from_str(&file.content_type).unwrap_or(HeaderValue::from_static(DEFAULT_CONTENT_TYPE));
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", file.file_name.replace('"', "")))
        .unwrap_or(HeaderValue::from_static("attachment"));

    Ok(([(CONTENT_TYPE, content_type), (CONTENT_DISPOSITION, disposition)], file.content).into_response())
}
