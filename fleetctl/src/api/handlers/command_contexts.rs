use crate::api::models::command_contexts::{CommandContextResponse, CommandContextUpsert};
use crate::api::handlers::missing;
use crate::auth::ApiCaller;
use crate::db::handlers::{CommandContexts, ownership::OwnedRow};
use crate::db::models::command_contexts::CommandContextUpsertDBRequest;
use crate::errors::{Error, Result};
use crate::types::{CommandContextId, Operation};
use crate::AppState;
use axum::{
    Json,
    extract::{Path, State},
};

/// Create or replace a command context. An id already used by another organization is refused.
#[utoipa::path(
    put,
    path = "/command-contexts/{id}",
    tag = "command-contexts",
    summary = "Upsert command context",
    params(("id" = uuid::Uuid, Path, description = "Command context ID")),
    request_body = CommandContextUpsert,
    responses(
        (status = 200, description = "Stored command context", body = CommandContextResponse),
        (status = 401, description = "Id belongs to another organization"),
    ),
    security(("ApiToken" = []))
)]
#[tracing::instrument(skip_all, fields(context_id = %id))]
pub async fn upsert_command_context(
    State(state): State<AppState>,
    caller: ApiCaller,
    Path(id): Path<CommandContextId>,
    Json(upsert): Json<CommandContextUpsert>,
) -> Result<Json<CommandContextResponse>> {
    let request = CommandContextUpsertDBRequest { id, payload: upsert.payload };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    match CommandContexts::new(&mut conn).upsert(caller.organization_id, &request).await? {
        Some(context) => Ok(Json(context.into())),
        None => Err(missing(&mut conn, caller.organization_id, OwnedRow::CommandContext(id), Operation::Update).await),
    }
}

#[utoipa::path(
    get,
    path = "/command-contexts/{id}",
    tag = "command-contexts",
    summary = "Get command context",
    params(("id" = uuid::Uuid, Path, description = "Command context ID")),
    responses(
        (status = 200, description = "Command context", body = CommandContextResponse),
        (status = 401, description = "Command context belongs to another organization"),
        (status = 404, description = "Command context not found"),
    ),
    security(("ApiToken" = []))
)]
#[tracing::instrument(skip_all, fields(context_id = %id))]
pub async fn get_command_context(
    State(state): State<AppState>,
    caller: ApiCaller,
    Path(id): Path<CommandContextId>,
) -> Result<Json<CommandContextResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    match CommandContexts::new(&mut conn).get(caller.organization_id, id).await? {
        Some(context) => Ok(Json(context.into())),
        None => Err(missing(&mut conn, caller.organization_id, OwnedRow::CommandContext(id), Operation::Read).await),
    }
}

#[utoipa::path(
    get,
    path = "/command-contexts",
    tag = "command-contexts",
    summary = "List command contexts",
    responses(
        (status = 200, description = "Command contexts, newest first", body = Vec<CommandContextResponse>),
        (status = 401, description = "Missing or invalid API token"),
    ),
    security(("ApiToken" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_command_contexts(State(state): State<AppState>, caller: ApiCaller) -> Result<Json<Vec<CommandContextResponse>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let contexts = CommandContexts::new(&mut conn).list(caller.organization_id).await?;

    Ok(Json(contexts.into_iter().map(Into::into).collect()))
}
