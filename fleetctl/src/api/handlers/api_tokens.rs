use crate::api::models::api_tokens::{ApiTokenCreate, ApiTokenCreatedResponse, ApiTokenResponse, ApiTokenUpdate};
use crate::api::handlers::missing;
use crate::auth::ApiCaller;
use crate::db::handlers::{ApiTokens, ownership::OwnedRow};
use crate::db::models::api_tokens::ApiTokenCreateDBRequest;
use crate::errors::{Error, Result};
use crate::types::{ApiTokenId, Operation};
use crate::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

fn require_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::BadRequest {
            message: "Token name is required".to_string(),
        });
    }
    Ok(name.to_string())
}

#[utoipa::path(
    get,
    path = "/api-tokens",
    tag = "api-tokens",
    summary = "List API tokens",
    responses(
        (status = 200, description = "Tokens of the caller's organization, most recently used first", body = Vec<ApiTokenResponse>),
        (status = 401, description = "Missing or invalid API token"),
    ),
    security(("ApiToken" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_api_tokens(State(state): State<AppState>, caller: ApiCaller) -> Result<Json<Vec<ApiTokenResponse>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let tokens = ApiTokens::new(&mut conn).list(caller.organization_id).await?;

    Ok(Json(tokens.into_iter().map(Into::into).collect()))
}

/// Issue a new token. The secret is in this response only.
#[utoipa::path(
    post,
    path = "/api-tokens",
    tag = "api-tokens",
    summary = "Create API token",
    request_body = ApiTokenCreate,
    responses(
        (status = 201, description = "Token created", body = ApiTokenCreatedResponse),
        (status = 400, description = "Empty name"),
    ),
    security(("ApiToken" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_api_token(
    State(state): State<AppState>,
    caller: ApiCaller,
    Json(create): Json<ApiTokenCreate>,
) -> Result<(StatusCode, Json<ApiTokenCreatedResponse>)> {
    let name = require_name(&create.name)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let created = ApiTokens::new(&mut conn)
        .create(caller.organization_id, &ApiTokenCreateDBRequest { name })
        .await?;

    Ok((StatusCode::CREATED, Json(created.into())))
}

#[utoipa::path(
    patch,
    path = "/api-tokens/{id}",
    tag = "api-tokens",
    summary = "Rename API token",
    params(("id" = uuid::Uuid, Path, description = "API token ID")),
    request_body = ApiTokenUpdate,
    responses(
        (status = 200, description = "Token renamed", body = ApiTokenResponse),
        (status = 401, description = "Token belongs to another organization"),
        (status = 404, description = "Token not found"),
    ),
    security(("ApiToken" = []))
)]
#[tracing::instrument(skip_all, fields(token_id = %id))]
pub async fn rename_api_token(
    State(state): State<AppState>,
    caller: ApiCaller,
    Path(id): Path<ApiTokenId>,
    Json(update): Json<ApiTokenUpdate>,
) -> Result<Json<ApiTokenResponse>> {
    let name = require_name(&update.name)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = ApiTokens::new(&mut conn);

    if !repo.rename(caller.organization_id, id, &name).await? {
        return Err(missing(&mut conn, caller.organization_id, OwnedRow::ApiToken(id), Operation::Update).await);
    }

    match repo.get_by_id(caller.organization_id, id).await? {
        Some(token) => Ok(Json(token.into())),
        None => Err(missing(&mut conn, caller.organization_id, OwnedRow::ApiToken(id), Operation::Read).await),
    }
}

#[utoipa::path(
    delete,
    path = "/api-tokens/{id}",
    tag = "api-tokens",
    summary = "Delete API token",
    params(("id" = uuid::Uuid, Path, description = "API token ID")),
    responses(
        (status = 204, description = "Token deleted"),
        (status = 401, description = "Token belongs to another organization"),
        (status = 404, description = "Token not found"),
    ),
    security(("ApiToken" = []))
)]
#[tracing::instrument(skip_all, fields(token_id = %id))]
pub async fn delete_api_token(State(state): State<AppState>, caller: ApiCaller, Path(id): Path<ApiTokenId>) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    if !ApiTokens::new(&mut conn).delete(caller.organization_id, id).await? {
        return Err(missing(&mut conn, caller.organization_id, OwnedRow::ApiToken(id), Operation::Delete).await);
    }
    Ok(StatusCode::NO_CONTENT)
}
