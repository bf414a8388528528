use crate::api::models::users::{UserAdminUpdate, UserPromptResponse, UserRemovedResponse, UserResponse};
use crate::api::handlers::missing;
use crate::auth::ApiCaller;
use crate::db::handlers::{Users, ownership::OwnedRow};
use crate::db::models::users::{UserDBResponse, UserOptions};
use crate::errors::{Error, Result};
use crate::types::{Operation, UserId};
use crate::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use sqlx::PgConnection;

/// Load a member of the caller's organization.
async fn member(conn: &mut PgConnection, caller: &ApiCaller, id: UserId, action: Operation) -> Result<UserDBResponse> {
    match Users::new(conn).get_by_id(id).await? {
        Some(user) if user.organization_id == caller.organization_id => Ok(user),
        Some(_) => Err(Error::Unauthorized {
            action,
            resource: "user".to_string(),
            id: id.to_string(),
        }),
        None => Err(Error::NotFound {
            resource: "user".to_string(),
            id: id.to_string(),
        }),
    }
}

#[utoipa::path(
    get,
    path = "/users",
    tag = "users",
    summary = "List users",
    responses(
        (status = 200, description = "Members of the caller's organization", body = Vec<UserResponse>),
        (status = 401, description = "Missing or invalid API token"),
    ),
    security(("ApiToken" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_users(State(state): State<AppState>, caller: ApiCaller) -> Result<Json<Vec<UserResponse>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let users = Users::new(&mut conn).list_for_organization(caller.organization_id).await?;

    Ok(Json(users.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "users",
    summary = "Get user",
    params(("id" = uuid::Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "User", body = UserResponse),
        (status = 401, description = "User belongs to another organization"),
        (status = 404, description = "User not found"),
    ),
    security(("ApiToken" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %id))]
pub async fn get_user(State(state): State<AppState>, caller: ApiCaller, Path(id): Path<UserId>) -> Result<Json<UserResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let user = member(&mut conn, &caller, id, Operation::Read).await?;

    Ok(Json(user.into()))
}

#[utoipa::path(
    put,
    path = "/users/{id}/admin",
    tag = "users",
    summary = "Grant or revoke administrator",
    params(("id" = uuid::Uuid, Path, description = "User ID")),
    request_body = UserAdminUpdate,
    responses(
        (status = 204, description = "Administrator flag updated"),
        (status = 401, description = "User belongs to another organization"),
        (status = 404, description = "User not found"),
    ),
    security(("ApiToken" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %id))]
pub async fn set_user_admin(
    State(state): State<AppState>,
    caller: ApiCaller,
    Path(id): Path<UserId>,
    Json(update): Json<UserAdminUpdate>,
) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    if !Users::new(&mut conn)
        .set_is_administrator(caller.organization_id, id, update.is_administrator)
        .await?
    {
        return Err(missing(&mut conn, caller.organization_id, OwnedRow::User(id), Operation::Update).await);
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Move a member out of the organization into a new organization of their own.
#[utoipa::path(
    post,
    path = "/users/{id}/remove",
    tag = "users",
    summary = "Remove user from organization",
    params(("id" = uuid::Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "User removed", body = UserRemovedResponse),
        (status = 401, description = "User belongs to another organization"),
        (status = 404, description = "User not found"),
    ),
    security(("ApiToken" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %id))]
pub async fn remove_user(State(state): State<AppState>, caller: ApiCaller, Path(id): Path<UserId>) -> Result<Json<UserRemovedResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    match Users::new(&mut conn).remove_from_organization(caller.organization_id, id).await? {
        Some(organization_id) => Ok(Json(UserRemovedResponse { organization_id })),
        None => Err(missing(&mut conn, caller.organization_id, OwnedRow::User(id), Operation::Update).await),
    }
}

#[utoipa::path(
    get,
    path = "/users/{id}/options",
    tag = "users",
    summary = "Get user options",
    params(("id" = uuid::Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "User options", body = UserOptions),
        (status = 401, description = "User belongs to another organization"),
        (status = 404, description = "User not found"),
    ),
    security(("ApiToken" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %id))]
pub async fn get_user_options(State(state): State<AppState>, caller: ApiCaller, Path(id): Path<UserId>) -> Result<Json<UserOptions>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let user = member(&mut conn, &caller, id, Operation::Read).await?;

    Ok(Json(user.options))
}

#[utoipa::path(
    put,
    path = "/users/{id}/options",
    tag = "users",
    summary = "Replace user options",
    params(("id" = uuid::Uuid, Path, description = "User ID")),
    request_body = UserOptions,
    responses(
        (status = 200, description = "Stored options", body = UserOptions),
        (status = 401, description = "User belongs to another organization"),
        (status = 404, description = "User not found"),
    ),
    security(("ApiToken" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %id))]
pub async fn update_user_options(
    State(state): State<AppState>,
    caller: ApiCaller,
    Path(id): Path<UserId>,
    Json(options): Json<UserOptions>,
) -> Result<Json<UserOptions>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    member(&mut conn, &caller, id, Operation::Update).await?;

    Users::new(&mut conn).update_options(id, &options).await?;
    Ok(Json(options))
}

/// The console prompt for a user: their own option, else the configured default.
#[utoipa::path(
    get,
    path = "/users/{id}/prompt",
    tag = "users",
    summary = "Resolve console prompt",
    params(("id" = uuid::Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Prompt", body = UserPromptResponse),
        (status = 401, description = "User belongs to another organization"),
        (status = 404, description = "User not found"),
    ),
    security(("ApiToken" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %id))]
pub async fn get_user_prompt(State(state): State<AppState>, caller: ApiCaller, Path(id): Path<UserId>) -> Result<Json<UserPromptResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let user = member(&mut conn, &caller, id, Operation::Read).await?;

    let prompt = Users::new(&mut conn).default_prompt(&user.username, &state.config.default_prompt).await?;
    Ok(Json(UserPromptResponse { prompt }))
}
