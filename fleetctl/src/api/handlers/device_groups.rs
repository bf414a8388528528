use crate::api::models::device_groups::{DeviceGroupCreate, DeviceGroupResponse};
use crate::api::handlers::missing;
use crate::auth::ApiCaller;
use crate::db::handlers::{DeviceGroups, Repository, device_groups::DeviceGroupFilter, ownership::OwnedRow};
use crate::db::models::device_groups::DeviceGroupCreateDBRequest;
use crate::errors::{Error, Result};
use crate::types::{DeviceGroupId, Operation};
use crate::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

#[utoipa::path(
    get,
    path = "/device-groups",
    tag = "device-groups",
    summary = "List device groups",
    responses(
        (status = 200, description = "Groups of the caller's organization, by name", body = Vec<DeviceGroupResponse>),
        (status = 401, description = "Missing or invalid API token"),
    ),
    security(("ApiToken" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_device_groups(State(state): State<AppState>, caller: ApiCaller) -> Result<Json<Vec<DeviceGroupResponse>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let groups = DeviceGroups::new(&mut conn)
        .list(caller.organization_id, &DeviceGroupFilter::default())
        .await?;

    Ok(Json(groups.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    post,
    path = "/device-groups",
    tag = "device-groups",
    summary = "Create device group",
    request_body = DeviceGroupCreate,
    responses(
        (status = 201, description = "Group created", body = DeviceGroupResponse),
        (status = 400, description = "Empty name"),
        (status = 409, description = "A group with that name already exists"),
    ),
    security(("ApiToken" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_device_group(
    State(state): State<AppState>,
    caller: ApiCaller,
    Json(create): Json<DeviceGroupCreate>,
) -> Result<(StatusCode, Json<DeviceGroupResponse>)> {
    let name = create.name.trim();
    if name.is_empty() {
        return Err(Error::BadRequest {
            message: "Group name is required".to_string(),
        });
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let group = DeviceGroups::new(&mut conn)
        .create(caller.organization_id, &DeviceGroupCreateDBRequest { name: name.to_string() })
        .await?;

    Ok((StatusCode::CREATED, Json(group.into())))
}

/// Delete a group. Its devices stay, ungrouped.
#[utoipa::path(
    delete,
    path = "/device-groups/{id}",
    tag = "device-groups",
    summary = "Delete device group",
    params(("id" = uuid::Uuid, Path, description = "Device group ID")),
    responses(
        (status = 204, description = "Group deleted"),
        (status = 401, description = "Group belongs to another organization"),
        (status = 404, description = "Group not found"),
    ),
    security(("ApiToken" = []))
)]
#[tracing::instrument(skip_all, fields(group_id = %id))]
pub async fn delete_device_group(State(state): State<AppState>, caller: ApiCaller, Path(id): Path<DeviceGroupId>) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    if !DeviceGroups::new(&mut conn).delete(caller.organization_id, id).await? {
        return Err(missing(&mut conn, caller.organization_id, OwnedRow::DeviceGroup(id), Operation::Delete).await);
    }
    Ok(StatusCode::NO_CONTENT)
}
