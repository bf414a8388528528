use crate::api::models::devices::{
    DeviceHeartbeat, DeviceResponse, DeviceSetupOptions, DeviceTagsUpdate, DeviceUpdate, FilterDevicesRequest, FilterDevicesResponse,
    RemoveDevicesRequest, RemoveDevicesResponse,
};
use crate::api::handlers::missing;
use crate::auth::ApiCaller;
use crate::db::handlers::{Devices, Users, ownership::OwnedRow};
use crate::db::models::devices::DeviceUpsertDBRequest;
use crate::errors::{Error, Result};
use crate::types::{DeviceId, Operation};
use crate::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

/// Agent heartbeat: create the device on first contact, refresh its telemetry afterwards.
///
/// Unauthenticated; the agent names its organization in the body. An unknown organization is
/// rejected and leaves an event behind.
#[utoipa::path(
    post,
    path = "/devices/heartbeat",
    tag = "devices",
    summary = "Device heartbeat",
    request_body = DeviceHeartbeat,
    responses(
        (status = 200, description = "Device stored", body = DeviceResponse),
        (status = 400, description = "Organization does not exist"),
    )
)]
#[tracing::instrument(skip_all, fields(device_id = %heartbeat.id))]
pub async fn heartbeat(State(state): State<AppState>, Json(heartbeat): Json<DeviceHeartbeat>) -> Result<Json<DeviceResponse>> {
    if heartbeat.id.trim().is_empty() {
        return Err(Error::BadRequest {
            message: "Device id is required".to_string(),
        });
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let device = Devices::new(&mut conn).upsert(&DeviceUpsertDBRequest::from(heartbeat)).await?;

    Ok(Json(device.into()))
}

/// Agent disconnect. A device that was never seen is ignored.
#[utoipa::path(
    post,
    path = "/devices/{id}/offline",
    tag = "devices",
    summary = "Mark device offline",
    params(("id" = String, Path, description = "Device ID")),
    responses((status = 204, description = "Device marked offline"))
)]
#[tracing::instrument(skip_all, fields(device_id = %id))]
pub async fn mark_offline(State(state): State<AppState>, Path(id): Path<DeviceId>) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    Devices::new(&mut conn).mark_offline(&id).await?;

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/devices",
    tag = "devices",
    summary = "List devices",
    responses(
        (status = 200, description = "Devices of the caller's organization", body = Vec<DeviceResponse>),
        (status = 401, description = "Missing or invalid API token"),
    ),
    security(("ApiToken" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_devices(State(state): State<AppState>, caller: ApiCaller) -> Result<Json<Vec<DeviceResponse>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let devices = Devices::new(&mut conn).list_for_organization(caller.organization_id).await?;

    Ok(Json(devices.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    get,
    path = "/devices/{id}",
    tag = "devices",
    summary = "Get device",
    params(("id" = String, Path, description = "Device ID")),
    responses(
        (status = 200, description = "Device details", body = DeviceResponse),
        (status = 401, description = "Device belongs to another organization"),
        (status = 404, description = "Device not found"),
    ),
    security(("ApiToken" = []))
)]
#[tracing::instrument(skip_all, fields(device_id = %id))]
pub async fn get_device(State(state): State<AppState>, caller: ApiCaller, Path(id): Path<DeviceId>) -> Result<Json<DeviceResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    match Devices::new(&mut conn).get(caller.organization_id, &id).await? {
        Some(device) => Ok(Json(device.into())),
        None => Err(missing(&mut conn, caller.organization_id, OwnedRow::Device(&id), Operation::Read).await),
    }
}

#[utoipa::path(
    patch,
    path = "/devices/{id}",
    tag = "devices",
    summary = "Update device",
    params(("id" = String, Path, description = "Device ID")),
    request_body = DeviceUpdate,
    responses(
        (status = 200, description = "Updated device", body = DeviceResponse),
        (status = 401, description = "Device belongs to another organization"),
        (status = 404, description = "Device, or the device group within the organization, not found"),
    ),
    security(("ApiToken" = []))
)]
#[tracing::instrument(skip_all, fields(device_id = %id))]
pub async fn update_device(
    State(state): State<AppState>,
    caller: ApiCaller,
    Path(id): Path<DeviceId>,
    Json(update): Json<DeviceUpdate>,
) -> Result<Json<DeviceResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    match Devices::new(&mut conn).update(caller.organization_id, &id, &update.into()).await? {
        Some(device) => Ok(Json(device.into())),
        None => Err(missing(&mut conn, caller.organization_id, OwnedRow::Device(&id), Operation::Update).await),
    }
}

#[utoipa::path(
    put,
    path = "/devices/{id}/tags",
    tag = "devices",
    summary = "Replace device tags",
    params(("id" = String, Path, description = "Device ID")),
    request_body = DeviceTagsUpdate,
    responses(
        (status = 204, description = "Tags replaced"),
        (status = 401, description = "Device belongs to another organization"),
        (status = 404, description = "Device not found"),
    ),
    security(("ApiToken" = []))
)]
#[tracing::instrument(skip_all, fields(device_id = %id))]
pub async fn update_device_tags(
    State(state): State<AppState>,
    caller: ApiCaller,
    Path(id): Path<DeviceId>,
    Json(update): Json<DeviceTagsUpdate>,
) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    if !Devices::new(&mut conn).update_tags(caller.organization_id, &id, &update.tags).await? {
        return Err(missing(&mut conn, caller.organization_id, OwnedRow::Device(&id), Operation::Update).await);
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Apply installer setup options: an alias and a group looked up by name.
#[utoipa::path(
    put,
    path = "/devices/{id}/setup",
    tag = "devices",
    summary = "Apply device setup options",
    params(("id" = String, Path, description = "Device ID")),
    request_body = DeviceSetupOptions,
    responses(
        (status = 200, description = "Updated device", body = DeviceResponse),
        (status = 401, description = "Device belongs to another organization"),
        (status = 404, description = "Device not found"),
    ),
    security(("ApiToken" = []))
)]
#[tracing::instrument(skip_all, fields(device_id = %id))]
pub async fn setup_device(
    State(state): State<AppState>,
    caller: ApiCaller,
    Path(id): Path<DeviceId>,
    Json(options): Json<DeviceSetupOptions>,
) -> Result<Json<DeviceResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Devices::new(&mut conn);

    if repo.get(caller.organization_id, &id).await?.is_none() {
        return Err(missing(&mut conn, caller.organization_id, OwnedRow::Device(&id), Operation::Update).await);
    }

    match repo.set_setup_options(&id, options.alias.as_deref(), options.group_name.as_deref()).await? {
        Some(device) => Ok(Json(device.into())),
        None => Err(missing(&mut conn, caller.organization_id, OwnedRow::Device(&id), Operation::Update).await),
    }
}

#[utoipa::path(
    post,
    path = "/devices/remove",
    tag = "devices",
    summary = "Remove devices",
    request_body = RemoveDevicesRequest,
    responses(
        (status = 200, description = "Number of devices removed; ids outside the organization are ignored", body = RemoveDevicesResponse),
        (status = 401, description = "Missing or invalid API token"),
    ),
    security(("ApiToken" = []))
)]
#[tracing::instrument(skip_all, fields(count = request.device_ids.len()))]
pub async fn remove_devices(
    State(state): State<AppState>,
    caller: ApiCaller,
    Json(request): Json<RemoveDevicesRequest>,
) -> Result<Json<RemoveDevicesResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let removed = Devices::new(&mut conn).remove(caller.organization_id, &request.device_ids).await?;

    Ok(Json(RemoveDevicesResponse { removed }))
}

/// The subset of `device_ids` the given user may see.
#[utoipa::path(
    post,
    path = "/devices/filter",
    tag = "devices",
    summary = "Filter device ids by user permission",
    request_body = FilterDevicesRequest,
    responses(
        (status = 200, description = "Visible device ids", body = FilterDevicesResponse),
        (status = 401, description = "User belongs to another organization"),
        (status = 404, description = "User not found"),
    ),
    security(("ApiToken" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %request.user_id))]
pub async fn filter_devices(
    State(state): State<AppState>,
    caller: ApiCaller,
    Json(request): Json<FilterDevicesRequest>,
) -> Result<Json<FilterDevicesResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let user = Users::new(&mut conn).get_by_id(request.user_id).await?;
    if user.is_none_or(|u| u.organization_id != caller.organization_id) {
        return Err(missing(&mut conn, caller.organization_id, OwnedRow::User(request.user_id), Operation::Read).await);
    }

    let device_ids = Devices::new(&mut conn)
        .filter_ids_by_permission(&request.device_ids, request.user_id)
        .await?;

    Ok(Json(FilterDevicesResponse { device_ids }))
}
