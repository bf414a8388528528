use crate::api::models::organizations::{OrganizationResponse, OrganizationUpdate};
use crate::auth::ApiCaller;
use crate::db::handlers::Organizations;
use crate::errors::{Error, Result};
use crate::AppState;
use axum::{Json, extract::State};

fn missing(caller: &ApiCaller) -> Error {
    Error::NotFound {
        resource: "Organization".to_string(),
        id: caller.organization_id.to_string(),
    }
}

#[utoipa::path(
    get,
    path = "/organization",
    tag = "organization",
    summary = "Get the caller's organization",
    responses(
        (status = 200, description = "Organization", body = OrganizationResponse),
        (status = 401, description = "Missing or invalid API token"),
    ),
    security(("ApiToken" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_organization(State(state): State<AppState>, caller: ApiCaller) -> Result<Json<OrganizationResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    Organizations::new(&mut conn)
        .get_by_id(caller.organization_id)
        .await?
        .map(|o| Json(o.into()))
        .ok_or_else(|| missing(&caller))
}

#[utoipa::path(
    put,
    path = "/organization",
    tag = "organization",
    summary = "Rename the caller's organization",
    request_body = OrganizationUpdate,
    responses(
        (status = 200, description = "Organization", body = OrganizationResponse),
        (status = 400, description = "Empty name"),
    ),
    security(("ApiToken" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_organization(
    State(state): State<AppState>,
    caller: ApiCaller,
    Json(update): Json<OrganizationUpdate>,
) -> Result<Json<OrganizationResponse>> {
    let name = update.name.trim();
    if name.is_empty() {
        return Err(Error::BadRequest {
            message: "Organization name is required".to_string(),
        });
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Organizations::new(&mut conn);

    if !repo.update_name(caller.organization_id, name).await? {
        return Err(missing(&caller));
    }

    repo.get_by_id(caller.organization_id)
        .await?
        .map(|o| Json(o.into()))
        .ok_or_else(|| missing(&caller))
}
