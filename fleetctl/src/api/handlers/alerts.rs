use crate::alerts::dispatcher;
use crate::api::models::alerts::{AlertOptions, AlertResponse};
use crate::auth::ApiCaller;
use crate::db::handlers::{Alerts, Repository, alerts::AlertFilter};
use crate::errors::{Error, Result};
use crate::types::{AlertId, Operation};
use crate::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

/// Raise an alert.
///
/// Every requested action is attempted. Failures of individual actions are written to the
/// organization's event log and do not change the response.
#[utoipa::path(
    post,
    path = "/alerts",
    tag = "alerts",
    summary = "Create alert",
    request_body = AlertOptions,
    responses(
        (status = 200, description = "Alert accepted"),
        (status = 400, description = "Malformed alert request"),
        (status = 401, description = "Missing or invalid API token"),
    ),
    security(("ApiToken" = []))
)]
#[tracing::instrument(skip_all, fields(org_id = %caller.organization_id))]
pub async fn create_alert(State(state): State<AppState>, caller: ApiCaller, Json(options): Json<AlertOptions>) -> Result<StatusCode> {
    dispatcher::validate(&options)?;

    let report = state.alert_dispatcher.dispatch(&options, caller.organization_id).await;
    if report.failures() > 0 {
        tracing::info!(failures = report.failures(), "Alert completed with failed actions");
    }

    Ok(StatusCode::OK)
}

#[utoipa::path(
    get,
    path = "/alerts",
    tag = "alerts",
    summary = "List alerts",
    responses(
        (status = 200, description = "Alerts of the caller's organization, newest first", body = Vec<AlertResponse>),
        (status = 401, description = "Missing or invalid API token"),
    ),
    security(("ApiToken" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_alerts(State(state): State<AppState>, caller: ApiCaller) -> Result<Json<Vec<AlertResponse>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let alerts = Alerts::new(&mut conn)
        .list(caller.organization_id, &AlertFilter::default())
        .await?;

    Ok(Json(alerts.into_iter().map(Into::into).collect()))
}

/// Delete an alert owned by the caller's organization.
///
/// An alert that is missing or owned by another organization yields 401.
#[utoipa::path(
    post,
    path = "/alerts/{id}/delete",
    tag = "alerts",
    summary = "Delete alert",
    params(("id" = uuid::Uuid, Path, description = "Alert ID")),
    responses(
        (status = 200, description = "Alert deleted"),
        (status = 401, description = "Alert not visible to the caller"),
    ),
    security(("ApiToken" = []))
)]
#[tracing::instrument(skip_all, fields(alert_id = %id))]
pub async fn delete_alert(State(state): State<AppState>, caller: ApiCaller, Path(id): Path<AlertId>) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    if !Alerts::new(&mut conn).delete(caller.organization_id, id).await? {
        return Err(Error::Unauthorized {
            action: Operation::Delete,
            resource: "alert".to_string(),
            id: id.to_string(),
        });
    }

    Ok(StatusCode::OK)
}
