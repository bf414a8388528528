use crate::api::models::events::{EventLogResponse, EventRangeQuery};
use crate::auth::ApiCaller;
use crate::db::handlers::EventLogs;
use crate::errors::{Error, Result};
use crate::AppState;
use axum::{
    Json,
    extract::{Query, State},
};
use chrono::{Duration, Utc};

const DEFAULT_WINDOW_DAYS: i64 = 7;

#[utoipa::path(
    get,
    path = "/events",
    tag = "events",
    summary = "List events in a time range",
    params(EventRangeQuery),
    responses(
        (status = 200, description = "Events of the caller's organization, newest first", body = Vec<EventLogResponse>),
        (status = 400, description = "`from` is after `to`"),
        (status = 401, description = "Missing or invalid API token"),
    ),
    security(("ApiToken" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_events(
    State(state): State<AppState>,
    caller: ApiCaller,
    Query(query): Query<EventRangeQuery>,
) -> Result<Json<Vec<EventLogResponse>>> {
    let to = query.to.unwrap_or_else(Utc::now);
    let from = query.from.unwrap_or(to - Duration::days(DEFAULT_WINDOW_DAYS));
    if from > to {
        return Err(Error::BadRequest {
            message: "`from` must not be after `to`".to_string(),
        });
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let events = EventLogs::new(&mut conn).list_in_range(caller.organization_id, from, to).await?;

    Ok(Json(events.into_iter().map(Into::into).collect()))
}
