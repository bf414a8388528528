use crate::api::models::invites::{InviteCreate, InviteRedeem, InviteRedeemResponse, InviteResponse};
use crate::api::handlers::missing;
use crate::auth::ApiCaller;
use crate::db::errors::DbError;
use crate::db::handlers::{Invites, Repository, invites::InviteFilter, ownership::OwnedRow};
use crate::db::models::invites::InviteCreateDBRequest;
use crate::errors::{Error, Result};
use crate::types::{InviteId, Operation};
use crate::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

#[utoipa::path(
    get,
    path = "/invites",
    tag = "invites",
    summary = "List invites",
    responses(
        (status = 200, description = "Pending invites of the caller's organization", body = Vec<InviteResponse>),
        (status = 401, description = "Missing or invalid API token"),
    ),
    security(("ApiToken" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_invites(State(state): State<AppState>, caller: ApiCaller) -> Result<Json<Vec<InviteResponse>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let invites = Invites::new(&mut conn)
        .list(caller.organization_id, &InviteFilter::default())
        .await?;

    Ok(Json(invites.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    post,
    path = "/invites",
    tag = "invites",
    summary = "Invite a user",
    request_body = InviteCreate,
    responses(
        (status = 201, description = "Invite created", body = InviteResponse),
        (status = 400, description = "Empty invited user"),
    ),
    security(("ApiToken" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_invite(
    State(state): State<AppState>,
    caller: ApiCaller,
    Json(create): Json<InviteCreate>,
) -> Result<(StatusCode, Json<InviteResponse>)> {
    if create.invited_user.trim().is_empty() {
        return Err(Error::BadRequest {
            message: "Invited user is required".to_string(),
        });
    }

    let request = InviteCreateDBRequest {
        invited_user: create.invited_user.trim().to_string(),
        is_admin: create.is_admin,
        reset_url: create.reset_url,
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let invite = Invites::new(&mut conn).create(caller.organization_id, &request).await?;

    Ok((StatusCode::CREATED, Json(invite.into())))
}

#[utoipa::path(
    delete,
    path = "/invites/{id}",
    tag = "invites",
    summary = "Revoke invite",
    params(("id" = uuid::Uuid, Path, description = "Invite ID")),
    responses(
        (status = 204, description = "Invite revoked"),
        (status = 401, description = "Invite belongs to another organization"),
        (status = 404, description = "Invite not found"),
    ),
    security(("ApiToken" = []))
)]
#[tracing::instrument(skip_all, fields(invite_id = %id))]
pub async fn delete_invite(State(state): State<AppState>, caller: ApiCaller, Path(id): Path<InviteId>) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    if !Invites::new(&mut conn).delete(caller.organization_id, id).await? {
        return Err(missing(&mut conn, caller.organization_id, OwnedRow::Invite(id), Operation::Delete).await);
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Join the invite's organization. An invite can be redeemed once, by the user it names.
///
/// The named user must be a member of the caller's organization; a user elsewhere yields 401 and
/// is left untouched.
#[utoipa::path(
    post,
    path = "/invites/{id}/redeem",
    tag = "invites",
    summary = "Redeem invite",
    params(("id" = uuid::Uuid, Path, description = "Invite ID")),
    request_body = InviteRedeem,
    responses(
        (status = 200, description = "Whether the invite was redeemed", body = InviteRedeemResponse),
        (status = 401, description = "The named user is not a member of the caller's organization"),
    ),
    security(("ApiToken" = []))
)]
#[tracing::instrument(skip_all, fields(invite_id = %id))]
pub async fn redeem_invite(
    State(state): State<AppState>,
    caller: ApiCaller,
    Path(id): Path<InviteId>,
    Json(redeem): Json<InviteRedeem>,
) -> Result<Json<InviteRedeemResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let redeemed = Invites::new(&mut conn)
        .redeem_for_member(caller.organization_id, &redeem.username, id)
        .await
        .map_err(|e| match e {
            DbError::NotFound => Error::Unauthorized {
                action: Operation::Update,
                resource: "user".to_string(),
                id: redeem.username.clone(),
            },
            other => Error::Database(other),
        })?;

    Ok(Json(InviteRedeemResponse { redeemed }))
}
