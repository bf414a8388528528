//! API request/response models for invite links.

use crate::db::models::invites::InviteDBResponse;
use crate::types::{InviteId, OrganizationId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Request body for inviting a user into the caller's organization
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InviteCreate {
    #[schema(example = "Jordan@Example.com")]
    pub invited_user: String,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub reset_url: Option<String>,
}

/// Request body for redeeming an invite
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InviteRedeem {
    /// Must match the invited user, ignoring case
    pub username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InviteRedeemResponse {
    /// False when no invite with this id is addressed to the user
    pub redeemed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InviteResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: InviteId,
    pub invited_user: String,
    pub is_admin: bool,
    pub date_sent: DateTime<Utc>,
    pub reset_url: Option<String>,
    #[schema(value_type = String, format = "uuid")]
    pub organization_id: OrganizationId,
}

impl From<InviteDBResponse> for InviteResponse {
    fn from(db: InviteDBResponse) -> Self {
        Self {
            id: db.id,
            invited_user: db.invited_user,
            is_admin: db.is_admin,
            date_sent: db.date_sent,
            reset_url: db.reset_url,
            organization_id: db.organization_id,
        }
    }
}
