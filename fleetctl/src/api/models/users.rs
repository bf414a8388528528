//! API request/response models for users.

use crate::db::models::users::{UserDBResponse, UserOptions};
use crate::types::{OrganizationId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserAdminUpdate {
    pub is_administrator: bool,
}

/// Result of removing a user from the caller's organization
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserRemovedResponse {
    /// The fresh organization the user now belongs to alone
    #[schema(value_type = String, format = "uuid")]
    pub organization_id: OrganizationId,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserPromptResponse {
    pub prompt: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: UserId,
    pub username: String,
    #[schema(value_type = String, format = "uuid")]
    pub organization_id: OrganizationId,
    pub is_administrator: bool,
    /// False while the account was created by an invite and never activated
    pub has_password: bool,
    pub options: UserOptions,
    pub created_at: DateTime<Utc>,
}

impl From<UserDBResponse> for UserResponse {
    fn from(db: UserDBResponse) -> Self {
        Self {
            id: db.id,
            username: db.username,
            organization_id: db.organization_id,
            is_administrator: db.is_administrator,
            has_password: db.has_password,
            options: db.options,
            created_at: db.created_at,
        }
    }
}
