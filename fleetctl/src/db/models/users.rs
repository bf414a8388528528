//! Database models for users.

use crate::types::{OrganizationId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Per-user preferences stored alongside the account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct UserOptions {
    /// Prompt shown in the remote console. Falls back to the configured default when unset.
    pub console_prompt: Option<String>,
    /// Shell used when a command does not name one
    pub default_shell: Option<String>,
}

/// Database request for creating a new user
#[derive(Debug, Clone)]
pub struct UserCreateDBRequest {
    pub username: String,
    pub organization_id: OrganizationId,
    pub is_administrator: bool,
    pub password_hash: Option<String>,
}

/// Database response for a user
#[derive(Debug, Clone)]
pub struct UserDBResponse {
    pub id: UserId,
    pub username: String,
    pub organization_id: OrganizationId,
    pub is_administrator: bool,
    pub has_password: bool,
    pub options: UserOptions,
    pub created_at: DateTime<Utc>,
}
