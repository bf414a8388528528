//! Database models for invite links.

use crate::types::{InviteId, OrganizationId};
use chrono::{DateTime, Utc};

/// Database request for creating an invite
#[derive(Debug, Clone)]
pub struct InviteCreateDBRequest {
    pub invited_user: String,
    pub is_admin: bool,
    pub reset_url: Option<String>,
}

/// Database response for an invite
#[derive(Debug, Clone)]
pub struct InviteDBResponse {
    pub id: InviteId,
    /// Always lower case
    pub invited_user: String,
    pub is_admin: bool,
    pub date_sent: DateTime<Utc>,
    pub reset_url: Option<String>,
    pub organization_id: OrganizationId,
}
