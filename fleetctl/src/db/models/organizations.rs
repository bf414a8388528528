//! Database models for organizations.

use crate::types::OrganizationId;
use chrono::{DateTime, Utc};

/// Database response for an organization
#[derive(Debug, Clone)]
pub struct OrganizationDBResponse {
    pub id: OrganizationId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}
