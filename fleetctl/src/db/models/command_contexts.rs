//! Database models for command contexts.

use crate::types::{CommandContextId, OrganizationId};
use chrono::{DateTime, Utc};

/// Database request for upserting a command context
#[derive(Debug, Clone)]
pub struct CommandContextUpsertDBRequest {
    pub id: CommandContextId,
    pub payload: serde_json::Value,
}

/// Database response for a command context
#[derive(Debug, Clone)]
pub struct CommandContextDBResponse {
    pub id: CommandContextId,
    pub timestamp: DateTime<Utc>,
    pub organization_id: OrganizationId,
    pub payload: serde_json::Value,
}
