//! API request/response models for command contexts.

use crate::db::models::command_contexts::CommandContextDBResponse;
use crate::types::{CommandContextId, OrganizationId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Body of `PUT /api/command-contexts/{id}`: the opaque result payload of a command run
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CommandContextUpsert {
    #[schema(value_type = Object)]
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CommandContextResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: CommandContextId,
    pub timestamp: DateTime<Utc>,
    #[schema(value_type = String, format = "uuid")]
    pub organization_id: OrganizationId,
    #[schema(value_type = Object)]
    pub payload: serde_json::Value,
}

impl From<CommandContextDBResponse> for CommandContextResponse {
    fn from(db: CommandContextDBResponse) -> Self {
        Self {
            id: db.id,
            timestamp: db.timestamp,
            organization_id: db.organization_id,
            payload: db.payload,
        }
    }
}
