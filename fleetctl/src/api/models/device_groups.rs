//! API request/response models for device groups.

use crate::db::models::device_groups::DeviceGroupDBResponse;
use crate::types::{DeviceGroupId, OrganizationId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Request body for creating a device group
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DeviceGroupCreate {
    /// Unique within the organization, ignoring case
    #[schema(example = "Front office")]
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DeviceGroupResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: DeviceGroupId,
    pub name: String,
    #[schema(value_type = String, format = "uuid")]
    pub organization_id: OrganizationId,
    pub created_at: DateTime<Utc>,
}

impl From<DeviceGroupDBResponse> for DeviceGroupResponse {
    fn from(db: DeviceGroupDBResponse) -> Self {
        Self {
            id: db.id,
            name: db.name,
            organization_id: db.organization_id,
            created_at: db.created_at,
        }
    }
}
