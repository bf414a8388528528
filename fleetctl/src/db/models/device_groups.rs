//! Database models for device groups.

use crate::types::{DeviceGroupId, OrganizationId};
use chrono::{DateTime, Utc};

/// Database request for creating a device group
#[derive(Debug, Clone)]
pub struct DeviceGroupCreateDBRequest {
    pub name: String,
}

/// Database response for a device group
#[derive(Debug, Clone)]
pub struct DeviceGroupDBResponse {
    pub id: DeviceGroupId,
    pub name: String,
    pub organization_id: OrganizationId,
    pub created_at: DateTime<Utc>,
}
