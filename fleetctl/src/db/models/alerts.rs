//! Database models for alerts.

use crate::types::{AlertId, DeviceId, OrganizationId};
use chrono::{DateTime, Utc};

/// Database request for creating an alert
#[derive(Debug, Clone)]
pub struct AlertCreateDBRequest {
    pub device_id: Option<DeviceId>,
    pub message: String,
}

/// Database response for an alert
#[derive(Debug, Clone)]
pub struct AlertDBResponse {
    pub id: AlertId,
    pub created_on: DateTime<Utc>,
    pub device_id: Option<DeviceId>,
    pub message: String,
    pub organization_id: OrganizationId,
}
