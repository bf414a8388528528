//! Database models for devices.

use crate::types::{DeviceGroupId, DeviceId, OrganizationId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A storage volume reported by an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Drive {
    pub name: String,
    #[serde(default)]
    pub volume_label: Option<String>,
    #[serde(default)]
    pub drive_format: Option<String>,
    /// Size in GB
    pub total_size: f64,
    /// Free space in GB
    pub free_space: f64,
}

/// Full telemetry snapshot sent by an agent on every heartbeat.
#[derive(Debug, Clone)]
pub struct DeviceUpsertDBRequest {
    pub id: DeviceId,
    pub organization_id: OrganizationId,
    pub device_name: String,
    pub current_user_name: Option<String>,
    pub drives: Vec<Drive>,
    pub cpu_utilization: f64,
    pub used_memory: f64,
    pub total_memory: f64,
    pub used_storage: f64,
    pub total_storage: f64,
    pub is_64_bit: bool,
    pub os_architecture: String,
    pub os_description: String,
    pub platform: String,
    pub processor_count: i32,
    pub agent_version: String,
}

/// Operator-controlled device fields. `None` leaves the stored value untouched;
/// `device_group_id: Some(None)` detaches the device from its group.
#[derive(Debug, Clone, Default)]
pub struct DeviceUpdateDBRequest {
    pub tags: Option<String>,
    pub alias: Option<String>,
    pub device_group_id: Option<Option<DeviceGroupId>>,
}

/// Database response for a device
#[derive(Debug, Clone)]
pub struct DeviceDBResponse {
    pub id: DeviceId,
    pub organization_id: OrganizationId,
    pub device_group_id: Option<DeviceGroupId>,
    pub device_name: String,
    pub alias: Option<String>,
    pub tags: String,
    pub current_user_name: Option<String>,
    pub drives: Vec<Drive>,
    pub cpu_utilization: f64,
    pub used_memory: f64,
    pub total_memory: f64,
    pub used_storage: f64,
    pub total_storage: f64,
    pub is_64_bit: bool,
    pub os_architecture: String,
    pub os_description: String,
    pub platform: String,
    pub processor_count: i32,
    pub agent_version: String,
    pub is_online: bool,
    pub last_online: DateTime<Utc>,
}
