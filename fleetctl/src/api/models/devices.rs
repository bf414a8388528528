//! API request/response models for devices.

use crate::db::models::devices::{DeviceDBResponse, DeviceUpdateDBRequest, DeviceUpsertDBRequest, Drive};
use crate::types::{DeviceGroupId, DeviceId, OrganizationId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::rust::double_option;
use utoipa::ToSchema;

/// Telemetry snapshot posted by an agent. Creates the device on first contact.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DeviceHeartbeat {
    /// Agent-assigned, stable across restarts
    #[schema(example = "5b1f0c9e-desk-07")]
    pub id: DeviceId,
    #[schema(value_type = String, format = "uuid")]
    pub organization_id: OrganizationId,
    pub device_name: String,
    #[serde(default)]
    pub current_user_name: Option<String>,
    #[serde(default)]
    pub drives: Vec<Drive>,
    /// Fraction between 0 and 1
    #[serde(default)]
    pub cpu_utilization: f64,
    /// GB
    #[serde(default)]
    pub used_memory: f64,
    #[serde(default)]
    pub total_memory: f64,
    #[serde(default)]
    pub used_storage: f64,
    #[serde(default)]
    pub total_storage: f64,
    #[serde(default)]
    pub is_64_bit: bool,
    #[serde(default)]
    pub os_architecture: String,
    #[serde(default)]
    pub os_description: String,
    #[serde(default)]
    pub platform: String,
    #[serde(default)]
    pub processor_count: i32,
    #[serde(default)]
    pub agent_version: String,
}

impl From<DeviceHeartbeat> for DeviceUpsertDBRequest {
    fn from(hb: DeviceHeartbeat) -> Self {
        Self {
            id: hb.id,
            organization_id: hb.organization_id,
            device_name: hb.device_name,
            current_user_name: hb.current_user_name,
            drives: hb.drives,
            cpu_utilization: hb.cpu_utilization,
            used_memory: hb.used_memory,
            total_memory: hb.total_memory,
            used_storage: hb.used_storage,
            total_storage: hb.total_storage,
            is_64_bit: hb.is_64_bit,
            os_architecture: hb.os_architecture,
            os_description: hb.os_description,
            platform: hb.platform,
            processor_count: hb.processor_count,
            agent_version: hb.agent_version,
        }
    }
}

/// Operator-editable device fields. Omitted fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct DeviceUpdate {
    pub tags: Option<String>,
    pub alias: Option<String>,
    /// Group to move the device into; `null` removes it from its group
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    #[schema(value_type = Option<String>, format = "uuid")]
    pub device_group_id: Option<Option<DeviceGroupId>>,
}

impl From<DeviceUpdate> for DeviceUpdateDBRequest {
    fn from(update: DeviceUpdate) -> Self {
        Self {
            tags: update.tags,
            alias: update.alias,
            device_group_id: update.device_group_id,
        }
    }
}

/// Replace a device's free-form tags
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DeviceTagsUpdate {
    #[schema(example = "lab, windows")]
    pub tags: String,
}

/// Options applied by an agent installer on first setup
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct DeviceSetupOptions {
    pub alias: Option<String>,
    /// Matched case-insensitively against the organization's groups
    pub group_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RemoveDevicesRequest {
    pub device_ids: Vec<DeviceId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RemoveDevicesResponse {
    pub removed: u64,
}

/// Narrow a list of device ids down to those a user may see
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FilterDevicesRequest {
    #[schema(value_type = String, format = "uuid")]
    pub user_id: UserId,
    pub device_ids: Vec<DeviceId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FilterDevicesResponse {
    pub device_ids: Vec<DeviceId>,
}

/// Full device details returned by the API
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DeviceResponse {
    pub id: DeviceId,
    #[schema(value_type = String, format = "uuid")]
    pub organization_id: OrganizationId,
    #[schema(value_type = Option<String>, format = "uuid")]
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

impl From<DeviceDBResponse> for DeviceResponse {
    fn from(db: DeviceDBResponse) -> Self {
        Self {
            id: db.id,
            organization_id: db.organization_id,
            device_group_id: db.device_group_id,
            device_name: db.device_name,
            alias: db.alias,
            tags: db.tags,
            current_user_name: db.current_user_name,
            drives: db.drives,
            cpu_utilization: db.cpu_utilization,
            used_memory: db.used_memory,
            total_memory: db.total_memory,
            used_storage: db.used_storage,
            total_storage: db.total_storage,
            is_64_bit: db.is_64_bit,
            os_architecture: db.os_architecture,
            os_description: db.os_description,
            platform: db.platform,
            processor_count: db.processor_count,
            agent_version: db.agent_version,
            is_online: db.is_online,
            last_online: db.last_online,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_update_distinguishes_null_from_missing() {
        let missing: DeviceUpdate = serde_json::from_str(r#"{"alias":"Front desk"}"#).unwrap();
        assert_eq!(missing.device_group_id, None);

        let cleared: DeviceUpdate = serde_json::from_str(r#"{"device_group_id":null}"#).unwrap();
        assert_eq!(cleared.device_group_id, Some(None));

        let id = uuid::Uuid::new_v4();
        let set: DeviceUpdate = serde_json::from_str(&format!(r#"{{"device_group_id":"{id}"}}"#)).unwrap();
        assert_eq!(set.device_group_id, Some(Some(id)));
    }
}
