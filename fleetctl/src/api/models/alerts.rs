//! API request/response models for alerts.

use std::collections::HashMap;

use crate::db::models::alerts::AlertDBResponse;
use crate::types::{AlertId, DeviceId, OrganizationId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Request body for raising an alert.
///
/// Three independent actions, each opted into by its flag: store an alert against the
/// organization, send an email, and call an arbitrary HTTP endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct AlertOptions {
    /// Store an alert record
    pub should_alert: bool,
    /// Device the stored alert refers to
    pub alert_device_id: Option<DeviceId>,
    /// Message of the stored alert
    #[schema(example = "Disk C: is 95% full")]
    pub alert_message: String,

    /// Send an email
    pub should_email: bool,
    #[schema(example = "ops@example.com")]
    pub email_to: String,
    pub email_subject: String,
    /// HTML body
    pub email_body: String,

    /// Call a webhook
    pub should_send_api_request: bool,
    #[schema(example = "https://hooks.example.com/fleet")]
    pub api_request_url: String,
    /// HTTP method, e.g. `POST`
    #[schema(example = "POST")]
    pub api_request_method: String,
    pub api_request_headers: HashMap<String, String>,
    /// Sent verbatim with `Content-Type: application/json`
    pub api_request_body: String,
}

/// A stored alert
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AlertResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: AlertId,
    pub created_on: DateTime<Utc>,
    pub device_id: Option<DeviceId>,
    pub message: String,
    #[schema(value_type = String, format = "uuid")]
    pub organization_id: OrganizationId,
}

impl From<AlertDBResponse> for AlertResponse {
    fn from(db: AlertDBResponse) -> Self {
        Self {
            id: db.id,
            created_on: db.created_on,
            device_id: db.device_id,
            message: db.message,
            organization_id: db.organization_id,
        }
    }
}
