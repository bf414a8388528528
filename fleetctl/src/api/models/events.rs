//! API request/response models for the event log.

use crate::db::models::event_logs::{EventLogDBResponse, EventSeverity};
use crate::types::{EventLogId, OrganizationId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Inclusive time range. Both ends default to "the last 7 days" when omitted.
#[derive(Debug, Clone, Deserialize, IntoParams, ToSchema)]
pub struct EventRangeQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EventLogResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: EventLogId,
    pub timestamp: DateTime<Utc>,
    pub severity: EventSeverity,
    pub message: String,
    pub source: Option<String>,
    pub stack_trace: Option<String>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub organization_id: Option<OrganizationId>,
}

impl From<EventLogDBResponse> for EventLogResponse {
    fn from(db: EventLogDBResponse) -> Self {
        Self {
            id: db.id,
            timestamp: db.timestamp,
            severity: db.severity,
            message: db.message,
            source: db.source,
            stack_trace: db.stack_trace,
            organization_id: db.organization_id,
        }
    }
}
