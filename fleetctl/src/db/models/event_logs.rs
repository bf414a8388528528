//! Database models for the event log.

use crate::types::{EventLogId, OrganizationId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EventSeverity {
    Info,
    Warning,
    Error,
}

/// Database request for appending an event
#[derive(Debug, Clone)]
pub struct EventLogCreateDBRequest {
    /// `None` for events that cannot be attributed to a tenant
    pub organization_id: Option<OrganizationId>,
    pub severity: EventSeverity,
    pub message: String,
    pub source: Option<String>,
    pub stack_trace: Option<String>,
}

impl EventLogCreateDBRequest {
    pub fn info(organization_id: Option<OrganizationId>, message: impl Into<String>) -> Self {
        Self {
            organization_id,
            severity: EventSeverity::Info,
            message: message.into(),
            source: None,
            stack_trace: None,
        }
    }

    pub fn error(organization_id: Option<OrganizationId>, message: impl Into<String>) -> Self {
        Self {
            organization_id,
            severity: EventSeverity::Error,
            message: message.into(),
            source: None,
            stack_trace: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_stack_trace(mut self, stack_trace: impl Into<String>) -> Self {
        self.stack_trace = Some(stack_trace.into());
        self
    }
}

/// Database response for an event
#[derive(Debug, Clone)]
pub struct EventLogDBResponse {
    pub id: EventLogId,
    pub timestamp: DateTime<Utc>,
    pub severity: EventSeverity,
    pub message: String,
    pub source: Option<String>,
    pub stack_trace: Option<String>,
    pub organization_id: Option<OrganizationId>,
}
