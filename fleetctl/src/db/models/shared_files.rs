//! Database models for shared files.

use crate::types::{OrganizationId, SharedFileId};
use bytes::Bytes;
use chrono::{DateTime, Utc};

/// Database request for storing a shared file
#[derive(Debug, Clone)]
pub struct SharedFileCreateDBRequest {
    pub file_name: String,
    pub content_type: String,
    pub content: Bytes,
}

/// Database response for a shared file
#[derive(Debug, Clone)]
pub struct SharedFileDBResponse {
    pub id: SharedFileId,
    pub timestamp: DateTime<Utc>,
    pub file_name: String,
    pub content_type: String,
    pub content: Bytes,
    pub organization_id: OrganizationId,
}
