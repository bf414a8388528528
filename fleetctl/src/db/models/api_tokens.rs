//! Database models for API tokens.

use crate::types::{ApiTokenId, OrganizationId};
use chrono::{DateTime, Utc};

/// Database request for creating a new API token
#[derive(Debug, Clone)]
pub struct ApiTokenCreateDBRequest {
    pub name: String,
}

/// Database response for an API token. Never carries the secret.
#[derive(Debug, Clone)]
pub struct ApiTokenDBResponse {
    pub id: ApiTokenId,
    pub name: String,
    pub token: String,
    pub last_used: Option<DateTime<Utc>>,
    pub organization_id: OrganizationId,
    pub created_at: DateTime<Utc>,
}

/// A freshly created token together with its plaintext secret.
///
/// Only the SHA-256 digest of the secret is stored, so this is the one place the secret exists.
#[derive(Debug, Clone)]
pub struct ApiTokenCreated {
    pub token: ApiTokenDBResponse,
    pub secret: String,
}

/// Stored credentials looked up during validation
#[derive(Debug, Clone)]
pub struct ApiTokenCredentials {
    pub id: ApiTokenId,
    pub token: String,
    pub secret_hash: String,
    pub organization_id: OrganizationId,
}
