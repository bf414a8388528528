//! API request/response models for API tokens.

use crate::db::models::api_tokens::{ApiTokenCreated, ApiTokenDBResponse};
use crate::types::ApiTokenId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiTokenCreate {
    #[schema(example = "Deploy pipeline")]
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiTokenUpdate {
    pub name: String,
}

/// An API token as listed. The secret is never returned after creation.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiTokenResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: ApiTokenId,
    pub name: String,
    pub token: String,
    pub last_used: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<ApiTokenDBResponse> for ApiTokenResponse {
    fn from(db: ApiTokenDBResponse) -> Self {
        Self {
            id: db.id,
            name: db.name,
            token: db.token,
            last_used: db.last_used,
            created_at: db.created_at,
        }
    }
}

/// Response to token creation, the only time the secret is shown
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiTokenCreatedResponse {
    #[serde(flatten)]
    pub token: ApiTokenResponse,
    pub secret: String,
}

impl From<ApiTokenCreated> for ApiTokenCreatedResponse {
    fn from(created: ApiTokenCreated) -> Self {
        Self {
            token: created.token.into(),
            secret: created.secret,
        }
    }
}
