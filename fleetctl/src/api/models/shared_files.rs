//! API response models for shared files.

use crate::types::SharedFileId;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Multipart form accepted by `POST /api/files`
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct SharedFileUpload {
    /// The file content. File name and content type are taken from the part headers.
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SharedFileCreatedResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: SharedFileId,
}
