//! Database repository for files shared with devices.

use crate::db::{
    errors::{DbError, Result},
    models::shared_files::{SharedFileCreateDBRequest, SharedFileDBResponse},
};
use crate::types::{OrganizationId, SharedFileId, abbrev_uuid};
use chrono::{DateTime, Duration, Utc};
use sqlx::{FromRow, PgConnection};
use tracing::instrument;

#[derive(Debug, Clone, FromRow)]
struct SharedFile {
    pub id: SharedFileId,
    pub timestamp: DateTime<Utc>,
    pub file_name: String,
    pub content_type: String,
    pub content: Vec<u8>,
    pub organization_id: OrganizationId,
}

impl From<SharedFile> for SharedFileDBResponse {
    fn from(f: SharedFile) -> Self {
        Self {
            id: f.id,
            timestamp: f.timestamp,
            file_name: f.file_name,
            content_type: f.content_type,
            content: f.content.into(),
            organization_id: f.organization_id,
        }
    }
}

pub struct SharedFiles<'c> {
    db: &'c mut PgConnection,
}

impl<'c> SharedFiles<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Store a file and return its generated id.
    ///
    /// With a positive `retention_days`, files older than the window are purged first so the
    /// table does not grow between sweeps.
    #[instrument(skip(self, request), fields(org_id = %abbrev_uuid(&org_id), size = request.content.len()), err)]
    pub async fn add(&mut self, org_id: OrganizationId, request: &SharedFileCreateDBRequest, retention_days: i64) -> Result<SharedFileId> {
        if retention_days > 0 {
            let cutoff = Utc::now() - Duration::days(retention_days);
            let purged = sqlx::query("DELETE FROM shared_files WHERE timestamp < $1")
                .bind(cutoff)
                .execute(&mut *self.db)
                .await?;
            if purged.rows_affected() > 0 {
                tracing::debug!(purged = purged.rows_affected(), "Purged expired shared files");
            }
        }

        let id: SharedFileId = sqlx::query_scalar(
            r#"
            INSERT INTO shared_files (file_name, content_type, content, organization_id)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(&request.file_name)
        .bind(&request.content_type)
        .bind(request.content.as_ref())
        .bind(org_id)
        .fetch_one(&mut *self.db)
        .await
        .map_err(DbError::from)
        .map_err(|e| match e {
            DbError::ForeignKeyViolation { .. } => DbError::OrganizationNotFound { organization_id: org_id },
            other => other,
        })?;

        Ok(id)
    }

    #[instrument(skip(self), fields(org_id = %abbrev_uuid(&org_id), file_id = %abbrev_uuid(&id)), err)]
    pub async fn get(&mut self, org_id: OrganizationId, id: SharedFileId) -> Result<Option<SharedFileDBResponse>> {
        let file = sqlx::query_as::<_, SharedFile>("SELECT * FROM shared_files WHERE id = $1 AND organization_id = $2")
            .bind(id)
            .bind(org_id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(file.map(Into::into))
    }
}
