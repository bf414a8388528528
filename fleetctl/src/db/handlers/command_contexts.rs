//! Database repository for command contexts: the recorded payload of a command sent to devices.

use crate::db::{
    errors::Result,
    models::command_contexts::{CommandContextDBResponse, CommandContextUpsertDBRequest},
};
use crate::types::{CommandContextId, OrganizationId, abbrev_uuid};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection, types::Json};
use tracing::instrument;

#[derive(Debug, Clone, FromRow)]
struct CommandContext {
    pub id: CommandContextId,
    pub timestamp: DateTime<Utc>,
    pub organization_id: OrganizationId,
    pub payload: Json<serde_json::Value>,
}

impl From<CommandContext> for CommandContextDBResponse {
    fn from(c: CommandContext) -> Self {
        Self {
            id: c.id,
            timestamp: c.timestamp,
            organization_id: c.organization_id,
            payload: c.payload.0,
        }
    }
}

pub struct CommandContexts<'c> {
    db: &'c mut PgConnection,
}

impl<'c> CommandContexts<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Insert or replace the payload stored under `request.id`.
    ///
    /// Replacing refreshes the timestamp. Returns `None` when the id is already taken by another
    /// organization, which is left untouched.
    #[instrument(skip(self, request), fields(org_id = %abbrev_uuid(&org_id), context_id = %abbrev_uuid(&request.id)), err)]
    pub async fn upsert(
        &mut self,
        org_id: OrganizationId,
        request: &CommandContextUpsertDBRequest,
    ) -> Result<Option<CommandContextDBResponse>> {
        let context = sqlx::query_as::<_, CommandContext>(
            r#"
            INSERT INTO command_contexts (id, organization_id, payload)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE SET payload = EXCLUDED.payload, timestamp = NOW()
            WHERE command_contexts.organization_id = EXCLUDED.organization_id
            RETURNING *
            "#,
        )
        .bind(request.id)
        .bind(org_id)
        .bind(Json(&request.payload))
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(context.map(Into::into))
    }

    #[instrument(skip(self), fields(org_id = %abbrev_uuid(&org_id), context_id = %abbrev_uuid(&id)), err)]
    pub async fn get(&mut self, org_id: OrganizationId, id: CommandContextId) -> Result<Option<CommandContextDBResponse>> {
        let context = sqlx::query_as::<_, CommandContext>("SELECT * FROM command_contexts WHERE id = $1 AND organization_id = $2")
            .bind(id)
            .bind(org_id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(context.map(Into::into))
    }

    #[instrument(skip(self), fields(org_id = %abbrev_uuid(&org_id)), err)]
    pub async fn list(&mut self, org_id: OrganizationId) -> Result<Vec<CommandContextDBResponse>> {
        let contexts =
            sqlx::query_as::<_, CommandContext>("SELECT * FROM command_contexts WHERE organization_id = $1 ORDER BY timestamp DESC")
                .bind(org_id)
                .fetch_all(&mut *self.db)
                .await?;

        Ok(contexts.into_iter().map(Into::into).collect())
    }
}
