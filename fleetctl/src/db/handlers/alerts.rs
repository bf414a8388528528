//! Database repository for persisted alerts.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::alerts::{AlertCreateDBRequest, AlertDBResponse},
};
use crate::types::{AlertId, DeviceId, OrganizationId, abbrev_uuid};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection};
use tracing::instrument;

/// Filter for listing alerts
#[derive(Debug, Clone, Default)]
pub struct AlertFilter {
    pub device_id: Option<DeviceId>,
}

#[derive(Debug, Clone, FromRow)]
struct Alert {
    pub id: AlertId,
    pub created_on: DateTime<Utc>,
    pub device_id: Option<DeviceId>,
    pub message: String,
    pub organization_id: OrganizationId,
}

impl From<Alert> for AlertDBResponse {
    fn from(a: Alert) -> Self {
        Self {
            id: a.id,
            created_on: a.created_on,
            device_id: a.device_id,
            message: a.message,
            organization_id: a.organization_id,
        }
    }
}

pub struct Alerts<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Alerts<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }
}

#[async_trait::async_trait]
impl<'c> Repository for Alerts<'c> {
    type CreateRequest = AlertCreateDBRequest;
    type Response = AlertDBResponse;
    type Id = AlertId;
    type Filter = AlertFilter;

    #[instrument(skip(self, request), fields(org_id = %abbrev_uuid(&org_id)), err)]
    async fn create(&mut self, org_id: OrganizationId, request: &Self::CreateRequest) -> Result<Self::Response> {
        let alert = sqlx::query_as::<_, Alert>(
            "INSERT INTO alerts (device_id, message, organization_id) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(&request.device_id)
        .bind(&request.message)
        .bind(org_id)
        .fetch_one(&mut *self.db)
        .await
        .map_err(DbError::from)
        .map_err(|e| match e {
            DbError::ForeignKeyViolation { .. } => DbError::OrganizationNotFound { organization_id: org_id },
            other => other,
        })?;

        Ok(alert.into())
    }

    #[instrument(skip(self), fields(org_id = %abbrev_uuid(&org_id), alert_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, org_id: OrganizationId, id: Self::Id) -> Result<Option<Self::Response>> {
        let alert = sqlx::query_as::<_, Alert>("SELECT * FROM alerts WHERE id = $1 AND organization_id = $2")
            .bind(id)
            .bind(org_id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(alert.map(Into::into))
    }

    #[instrument(skip(self, filter), fields(org_id = %abbrev_uuid(&org_id)), err)]
    async fn list(&mut self, org_id: OrganizationId, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let alerts = sqlx::query_as::<_, Alert>(
            r#"
            SELECT * FROM alerts
            WHERE organization_id = $1 AND ($2::VARCHAR IS NULL OR device_id = $2)
            ORDER BY created_on DESC
            "#,
        )
        .bind(org_id)
        .bind(&filter.device_id)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(alerts.into_iter().map(Into::into).collect())
    }

    /// Returns `false` both for a missing alert and for one owned by another organization.
    #[instrument(skip(self), fields(org_id = %abbrev_uuid(&org_id), alert_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, org_id: OrganizationId, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM alerts WHERE id = $1 AND organization_id = $2")
            .bind(id)
            .bind(org_id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::handlers::Organizations;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_alerts_are_tenant_scoped(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let org_a = Organizations::new(&mut conn).create("A").await.unwrap();
        let org_b = Organizations::new(&mut conn).create("B").await.unwrap();

        let mut repo = Alerts::new(&mut conn);
        let alert = repo
            .create(
                org_a.id,
                &AlertCreateDBRequest {
                    device_id: Some("dev-1".to_string()),
                    message: "Disk almost full".to_string(),
                },
            )
            .await
            .unwrap();

        assert!(repo.get_by_id(org_b.id, alert.id).await.unwrap().is_none());
        assert!(repo.list(org_b.id, &AlertFilter::default()).await.unwrap().is_empty());
        assert!(!repo.delete(org_b.id, alert.id).await.unwrap());

        let filter = AlertFilter {
            device_id: Some("dev-1".to_string()),
        };
        assert_eq!(repo.list(org_a.id, &filter).await.unwrap().len(), 1);
        assert!(repo.delete(org_a.id, alert.id).await.unwrap());
        assert!(!repo.delete(org_a.id, alert.id).await.unwrap());
    }
}
