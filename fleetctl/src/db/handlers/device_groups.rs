//! Database repository for device groups.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::device_groups::{DeviceGroupCreateDBRequest, DeviceGroupDBResponse},
};
use crate::types::{DeviceGroupId, OrganizationId, abbrev_uuid};
use chrono::{DateTime, Utc};
use sqlx::{Connection, FromRow, PgConnection};
use tracing::instrument;

/// Filter for listing device groups
#[derive(Debug, Clone)]
pub struct DeviceGroupFilter {
    pub skip: i64,
    pub limit: i64,
}

impl DeviceGroupFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self { skip, limit }
    }
}

impl Default for DeviceGroupFilter {
    fn default() -> Self {
        Self::new(0, i64::MAX)
    }
}

#[derive(Debug, Clone, FromRow)]
struct DeviceGroup {
    pub id: DeviceGroupId,
    pub name: String,
    pub organization_id: OrganizationId,
    pub created_at: DateTime<Utc>,
}

impl From<DeviceGroup> for DeviceGroupDBResponse {
    fn from(g: DeviceGroup) -> Self {
        Self {
            id: g.id,
            name: g.name,
            organization_id: g.organization_id,
            created_at: g.created_at,
        }
    }
}

pub struct DeviceGroups<'c> {
    db: &'c mut PgConnection,
}

fn duplicate(name: &str) -> DbError {
    DbError::DuplicateName {
        entity_type: "Device group".to_string(),
        name: name.to_string(),
    }
}

#[async_trait::async_trait]
impl<'c> Repository for DeviceGroups<'c> {
    type CreateRequest = DeviceGroupCreateDBRequest;
    type Response = DeviceGroupDBResponse;
    type Id = DeviceGroupId;
    type Filter = DeviceGroupFilter;

    /// Names are unique per organization, ignoring case. The unique index backs up the check
    /// against a concurrent insert of the same name.
    #[instrument(skip(self, request), fields(org_id = %abbrev_uuid(&org_id), name = %request.name), err)]
    async fn create(&mut self, org_id: OrganizationId, request: &Self::CreateRequest) -> Result<Self::Response> {
        let taken: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM device_groups WHERE organization_id = $1 AND LOWER(name) = LOWER($2))")
                .bind(org_id)
                .bind(&request.name)
                .fetch_one(&mut *self.db)
                .await?;

        if taken {
            return Err(duplicate(&request.name));
        }

        let group = sqlx::query_as::<_, DeviceGroup>("INSERT INTO device_groups (name, organization_id) VALUES ($1, $2) RETURNING *")
            .bind(&request.name)
            .bind(org_id)
            .fetch_one(&mut *self.db)
            .await
            .map_err(DbError::from)
            .map_err(|e| match e {
                DbError::UniqueViolation { .. } => duplicate(&request.name),
                DbError::ForeignKeyViolation { .. } => DbError::OrganizationNotFound { organization_id: org_id },
                other => other,
            })?;

        Ok(group.into())
    }

    #[instrument(skip(self), fields(org_id = %abbrev_uuid(&org_id), group_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, org_id: OrganizationId, id: Self::Id) -> Result<Option<Self::Response>> {
        let group = sqlx::query_as::<_, DeviceGroup>("SELECT * FROM device_groups WHERE id = $1 AND organization_id = $2")
            .bind(id)
            .bind(org_id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(group.map(Into::into))
    }

    #[instrument(skip(self, filter), fields(org_id = %abbrev_uuid(&org_id)), err)]
    async fn list(&mut self, org_id: OrganizationId, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let groups = sqlx::query_as::<_, DeviceGroup>(
            "SELECT * FROM device_groups WHERE organization_id = $1 ORDER BY name LIMIT $2 OFFSET $3",
        )
        .bind(org_id)
        .bind(filter.limit)
        .bind(filter.skip)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(groups.into_iter().map(Into::into).collect())
    }

    /// Member devices are detached first, in the same transaction as the delete.
    #[instrument(skip(self), fields(org_id = %abbrev_uuid(&org_id), group_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, org_id: OrganizationId, id: Self::Id) -> Result<bool> {
        let mut tx = self.db.begin().await?;

        sqlx::query("UPDATE devices SET device_group_id = NULL WHERE device_group_id = $1 AND organization_id = $2")
            .bind(id)
            .bind(org_id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM device_groups WHERE id = $1 AND organization_id = $2")
            .bind(id)
            .bind(org_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }
}

impl<'c> DeviceGroups<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Groups of the organization `username` belongs to.
    #[instrument(skip(self), err)]
    pub async fn list_for_user(&mut self, username: &str) -> Result<Vec<DeviceGroupDBResponse>> {
        let groups = sqlx::query_as::<_, DeviceGroup>(
            r#"
            SELECT g.* FROM device_groups g
            INNER JOIN users u ON u.organization_id = g.organization_id
            WHERE LOWER(u.username) = LOWER($1)
            ORDER BY g.name
            "#,
        )
        .bind(username)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(groups.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::handlers::{Devices, Organizations};
    use crate::db::models::devices::{DeviceUpdateDBRequest, DeviceUpsertDBRequest};
    use sqlx::PgPool;

    fn named(name: &str) -> DeviceGroupCreateDBRequest {
        DeviceGroupCreateDBRequest { name: name.to_string() }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_duplicate_names_rejected_per_organization_only(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let org_a = Organizations::new(&mut conn).create("A").await.unwrap();
        let org_b = Organizations::new(&mut conn).create("B").await.unwrap();

        let mut repo = DeviceGroups::new(&mut conn);
        repo.create(org_a.id, &named("Lab")).await.unwrap();

        let err = repo.create(org_a.id, &named("lab")).await.unwrap_err();
        assert!(matches!(err, DbError::DuplicateName { ref name, .. } if name == "lab"));

        // The same name is free in another organization
        repo.create(org_b.id, &named("LAB")).await.unwrap();

        let groups = repo.list(org_a.id, &DeviceGroupFilter::default()).await.unwrap();
        assert_eq!(groups.len(), 1);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_delete_detaches_devices_and_keeps_them(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let org = Organizations::new(&mut conn).create("Acme").await.unwrap();
        let group = DeviceGroups::new(&mut conn).create(org.id, &named("Lab")).await.unwrap();

        let mut devices = Devices::new(&mut conn);
        devices
            .upsert(&DeviceUpsertDBRequest {
                id: "dev-1".to_string(),
                organization_id: org.id,
                device_name: "bench".to_string(),
                current_user_name: None,
                drives: vec![],
                cpu_utilization: 0.0,
                used_memory: 0.0,
                total_memory: 0.0,
                used_storage: 0.0,
                total_storage: 0.0,
                is_64_bit: true,
                os_architecture: "X64".to_string(),
                os_description: "Linux".to_string(),
                platform: "Linux".to_string(),
                processor_count: 4,
                agent_version: "1.0.0".to_string(),
            })
            .await
            .unwrap();
        devices
            .update(
                org.id,
                "dev-1",
                &DeviceUpdateDBRequest {
                    device_group_id: Some(Some(group.id)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let mut repo = DeviceGroups::new(&mut conn);
        assert!(repo.delete(org.id, group.id).await.unwrap());
        assert!(repo.get_by_id(org.id, group.id).await.unwrap().is_none());

        let device = Devices::new(&mut conn).get(org.id, "dev-1").await.unwrap().unwrap();
        assert_eq!(device.device_group_id, None);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_foreign_group_is_invisible(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let org_a = Organizations::new(&mut conn).create("A").await.unwrap();
        let org_b = Organizations::new(&mut conn).create("B").await.unwrap();

        let mut repo = DeviceGroups::new(&mut conn);
        let group = repo.create(org_a.id, &named("Lab")).await.unwrap();

        assert!(repo.get_by_id(org_b.id, group.id).await.unwrap().is_none());
        assert!(!repo.delete(org_b.id, group.id).await.unwrap());
        assert!(repo.get_by_id(org_a.id, group.id).await.unwrap().is_some());
    }
}
