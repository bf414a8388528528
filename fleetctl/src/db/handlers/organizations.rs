//! Database repository for organizations.

use crate::db::{errors::Result, models::organizations::OrganizationDBResponse};
use crate::types::{OrganizationId, abbrev_uuid};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection};
use tracing::instrument;

#[derive(Debug, Clone, FromRow)]
struct Organization {
    pub id: OrganizationId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl From<Organization> for OrganizationDBResponse {
    fn from(org: Organization) -> Self {
        Self {
            id: org.id,
            name: org.name,
            created_at: org.created_at,
        }
    }
}

pub struct Organizations<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Organizations<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self), err)]
    pub async fn create(&mut self, name: &str) -> Result<OrganizationDBResponse> {
        let org = sqlx::query_as::<_, Organization>("INSERT INTO organizations (name) VALUES ($1) RETURNING *")
            .bind(name)
            .fetch_one(&mut *self.db)
            .await?;

        Ok(org.into())
    }

    #[instrument(skip(self), fields(org_id = %abbrev_uuid(&id)), err)]
    pub async fn get_by_id(&mut self, id: OrganizationId) -> Result<Option<OrganizationDBResponse>> {
        let org = sqlx::query_as::<_, Organization>("SELECT * FROM organizations WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(org.map(Into::into))
    }

    #[instrument(skip(self), fields(org_id = %abbrev_uuid(&id)), err)]
    pub async fn exists(&mut self, id: OrganizationId) -> Result<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM organizations WHERE id = $1)")
            .bind(id)
            .fetch_one(&mut *self.db)
            .await?;

        Ok(exists)
    }

    /// Returns the display name, or `None` if the organization does not exist.
    #[instrument(skip(self), fields(org_id = %abbrev_uuid(&id)), err)]
    pub async fn get_name(&mut self, id: OrganizationId) -> Result<Option<String>> {
        let name: Option<String> = sqlx::query_scalar("SELECT name FROM organizations WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(name)
    }

    #[instrument(skip(self), fields(org_id = %abbrev_uuid(&id)), err)]
    pub async fn update_name(&mut self, id: OrganizationId, name: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE organizations SET name = $2 WHERE id = $1")
            .bind(id)
            .bind(name)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_and_rename_organization(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Organizations::new(&mut conn);

        let org = repo.create("Acme").await.unwrap();
        assert!(repo.exists(org.id).await.unwrap());
        assert_eq!(repo.get_name(org.id).await.unwrap().as_deref(), Some("Acme"));

        assert!(repo.update_name(org.id, "Acme Robotics").await.unwrap());
        let fetched = repo.get_by_id(org.id).await.unwrap().unwrap();
        assert_eq!(fetched.name, "Acme Robotics");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_missing_organization_is_absent_not_error(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Organizations::new(&mut conn);
        let missing = uuid::Uuid::new_v4();

        assert!(!repo.exists(missing).await.unwrap());
        assert!(repo.get_name(missing).await.unwrap().is_none());
        assert!(!repo.update_name(missing, "nope").await.unwrap());
    }
}
