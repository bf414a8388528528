//! Database repository for API tokens.

use crate::crypto;
use crate::db::{
    errors::{DbError, Result},
    models::api_tokens::{ApiTokenCreateDBRequest, ApiTokenCreated, ApiTokenCredentials, ApiTokenDBResponse},
};
use crate::types::{ApiTokenId, OrganizationId, abbrev_uuid};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection};
use tracing::instrument;

#[derive(Debug, Clone, FromRow)]
struct ApiToken {
    pub id: ApiTokenId,
    pub name: String,
    pub token: String,
    pub secret_hash: String,
    pub last_used: Option<DateTime<Utc>>,
    pub organization_id: OrganizationId,
    pub created_at: DateTime<Utc>,
}

impl From<ApiToken> for ApiTokenDBResponse {
    fn from(t: ApiToken) -> Self {
        Self {
            id: t.id,
            name: t.name,
            token: t.token,
            last_used: t.last_used,
            organization_id: t.organization_id,
            created_at: t.created_at,
        }
    }
}

impl From<ApiToken> for ApiTokenCredentials {
    fn from(t: ApiToken) -> Self {
        Self {
            id: t.id,
            token: t.token,
            secret_hash: t.secret_hash,
            organization_id: t.organization_id,
        }
    }
}

pub struct ApiTokens<'c> {
    db: &'c mut PgConnection,
}

impl<'c> ApiTokens<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Issue a new token. The plaintext secret is only available on the returned value.
    #[instrument(skip(self, request), fields(org_id = %abbrev_uuid(&org_id), name = %request.name), err)]
    pub async fn create(&mut self, org_id: OrganizationId, request: &ApiTokenCreateDBRequest) -> Result<ApiTokenCreated> {
        let secret = crypto::generate_secret();

        let token = sqlx::query_as::<_, ApiToken>(
            r#"
            INSERT INTO api_tokens (name, token, secret_hash, organization_id)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(&request.name)
        .bind(crypto::generate_token())
        .bind(crypto::hash_secret(&secret))
        .bind(org_id)
        .fetch_one(&mut *self.db)
        .await
        .map_err(DbError::from)
        .map_err(|e| match e {
            DbError::ForeignKeyViolation { .. } => DbError::OrganizationNotFound { organization_id: org_id },
            other => other,
        })?;

        Ok(ApiTokenCreated {
            token: token.into(),
            secret,
        })
    }

    /// Tokens of an organization, most recently used first; never-used tokens last.
    #[instrument(skip(self), fields(org_id = %abbrev_uuid(&org_id)), err)]
    pub async fn list(&mut self, org_id: OrganizationId) -> Result<Vec<ApiTokenDBResponse>> {
        let tokens = sqlx::query_as::<_, ApiToken>(
            "SELECT * FROM api_tokens WHERE organization_id = $1 ORDER BY last_used DESC NULLS LAST, created_at DESC",
        )
        .bind(org_id)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(tokens.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self), fields(org_id = %abbrev_uuid(&org_id), token_id = %abbrev_uuid(&id)), err)]
    pub async fn get_by_id(&mut self, org_id: OrganizationId, id: ApiTokenId) -> Result<Option<ApiTokenDBResponse>> {
        let token = sqlx::query_as::<_, ApiToken>("SELECT * FROM api_tokens WHERE id = $1 AND organization_id = $2")
            .bind(id)
            .bind(org_id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(token.map(Into::into))
    }

    #[instrument(skip(self), fields(org_id = %abbrev_uuid(&org_id), token_id = %abbrev_uuid(&id)), err)]
    pub async fn rename(&mut self, org_id: OrganizationId, id: ApiTokenId, name: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE api_tokens SET name = $3 WHERE id = $1 AND organization_id = $2")
            .bind(id)
            .bind(org_id)
            .bind(name)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), fields(org_id = %abbrev_uuid(&org_id), token_id = %abbrev_uuid(&id)), err)]
    pub async fn delete(&mut self, org_id: OrganizationId, id: ApiTokenId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM api_tokens WHERE id = $1 AND organization_id = $2")
            .bind(id)
            .bind(org_id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Look up stored credentials by the public token value. Not tenant scoped: this is how the
    /// tenant of an inbound request is discovered.
    #[instrument(skip_all, err)]
    pub async fn get_credentials(&mut self, token: &str) -> Result<Option<ApiTokenCredentials>> {
        let token = sqlx::query_as::<_, ApiToken>("SELECT * FROM api_tokens WHERE token = $1")
            .bind(token)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(token.map(Into::into))
    }

    #[instrument(skip(self), fields(token_id = %abbrev_uuid(&id)), err)]
    pub async fn touch_last_used(&mut self, id: ApiTokenId) -> Result<()> {
        sqlx::query("UPDATE api_tokens SET last_used = NOW() WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::handlers::Organizations;
    use sqlx::PgPool;

    fn named(name: &str) -> ApiTokenCreateDBRequest {
        ApiTokenCreateDBRequest { name: name.to_string() }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_stores_only_secret_digest(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let org = Organizations::new(&mut conn).create("Acme").await.unwrap();

        let mut repo = ApiTokens::new(&mut conn);
        let created = repo.create(org.id, &named("ci")).await.unwrap();
        assert!(created.token.last_used.is_none());

        let creds = repo.get_credentials(&created.token.token).await.unwrap().unwrap();
        assert_ne!(creds.secret_hash, created.secret);
        assert!(crypto::verify_secret(&created.secret, &creds.secret_hash));
        assert_eq!(creds.organization_id, org.id);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_list_orders_by_last_used(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let org = Organizations::new(&mut conn).create("Acme").await.unwrap();

        let mut repo = ApiTokens::new(&mut conn);
        let idle = repo.create(org.id, &named("idle")).await.unwrap();
        let busy = repo.create(org.id, &named("busy")).await.unwrap();
        repo.touch_last_used(busy.token.id).await.unwrap();

        let tokens = repo.list(org.id).await.unwrap();
        let ids: Vec<_> = tokens.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![busy.token.id, idle.token.id]);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_rename_and_delete_are_org_scoped(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let org_a = Organizations::new(&mut conn).create("A").await.unwrap();
        let org_b = Organizations::new(&mut conn).create("B").await.unwrap();

        let mut repo = ApiTokens::new(&mut conn);
        let token = repo.create(org_a.id, &named("ci")).await.unwrap().token;

        assert!(!repo.rename(org_b.id, token.id, "stolen").await.unwrap());
        assert!(!repo.delete(org_b.id, token.id).await.unwrap());

        assert!(repo.rename(org_a.id, token.id, "deploy").await.unwrap());
        assert_eq!(repo.get_by_id(org_a.id, token.id).await.unwrap().unwrap().name, "deploy");
        assert!(repo.delete(org_a.id, token.id).await.unwrap());
        assert!(repo.get_credentials(&token.token).await.unwrap().is_none());
    }
}
