//! Database repository for users and their organization membership.

use crate::db::{
    errors::{DbError, Result},
    models::users::{UserCreateDBRequest, UserDBResponse, UserOptions},
};
use crate::types::{OrganizationId, UserId, abbrev_uuid};
use chrono::{DateTime, Utc};
use sqlx::{Connection, FromRow, PgConnection, types::Json};
use tracing::instrument;

#[derive(Debug, Clone, FromRow)]
struct User {
    pub id: UserId,
    pub username: String,
    pub organization_id: OrganizationId,
    pub is_administrator: bool,
    pub password_hash: Option<String>,
    pub options: Json<UserOptions>,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserDBResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            organization_id: user.organization_id,
            is_administrator: user.is_administrator,
            has_password: user.password_hash.is_some_and(|h| !h.trim().is_empty()),
            options: user.options.0,
            created_at: user.created_at,
        }
    }
}

pub struct Users<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Users<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(username = %request.username), err)]
    pub async fn create(&mut self, request: &UserCreateDBRequest) -> Result<UserDBResponse> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, organization_id, is_administrator, password_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(&request.username)
        .bind(request.organization_id)
        .bind(request.is_administrator)
        .bind(&request.password_hash)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(user.into())
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    pub async fn get_by_id(&mut self, id: UserId) -> Result<Option<UserDBResponse>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(user.map(Into::into))
    }

    /// Usernames compare case-insensitively.
    #[instrument(skip(self), err)]
    pub async fn get_by_username(&mut self, username: &str) -> Result<Option<UserDBResponse>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE LOWER(username) = LOWER($1)")
            .bind(username)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(user.map(Into::into))
    }

    #[instrument(skip(self), fields(org_id = %abbrev_uuid(&org_id)), err)]
    pub async fn list_for_organization(&mut self, org_id: OrganizationId) -> Result<Vec<UserDBResponse>> {
        let users = sqlx::query_as::<_, User>("SELECT * FROM users WHERE organization_id = $1 ORDER BY username")
            .bind(org_id)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(users.into_iter().map(Into::into).collect())
    }

    /// All users sharing an organization with `username`, including that user. Empty if the user
    /// does not exist.
    #[instrument(skip(self), err)]
    pub async fn list_in_same_organization(&mut self, username: &str) -> Result<Vec<UserDBResponse>> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT u.* FROM users u
            WHERE u.organization_id = (SELECT organization_id FROM users WHERE LOWER(username) = LOWER($1))
            ORDER BY u.username
            "#,
        )
        .bind(username)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(users.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self), fields(org_id = %abbrev_uuid(&org_id), user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn set_is_administrator(&mut self, org_id: OrganizationId, user_id: UserId, is_administrator: bool) -> Result<bool> {
        let result = sqlx::query("UPDATE users SET is_administrator = $3 WHERE id = $2 AND organization_id = $1")
            .bind(org_id)
            .bind(user_id)
            .bind(is_administrator)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Move a user out of `org_id` into a freshly created organization of their own.
    ///
    /// The account itself is preserved. Returns the new organization id, or `None` if the user is
    /// not a member of `org_id`.
    #[instrument(skip(self), fields(org_id = %abbrev_uuid(&org_id), user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn remove_from_organization(&mut self, org_id: OrganizationId, user_id: UserId) -> Result<Option<OrganizationId>> {
        let mut tx = self.db.begin().await?;

        let member: Option<UserId> = sqlx::query_scalar("SELECT id FROM users WHERE id = $1 AND organization_id = $2 FOR UPDATE")
            .bind(user_id)
            .bind(org_id)
            .fetch_optional(&mut *tx)
            .await?;

        if member.is_none() {
            return Ok(None);
        }

        let new_org_id: OrganizationId = sqlx::query_scalar("INSERT INTO organizations (name) VALUES ('') RETURNING id")
            .fetch_one(&mut *tx)
            .await?;

        sqlx::query("UPDATE users SET organization_id = $2 WHERE id = $1")
            .bind(user_id)
            .bind(new_org_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some(new_org_id))
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn get_options(&mut self, user_id: UserId) -> Result<Option<UserOptions>> {
        let options: Option<Json<UserOptions>> = sqlx::query_scalar("SELECT options FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(options.map(|o| o.0))
    }

    #[instrument(skip(self, options), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn update_options(&mut self, user_id: UserId, options: &UserOptions) -> Result<()> {
        let result = sqlx::query("UPDATE users SET options = $2 WHERE id = $1")
            .bind(user_id)
            .bind(Json(options))
            .execute(&mut *self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    /// The console prompt for `username`: their own option if set, else `fallback`.
    #[instrument(skip(self, fallback), err)]
    pub async fn default_prompt(&mut self, username: &str, fallback: &str) -> Result<String> {
        let prompt = self
            .get_by_username(username)
            .await?
            .and_then(|u| u.options.console_prompt)
            .filter(|p| !p.trim().is_empty());

        Ok(prompt.unwrap_or_else(|| fallback.to_string()))
    }
}
