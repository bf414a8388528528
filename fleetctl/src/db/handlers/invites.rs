//! Database repository for invite links.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::invites::{InviteCreateDBRequest, InviteDBResponse},
};
use crate::types::{InviteId, OrganizationId, UserId, abbrev_uuid};
use chrono::{DateTime, Utc};
use sqlx::{Connection, FromRow, PgConnection};
use tracing::instrument;

/// Filter for listing invites
#[derive(Debug, Clone, Default)]
pub struct InviteFilter {
    /// Only invites addressed to this user, compared case-insensitively
    pub invited_user: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
struct InviteLink {
    pub id: InviteId,
    pub invited_user: String,
    pub is_admin: bool,
    pub date_sent: DateTime<Utc>,
    pub reset_url: Option<String>,
    pub organization_id: OrganizationId,
}

impl From<InviteLink> for InviteDBResponse {
    fn from(i: InviteLink) -> Self {
        Self {
            id: i.id,
            invited_user: i.invited_user,
            is_admin: i.is_admin,
            date_sent: i.date_sent,
            reset_url: i.reset_url,
            organization_id: i.organization_id,
        }
    }
}

#[derive(Debug, FromRow)]
struct ClaimedInvite {
    organization_id: OrganizationId,
    is_admin: bool,
}

pub struct Invites<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Invites<'c> {
    type CreateRequest = InviteCreateDBRequest;
    type Response = InviteDBResponse;
    type Id = InviteId;
    type Filter = InviteFilter;

    #[instrument(skip(self, request), fields(org_id = %abbrev_uuid(&org_id)), err)]
    async fn create(&mut self, org_id: OrganizationId, request: &Self::CreateRequest) -> Result<Self::Response> {
        let invite = sqlx::query_as::<_, InviteLink>(
            r#"
            INSERT INTO invite_links (invited_user, is_admin, reset_url, organization_id)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(request.invited_user.to_lowercase())
        .bind(request.is_admin)
        .bind(&request.reset_url)
        .bind(org_id)
        .fetch_one(&mut *self.db)
        .await
        .map_err(DbError::from)
        .map_err(|e| match e {
            DbError::ForeignKeyViolation { .. } => DbError::OrganizationNotFound { organization_id: org_id },
            other => other,
        })?;

        Ok(invite.into())
    }

    #[instrument(skip(self), fields(org_id = %abbrev_uuid(&org_id), invite_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, org_id: OrganizationId, id: Self::Id) -> Result<Option<Self::Response>> {
        let invite = sqlx::query_as::<_, InviteLink>("SELECT * FROM invite_links WHERE id = $1 AND organization_id = $2")
            .bind(id)
            .bind(org_id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(invite.map(Into::into))
    }

    #[instrument(skip(self, filter), fields(org_id = %abbrev_uuid(&org_id)), err)]
    async fn list(&mut self, org_id: OrganizationId, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let invites = sqlx::query_as::<_, InviteLink>(
            r#"
            SELECT * FROM invite_links
            WHERE organization_id = $1 AND ($2::VARCHAR IS NULL OR invited_user = LOWER($2))
            ORDER BY date_sent DESC
            "#,
        )
        .bind(org_id)
        .bind(&filter.invited_user)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(invites.into_iter().map(Into::into).collect())
    }

    /// Revoke an invite. An invited account that never set a password is removed with it, since
    /// nothing else can be done with it.
    #[instrument(skip(self), fields(org_id = %abbrev_uuid(&org_id), invite_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, org_id: OrganizationId, id: Self::Id) -> Result<bool> {
        let mut tx = self.db.begin().await?;

        let invited_user: Option<String> =
            sqlx::query_scalar("DELETE FROM invite_links WHERE id = $1 AND organization_id = $2 RETURNING invited_user")
                .bind(id)
                .bind(org_id)
                .fetch_optional(&mut *tx)
                .await?;

        let Some(invited_user) = invited_user else {
            return Ok(false);
        };

        sqlx::query(
            r#"
            DELETE FROM users
            WHERE LOWER(username) = LOWER($1)
              AND organization_id = $2
              AND (password_hash IS NULL OR TRIM(password_hash) = '')
            "#,
        )
        .bind(&invited_user)
        .bind(org_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }
}

impl<'c> Invites<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Pending invites of the organization `username` belongs to.
    #[instrument(skip(self), err)]
    pub async fn list_for_user(&mut self, username: &str) -> Result<Vec<InviteDBResponse>> {
        let invites = sqlx::query_as::<_, InviteLink>(
            r#"
            SELECT i.* FROM invite_links i
            INNER JOIN users u ON u.organization_id = i.organization_id
            WHERE LOWER(u.username) = LOWER($1)
            ORDER BY i.date_sent DESC
            "#,
        )
        .bind(username)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(invites.into_iter().map(Into::into).collect())
    }

    /// Redeem an invite for `username`.
    ///
    /// Deleting the invite row is the claim: of two concurrent redemptions only one sees the row
    /// come back, so an invite is consumed at most once. The user joins the invite's organization
    /// with its admin flag in the same transaction. Returns `false` if no invite with this id is
    /// addressed to the user. A missing user rolls the claim back and fails with `NotFound`.
    #[instrument(skip(self), fields(invite_id = %abbrev_uuid(&invite_id)), err)]
    pub async fn redeem(&mut self, username: &str, invite_id: InviteId) -> Result<bool> {
        self.claim(username, invite_id, None).await
    }

    /// Like [`Self::redeem`], on behalf of a member of `org_id`.
    ///
    /// The user must currently belong to `org_id`; otherwise nothing changes and `NotFound` is
    /// returned. The membership row is locked for the rest of the transaction.
    #[instrument(skip(self), fields(org_id = %abbrev_uuid(&org_id), invite_id = %abbrev_uuid(&invite_id)), err)]
    pub async fn redeem_for_member(&mut self, org_id: OrganizationId, username: &str, invite_id: InviteId) -> Result<bool> {
        self.claim(username, invite_id, Some(org_id)).await
    }

    async fn claim(&mut self, username: &str, invite_id: InviteId, member_of: Option<OrganizationId>) -> Result<bool> {
        let mut tx = self.db.begin().await?;

        if let Some(org_id) = member_of {
            let member: Option<UserId> =
                sqlx::query_scalar("SELECT id FROM users WHERE LOWER(username) = LOWER($1) AND organization_id = $2 FOR UPDATE")
                    .bind(username)
                    .bind(org_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            if member.is_none() {
                return Err(DbError::NotFound);
            }
        }

        let claimed = sqlx::query_as::<_, ClaimedInvite>(
            r#"
            DELETE FROM invite_links
            WHERE id = $1 AND invited_user = LOWER($2)
            RETURNING organization_id, is_admin
            "#,
        )
        .bind(invite_id)
        .bind(username)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(claimed) = claimed else {
            return Ok(false);
        };

        let result = sqlx::query("UPDATE users SET organization_id = $2, is_administrator = $3 WHERE LOWER(username) = LOWER($1)")
            .bind(username)
            .bind(claimed.organization_id)
            .bind(claimed.is_admin)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }

        tx.commit().await?;
        Ok(true)
    }
}
