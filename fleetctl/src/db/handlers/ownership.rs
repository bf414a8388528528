//! Owner lookup for rows that a tenant-scoped query did not find.
//!
//! Tenant-scoped repositories cannot tell a missing row from one held by another organization.
//! Handlers ask here after a miss to choose between not-found and unauthorized.

use crate::db::errors::Result;
use crate::types::{ApiTokenId, CommandContextId, DeviceGroupId, InviteId, OrganizationId, SharedFileId, UserId};
use sqlx::PgConnection;
use tracing::instrument;

/// An organization-owned row, addressed by its id.
#[derive(Debug, Clone, Copy)]
pub enum OwnedRow<'a> {
    ApiToken(ApiTokenId),
    CommandContext(CommandContextId),
    Device(&'a str),
    DeviceGroup(DeviceGroupId),
    Invite(InviteId),
    SharedFile(SharedFileId),
    User(UserId),
}

impl OwnedRow<'_> {
    fn table(&self) -> &'static str {
        match self {
            OwnedRow::ApiToken(_) => "api_tokens",
            OwnedRow::CommandContext(_) => "command_contexts",
            OwnedRow::Device(_) => "devices",
            OwnedRow::DeviceGroup(_) => "device_groups",
            OwnedRow::Invite(_) => "invite_links",
            OwnedRow::SharedFile(_) => "shared_files",
            OwnedRow::User(_) => "users",
        }
    }
}

/// The organization holding `row`, whoever asks. `None` if no organization does.
#[instrument(skip(conn), err)]
pub async fn owner_of(conn: &mut PgConnection, row: OwnedRow<'_>) -> Result<Option<OrganizationId>> {
    let sql = format!("SELECT organization_id FROM {} WHERE id = $1", row.table());
    let query = sqlx::query_scalar::<_, OrganizationId>(&sql);
    let query = match row {
        OwnedRow::Device(id) => query.bind(id),
        OwnedRow::ApiToken(id)
        | OwnedRow::CommandContext(id)
        | OwnedRow::DeviceGroup(id)
        | OwnedRow::Invite(id)
        | OwnedRow::SharedFile(id)
        | OwnedRow::User(id) => query.bind(id),
    };

    Ok(query.fetch_optional(&mut *conn).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::handlers::{Organizations, Users};
    use crate::db::models::users::UserCreateDBRequest;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_owner_is_reported_regardless_of_asker(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let org = Organizations::new(&mut conn).create("Acme").await.unwrap();
        let user = Users::new(&mut conn)
            .create(&UserCreateDBRequest {
                username: "alice".to_string(),
                organization_id: org.id,
                is_administrator: false,
                password_hash: None,
            })
            .await
            .unwrap();

        assert_eq!(owner_of(&mut conn, OwnedRow::User(user.id)).await.unwrap(), Some(org.id));
        assert_eq!(owner_of(&mut conn, OwnedRow::User(uuid::Uuid::new_v4())).await.unwrap(), None);
        assert_eq!(owner_of(&mut conn, OwnedRow::Device("never-seen")).await.unwrap(), None);
    }
}
