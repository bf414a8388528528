//! Database repository for the append-only event log.

use crate::db::{
    errors::Result,
    models::event_logs::{EventLogCreateDBRequest, EventLogDBResponse, EventSeverity},
};
use crate::types::{EventLogId, OrganizationId, abbrev_uuid};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection};
use tracing::instrument;

#[derive(Debug, Clone, FromRow)]
struct EventLog {
    pub id: EventLogId,
    pub timestamp: DateTime<Utc>,
    pub severity: EventSeverity,
    pub message: String,
    pub source: Option<String>,
    pub stack_trace: Option<String>,
    pub organization_id: Option<OrganizationId>,
}

impl From<EventLog> for EventLogDBResponse {
    fn from(e: EventLog) -> Self {
        Self {
            id: e.id,
            timestamp: e.timestamp,
            severity: e.severity,
            message: e.message,
            source: e.source,
            stack_trace: e.stack_trace,
            organization_id: e.organization_id,
        }
    }
}

pub struct EventLogs<'c> {
    db: &'c mut PgConnection,
}

impl<'c> EventLogs<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(severity = ?request.severity), err)]
    pub async fn write(&mut self, request: &EventLogCreateDBRequest) -> Result<EventLogDBResponse> {
        let event = sqlx::query_as::<_, EventLog>(
            r#"
            INSERT INTO event_logs (severity, message, source, stack_trace, organization_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(request.severity)
        .bind(&request.message)
        .bind(&request.source)
        .bind(&request.stack_trace)
        .bind(request.organization_id)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(event.into())
    }

    /// Most recent events of an organization first.
    #[instrument(skip(self), fields(org_id = %abbrev_uuid(&org_id)), err)]
    pub async fn list_for_organization(&mut self, org_id: OrganizationId, limit: i64) -> Result<Vec<EventLogDBResponse>> {
        let events = sqlx::query_as::<_, EventLog>(
            "SELECT * FROM event_logs WHERE organization_id = $1 ORDER BY timestamp DESC, id LIMIT $2",
        )
        .bind(org_id)
        .bind(limit)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(events.into_iter().map(Into::into).collect())
    }

    /// Events of an organization with `from <= timestamp <= to`, newest first.
    #[instrument(skip(self), fields(org_id = %abbrev_uuid(&org_id)), err)]
    pub async fn list_in_range(
        &mut self,
        org_id: OrganizationId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<EventLogDBResponse>> {
        let events = sqlx::query_as::<_, EventLog>(
            r#"
            SELECT * FROM event_logs
            WHERE organization_id = $1 AND timestamp >= $2 AND timestamp <= $3
            ORDER BY timestamp DESC, id
            "#,
        )
        .bind(org_id)
        .bind(from)
        .bind(to)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(events.into_iter().map(Into::into).collect())
    }

    /// Same as [`Self::list_in_range`], resolving the organization from a username.
    #[instrument(skip(self), err)]
    pub async fn list_in_range_for_user(
        &mut self,
        username: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<EventLogDBResponse>> {
        let events = sqlx::query_as::<_, EventLog>(
            r#"
            SELECT e.* FROM event_logs e
            INNER JOIN users u ON u.organization_id = e.organization_id
            WHERE LOWER(u.username) = LOWER($1) AND e.timestamp >= $2 AND e.timestamp <= $3
            ORDER BY e.timestamp DESC, e.id
            "#,
        )
        .bind(username)
        .bind(from)
        .bind(to)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(events.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::handlers::{Organizations, Users};
    use crate::db::models::users::UserCreateDBRequest;
    use chrono::{Duration, SubsecRound};
    use sqlx::PgPool;

    async fn backdate(pool: &PgPool, id: EventLogId, when: DateTime<Utc>) {
        sqlx::query("UPDATE event_logs SET timestamp = $2 WHERE id = $1")
            .bind(id)
            .bind(when)
            .execute(pool)
            .await
            .unwrap();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_write_with_source_and_stack_trace(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let org = Organizations::new(&mut conn).create("Acme").await.unwrap();

        let mut repo = EventLogs::new(&mut conn);
        let event = repo
            .write(
                &EventLogCreateDBRequest::error(Some(org.id), "Email failed")
                    .with_source("alerts")
                    .with_stack_trace("smtp: timeout"),
            )
            .await
            .unwrap();

        assert_eq!(event.severity, EventSeverity::Error);
        assert_eq!(event.source.as_deref(), Some("alerts"));
        assert_eq!(event.stack_trace.as_deref(), Some("smtp: timeout"));

        let unscoped = repo.write(&EventLogCreateDBRequest::info(None, "no tenant")).await.unwrap();
        assert!(unscoped.organization_id.is_none());

        let listed = repo.list_for_organization(org.id, 50).await.unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_range_is_inclusive_and_newest_first(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let org = Organizations::new(&mut conn).create("Acme").await.unwrap();
        let other = Organizations::new(&mut conn).create("Other").await.unwrap();
        Users::new(&mut conn)
            .create(&UserCreateDBRequest {
                username: "ops".to_string(),
                organization_id: org.id,
                is_administrator: true,
                password_hash: None,
            })
            .await
            .unwrap();

        // Postgres stores microseconds, so keep bounds representable
        let now = Utc::now().trunc_subsecs(0);
        let from = now - Duration::days(2);
        let to = now - Duration::days(1);

        let mut repo = EventLogs::new(&mut conn);
        let at_from = repo.write(&EventLogCreateDBRequest::info(Some(org.id), "at from")).await.unwrap();
        let at_to = repo.write(&EventLogCreateDBRequest::info(Some(org.id), "at to")).await.unwrap();
        let too_old = repo.write(&EventLogCreateDBRequest::info(Some(org.id), "too old")).await.unwrap();
        let foreign = repo.write(&EventLogCreateDBRequest::info(Some(other.id), "foreign")).await.unwrap();
        drop(repo);

        backdate(&pool, at_from.id, from).await;
        backdate(&pool, at_to.id, to).await;
        backdate(&pool, too_old.id, from - Duration::seconds(1)).await;
        backdate(&pool, foreign.id, to).await;

        let mut repo = EventLogs::new(&mut conn);
        let events = repo.list_in_range(org.id, from, to).await.unwrap();
        let messages: Vec<_> = events.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["at to", "at from"]);

        let for_user = repo.list_in_range_for_user("OPS", from, to).await.unwrap();
        assert_eq!(for_user.len(), 2);
        assert!(repo.list_in_range_for_user("nobody", from, to).await.unwrap().is_empty());
    }
}
