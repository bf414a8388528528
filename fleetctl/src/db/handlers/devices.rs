//! Database repository for devices.
//!
//! Devices are keyed by the id their agent reports. A heartbeat refreshes a known device in
//! place; only a first-seen device goes through the organization check and the insert.

use crate::db::{
    errors::{DbError, Result},
    handlers::EventLogs,
    models::{
        devices::{DeviceDBResponse, DeviceUpdateDBRequest, DeviceUpsertDBRequest, Drive},
        event_logs::EventLogCreateDBRequest,
    },
};
use crate::types::{DeviceGroupId, DeviceId, OrganizationId, UserId, abbrev_uuid};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection, types::Json};
use tracing::instrument;

#[derive(Debug, Clone, FromRow)]
struct Device {
    pub id: DeviceId,
    pub organization_id: OrganizationId,
    pub device_group_id: Option<DeviceGroupId>,
    pub device_name: String,
    pub alias: Option<String>,
    pub tags: String,
    pub current_user_name: Option<String>,
    pub drives: Json<Vec<Drive>>,
    pub cpu_utilization: f64,
    pub used_memory: f64,
    pub total_memory: f64,
    pub used_storage: f64,
    pub total_storage: f64,
    pub is_64_bit: bool,
    pub os_architecture: String,
    pub os_description: String,
    pub platform: String,
    pub processor_count: i32,
    pub agent_version: String,
    pub is_online: bool,
    pub last_online: DateTime<Utc>,
}

impl From<Device> for DeviceDBResponse {
    fn from(d: Device) -> Self {
        Self {
            id: d.id,
            organization_id: d.organization_id,
            device_group_id: d.device_group_id,
            device_name: d.device_name,
            alias: d.alias,
            tags: d.tags,
            current_user_name: d.current_user_name,
            drives: d.drives.0,
            cpu_utilization: d.cpu_utilization,
            used_memory: d.used_memory,
            total_memory: d.total_memory,
            used_storage: d.used_storage,
            total_storage: d.total_storage,
            is_64_bit: d.is_64_bit,
            os_architecture: d.os_architecture,
            os_description: d.os_description,
            platform: d.platform,
            processor_count: d.processor_count,
            agent_version: d.agent_version,
            is_online: d.is_online,
            last_online: d.last_online,
        }
    }
}

pub struct Devices<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Devices<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Insert or refresh a device from an agent heartbeat.
    ///
    /// An existing device keeps its organization, alias, tags and group; everything the agent
    /// reports is overwritten, the device is marked online and `last_online` is refreshed. The
    /// organization in the heartbeat is only consulted for a device seen for the first time: a new
    /// device is inserted when its organization exists. Otherwise nothing is persisted except one
    /// diagnostic event, and [`DbError::OrganizationNotFound`] is returned. The event is written on
    /// this connection, so run this outside a transaction you intend to roll back.
    ///
    /// Concurrent first heartbeats for one id all succeed and leave a single row.
    #[instrument(skip(self, request), fields(device_id = %request.id, org_id = %abbrev_uuid(&request.organization_id)), err)]
    pub async fn upsert(&mut self, request: &DeviceUpsertDBRequest) -> Result<DeviceDBResponse> {
        if let Some(device) = self.refresh(request).await? {
            return Ok(device.into());
        }

        let inserted = match self.insert_new(request).await {
            Ok(device) => device,
            // The organization vanished between the EXISTS check and the insert
            Err(e) if is_fk_violation(&e) => None,
            Err(e) => return Err(e.into()),
        };
        if let Some(device) = inserted {
            return Ok(device.into());
        }

        // Another heartbeat may have created the device since the refresh above
        if let Some(device) = self.refresh(request).await? {
            return Ok(device.into());
        }

        let message = format!(
            "Unable to add device {} because organization {} does not exist.",
            request.device_name, request.organization_id
        );
        tracing::info!(device_id = %request.id, "{}", message);
        EventLogs::new(&mut *self.db)
            .write(&EventLogCreateDBRequest::info(None, message).with_source("Devices::upsert"))
            .await?;

        Err(DbError::OrganizationNotFound {
            organization_id: request.organization_id,
        })
    }

    /// Overwrite the telemetry of a known device. `None` if the device has never been seen.
    async fn refresh(&mut self, request: &DeviceUpsertDBRequest) -> Result<Option<Device>> {
        let device = sqlx::query_as::<_, Device>(
            r#"
            UPDATE devices SET
                device_name = $2,
                current_user_name = $3,
                drives = $4,
                cpu_utilization = $5,
                used_memory = $6,
                total_memory = $7,
                used_storage = $8,
                total_storage = $9,
                is_64_bit = $10,
                os_architecture = $11,
                os_description = $12,
                platform = $13,
                processor_count = $14,
                agent_version = $15,
                is_online = TRUE,
                last_online = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(&request.id)
        .bind(&request.device_name)
        .bind(&request.current_user_name)
        .bind(Json(&request.drives))
        .bind(request.cpu_utilization)
        .bind(request.used_memory)
        .bind(request.total_memory)
        .bind(request.used_storage)
        .bind(request.total_storage)
        .bind(request.is_64_bit)
        .bind(&request.os_architecture)
        .bind(&request.os_description)
        .bind(&request.platform)
        .bind(request.processor_count)
        .bind(&request.agent_version)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(device)
    }

    /// Insert a first-seen device if its organization exists. A row inserted concurrently by
    /// another heartbeat is refreshed instead of duplicated.
    async fn insert_new(&mut self, request: &DeviceUpsertDBRequest) -> std::result::Result<Option<Device>, sqlx::Error> {
        sqlx::query_as::<_, Device>(
            r#"
            INSERT INTO devices (
                id, organization_id, device_name, current_user_name, drives,
                cpu_utilization, used_memory, total_memory, used_storage, total_storage,
                is_64_bit, os_architecture, os_description, platform, processor_count,
                agent_version, is_online, last_online
            )
            SELECT $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, TRUE, NOW()
            WHERE EXISTS (SELECT 1 FROM organizations WHERE id = $2)
            ON CONFLICT (id) DO UPDATE SET
                device_name = EXCLUDED.device_name,
                current_user_name = EXCLUDED.current_user_name,
                drives = EXCLUDED.drives,
                cpu_utilization = EXCLUDED.cpu_utilization,
                used_memory = EXCLUDED.used_memory,
                total_memory = EXCLUDED.total_memory,
                used_storage = EXCLUDED.used_storage,
                total_storage = EXCLUDED.total_storage,
                is_64_bit = EXCLUDED.is_64_bit,
                os_architecture = EXCLUDED.os_architecture,
                os_description = EXCLUDED.os_description,
                platform = EXCLUDED.platform,
                processor_count = EXCLUDED.processor_count,
                agent_version = EXCLUDED.agent_version,
                is_online = TRUE,
                last_online = NOW()
            RETURNING *
            "#,
        )
        .bind(&request.id)
        .bind(request.organization_id)
        .bind(&request.device_name)
        .bind(&request.current_user_name)
        .bind(Json(&request.drives))
        .bind(request.cpu_utilization)
        .bind(request.used_memory)
        .bind(request.total_memory)
        .bind(request.used_storage)
        .bind(request.total_storage)
        .bind(request.is_64_bit)
        .bind(&request.os_architecture)
        .bind(&request.os_description)
        .bind(&request.platform)
        .bind(request.processor_count)
        .bind(&request.agent_version)
        .fetch_optional(&mut *self.db)
        .await
    }

    /// Mark a device offline. Missing devices are ignored.
    #[instrument(skip(self), err)]
    pub async fn mark_offline(&mut self, device_id: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE devices SET is_online = FALSE, last_online = NOW() WHERE id = $1")
            .bind(device_id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Bulk variant used at startup, when no agent can be connected yet.
    #[instrument(skip(self), err)]
    pub async fn set_all_offline(&mut self) -> Result<u64> {
        let result = sqlx::query("UPDATE devices SET is_online = FALSE WHERE is_online")
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected())
    }

    #[instrument(skip(self), fields(org_id = %abbrev_uuid(&org_id)), err)]
    pub async fn get(&mut self, org_id: OrganizationId, device_id: &str) -> Result<Option<DeviceDBResponse>> {
        let device = sqlx::query_as::<_, Device>("SELECT * FROM devices WHERE id = $1 AND organization_id = $2")
            .bind(device_id)
            .bind(org_id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(device.map(Into::into))
    }

    #[instrument(skip(self), fields(org_id = %abbrev_uuid(&org_id)), err)]
    pub async fn list_for_organization(&mut self, org_id: OrganizationId) -> Result<Vec<DeviceDBResponse>> {
        let devices = sqlx::query_as::<_, Device>("SELECT * FROM devices WHERE organization_id = $1 ORDER BY device_name, id")
            .bind(org_id)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(devices.into_iter().map(Into::into).collect())
    }

    /// Devices visible to `username`: every device of the user's organization.
    #[instrument(skip(self), err)]
    pub async fn list_for_user(&mut self, username: &str) -> Result<Vec<DeviceDBResponse>> {
        let devices = sqlx::query_as::<_, Device>(
            r#"
            SELECT d.* FROM devices d
            INNER JOIN users u ON u.organization_id = d.organization_id
            WHERE LOWER(u.username) = LOWER($1)
            ORDER BY d.device_name, d.id
            "#,
        )
        .bind(username)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(devices.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn user_has_access(&mut self, user_id: UserId, device_id: &str) -> Result<bool> {
        let has_access: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM devices d
                INNER JOIN users u ON u.organization_id = d.organization_id
                WHERE d.id = $1 AND u.id = $2
            )
            "#,
        )
        .bind(device_id)
        .bind(user_id)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(has_access)
    }

    /// Intersect externally supplied device ids with the ones the user's organization owns.
    ///
    /// Unknown ids and ids owned by another organization are dropped. Order is not preserved.
    #[instrument(skip(self, device_ids), fields(user_id = %abbrev_uuid(&user_id), count = device_ids.len()), err)]
    pub async fn filter_ids_by_permission(&mut self, device_ids: &[DeviceId], user_id: UserId) -> Result<Vec<DeviceId>> {
        if device_ids.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<DeviceId> = sqlx::query_scalar(
            r#"
            SELECT d.id FROM devices d
            INNER JOIN users u ON u.organization_id = d.organization_id
            WHERE d.id = ANY($1) AND u.id = $2
            "#,
        )
        .bind(device_ids)
        .bind(user_id)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(ids)
    }

    /// Apply operator edits. Returns `None` if the device is not in `org_id`.
    ///
    /// A group assignment must name a group of the same organization.
    #[instrument(skip(self, request), fields(org_id = %abbrev_uuid(&org_id)), err)]
    pub async fn update(
        &mut self,
        org_id: OrganizationId,
        device_id: &str,
        request: &DeviceUpdateDBRequest,
    ) -> Result<Option<DeviceDBResponse>> {
        if let Some(Some(group_id)) = request.device_group_id {
            let group_in_org: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM device_groups WHERE id = $1 AND organization_id = $2)")
                .bind(group_id)
                .bind(org_id)
                .fetch_one(&mut *self.db)
                .await?;
            if !group_in_org {
                return Err(DbError::NotFound);
            }
        }

        let device = sqlx::query_as::<_, Device>(
            r#"
            UPDATE devices SET
                tags = COALESCE($3, tags),
                alias = COALESCE($4, alias),
                device_group_id = CASE WHEN $5 THEN $6 ELSE device_group_id END
            WHERE id = $1 AND organization_id = $2
            RETURNING *
            "#,
        )
        .bind(device_id)
        .bind(org_id)
        .bind(&request.tags)
        .bind(&request.alias)
        .bind(request.device_group_id.is_some())
        .bind(request.device_group_id.flatten())
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(device.map(Into::into))
    }

    #[instrument(skip(self, tags), fields(org_id = %abbrev_uuid(&org_id)), err)]
    pub async fn update_tags(&mut self, org_id: OrganizationId, device_id: &str, tags: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE devices SET tags = $3 WHERE id = $1 AND organization_id = $2")
            .bind(device_id)
            .bind(org_id)
            .bind(tags)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Set alias and group during agent setup. The group is matched by name, case-insensitively,
    /// within the device's own organization; no match leaves the device ungrouped.
    #[instrument(skip(self), err)]
    pub async fn set_setup_options(&mut self, device_id: &str, alias: Option<&str>, group_name: Option<&str>) -> Result<Option<DeviceDBResponse>> {
        let device = sqlx::query_as::<_, Device>(
            r#"
            UPDATE devices d SET
                alias = $2,
                device_group_id = (
                    SELECT g.id FROM device_groups g
                    WHERE g.organization_id = d.organization_id AND LOWER(g.name) = LOWER($3)
                )
            WHERE d.id = $1
            RETURNING d.*
            "#,
        )
        .bind(device_id)
        .bind(alias)
        .bind(group_name)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(device.map(Into::into))
    }

    #[instrument(skip(self, device_ids), fields(org_id = %abbrev_uuid(&org_id), count = device_ids.len()), err)]
    pub async fn remove(&mut self, org_id: OrganizationId, device_ids: &[DeviceId]) -> Result<u64> {
        let result = sqlx::query("DELETE FROM devices WHERE id = ANY($1) AND organization_id = $2")
            .bind(device_ids)
            .bind(org_id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected())
    }
}

fn is_fk_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation())
}
