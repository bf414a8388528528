//! HTTP request handlers for all API endpoints.
//!
//! Handlers parse the request, resolve the caller through [`crate::auth::ApiCaller`], and call
//! the repositories in [`crate::db::handlers`] with the caller's organization. An id the caller's
//! organization does not hold is 404 when no organization holds it and 401 when another one does;
//! see [`missing`]. Alerts report every miss as 401.
//!
//! # Handler Modules
//!
//! - [`alerts`]: alert intake, listing and deletion
//! - [`api_tokens`]: issuing, renaming and revoking API tokens
//! - [`command_contexts`]: command result payloads
//! - [`device_groups`]: device group management
//! - [`devices`]: agent heartbeats and device management
//! - [`events`]: the organization's event log
//! - [`invites`]: invite links and redemption
//! - [`organizations`]: the caller's organization
//! - [`shared_files`]: file upload and download
//! - [`users`]: organization members and their options

pub mod alerts;
pub mod api_tokens;
pub mod command_contexts;
pub mod device_groups;
pub mod devices;
pub mod events;
pub mod invites;
pub mod organizations;
pub mod shared_files;
pub mod users;

use crate::db::handlers::ownership::{OwnedRow, owner_of};
use crate::errors::Error;
use crate::types::{OrganizationId, Operation};
use sqlx::PgConnection;

/// The error for an id that a query scoped to `org_id` did not find.
pub(crate) async fn missing(conn: &mut PgConnection, org_id: OrganizationId, row: OwnedRow<'_>, action: Operation) -> Error {
    let (resource, id) = describe(&row);
    match owner_of(conn, row).await {
        Ok(Some(owner)) if owner != org_id => Error::Unauthorized { action, resource, id },
        // Held by the caller after all: the row changed between the two queries
        Ok(Some(_)) | Ok(None) => Error::NotFound { resource, id },
        Err(e) => Error::Database(e),
    }
}

fn describe(row: &OwnedRow<'_>) -> (String, String) {
    let (resource, id) = match row {
        OwnedRow::ApiToken(id) => ("API token", id.to_string()),
        OwnedRow::CommandContext(id) => ("command context", id.to_string()),
        OwnedRow::Device(id) => ("device", (*id).to_string()),
        OwnedRow::DeviceGroup(id) => ("device group", id.to_string()),
        OwnedRow::Invite(id) => ("invite", id.to_string()),
        OwnedRow::SharedFile(id) => ("file", id.to_string()),
        OwnedRow::User(id) => ("user", id.to_string()),
    };
    (resource.to_string(), id)
}
