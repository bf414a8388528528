//! Repository implementations for database access.
//!
//! One repository struct per entity group. Each wraps a borrowed `PgConnection` (a pooled
//! connection or an open transaction) and returns plain models from [`crate::db::models`].
//!
//! # Tenant scoping
//!
//! Every read or mutation of organization-owned rows names the owning organization, and a row
//! owned by another organization behaves exactly like a missing one. The handful of lookups that
//! are keyed differently say so on the method: device heartbeats are keyed by the agent-assigned
//! device id, and API token credentials are looked up by token value to discover the tenant.
//! [`ownership::owner_of`] is the one unscoped lookup; it only reports which organization holds
//! an id so a handler can tell a foreign row from a missing one.
//!
//! Repositories whose operations fit plain create/get/list/delete implement [`Repository`];
//! the rest expose inherent methods.
//!
//! # Usage
//!
//! ```ignore
//! use fleetctl::db::handlers::{DeviceGroups, Repository};
//!
//! async fn example(pool: &sqlx::PgPool, org_id: uuid::Uuid) -> Result<(), Box<dyn std::error::Error>> {
//!     let mut tx = pool.begin().await?;
//!     let mut repo = DeviceGroups::new(&mut tx);
//!
//!     let group = repo.create(org_id, &request).await?;
//!     repo.delete(org_id, group.id).await?;
//!
//!     tx.commit().await?;
//!     Ok(())
//! }
//! ```

pub mod alerts;
pub mod api_tokens;
pub mod command_contexts;
pub mod device_groups;
pub mod devices;
pub mod event_logs;
pub mod invites;
pub mod organizations;
pub mod ownership;
pub mod repository;
pub mod shared_files;
pub mod users;

pub use alerts::Alerts;
pub use api_tokens::ApiTokens;
pub use command_contexts::CommandContexts;
pub use device_groups::DeviceGroups;
pub use devices::Devices;
pub use event_logs::EventLogs;
pub use invites::Invites;
pub use organizations::Organizations;
pub use repository::Repository;
pub use shared_files::SharedFiles;
pub use users::Users;
