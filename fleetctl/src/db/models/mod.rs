//! Database record models.
//!
//! Request structs (`*DBRequest`) carry what a repository needs to insert or update a row;
//! response structs (`*DBResponse`) are what it hands back. The row types that derive
//! `sqlx::FromRow` stay private to their repository in [`crate::db::handlers`], so the storage
//! shape can change without touching callers.
//!
//! API models in [`crate::api::models`] convert from these with `From` impls.

pub mod alerts;
pub mod api_tokens;
pub mod command_contexts;
pub mod device_groups;
pub mod devices;
pub mod event_logs;
pub mod invites;
pub mod organizations;
pub mod shared_files;
pub mod users;
