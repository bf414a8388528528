//! API request and response data models.
//!
//! These are the JSON shapes of the HTTP surface. Each module converts from the matching
//! `db::models` type so handlers never serialize database rows directly.

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
