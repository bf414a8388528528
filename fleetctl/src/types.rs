//! Common type definitions shared across the crate.
//!
//! # ID Types
//!
//! Entity IDs generated by this system are UUIDs wrapped in type aliases:
//!
//! - [`OrganizationId`]: Tenant identifier, the root of data isolation
//! - [`UserId`]: User account identifier
//! - [`DeviceGroupId`], [`InviteId`], [`ApiTokenId`], [`EventLogId`], [`CommandContextId`],
//!   [`SharedFileId`], [`AlertId`]
//!
//! Device IDs are the exception: [`DeviceId`] is a string assigned by the agent that reports in,
//! and is treated as a stable natural key.
//!
//! # Utility Functions
//!
//! - [`abbrev_uuid`]: Abbreviate UUIDs to first 8 chars for logging

use std::fmt;
use uuid::Uuid;

// Type aliases for IDs
pub type OrganizationId = Uuid;
pub type UserId = Uuid;
pub type DeviceGroupId = Uuid;
pub type InviteId = Uuid;
pub type ApiTokenId = Uuid;
pub type EventLogId = Uuid;
pub type CommandContextId = Uuid;
pub type SharedFileId = Uuid;
pub type AlertId = Uuid;
pub type DeviceId = String;

/// Abbreviate a UUID to its first 8 characters for more readable logs and traces
/// Example: "550e8400-e29b-41d4-a716-446655440000" -> "550e8400"
pub fn abbrev_uuid(uuid: &Uuid) -> String {
    uuid.to_string().chars().take(8).collect()
}

// Operations that can be attempted on a tenant-owned resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Create => write!(f, "create"),
            Operation::Read => write!(f, "read"),
            Operation::Update => write!(f, "update"),
            Operation::Delete => write!(f, "delete"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abbrev_uuid() {
        let id = Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap();
        assert_eq!(abbrev_uuid(&id), "550e8400");
    }
}
