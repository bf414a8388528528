//! Base repository trait for tenant-scoped database operations.

use crate::db::errors::Result;
use crate::types::OrganizationId;

/// A repository is a data access layer for a postgres table owned by an organization.
///
/// Every method takes the owning organization explicitly: there is no way to read or mutate a row
/// through this trait without naming the tenant it belongs to. Rows owned by a different
/// organization behave exactly like missing rows.
#[async_trait::async_trait]
pub trait Repository {
    /// The request type for creating entities
    type CreateRequest;

    /// The response/DTO type returned by operations
    type Response;

    /// The identifier type for lookups
    type Id: Send + Sync;

    /// The filter type for list operations
    type Filter: Send + Sync;

    /// Create a new entity owned by `org_id`
    async fn create(&mut self, org_id: OrganizationId, request: &Self::CreateRequest) -> Result<Self::Response>;

    /// Get an entity by ID within `org_id`
    async fn get_by_id(&mut self, org_id: OrganizationId, id: Self::Id) -> Result<Option<Self::Response>>;

    /// List entities of `org_id` with filtering
    async fn list(&mut self, org_id: OrganizationId, filter: &Self::Filter) -> Result<Vec<Self::Response>>;

    /// Delete an entity by ID within `org_id`
    async fn delete(&mut self, org_id: OrganizationId, id: Self::Id) -> Result<bool>;
}
