//! Core cloud API abstraction trait.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::error::Result;
use crate::types::{Action, Pagination, Server, Volume};

/// Parameters for creating a volume.
#[derive(Debug, Clone)]
pub struct VolumeCreateOpts {
    /// Name, unique per account
    pub name: String,
    /// Size in gigabytes
    pub size: i64,
    /// Location to create the volume in
    pub location: String,
    /// Labels to attach for provenance
    pub labels: HashMap<String, String>,
}

/// Result of a volume creation: the volume itself plus the provider's
/// asynchronous creation action, when one was returned.
#[derive(Debug, Clone)]
pub struct VolumeCreated {
    pub volume: Volume,
    pub action: Option<Action>,
}

/// Listing parameters. Zero values are omitted from the request, leaving
/// the choice to the server.
#[derive(Debug, Clone, Copy, Default)]
pub struct ListOpts {
    /// Page to fetch (1-based)
    pub page: u32,
    /// Page size
    pub per_page: u32,
}

/// One page of a volume listing.
#[derive(Debug, Clone)]
pub struct VolumePage {
    pub volumes: Vec<Volume>,
    /// Absent when the server did not paginate the response
    pub pagination: Option<Pagination>,
}

/// Core cloud API abstraction trait.
///
/// This trait defines the slice of the provider's API the controller
/// consumes. The remote directory is authoritative; implementations must
/// not cache state across calls. [`CloudError::NotFound`] is the one error
/// callers inspect, so implementations have to keep the absent-resource
/// case distinguishable from other failures.
///
/// [`CloudError::NotFound`]: crate::error::CloudError::NotFound
#[async_trait]
pub trait VolumeApi: Send + Sync {
    // =========================================================================
    // Volumes
    // =========================================================================

    /// Look up a volume by name. `Ok(None)` means no volume has that name.
    async fn volume_by_name(&self, name: &str) -> Result<Option<Volume>>;

    /// Fetch a volume by id.
    async fn volume_by_id(&self, id: i64) -> Result<Volume>;

    /// Create a new volume. The returned action, if any, tracks the
    /// provider-side creation work.
    async fn create_volume(&self, opts: VolumeCreateOpts) -> Result<VolumeCreated>;

    /// Delete a volume by id.
    async fn delete_volume(&self, id: i64) -> Result<()>;

    /// Attach a volume to a server. The returned action, if any, must be
    /// polled to completion before the attachment is usable.
    async fn attach_volume(&self, volume_id: i64, server_id: i64) -> Result<Option<Action>>;

    /// Detach a volume from whatever server it is attached to.
    async fn detach_volume(&self, volume_id: i64) -> Result<Option<Action>>;

    /// Fetch one page of the volume listing.
    async fn list_volumes(&self, opts: ListOpts) -> Result<VolumePage>;

    // =========================================================================
    // Servers
    // =========================================================================

    /// Fetch a server by id.
    async fn server_by_id(&self, id: i64) -> Result<Server>;

    // =========================================================================
    // Actions
    // =========================================================================

    /// Fetch the current state of an asynchronous action.
    async fn action_by_id(&self, id: i64) -> Result<Action>;
}
