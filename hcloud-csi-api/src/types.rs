//! Type definitions for cloud API resources.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A network-attached block storage volume.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Volume {
    /// Provider-assigned identifier
    pub id: i64,
    /// Name, unique per account
    pub name: String,
    /// Size in gigabytes
    pub size: i64,
    /// Location the volume lives in (e.g. "fsn1")
    pub location: String,
    /// Server the volume is currently attached to, if any
    pub server: Option<i64>,
    /// Labels set at creation time
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

/// A server (node) as seen by this system. Read-only here; the provider
/// owns its lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Server {
    /// Provider-assigned identifier
    pub id: i64,
    /// Human-readable name
    pub name: String,
}

/// States an asynchronous remote action can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    /// Still in progress
    Running,
    /// Finished successfully (terminal)
    Success,
    /// Failed (terminal)
    Error,
}

/// Error details attached to a failed action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionError {
    pub code: String,
    pub message: String,
}

/// An asynchronous unit of remote work (create, attach, detach).
///
/// Actions are never persisted locally; they are polled by id until they
/// reach a terminal state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    /// Provider-assigned identifier
    pub id: i64,
    /// Current status
    pub status: ActionStatus,
    /// Failure details, set when `status` is [`ActionStatus::Error`]
    pub error: Option<ActionError>,
}

/// Pagination details from the remote listing envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pagination {
    /// Page this response covers (1-based)
    pub page: u32,
    /// Page size used by the server
    pub per_page: u32,
    /// Next page, absent on the last page
    pub next_page: Option<u32>,
    /// Last page of the collection, absent when unknown
    pub last_page: Option<u32>,
    /// Total entries across all pages, absent when unknown
    pub total_entries: Option<u32>,
}
