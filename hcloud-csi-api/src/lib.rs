//! Cloud volume API client for the hcloud CSI driver.
//!
//! This crate isolates everything that talks to the cloud REST API: the
//! [`VolumeApi`] trait the controller programs against, the HTTP-backed
//! [`ApiClient`], and a scriptable [`MockApi`] for tests. Sizes cross this
//! boundary in whole gigabytes, matching the remote API; the byte-oriented
//! view belongs to the gRPC layer above.

pub mod api;
pub mod client;
pub mod error;
pub mod mock;
pub mod types;

pub use api::{ListOpts, VolumeApi, VolumeCreateOpts, VolumeCreated, VolumePage};
pub use client::{ApiClient, DEFAULT_API_URL};
pub use error::{CloudError, Result};
pub use mock::MockApi;
pub use types::{Action, ActionError, ActionStatus, Pagination, Server, Volume};
