//! # hcloud-csi Controller Daemon
//!
//! Serves the orchestrator's volume controller gRPC interface and translates
//! volume lifecycle calls into Hetzner Cloud block storage API requests. One
//! instance runs per cluster, next to the control plane; node-side mounting
//! is out of scope here.

pub mod cli;
pub mod config;
pub mod controller;
pub mod logging;
pub mod server;

pub use controller::ControllerService;
