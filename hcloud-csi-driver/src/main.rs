//! # hcloud-csi Controller Daemon
//!
//! The controller daemon runs next to the orchestrator's control plane and
//! manages network-attached volumes through the Hetzner Cloud API. It serves
//! the volume controller gRPC interface over a unix or TCP socket.
//!
//! ## Features
//! - Volume lifecycle management (create, delete, attach, detach)
//! - Capability validation and volume listing
//! - Idempotent operations safe under orchestrator retries
//!
//! ## Usage
//! ```bash
//! hcloud-csi-driver --config /etc/hcloud-csi/config.yaml
//! ```

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use hcloud_csi_driver::cli::Args;
use hcloud_csi_driver::config::Config;
use hcloud_csi_driver::{logging, server};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Initialize logging
    logging::init(&args.log_level, args.log_json)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting hcloud-csi controller daemon"
    );

    // Load configuration
    let config = match &args.config {
        Some(config_path) => {
            // Explicit config file provided
            match Config::load(config_path) {
                Ok(cfg) => {
                    info!(config_path = %config_path, "Configuration loaded");
                    cfg.with_cli_overrides(&args)
                }
                Err(e) => {
                    error!(error = %e, path = %config_path, "Failed to load configuration");
                    return Err(e);
                }
            }
        }
        None => {
            // Try default location, fall back to CLI-only config
            let default_path = "/etc/hcloud-csi/config.yaml";
            match Config::load(default_path) {
                Ok(cfg) => {
                    info!(config_path = %default_path, "Configuration loaded from default location");
                    cfg.with_cli_overrides(&args)
                }
                Err(_) => {
                    info!("No config file found, using CLI arguments and defaults");
                    Config::default_with_cli(&args)
                }
            }
        }
    };

    info!(
        endpoint = %config.server.endpoint,
        location = %config.driver.location,
        "Controller daemon configured"
    );

    // Start gRPC server
    if let Err(e) = server::run(config).await {
        error!(error = %e, "Server failed");
        return Err(e);
    }

    Ok(())
}
