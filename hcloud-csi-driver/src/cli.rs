//! Command-line argument parsing.

use clap::Parser;

/// hcloud-csi controller daemon - volume lifecycle controller
#[derive(Parser, Debug)]
#[command(name = "hcloud-csi-driver")]
#[command(about = "Hetzner Cloud volume controller daemon")]
#[command(version)]
pub struct Args {
    /// Path to configuration file (optional, defaults used if not found)
    #[arg(short, long)]
    pub config: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON instead of human-readable lines
    #[arg(long)]
    pub log_json: bool,

    /// Endpoint to serve gRPC on (unix:///path/to.sock or tcp://host:port)
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Cloud API token
    #[arg(long, env = "HCLOUD_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Cloud API base URL
    #[arg(long, env = "HCLOUD_API_URL")]
    pub api_url: Option<String>,

    /// Location volumes are provisioned in (e.g. fsn1)
    #[arg(long, env = "HCLOUD_LOCATION")]
    pub location: Option<String>,

    /// Accept non-numeric volume and node ids by substituting a sentinel
    /// instead of rejecting the request
    #[arg(long)]
    pub lenient_ids: bool,
}
