//! Configuration management for the controller daemon.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use hcloud_csi_api::DEFAULT_API_URL;

use crate::cli::Args;

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// gRPC server configuration
    pub server: ServerConfig,
    /// Cloud API connection configuration
    pub api: ApiConfig,
    /// Controller behavior configuration
    pub driver: DriverConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            api: ApiConfig::default(),
            driver: DriverConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(anyhow::anyhow!("Config file not found: {}", path.display()));
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| "Failed to parse config file")?;

        Ok(config)
    }

    /// Apply CLI argument overrides to the configuration.
    pub fn with_cli_overrides(mut self, args: &Args) -> Self {
        if let Some(ref endpoint) = args.endpoint {
            self.server.endpoint = endpoint.clone();
        }

        if let Some(ref token) = args.token {
            self.api.token = token.clone();
        }

        if let Some(ref url) = args.api_url {
            self.api.url = url.clone();
        }

        if let Some(ref location) = args.location {
            self.driver.location = location.clone();
        }

        if args.lenient_ids {
            self.driver.lenient_ids = true;
        }

        self
    }

    /// Build a configuration from defaults and CLI arguments alone.
    pub fn default_with_cli(args: &Args) -> Self {
        Self::default().with_cli_overrides(args)
    }

    /// Check that the configuration is complete enough to serve.
    pub fn validate(&self) -> Result<()> {
        if !self.server.endpoint.starts_with("unix://")
            && !self.server.endpoint.starts_with("tcp://")
        {
            return Err(anyhow::anyhow!(
                "Unsupported endpoint {:?}, expected unix:// or tcp://",
                self.server.endpoint
            ));
        }

        if self.api.token.is_empty() {
            return Err(anyhow::anyhow!(
                "API token is not configured (set api.token or HCLOUD_TOKEN)"
            ));
        }

        if self.driver.location.is_empty() {
            return Err(anyhow::anyhow!(
                "Volume location is not configured (set driver.location or HCLOUD_LOCATION)"
            ));
        }

        Ok(())
    }
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Endpoint to serve gRPC on (unix:// or tcp:// scheme)
    pub endpoint: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            endpoint: "unix:///var/lib/kubelet/plugins/hcloud-csi/csi.sock".to_string(),
        }
    }
}

/// Cloud API connection configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the cloud API
    pub url: String,
    /// Access token. Never logged.
    pub token: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_API_URL.to_string(),
            token: String::new(),
        }
    }
}

/// Controller behavior configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Location volumes are provisioned in (e.g. "fsn1")
    pub location: String,
    /// Accept non-numeric ids by substituting a sentinel
    pub lenient_ids: bool,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            location: String::new(),
            lenient_ids: false,
        }
    }
}
