//! gRPC server setup and lifecycle.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tokio::net::{TcpListener, UnixListener};
use tokio_stream::wrappers::{TcpListenerStream, UnixListenerStream};
use tonic::transport::Server;
use tracing::info;

use hcloud_csi_api::ApiClient;
use hcloud_csi_proto::ControllerServer;

use crate::config::Config;
use crate::controller::ControllerService;

/// Run the gRPC server.
pub async fn run(config: Config) -> Result<()> {
    config.validate()?;

    // Initialize the cloud API client
    let api = ApiClient::new(&config.api.url, &config.api.token);

    info!(api_url = %config.api.url, location = %config.driver.location, "Cloud API client configured");

    // Create service implementation
    let service = ControllerService::new(Arc::new(api), config.driver.location.clone())
        .with_lenient_ids(config.driver.lenient_ids);

    if config.driver.lenient_ids {
        info!("Lenient id handling is enabled");
    }

    let router = Server::builder().add_service(ControllerServer::new(service));

    let endpoint = config.server.endpoint.as_str();

    info!(endpoint = %endpoint, "Starting gRPC server");

    if let Some(path) = endpoint.strip_prefix("unix://") {
        let path = Path::new(path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create socket directory: {}", parent.display())
            })?;
        }
        // A socket left behind by a previous run would fail the bind.
        if path.exists() {
            std::fs::remove_file(path).with_context(|| {
                format!("Failed to remove stale socket: {}", path.display())
            })?;
        }

        let listener = UnixListener::bind(path)
            .with_context(|| format!("Failed to bind unix socket: {}", path.display()))?;

        router
            .serve_with_incoming(UnixListenerStream::new(listener))
            .await
            .map_err(|e| anyhow::anyhow!("gRPC server error: {}", e))?;
    } else if let Some(addr) = endpoint.strip_prefix("tcp://") {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind address: {}", addr))?;

        router
            .serve_with_incoming(TcpListenerStream::new(listener))
            .await
            .map_err(|e| anyhow::anyhow!("gRPC server error: {}", e))?;
    } else {
        // validate() already rules this out; kept for direct callers.
        return Err(anyhow::anyhow!(
            "Unsupported endpoint {:?}, expected unix:// or tcp://",
            endpoint
        ));
    }

    Ok(())
}
