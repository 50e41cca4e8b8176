//! Controller gRPC service implementation.
//!
//! Every operation re-reads remote state before acting; the service keeps no
//! volume or attachment cache, so correctness under concurrent callers comes
//! from the cloud API being the single source of truth. All operations are
//! idempotent against their own re-invocation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tonic::{Request, Response, Status};
use tracing::{debug, info, instrument, warn};

use hcloud_csi_api::{ActionStatus, ListOpts, VolumeApi, VolumeCreateOpts};
use hcloud_csi_proto::{
    controller_service_capability, list_volumes_response, volume_capability, CapacityRange,
    Controller, ControllerGetCapabilitiesRequest, ControllerGetCapabilitiesResponse,
    ControllerPublishVolumeRequest, ControllerPublishVolumeResponse, ControllerServiceCapability,
    ControllerUnpublishVolumeRequest, ControllerUnpublishVolumeResponse, CreateSnapshotRequest,
    CreateSnapshotResponse, CreateVolumeRequest, CreateVolumeResponse, DeleteSnapshotRequest,
    DeleteSnapshotResponse, DeleteVolumeRequest, DeleteVolumeResponse, GetCapacityRequest,
    GetCapacityResponse, ListSnapshotsRequest, ListSnapshotsResponse, ListVolumesRequest,
    ListVolumesResponse, Topology, ValidateVolumeCapabilitiesRequest,
    ValidateVolumeCapabilitiesResponse, Volume as PbVolume, VolumeCapability,
};

use controller_service_capability::rpc;
use volume_capability::access_mode;

/// One gigabyte in bytes.
pub const GB: i64 = 1 << 30;

/// Size used when the request carries no capacity range at all.
pub const DEFAULT_VOLUME_SIZE: i64 = 16 * GB;

/// Smallest volume the cloud will provision.
pub const MIN_VOLUME_SIZE: i64 = 10 * GB;

/// Topology segment key carrying the location constraint.
pub const LOCATION_SEGMENT: &str = "location";

const CREATED_BY_LABEL: &str = "createdBy";
const CREATED_BY_VALUE: &str = "hcloud-csi-driver";

/// Id substituted for unparseable ids in lenient mode. Cannot name a real
/// resource owned by this deployment, so the remote call fails cleanly.
const LENIENT_ID_SENTINEL: i64 = 1;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
const DEFAULT_ACTION_TIMEOUT: Duration = Duration::from_secs(60);

/// Controller service bridging the volume-lifecycle RPCs to the cloud API.
///
/// Sizes are bytes on the gRPC surface and whole gigabytes toward the API;
/// the conversion happens exactly once per request. The service holds the
/// deployment's location, which every created volume is placed in and every
/// topology constraint is checked against.
pub struct ControllerService {
    api: Arc<dyn VolumeApi>,
    location: String,
    lenient_ids: bool,
    poll_interval: Duration,
    action_timeout: Duration,
}

impl ControllerService {
    /// Create a new service instance against the given API backend.
    pub fn new(api: Arc<dyn VolumeApi>, location: impl Into<String>) -> Self {
        Self {
            api,
            location: location.into(),
            lenient_ids: false,
            poll_interval: DEFAULT_POLL_INTERVAL,
            action_timeout: DEFAULT_ACTION_TIMEOUT,
        }
    }

    /// Substitute a sentinel for unparseable ids instead of rejecting them.
    ///
    /// Compatibility shim for conformance suites that send opaque ids. Not
    /// safe for production identities; off unless explicitly configured.
    pub fn with_lenient_ids(mut self, lenient: bool) -> Self {
        self.lenient_ids = lenient;
        self
    }

    /// Tune how often and for how long attach/detach actions are polled.
    pub fn with_action_polling(mut self, interval: Duration, timeout: Duration) -> Self {
        self.poll_interval = interval;
        self.action_timeout = timeout;
        self
    }

    /// Resolve a wire id to the provider's integer form.
    fn resolve_id(&self, raw: &str, field: &str) -> Result<i64, Status> {
        match raw.parse::<i64>() {
            Ok(id) => Ok(id),
            Err(_) if self.lenient_ids => {
                warn!(field = field, id = %raw, "Id is not numeric, substituting sentinel");
                Ok(LENIENT_ID_SENTINEL)
            }
            Err(_) => Err(Status::invalid_argument(format!(
                "{} must be a numeric id, got {:?}",
                field, raw
            ))),
        }
    }

    /// Account volume-limit check. The cloud API exposes no quota endpoint,
    /// so this always passes.
    async fn check_volume_limit(&self) -> Result<(), Status> {
        Ok(())
    }

    /// Block until the given remote action reports success.
    ///
    /// Poll failures are treated as transient: logged, then retried on the
    /// next tick. An action stuck in `running`, or reporting `error` on
    /// every poll, runs into the deadline and surfaces as
    /// `DeadlineExceeded`. Dropping the request future cancels the wait.
    async fn wait_for_action(&self, volume_id: i64, action_id: i64) -> Result<(), Status> {
        let poll = async {
            let mut ticker = tokio::time::interval(self.poll_interval);
            // The first tick completes immediately; the first poll should
            // happen one interval after the action was issued.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let action = match self.api.action_by_id(action_id).await {
                    Ok(action) => action,
                    Err(err) => {
                        debug!(action_id = action_id, error = %err, "Action poll failed, retrying");
                        continue;
                    }
                };
                match action.status {
                    ActionStatus::Success => return,
                    ActionStatus::Running => {
                        debug!(action_id = action_id, "Action still running");
                    }
                    ActionStatus::Error => {
                        let detail = action
                            .error
                            .map(|e| format!("{}: {}", e.code, e.message))
                            .unwrap_or_else(|| "no details".to_string());
                        warn!(action_id = action_id, error = %detail, "Action reported an error, still polling");
                    }
                }
            }
        };

        tokio::time::timeout(self.action_timeout, poll)
            .await
            .map_err(|_| {
                Status::deadline_exceeded(format!(
                    "timeout waiting for storage action of volume {}",
                    volume_id
                ))
            })
    }
}

/// Resolve a requested capacity range to a concrete size in bytes.
///
/// Fails with `InvalidArgument` when the bounds diverge; only exact sizes
/// are supported. CreateVolume maps that to `Internal` on its surface.
fn resolve_capacity(range: Option<&CapacityRange>) -> Result<i64, Status> {
    let Some(range) = range else {
        return Ok(DEFAULT_VOLUME_SIZE);
    };

    if range.required_bytes == 0 && range.limit_bytes == 0 {
        return Ok(DEFAULT_VOLUME_SIZE);
    }

    let required = range.required_bytes;
    // An unset limit means the caller only pinned the lower bound.
    let limit = if range.limit_bytes == 0 {
        required
    } else {
        range.limit_bytes
    };

    if required == limit {
        return Ok(required);
    }

    Err(Status::invalid_argument(
        "required bytes and limit bytes must be equal when both are set",
    ))
}

/// A capability set is satisfied only when every entry asks for the single
/// supported mode. An empty set or an unset access mode is unsatisfied.
fn supports_capabilities(caps: &[VolumeCapability]) -> bool {
    if caps.is_empty() {
        return false;
    }
    caps.iter().all(|cap| {
        cap.access_mode
            .as_ref()
            .map(|mode| mode.mode() == access_mode::Mode::SingleNodeWriter)
            .unwrap_or(false)
    })
}

fn rpc_capability(rpc_type: rpc::Type) -> ControllerServiceCapability {
    ControllerServiceCapability {
        r#type: Some(controller_service_capability::Type::Rpc(
            controller_service_capability::Rpc {
                r#type: rpc_type as i32,
            },
        )),
    }
}

#[tonic::async_trait]
impl Controller for ControllerService {
    #[instrument(skip(self, request), fields(volume_name = %request.get_ref().name))]
    async fn create_volume(
        &self,
        request: Request<CreateVolumeRequest>,
    ) -> Result<Response<CreateVolumeResponse>, Status> {
        let req = request.into_inner();

        if req.name.is_empty() {
            return Err(Status::invalid_argument("volume name must be provided"));
        }
        if req.volume_capabilities.is_empty() {
            return Err(Status::invalid_argument(
                "volume capabilities must be provided",
            ));
        }

        if let Some(requirements) = &req.accessibility_requirements {
            for topology in &requirements.requisite {
                let Some(location) = topology.segments.get(LOCATION_SEGMENT) else {
                    continue;
                };
                if location != &self.location {
                    return Err(Status::resource_exhausted(format!(
                        "volume can only be created in location {:?}, got {:?}",
                        self.location, location
                    )));
                }
            }
        }

        let size = resolve_capacity(req.capacity_range.as_ref())
            .map_err(|err| Status::internal(err.message().to_string()))?;

        info!(size_gb = size / GB, "Creating volume");

        let existing = self
            .api
            .volume_by_name(&req.name)
            .await
            .map_err(|e| Status::internal(e.to_string()))?;

        if let Some(volume) = existing {
            let existing_bytes = volume.size * GB;
            if existing_bytes != size {
                return Err(Status::already_exists(format!(
                    "volume {:?} already exists with size {} bytes, requested {}",
                    req.name, existing_bytes, size
                )));
            }

            info!(volume_id = volume.id, "Volume already created");
            return Ok(Response::new(CreateVolumeResponse {
                volume: Some(PbVolume {
                    volume_id: volume.id.to_string(),
                    capacity_bytes: existing_bytes,
                    accessible_topology: Vec::new(),
                }),
            }));
        }

        if !supports_capabilities(&req.volume_capabilities) {
            return Err(Status::already_exists(
                "unsupported volume capabilities requested, only single-node writer attachments are available",
            ));
        }

        if size < MIN_VOLUME_SIZE {
            return Err(Status::out_of_range(format!(
                "requested volume size {} GB is below the supported minimum of {} GB",
                size / GB,
                MIN_VOLUME_SIZE / GB
            )));
        }

        self.check_volume_limit().await?;

        let created = self
            .api
            .create_volume(VolumeCreateOpts {
                name: req.name.clone(),
                size: size / GB,
                location: self.location.clone(),
                labels: HashMap::from([(
                    CREATED_BY_LABEL.to_string(),
                    CREATED_BY_VALUE.to_string(),
                )]),
            })
            .await
            .map_err(|e| Status::internal(e.to_string()))?;

        // The create action is not awaited; the volume is attachable as soon
        // as the API reports it.
        info!(volume_id = created.volume.id, "Volume created");

        Ok(Response::new(CreateVolumeResponse {
            volume: Some(PbVolume {
                volume_id: created.volume.id.to_string(),
                capacity_bytes: size,
                accessible_topology: vec![Topology {
                    segments: HashMap::from([(
                        LOCATION_SEGMENT.to_string(),
                        self.location.clone(),
                    )]),
                }],
            }),
        }))
    }

    #[instrument(skip(self, request), fields(volume_id = %request.get_ref().volume_id))]
    async fn delete_volume(
        &self,
        request: Request<DeleteVolumeRequest>,
    ) -> Result<Response<DeleteVolumeResponse>, Status> {
        let req = request.into_inner();

        if req.volume_id.is_empty() {
            return Err(Status::invalid_argument("volume id must be provided"));
        }

        info!("Deleting volume");

        // A malformed id cannot name a real volume, so there is nothing to
        // delete. This holds regardless of the lenient-id setting.
        let Ok(volume_id) = req.volume_id.parse::<i64>() else {
            info!("Volume id is not numeric, treating as already deleted");
            return Ok(Response::new(DeleteVolumeResponse {}));
        };

        match self.api.delete_volume(volume_id).await {
            Ok(()) => {}
            Err(err) if err.is_not_found() => {
                warn!("Volume not found, assuming it is already deleted");
            }
            Err(err) => return Err(Status::internal(err.to_string())),
        }

        info!("Volume deleted");
        Ok(Response::new(DeleteVolumeResponse {}))
    }

    #[instrument(
        skip(self, request),
        fields(
            volume_id = %request.get_ref().volume_id,
            node_id = %request.get_ref().node_id,
        )
    )]
    async fn controller_publish_volume(
        &self,
        request: Request<ControllerPublishVolumeRequest>,
    ) -> Result<Response<ControllerPublishVolumeResponse>, Status> {
        let req = request.into_inner();

        if req.volume_id.is_empty() {
            return Err(Status::invalid_argument("volume id must be provided"));
        }
        if req.node_id.is_empty() {
            return Err(Status::invalid_argument("node id must be provided"));
        }
        if req.volume_capability.is_none() {
            return Err(Status::invalid_argument(
                "volume capability must be provided",
            ));
        }
        if req.readonly {
            return Err(Status::already_exists("read-only volumes are not supported"));
        }

        let volume_id = self.resolve_id(&req.volume_id, "volume id")?;
        let server_id = self.resolve_id(&req.node_id, "node id")?;

        info!("Publishing volume");

        let volume = match self.api.volume_by_id(volume_id).await {
            Ok(volume) => volume,
            Err(_) => {
                return Err(Status::not_found(format!(
                    "volume {:?} not found",
                    req.volume_id
                )))
            }
        };
        let server = match self.api.server_by_id(server_id).await {
            Ok(server) => server,
            Err(_) => {
                return Err(Status::not_found(format!(
                    "server {:?} not found",
                    req.node_id
                )))
            }
        };

        match volume.server {
            Some(attached) if attached == server.id => {
                info!("Volume is already attached");
                return Ok(Response::new(ControllerPublishVolumeResponse::default()));
            }
            Some(attached) => {
                return Err(Status::failed_precondition(format!(
                    "volume is attached to server {}, detach it first",
                    attached
                )));
            }
            None => {}
        }

        let action = self
            .api
            .attach_volume(volume.id, server.id)
            .await
            .map_err(|e| {
                Status::aborted(format!(
                    "volume {} could not be attached to server {}: {}",
                    volume.id, server.id, e
                ))
            })?;

        if let Some(action) = action {
            info!(action_id = action.id, "Waiting until volume is attached");
            self.wait_for_action(volume.id, action.id).await?;
        }

        info!("Volume attached");
        Ok(Response::new(ControllerPublishVolumeResponse::default()))
    }

    #[instrument(
        skip(self, request),
        fields(
            volume_id = %request.get_ref().volume_id,
            node_id = %request.get_ref().node_id,
        )
    )]
    async fn controller_unpublish_volume(
        &self,
        request: Request<ControllerUnpublishVolumeRequest>,
    ) -> Result<Response<ControllerUnpublishVolumeResponse>, Status> {
        let req = request.into_inner();

        if req.volume_id.is_empty() {
            return Err(Status::invalid_argument("volume id must be provided"));
        }

        let volume_id = self.resolve_id(&req.volume_id, "volume id")?;
        let server_id = self.resolve_id(&req.node_id, "node id")?;

        info!("Unpublishing volume");

        let volume = match self.api.volume_by_id(volume_id).await {
            Ok(volume) => volume,
            Err(err) if err.is_not_found() => {
                info!("Volume not found, assuming it is already detached");
                return Ok(Response::new(ControllerUnpublishVolumeResponse {}));
            }
            Err(err) => return Err(Status::internal(err.to_string())),
        };

        match self.api.server_by_id(server_id).await {
            Ok(_) => {}
            Err(err) if err.is_not_found() => {
                return Err(Status::not_found(format!(
                    "server {:?} not found",
                    req.node_id
                )));
            }
            Err(err) => return Err(Status::internal(err.to_string())),
        }

        let action = self.api.detach_volume(volume.id).await.map_err(|e| {
            Status::aborted(format!(
                "volume {} could not be detached from server {}: {}",
                volume.id, server_id, e
            ))
        })?;

        if let Some(action) = action {
            info!(action_id = action.id, "Waiting until volume is detached");
            self.wait_for_action(volume.id, action.id).await?;
        }

        info!("Volume detached");
        Ok(Response::new(ControllerUnpublishVolumeResponse {}))
    }

    #[instrument(skip(self, request), fields(volume_id = %request.get_ref().volume_id))]
    async fn validate_volume_capabilities(
        &self,
        request: Request<ValidateVolumeCapabilitiesRequest>,
    ) -> Result<Response<ValidateVolumeCapabilitiesResponse>, Status> {
        let req = request.into_inner();

        if req.volume_id.is_empty() {
            return Err(Status::invalid_argument("volume id must be provided"));
        }
        if req.volume_capabilities.is_empty() {
            return Err(Status::invalid_argument(
                "volume capabilities must be provided",
            ));
        }

        let volume_id = self.resolve_id(&req.volume_id, "volume id")?;

        debug!("Validating volume capabilities");

        if self.api.volume_by_id(volume_id).await.is_err() {
            return Err(Status::not_found(format!(
                "volume {:?} not found",
                req.volume_id
            )));
        }

        // A location mismatch rules the volume out before capabilities are
        // even looked at.
        for topology in &req.accessible_topology {
            let Some(location) = topology.segments.get(LOCATION_SEGMENT) else {
                continue;
            };
            if location != &self.location {
                info!(supported = false, "Capabilities validated");
                return Ok(Response::new(ValidateVolumeCapabilitiesResponse {
                    supported: false,
                    message: String::new(),
                }));
            }
        }

        let supported = supports_capabilities(&req.volume_capabilities);
        info!(supported = supported, "Capabilities validated");
        Ok(Response::new(ValidateVolumeCapabilitiesResponse {
            supported,
            message: String::new(),
        }))
    }

    #[instrument(skip(self, request), fields(starting_token = %request.get_ref().starting_token))]
    async fn list_volumes(
        &self,
        request: Request<ListVolumesRequest>,
    ) -> Result<Response<ListVolumesResponse>, Status> {
        let req = request.into_inner();

        let page = if req.starting_token.is_empty() {
            0
        } else {
            req.starting_token.parse::<u32>().map_err(|_| {
                Status::invalid_argument(format!(
                    "starting token must be a page number, got {:?}",
                    req.starting_token
                ))
            })?
        };

        let mut opts = ListOpts {
            page,
            per_page: req.max_entries.max(0) as u32,
        };

        info!(page = opts.page, per_page = opts.per_page, "Listing volumes");

        // The whole collection is drained in one call; max_entries only
        // bounds the remote page size. The returned token is the page the
        // drain stopped at and cannot resume a partial listing. That is the
        // documented contract of this operation.
        let mut volumes = Vec::new();
        let mut last_page: u32 = 0;
        loop {
            let batch = self
                .api
                .list_volumes(opts)
                .await
                .map_err(|e| Status::internal(e.to_string()))?;
            volumes.extend(batch.volumes);

            let Some(meta) = batch.pagination else {
                break;
            };
            match meta.next_page {
                Some(next) if meta.last_page != Some(meta.page) => opts.page = next,
                _ => {
                    last_page = meta.page;
                    break;
                }
            }
        }

        let entries: Vec<list_volumes_response::Entry> = volumes
            .into_iter()
            .map(|volume| list_volumes_response::Entry {
                volume: Some(PbVolume {
                    volume_id: volume.id.to_string(),
                    capacity_bytes: volume.size * GB,
                    accessible_topology: Vec::new(),
                }),
            })
            .collect();

        debug!(count = entries.len(), "Volumes listed");

        Ok(Response::new(ListVolumesResponse {
            entries,
            next_token: last_page.to_string(),
        }))
    }

    #[instrument(skip(self, _request))]
    async fn get_capacity(
        &self,
        _request: Request<GetCapacityRequest>,
    ) -> Result<Response<GetCapacityResponse>, Status> {
        warn!("Capacity reporting is not implemented");
        Err(Status::unimplemented(""))
    }

    #[instrument(skip(self, _request))]
    async fn controller_get_capabilities(
        &self,
        _request: Request<ControllerGetCapabilitiesRequest>,
    ) -> Result<Response<ControllerGetCapabilitiesResponse>, Status> {
        let capabilities = [
            rpc::Type::CreateDeleteVolume,
            rpc::Type::PublishUnpublishVolume,
            rpc::Type::ListVolumes,
        ]
        .into_iter()
        .map(rpc_capability)
        .collect();

        debug!("Reporting controller capabilities");
        Ok(Response::new(ControllerGetCapabilitiesResponse {
            capabilities,
        }))
    }

    #[instrument(skip(self, _request))]
    async fn create_snapshot(
        &self,
        _request: Request<CreateSnapshotRequest>,
    ) -> Result<Response<CreateSnapshotResponse>, Status> {
        warn!("Snapshot creation is not implemented");
        Err(Status::unimplemented(""))
    }

    #[instrument(skip(self, _request))]
    async fn delete_snapshot(
        &self,
        _request: Request<DeleteSnapshotRequest>,
    ) -> Result<Response<DeleteSnapshotResponse>, Status> {
        warn!("Snapshot deletion is not implemented");
        Err(Status::unimplemented(""))
    }

    #[instrument(skip(self, _request))]
    async fn list_snapshots(
        &self,
        _request: Request<ListSnapshotsRequest>,
    ) -> Result<Response<ListSnapshotsResponse>, Status> {
        warn!("Snapshot listing is not implemented");
        Err(Status::unimplemented(""))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hcloud_csi_api::{CloudError, MockApi, Server, Volume};
    use hcloud_csi_proto::volume_capability::AccessMode;
    use hcloud_csi_proto::TopologyRequirement;
    use tonic::Code;

    fn service(api: &Arc<MockApi>) -> ControllerService {
        ControllerService::new(api.clone(), "fsn1")
    }

    fn fast_service(api: &Arc<MockApi>) -> ControllerService {
        service(api).with_action_polling(Duration::from_millis(5), Duration::from_millis(250))
    }

    fn capability(mode: access_mode::Mode) -> VolumeCapability {
        VolumeCapability {
            access_mode: Some(AccessMode { mode: mode as i32 }),
            access_type: None,
        }
    }

    fn rw_capability() -> VolumeCapability {
        capability(access_mode::Mode::SingleNodeWriter)
    }

    fn range(required: i64, limit: i64) -> CapacityRange {
        CapacityRange {
            required_bytes: required,
            limit_bytes: limit,
        }
    }

    fn api_volume(id: i64, name: &str, size_gb: i64) -> Volume {
        Volume {
            id,
            name: name.to_string(),
            size: size_gb,
            location: "fsn1".to_string(),
            server: None,
            labels: HashMap::new(),
        }
    }

    fn attached_volume(id: i64, name: &str, size_gb: i64, server: i64) -> Volume {
        Volume {
            server: Some(server),
            ..api_volume(id, name, size_gb)
        }
    }

    fn create_request(name: &str, required: i64, limit: i64) -> CreateVolumeRequest {
        CreateVolumeRequest {
            name: name.to_string(),
            capacity_range: Some(range(required, limit)),
            volume_capabilities: vec![rw_capability()],
            parameters: HashMap::new(),
            accessibility_requirements: None,
        }
    }

    fn publish_request(volume_id: &str, node_id: &str) -> ControllerPublishVolumeRequest {
        ControllerPublishVolumeRequest {
            volume_id: volume_id.to_string(),
            node_id: node_id.to_string(),
            volume_capability: Some(rw_capability()),
            readonly: false,
        }
    }

    fn unpublish_request(volume_id: &str, node_id: &str) -> ControllerUnpublishVolumeRequest {
        ControllerUnpublishVolumeRequest {
            volume_id: volume_id.to_string(),
            node_id: node_id.to_string(),
        }
    }

    fn requisite(location: &str) -> TopologyRequirement {
        TopologyRequirement {
            requisite: vec![Topology {
                segments: HashMap::from([(
                    LOCATION_SEGMENT.to_string(),
                    location.to_string(),
                )]),
            }],
            preferred: Vec::new(),
        }
    }

    // =========================================================================
    // Capacity resolution
    // =========================================================================

    #[test]
    fn test_resolve_capacity_defaults_without_range() {
        assert_eq!(resolve_capacity(None).unwrap(), DEFAULT_VOLUME_SIZE);
        assert_eq!(
            resolve_capacity(Some(&range(0, 0))).unwrap(),
            DEFAULT_VOLUME_SIZE
        );
    }

    #[test]
    fn test_resolve_capacity_takes_required_when_limit_unset() {
        assert_eq!(resolve_capacity(Some(&range(10 * GB, 0))).unwrap(), 10 * GB);
    }

    #[test]
    fn test_resolve_capacity_takes_exact_range() {
        assert_eq!(
            resolve_capacity(Some(&range(10 * GB, 10 * GB))).unwrap(),
            10 * GB
        );
    }

    #[test]
    fn test_resolve_capacity_rejects_diverging_bounds() {
        let err = resolve_capacity(Some(&range(5 * GB, 10 * GB))).unwrap_err();
        assert_eq!(err.code(), Code::InvalidArgument);
    }

    // =========================================================================
    // Capability validation
    // =========================================================================

    #[test]
    fn test_supports_capabilities_requires_every_entry_to_match() {
        assert!(supports_capabilities(&[rw_capability()]));
        assert!(supports_capabilities(&[rw_capability(), rw_capability()]));
        assert!(!supports_capabilities(&[
            rw_capability(),
            capability(access_mode::Mode::MultiNodeMultiWriter),
        ]));
        assert!(!supports_capabilities(&[capability(
            access_mode::Mode::SingleNodeReaderOnly
        )]));
    }

    #[test]
    fn test_supports_capabilities_rejects_empty_and_unset() {
        assert!(!supports_capabilities(&[]));
        assert!(!supports_capabilities(&[VolumeCapability {
            access_mode: None,
            access_type: None,
        }]));
    }

    // =========================================================================
    // CreateVolume
    // =========================================================================

    #[tokio::test]
    async fn test_create_volume_rejects_empty_name() {
        let api = Arc::new(MockApi::new());
        let err = service(&api)
            .create_volume(Request::new(create_request("", 10 * GB, 10 * GB)))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::InvalidArgument);
    }

    #[tokio::test]
    async fn test_create_volume_rejects_missing_capabilities() {
        let api = Arc::new(MockApi::new());
        let mut req = create_request("pvc-1", 10 * GB, 10 * GB);
        req.volume_capabilities.clear();

        let err = service(&api)
            .create_volume(Request::new(req))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::InvalidArgument);
    }

    #[tokio::test]
    async fn test_create_volume_rejects_foreign_location() {
        let api = Arc::new(MockApi::new());
        let mut req = create_request("pvc-1", 10 * GB, 10 * GB);
        req.accessibility_requirements = Some(requisite("nbg1"));

        let err = service(&api)
            .create_volume(Request::new(req))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::ResourceExhausted);
        assert_eq!(api.create_calls(), 0);
    }

    #[tokio::test]
    async fn test_create_volume_accepts_matching_location() {
        let api = Arc::new(MockApi::new());
        let mut req = create_request("pvc-1", 10 * GB, 10 * GB);
        req.accessibility_requirements = Some(requisite("fsn1"));

        assert!(service(&api).create_volume(Request::new(req)).await.is_ok());
        assert_eq!(api.create_calls(), 1);
    }

    #[tokio::test]
    async fn test_create_volume_surfaces_capacity_conflict_as_internal() {
        let api = Arc::new(MockApi::new());
        let err = service(&api)
            .create_volume(Request::new(create_request("pvc-1", 5 * GB, 10 * GB)))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::Internal);
        assert_eq!(api.create_calls(), 0);
    }

    #[tokio::test]
    async fn test_create_volume_provisions_with_location_and_label() {
        let api = Arc::new(MockApi::new());
        let resp = service(&api)
            .create_volume(Request::new(create_request("pvc-1", 10 * GB, 10 * GB)))
            .await
            .unwrap()
            .into_inner();

        let volume = resp.volume.unwrap();
        assert_eq!(volume.volume_id, "1");
        assert_eq!(volume.capacity_bytes, 10 * GB);
        assert_eq!(
            volume.accessible_topology[0].segments.get(LOCATION_SEGMENT),
            Some(&"fsn1".to_string())
        );

        let stored = api.volume(1).unwrap();
        assert_eq!(stored.size, 10);
        assert_eq!(stored.location, "fsn1");
        assert_eq!(
            stored.labels.get("createdBy"),
            Some(&"hcloud-csi-driver".to_string())
        );
    }

    #[tokio::test]
    async fn test_create_volume_defaults_size_without_range() {
        let api = Arc::new(MockApi::new());
        let mut req = create_request("pvc-1", 0, 0);
        req.capacity_range = None;

        let resp = service(&api)
            .create_volume(Request::new(req))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(resp.volume.unwrap().capacity_bytes, DEFAULT_VOLUME_SIZE);
        assert_eq!(api.volume(1).unwrap().size, 16);
    }

    #[tokio::test]
    async fn test_create_volume_is_idempotent_for_matching_size() {
        let api = Arc::new(MockApi::new().with_volume(api_volume(40, "pvc-1", 10)));
        let resp = service(&api)
            .create_volume(Request::new(create_request("pvc-1", 10 * GB, 10 * GB)))
            .await
            .unwrap()
            .into_inner();

        let volume = resp.volume.unwrap();
        assert_eq!(volume.volume_id, "40");
        assert_eq!(volume.capacity_bytes, 10 * GB);
        // The idempotent reply does not advertise topology.
        assert!(volume.accessible_topology.is_empty());
        assert_eq!(api.create_calls(), 0);
    }

    #[tokio::test]
    async fn test_create_volume_rejects_size_conflict_on_existing_name() {
        let api = Arc::new(MockApi::new().with_volume(api_volume(40, "pvc-1", 16)));
        let err = service(&api)
            .create_volume(Request::new(create_request("pvc-1", 10 * GB, 10 * GB)))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::AlreadyExists);
        assert_eq!(api.create_calls(), 0);
    }

    #[tokio::test]
    async fn test_create_volume_skips_capability_check_on_existing_name() {
        let api = Arc::new(MockApi::new().with_volume(api_volume(40, "pvc-1", 10)));
        let mut req = create_request("pvc-1", 10 * GB, 10 * GB);
        req.volume_capabilities = vec![capability(access_mode::Mode::MultiNodeMultiWriter)];

        // Matching name and size short-circuits before capabilities are
        // evaluated.
        assert!(service(&api).create_volume(Request::new(req)).await.is_ok());
    }

    #[tokio::test]
    async fn test_create_volume_rejects_unsupported_capabilities() {
        let api = Arc::new(MockApi::new());
        let mut req = create_request("pvc-1", 10 * GB, 10 * GB);
        req.volume_capabilities = vec![capability(access_mode::Mode::MultiNodeMultiWriter)];

        let err = service(&api)
            .create_volume(Request::new(req))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::AlreadyExists);
        assert_eq!(api.create_calls(), 0);
    }

    #[tokio::test]
    async fn test_create_volume_rejects_size_below_minimum() {
        let api = Arc::new(MockApi::new());
        let err = service(&api)
            .create_volume(Request::new(create_request("pvc-1", 5 * GB, 5 * GB)))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::OutOfRange);
        assert_eq!(api.create_calls(), 0);
    }

    #[tokio::test]
    async fn test_create_volume_surfaces_remote_failure_as_internal() {
        let api = Arc::new(MockApi::new().with_create_error(CloudError::Api {
            code: "limit_exceeded".to_string(),
            message: "volume limit reached".to_string(),
        }));
        let err = service(&api)
            .create_volume(Request::new(create_request("pvc-1", 10 * GB, 10 * GB)))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::Internal);
    }

    // =========================================================================
    // DeleteVolume
    // =========================================================================

    #[tokio::test]
    async fn test_delete_volume_rejects_empty_id() {
        let api = Arc::new(MockApi::new());
        let err = service(&api)
            .delete_volume(Request::new(DeleteVolumeRequest {
                volume_id: String::new(),
            }))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::InvalidArgument);
    }

    #[tokio::test]
    async fn test_delete_volume_treats_malformed_id_as_deleted() {
        let api = Arc::new(MockApi::new());
        assert!(service(&api)
            .delete_volume(Request::new(DeleteVolumeRequest {
                volume_id: "not-a-number".to_string(),
            }))
            .await
            .is_ok());
        assert_eq!(api.delete_calls(), 0);
    }

    #[tokio::test]
    async fn test_delete_volume_treats_missing_volume_as_deleted() {
        let api = Arc::new(MockApi::new());
        assert!(service(&api)
            .delete_volume(Request::new(DeleteVolumeRequest {
                volume_id: "99".to_string(),
            }))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_delete_volume_removes_existing_volume() {
        let api = Arc::new(MockApi::new().with_volume(api_volume(7, "pvc-1", 10)));
        assert!(service(&api)
            .delete_volume(Request::new(DeleteVolumeRequest {
                volume_id: "7".to_string(),
            }))
            .await
            .is_ok());
        assert!(api.volume(7).is_none());
    }

    #[tokio::test]
    async fn test_delete_volume_surfaces_other_remote_errors() {
        let api = Arc::new(MockApi::new().with_delete_error(CloudError::Api {
            code: "protected".to_string(),
            message: "volume is protected".to_string(),
        }));
        let err = service(&api)
            .delete_volume(Request::new(DeleteVolumeRequest {
                volume_id: "7".to_string(),
            }))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::Internal);
    }

    // =========================================================================
    // ControllerPublishVolume
    // =========================================================================

    #[tokio::test]
    async fn test_publish_rejects_missing_arguments() {
        let api = Arc::new(MockApi::new());
        let svc = service(&api);

        let err = svc
            .controller_publish_volume(Request::new(publish_request("", "7")))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::InvalidArgument);

        let err = svc
            .controller_publish_volume(Request::new(publish_request("1", "")))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::InvalidArgument);

        let mut req = publish_request("1", "7");
        req.volume_capability = None;
        let err = svc
            .controller_publish_volume(Request::new(req))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::InvalidArgument);
    }

    #[tokio::test]
    async fn test_publish_rejects_readonly_before_id_resolution() {
        let api = Arc::new(MockApi::new());
        let mut req = publish_request("not-a-number", "7");
        req.readonly = true;

        let err = service(&api)
            .controller_publish_volume(Request::new(req))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::AlreadyExists);
    }

    #[tokio::test]
    async fn test_publish_rejects_malformed_ids_by_default() {
        let api = Arc::new(MockApi::new());
        let err = service(&api)
            .controller_publish_volume(Request::new(publish_request("csi-test-vol", "7")))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::InvalidArgument);
    }

    #[tokio::test]
    async fn test_publish_substitutes_sentinel_in_lenient_mode() {
        let api = Arc::new(MockApi::new());
        let svc = service(&api).with_lenient_ids(true);

        // The sentinel names no real volume, so the lookup fails downstream
        // instead of the argument check failing upfront.
        let err = svc
            .controller_publish_volume(Request::new(publish_request("csi-test-vol", "7")))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::NotFound);
    }

    #[tokio::test]
    async fn test_publish_fails_for_missing_volume() {
        let api = Arc::new(MockApi::new().with_server(Server {
            id: 7,
            name: "node-7".to_string(),
        }));
        let err = service(&api)
            .controller_publish_volume(Request::new(publish_request("42", "7")))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::NotFound);
    }

    #[tokio::test]
    async fn test_publish_fails_for_missing_server() {
        let api = Arc::new(MockApi::new().with_volume(api_volume(1, "pvc-1", 10)));
        let err = service(&api)
            .controller_publish_volume(Request::new(publish_request("1", "7")))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::NotFound);
        assert_eq!(api.attach_calls(), 0);
    }

    #[tokio::test]
    async fn test_publish_is_idempotent_when_already_attached() {
        let api = Arc::new(
            MockApi::new()
                .with_volume(attached_volume(1, "pvc-1", 10, 7))
                .with_server(Server {
                    id: 7,
                    name: "node-7".to_string(),
                }),
        );
        assert!(service(&api)
            .controller_publish_volume(Request::new(publish_request("1", "7")))
            .await
            .is_ok());
        assert_eq!(api.attach_calls(), 0);
    }

    #[tokio::test]
    async fn test_publish_fails_when_attached_elsewhere() {
        let api = Arc::new(
            MockApi::new()
                .with_volume(attached_volume(1, "pvc-1", 10, 8))
                .with_server(Server {
                    id: 7,
                    name: "node-7".to_string(),
                }),
        );
        let err = service(&api)
            .controller_publish_volume(Request::new(publish_request("1", "7")))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::FailedPrecondition);
        assert_eq!(api.attach_calls(), 0);
    }

    #[tokio::test]
    async fn test_publish_attaches_and_completes_without_action() {
        let api = Arc::new(
            MockApi::new()
                .with_volume(api_volume(1, "pvc-1", 10))
                .with_server(Server {
                    id: 7,
                    name: "node-7".to_string(),
                }),
        );
        assert!(service(&api)
            .controller_publish_volume(Request::new(publish_request("1", "7")))
            .await
            .is_ok());
        assert_eq!(api.attach_calls(), 1);
        assert_eq!(api.volume(1).unwrap().server, Some(7));
    }

    #[tokio::test]
    async fn test_publish_waits_for_returned_action() {
        let api = Arc::new(
            MockApi::new()
                .with_volume(api_volume(1, "pvc-1", 10))
                .with_server(Server {
                    id: 7,
                    name: "node-7".to_string(),
                })
                .with_action_script(vec![
                    ActionStatus::Running,
                    ActionStatus::Running,
                    ActionStatus::Success,
                ]),
        );
        assert!(fast_service(&api)
            .controller_publish_volume(Request::new(publish_request("1", "7")))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_publish_retries_transient_poll_failures() {
        let api = Arc::new(
            MockApi::new()
                .with_volume(api_volume(1, "pvc-1", 10))
                .with_server(Server {
                    id: 7,
                    name: "node-7".to_string(),
                })
                .with_action_script(vec![ActionStatus::Running, ActionStatus::Success])
                .with_action_error(CloudError::Api {
                    code: "rate_limit_exceeded".to_string(),
                    message: "slow down".to_string(),
                }),
        );
        assert!(fast_service(&api)
            .controller_publish_volume(Request::new(publish_request("1", "7")))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_publish_times_out_on_action_stuck_running() {
        let api = Arc::new(
            MockApi::new()
                .with_volume(api_volume(1, "pvc-1", 10))
                .with_server(Server {
                    id: 7,
                    name: "node-7".to_string(),
                })
                .with_action_script(vec![ActionStatus::Running]),
        );
        let err = fast_service(&api)
            .controller_publish_volume(Request::new(publish_request("1", "7")))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::DeadlineExceeded);
        assert!(err.message().contains('1'));
    }

    #[tokio::test]
    async fn test_publish_surfaces_attach_failure_as_aborted() {
        let api = Arc::new(
            MockApi::new()
                .with_volume(api_volume(1, "pvc-1", 10))
                .with_server(Server {
                    id: 7,
                    name: "node-7".to_string(),
                })
                .with_attach_error(CloudError::Api {
                    code: "locked".to_string(),
                    message: "volume is locked".to_string(),
                }),
        );
        let err = service(&api)
            .controller_publish_volume(Request::new(publish_request("1", "7")))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::Aborted);
    }

    // =========================================================================
    // ControllerUnpublishVolume
    // =========================================================================

    #[tokio::test]
    async fn test_unpublish_rejects_empty_volume_id() {
        let api = Arc::new(MockApi::new());
        let err = service(&api)
            .controller_unpublish_volume(Request::new(unpublish_request("", "7")))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::InvalidArgument);
    }

    #[tokio::test]
    async fn test_unpublish_rejects_malformed_ids_by_default() {
        let api = Arc::new(MockApi::new());
        let err = service(&api)
            .controller_unpublish_volume(Request::new(unpublish_request("csi-test-vol", "7")))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::InvalidArgument);
    }

    #[tokio::test]
    async fn test_unpublish_substitutes_sentinel_in_lenient_mode() {
        let api = Arc::new(MockApi::new());
        let svc = service(&api).with_lenient_ids(true);

        // The sentinel names no real volume, so the detach collapses into
        // the already-detached idempotent success.
        assert!(svc
            .controller_unpublish_volume(Request::new(unpublish_request("csi-test-vol", "7")))
            .await
            .is_ok());
        assert_eq!(api.detach_calls(), 0);
    }

    #[tokio::test]
    async fn test_unpublish_is_idempotent_for_missing_volume() {
        let api = Arc::new(MockApi::new());
        assert!(service(&api)
            .controller_unpublish_volume(Request::new(unpublish_request("42", "7")))
            .await
            .is_ok());
        assert_eq!(api.detach_calls(), 0);
    }

    #[tokio::test]
    async fn test_unpublish_fails_for_missing_server() {
        let api = Arc::new(MockApi::new().with_volume(attached_volume(1, "pvc-1", 10, 7)));
        let err = service(&api)
            .controller_unpublish_volume(Request::new(unpublish_request("1", "7")))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::NotFound);
        assert_eq!(api.detach_calls(), 0);
    }

    #[tokio::test]
    async fn test_unpublish_detaches_volume() {
        let api = Arc::new(
            MockApi::new()
                .with_volume(attached_volume(1, "pvc-1", 10, 7))
                .with_server(Server {
                    id: 7,
                    name: "node-7".to_string(),
                }),
        );
        assert!(service(&api)
            .controller_unpublish_volume(Request::new(unpublish_request("1", "7")))
            .await
            .is_ok());
        assert_eq!(api.detach_calls(), 1);
        assert_eq!(api.volume(1).unwrap().server, None);
    }

    #[tokio::test]
    async fn test_unpublish_surfaces_detach_failure_as_aborted() {
        let api = Arc::new(
            MockApi::new()
                .with_volume(attached_volume(1, "pvc-1", 10, 7))
                .with_server(Server {
                    id: 7,
                    name: "node-7".to_string(),
                })
                .with_detach_error(CloudError::Api {
                    code: "locked".to_string(),
                    message: "volume is locked".to_string(),
                }),
        );
        let err = service(&api)
            .controller_unpublish_volume(Request::new(unpublish_request("1", "7")))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::Aborted);
    }

    // =========================================================================
    // ValidateVolumeCapabilities
    // =========================================================================

    fn validate_request(volume_id: &str) -> ValidateVolumeCapabilitiesRequest {
        ValidateVolumeCapabilitiesRequest {
            volume_id: volume_id.to_string(),
            volume_capabilities: vec![rw_capability()],
            accessible_topology: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_validate_rejects_missing_arguments() {
        let api = Arc::new(MockApi::new());
        let svc = service(&api);

        let err = svc
            .validate_volume_capabilities(Request::new(validate_request("")))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::InvalidArgument);

        let mut req = validate_request("1");
        req.volume_capabilities.clear();
        let err = svc
            .validate_volume_capabilities(Request::new(req))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::InvalidArgument);
    }

    #[tokio::test]
    async fn test_validate_rejects_malformed_id_by_default() {
        let api = Arc::new(MockApi::new());
        let err = service(&api)
            .validate_volume_capabilities(Request::new(validate_request("csi-test-vol")))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::InvalidArgument);
    }

    #[tokio::test]
    async fn test_validate_substitutes_sentinel_in_lenient_mode() {
        let api = Arc::new(MockApi::new());
        let svc = service(&api).with_lenient_ids(true);

        // The sentinel names no real volume, so the lookup fails downstream
        // instead of the argument check failing upfront.
        let err = svc
            .validate_volume_capabilities(Request::new(validate_request("csi-test-vol")))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::NotFound);
    }

    #[tokio::test]
    async fn test_validate_fails_for_missing_volume() {
        let api = Arc::new(MockApi::new());
        let err = service(&api)
            .validate_volume_capabilities(Request::new(validate_request("42")))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::NotFound);
    }

    #[tokio::test]
    async fn test_validate_short_circuits_on_foreign_location() {
        let api = Arc::new(MockApi::new().with_volume(api_volume(1, "pvc-1", 10)));
        let mut req = validate_request("1");
        req.accessible_topology = vec![Topology {
            segments: HashMap::from([(LOCATION_SEGMENT.to_string(), "nbg1".to_string())]),
        }];

        // Capabilities are valid; the location mismatch alone decides.
        let resp = service(&api)
            .validate_volume_capabilities(Request::new(req))
            .await
            .unwrap()
            .into_inner();
        assert!(!resp.supported);
    }

    #[tokio::test]
    async fn test_validate_accepts_matching_location_and_mode() {
        let api = Arc::new(MockApi::new().with_volume(api_volume(1, "pvc-1", 10)));
        let mut req = validate_request("1");
        req.accessible_topology = vec![Topology {
            segments: HashMap::from([(LOCATION_SEGMENT.to_string(), "fsn1".to_string())]),
        }];

        let resp = service(&api)
            .validate_volume_capabilities(Request::new(req))
            .await
            .unwrap()
            .into_inner();
        assert!(resp.supported);
    }

    #[tokio::test]
    async fn test_validate_reports_unsupported_modes() {
        let api = Arc::new(MockApi::new().with_volume(api_volume(1, "pvc-1", 10)));
        let mut req = validate_request("1");
        req.volume_capabilities = vec![capability(access_mode::Mode::MultiNodeReaderOnly)];

        let resp = service(&api)
            .validate_volume_capabilities(Request::new(req))
            .await
            .unwrap()
            .into_inner();
        assert!(!resp.supported);
    }

    // =========================================================================
    // ListVolumes
    // =========================================================================

    #[tokio::test]
    async fn test_list_volumes_rejects_malformed_token() {
        let api = Arc::new(MockApi::new());
        let err = service(&api)
            .list_volumes(Request::new(ListVolumesRequest {
                max_entries: 0,
                starting_token: "not-a-page".to_string(),
            }))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::InvalidArgument);
    }

    #[tokio::test]
    async fn test_list_volumes_drains_every_page() {
        let mut seeded = MockApi::new();
        for id in 1..=5 {
            seeded = seeded.with_volume(api_volume(id, &format!("vol-{id}"), 10));
        }
        let api = Arc::new(seeded);

        let resp = service(&api)
            .list_volumes(Request::new(ListVolumesRequest {
                max_entries: 2,
                starting_token: String::new(),
            }))
            .await
            .unwrap()
            .into_inner();

        // max_entries bounds the page size, not the response.
        assert_eq!(resp.entries.len(), 5);
        assert_eq!(resp.next_token, "3");

        let first = resp.entries[0].volume.as_ref().unwrap();
        assert_eq!(first.volume_id, "1");
        assert_eq!(first.capacity_bytes, 10 * GB);
    }

    #[tokio::test]
    async fn test_list_volumes_resumes_from_token_page() {
        let mut seeded = MockApi::new();
        for id in 1..=5 {
            seeded = seeded.with_volume(api_volume(id, &format!("vol-{id}"), 10));
        }
        let api = Arc::new(seeded);

        let resp = service(&api)
            .list_volumes(Request::new(ListVolumesRequest {
                max_entries: 2,
                starting_token: "2".to_string(),
            }))
            .await
            .unwrap()
            .into_inner();

        assert_eq!(resp.entries.len(), 3);
        assert_eq!(resp.entries[0].volume.as_ref().unwrap().volume_id, "3");
        assert_eq!(resp.next_token, "3");
    }

    #[tokio::test]
    async fn test_list_volumes_handles_empty_listing() {
        let api = Arc::new(MockApi::new());
        let resp = service(&api)
            .list_volumes(Request::new(ListVolumesRequest {
                max_entries: 0,
                starting_token: String::new(),
            }))
            .await
            .unwrap()
            .into_inner();

        assert!(resp.entries.is_empty());
        assert_eq!(resp.next_token, "1");
    }

    // =========================================================================
    // Stubs and capabilities
    // =========================================================================

    #[tokio::test]
    async fn test_get_capacity_is_unimplemented() {
        let api = Arc::new(MockApi::new());
        let err = service(&api)
            .get_capacity(Request::new(GetCapacityRequest::default()))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::Unimplemented);
        assert!(err.message().is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_operations_are_unimplemented() {
        let api = Arc::new(MockApi::new());
        let svc = service(&api);

        let err = svc
            .create_snapshot(Request::new(CreateSnapshotRequest::default()))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::Unimplemented);

        let err = svc
            .delete_snapshot(Request::new(DeleteSnapshotRequest::default()))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::Unimplemented);

        let err = svc
            .list_snapshots(Request::new(ListSnapshotsRequest::default()))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::Unimplemented);
    }

    #[tokio::test]
    async fn test_capabilities_cover_volume_lifecycle_only() {
        let api = Arc::new(MockApi::new());
        let resp = service(&api)
            .controller_get_capabilities(Request::new(ControllerGetCapabilitiesRequest {}))
            .await
            .unwrap()
            .into_inner();

        let types: Vec<rpc::Type> = resp
            .capabilities
            .iter()
            .filter_map(|cap| match &cap.r#type {
                Some(controller_service_capability::Type::Rpc(rpc)) => Some(rpc.r#type()),
                None => None,
            })
            .collect();
        assert_eq!(
            types,
            vec![
                rpc::Type::CreateDeleteVolume,
                rpc::Type::PublishUnpublishVolume,
                rpc::Type::ListVolumes,
            ]
        );
    }
}
