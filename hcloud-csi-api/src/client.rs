//! HTTP client for the cloud volume API.

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use crate::api::{ListOpts, VolumeApi, VolumeCreateOpts, VolumeCreated, VolumePage};
use crate::error::{CloudError, Result};
use crate::types::{Action, Pagination, Server, Volume};

/// Default public API endpoint.
pub const DEFAULT_API_URL: &str = "https://api.hetzner.cloud/v1";

/// Client for the cloud volume API.
///
/// Every request carries the account token as a bearer header; bodies are
/// JSON in both directions. A 404 response or a `not_found` error code maps
/// to [`CloudError::NotFound`] so callers can drive idempotency decisions;
/// other remote rejections surface their error envelope unchanged.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl ApiClient {
    /// Create a new client against `base_url`, authenticating with `token`.
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.base_url, path))
            .bearer_auth(&self.token)
    }

    async fn send_json<T: DeserializeOwned>(req: reqwest::RequestBuilder) -> Result<T> {
        let resp = req.send().await?;
        if !resp.status().is_success() {
            return Err(Self::into_error(resp).await);
        }
        Ok(resp.json::<T>().await?)
    }

    async fn into_error(resp: reqwest::Response) -> CloudError {
        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return CloudError::NotFound;
        }
        match resp.json::<ErrorResponse>().await {
            Ok(body) if body.error.code == "not_found" => CloudError::NotFound,
            Ok(body) => CloudError::Api {
                code: body.error.code,
                message: body.error.message,
            },
            Err(_) => CloudError::Decode(format!("HTTP {} with undecodable error body", status)),
        }
    }
}

#[async_trait]
impl VolumeApi for ApiClient {
    async fn volume_by_name(&self, name: &str) -> Result<Option<Volume>> {
        let resp: VolumesResponse =
            Self::send_json(self.request(Method::GET, "/volumes").query(&[("name", name)]))
                .await?;
        Ok(resp.volumes.into_iter().next().map(Volume::from))
    }

    async fn volume_by_id(&self, id: i64) -> Result<Volume> {
        let resp: VolumeResponse =
            Self::send_json(self.request(Method::GET, &format!("/volumes/{}", id))).await?;
        Ok(resp.volume.into())
    }

    async fn create_volume(&self, opts: VolumeCreateOpts) -> Result<VolumeCreated> {
        debug!(
            name = %opts.name,
            size_gb = opts.size,
            location = %opts.location,
            "Creating volume"
        );

        let body = CreateVolumeBody {
            name: &opts.name,
            size: opts.size,
            location: &opts.location,
            labels: &opts.labels,
        };
        let resp: VolumeCreatedResponse =
            Self::send_json(self.request(Method::POST, "/volumes").json(&body)).await?;

        Ok(VolumeCreated {
            volume: resp.volume.into(),
            action: resp.action,
        })
    }

    async fn delete_volume(&self, id: i64) -> Result<()> {
        debug!(volume_id = id, "Deleting volume");

        let resp = self
            .request(Method::DELETE, &format!("/volumes/{}", id))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(Self::into_error(resp).await);
        }
        Ok(())
    }

    async fn attach_volume(&self, volume_id: i64, server_id: i64) -> Result<Option<Action>> {
        debug!(volume_id = volume_id, server_id = server_id, "Attaching volume");

        let resp: ActionResponse = Self::send_json(
            self.request(Method::POST, &format!("/volumes/{}/actions/attach", volume_id))
                .json(&AttachVolumeBody { server: server_id }),
        )
        .await?;
        Ok(Some(resp.action))
    }

    async fn detach_volume(&self, volume_id: i64) -> Result<Option<Action>> {
        debug!(volume_id = volume_id, "Detaching volume");

        let resp: ActionResponse = Self::send_json(
            self.request(Method::POST, &format!("/volumes/{}/actions/detach", volume_id))
                .json(&DetachVolumeBody {}),
        )
        .await?;
        Ok(Some(resp.action))
    }

    async fn list_volumes(&self, opts: ListOpts) -> Result<VolumePage> {
        let mut query: Vec<(&str, String)> = Vec::new();
        if opts.page > 0 {
            query.push(("page", opts.page.to_string()));
        }
        if opts.per_page > 0 {
            query.push(("per_page", opts.per_page.to_string()));
        }

        let resp: VolumesResponse =
            Self::send_json(self.request(Method::GET, "/volumes").query(&query)).await?;
        Ok(VolumePage {
            volumes: resp.volumes.into_iter().map(Volume::from).collect(),
            pagination: resp.meta.and_then(|m| m.pagination),
        })
    }

    async fn server_by_id(&self, id: i64) -> Result<Server> {
        let resp: ServerResponse =
            Self::send_json(self.request(Method::GET, &format!("/servers/{}", id))).await?;
        Ok(resp.server)
    }

    async fn action_by_id(&self, id: i64) -> Result<Action> {
        let resp: ActionResponse =
            Self::send_json(self.request(Method::GET, &format!("/actions/{}", id))).await?;
        Ok(resp.action)
    }
}

// =============================================================================
// Wire schemas
// =============================================================================
// The remote API nests the location as an object and wraps every response in
// a resource-named envelope; these structs mirror that shape and convert
// into the flat domain types.

#[derive(Debug, Deserialize)]
struct VolumeSchema {
    id: i64,
    name: String,
    size: i64,
    location: LocationSchema,
    server: Option<i64>,
    #[serde(default)]
    labels: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct LocationSchema {
    name: String,
}

impl From<VolumeSchema> for Volume {
    fn from(schema: VolumeSchema) -> Self {
        Volume {
            id: schema.id,
            name: schema.name,
            size: schema.size,
            location: schema.location.name,
            server: schema.server,
            labels: schema.labels,
        }
    }
}

#[derive(Debug, Deserialize)]
struct VolumesResponse {
    volumes: Vec<VolumeSchema>,
    meta: Option<MetaSchema>,
}

#[derive(Debug, Deserialize)]
struct MetaSchema {
    pagination: Option<Pagination>,
}

#[derive(Debug, Deserialize)]
struct VolumeResponse {
    volume: VolumeSchema,
}

#[derive(Debug, Deserialize)]
struct VolumeCreatedResponse {
    volume: VolumeSchema,
    action: Option<Action>,
}

#[derive(Debug, Deserialize)]
struct ActionResponse {
    action: Action,
}

#[derive(Debug, Deserialize)]
struct ServerResponse {
    server: Server,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ApiErrorSchema,
}

#[derive(Debug, Deserialize)]
struct ApiErrorSchema {
    code: String,
    message: String,
}

#[derive(Debug, Serialize)]
struct CreateVolumeBody<'a> {
    name: &'a str,
    size: i64,
    location: &'a str,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    labels: &'a HashMap<String, String>,
}

#[derive(Debug, Serialize)]
struct AttachVolumeBody {
    server: i64,
}

#[derive(Debug, Serialize)]
struct DetachVolumeBody {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ActionStatus;
    use serde_json::json;

    #[test]
    fn test_volume_schema_flattens_location() {
        let schema: VolumeSchema = serde_json::from_value(json!({
            "id": 42,
            "name": "pvc-1",
            "size": 10,
            "location": {"id": 1, "name": "fsn1", "country": "DE"},
            "server": 7,
            "labels": {"createdBy": "hcloud-csi-driver"}
        }))
        .unwrap();

        let volume = Volume::from(schema);
        assert_eq!(volume.id, 42);
        assert_eq!(volume.location, "fsn1");
        assert_eq!(volume.server, Some(7));
        assert_eq!(volume.labels.get("createdBy").unwrap(), "hcloud-csi-driver");
    }

    #[test]
    fn test_volume_schema_defaults_labels() {
        let schema: VolumeSchema = serde_json::from_value(json!({
            "id": 1,
            "name": "plain",
            "size": 16,
            "location": {"name": "nbg1"},
            "server": null
        }))
        .unwrap();

        assert!(schema.labels.is_empty());
        assert!(schema.server.is_none());
    }

    #[test]
    fn test_action_decodes_lowercase_status() {
        let action: Action = serde_json::from_value(json!({
            "id": 13,
            "command": "attach_volume",
            "status": "running",
            "error": null
        }))
        .unwrap();

        assert_eq!(action.status, ActionStatus::Running);
        assert!(action.error.is_none());
    }

    #[test]
    fn test_action_decodes_error_details() {
        let action: Action = serde_json::from_value(json!({
            "id": 14,
            "status": "error",
            "error": {"code": "action_failed", "message": "attach failed"}
        }))
        .unwrap();

        assert_eq!(action.status, ActionStatus::Error);
        assert_eq!(action.error.unwrap().code, "action_failed");
    }

    #[test]
    fn test_error_envelope_decodes() {
        let resp: ErrorResponse = serde_json::from_value(json!({
            "error": {"code": "uniqueness_error", "message": "volume name already used"}
        }))
        .unwrap();

        assert_eq!(resp.error.code, "uniqueness_error");
    }

    #[test]
    fn test_trailing_slash_is_trimmed() {
        let client = ApiClient::new("https://api.example.com/v1/", "secret");
        assert_eq!(client.base_url, "https://api.example.com/v1");
    }
}
