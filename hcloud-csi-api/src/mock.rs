//! In-memory mock backend for tests.
//!
//! [`MockApi`] keeps volumes and servers in hash maps behind `RwLock`s and
//! hands out scripted results where the real API would be asynchronous:
//! attach and detach consume pre-seeded action scripts, and each poll of an
//! action steps through its remaining statuses, repeating the final one.
//! Error queues let a test fail exactly one upcoming call per operation.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::RwLock;

use crate::api::{ListOpts, VolumeApi, VolumeCreateOpts, VolumeCreated, VolumePage};
use crate::error::{CloudError, Result};
use crate::types::{Action, ActionError, ActionStatus, Pagination, Server, Volume};

const DEFAULT_PER_PAGE: u32 = 25;

/// Scriptable in-memory implementation of [`VolumeApi`].
#[derive(Default)]
pub struct MockApi {
    volumes: RwLock<HashMap<i64, Volume>>,
    servers: RwLock<HashMap<i64, Server>>,
    /// Statuses still pending per allocated action id.
    actions: RwLock<HashMap<i64, VecDeque<ActionStatus>>>,
    /// Scripts handed out to the next attach/detach calls, oldest first.
    action_scripts: RwLock<VecDeque<Vec<ActionStatus>>>,
    create_errors: RwLock<VecDeque<CloudError>>,
    delete_errors: RwLock<VecDeque<CloudError>>,
    attach_errors: RwLock<VecDeque<CloudError>>,
    detach_errors: RwLock<VecDeque<CloudError>>,
    action_errors: RwLock<VecDeque<CloudError>>,
    next_id: AtomicI64,
    next_action_id: AtomicI64,
    create_calls: AtomicUsize,
    delete_calls: AtomicUsize,
    attach_calls: AtomicUsize,
    detach_calls: AtomicUsize,
}

impl MockApi {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(1),
            next_action_id: AtomicI64::new(9001),
            ..Self::default()
        }
    }

    /// Seed a volume. Ids above the seeded one keep being allocated fresh.
    pub fn with_volume(self, volume: Volume) -> Self {
        self.next_id.fetch_max(volume.id + 1, Ordering::SeqCst);
        if let Ok(mut volumes) = self.volumes.write() {
            volumes.insert(volume.id, volume);
        }
        self
    }

    pub fn with_server(self, server: Server) -> Self {
        if let Ok(mut servers) = self.servers.write() {
            servers.insert(server.id, server);
        }
        self
    }

    /// Queue the status sequence the next attach or detach hands out.
    ///
    /// The first status is reported on the action itself; later polls step
    /// through the rest and repeat the final status indefinitely. Without a
    /// queued script the call reports no action at all.
    pub fn with_action_script(self, script: Vec<ActionStatus>) -> Self {
        if let Ok(mut scripts) = self.action_scripts.write() {
            scripts.push_back(script);
        }
        self
    }

    pub fn with_create_error(self, error: CloudError) -> Self {
        if let Ok(mut errors) = self.create_errors.write() {
            errors.push_back(error);
        }
        self
    }

    pub fn with_delete_error(self, error: CloudError) -> Self {
        if let Ok(mut errors) = self.delete_errors.write() {
            errors.push_back(error);
        }
        self
    }

    pub fn with_attach_error(self, error: CloudError) -> Self {
        if let Ok(mut errors) = self.attach_errors.write() {
            errors.push_back(error);
        }
        self
    }

    pub fn with_detach_error(self, error: CloudError) -> Self {
        if let Ok(mut errors) = self.detach_errors.write() {
            errors.push_back(error);
        }
        self
    }

    /// Queue an error for the next action poll.
    pub fn with_action_error(self, error: CloudError) -> Self {
        if let Ok(mut errors) = self.action_errors.write() {
            errors.push_back(error);
        }
        self
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    pub fn attach_calls(&self) -> usize {
        self.attach_calls.load(Ordering::SeqCst)
    }

    pub fn detach_calls(&self) -> usize {
        self.detach_calls.load(Ordering::SeqCst)
    }

    /// Current state of a volume, if present.
    pub fn volume(&self, id: i64) -> Option<Volume> {
        self.volumes.read().ok()?.get(&id).cloned()
    }

    fn pop_error(queue: &RwLock<VecDeque<CloudError>>) -> Result<()> {
        let mut queue = queue
            .write()
            .map_err(|_| CloudError::Internal("Lock poisoned".to_string()))?;
        match queue.pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn begin_action(&self) -> Result<Option<Action>> {
        let script = {
            let mut scripts = self
                .action_scripts
                .write()
                .map_err(|_| CloudError::Internal("Lock poisoned".to_string()))?;
            scripts.pop_front()
        };
        let Some(script) = script else {
            return Ok(None);
        };

        let id = self.next_action_id.fetch_add(1, Ordering::SeqCst);
        let mut statuses: VecDeque<ActionStatus> = script.into();
        let first = statuses.pop_front().unwrap_or(ActionStatus::Success);
        if statuses.is_empty() {
            statuses.push_back(first);
        }

        let mut actions = self
            .actions
            .write()
            .map_err(|_| CloudError::Internal("Lock poisoned".to_string()))?;
        actions.insert(id, statuses);
        Ok(Some(action_with_status(id, first)))
    }
}

fn action_with_status(id: i64, status: ActionStatus) -> Action {
    let error = match status {
        ActionStatus::Error => Some(ActionError {
            code: "action_failed".to_string(),
            message: "scripted action failure".to_string(),
        }),
        _ => None,
    };
    Action { id, status, error }
}

#[async_trait]
impl VolumeApi for MockApi {
    async fn volume_by_name(&self, name: &str) -> Result<Option<Volume>> {
        let volumes = self
            .volumes
            .read()
            .map_err(|_| CloudError::Internal("Lock poisoned".to_string()))?;
        Ok(volumes.values().find(|v| v.name == name).cloned())
    }

    async fn volume_by_id(&self, id: i64) -> Result<Volume> {
        let volumes = self
            .volumes
            .read()
            .map_err(|_| CloudError::Internal("Lock poisoned".to_string()))?;
        volumes.get(&id).cloned().ok_or(CloudError::NotFound)
    }

    async fn create_volume(&self, opts: VolumeCreateOpts) -> Result<VolumeCreated> {
        Self::pop_error(&self.create_errors)?;
        self.create_calls.fetch_add(1, Ordering::SeqCst);

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let volume = Volume {
            id,
            name: opts.name,
            size: opts.size,
            location: opts.location,
            server: None,
            labels: opts.labels,
        };

        let mut volumes = self
            .volumes
            .write()
            .map_err(|_| CloudError::Internal("Lock poisoned".to_string()))?;
        volumes.insert(id, volume.clone());
        Ok(VolumeCreated {
            volume,
            action: None,
        })
    }

    async fn delete_volume(&self, id: i64) -> Result<()> {
        Self::pop_error(&self.delete_errors)?;
        self.delete_calls.fetch_add(1, Ordering::SeqCst);

        let mut volumes = self
            .volumes
            .write()
            .map_err(|_| CloudError::Internal("Lock poisoned".to_string()))?;
        match volumes.remove(&id) {
            Some(_) => Ok(()),
            None => Err(CloudError::NotFound),
        }
    }

    async fn attach_volume(&self, volume_id: i64, server_id: i64) -> Result<Option<Action>> {
        Self::pop_error(&self.attach_errors)?;
        self.attach_calls.fetch_add(1, Ordering::SeqCst);

        {
            let mut volumes = self
                .volumes
                .write()
                .map_err(|_| CloudError::Internal("Lock poisoned".to_string()))?;
            let volume = volumes.get_mut(&volume_id).ok_or(CloudError::NotFound)?;
            volume.server = Some(server_id);
        }
        self.begin_action()
    }

    async fn detach_volume(&self, volume_id: i64) -> Result<Option<Action>> {
        Self::pop_error(&self.detach_errors)?;
        self.detach_calls.fetch_add(1, Ordering::SeqCst);

        {
            let mut volumes = self
                .volumes
                .write()
                .map_err(|_| CloudError::Internal("Lock poisoned".to_string()))?;
            let volume = volumes.get_mut(&volume_id).ok_or(CloudError::NotFound)?;
            volume.server = None;
        }
        self.begin_action()
    }

    async fn list_volumes(&self, opts: ListOpts) -> Result<VolumePage> {
        let volumes = self
            .volumes
            .read()
            .map_err(|_| CloudError::Internal("Lock poisoned".to_string()))?;

        let mut all: Vec<Volume> = volumes.values().cloned().collect();
        all.sort_by_key(|v| v.id);

        let page = opts.page.max(1);
        let per_page = if opts.per_page == 0 {
            DEFAULT_PER_PAGE
        } else {
            opts.per_page
        };
        let total = all.len() as u32;
        let last_page = ((total + per_page - 1) / per_page).max(1);
        let start = ((page - 1) * per_page) as usize;

        let items: Vec<Volume> = all
            .into_iter()
            .skip(start)
            .take(per_page as usize)
            .collect();
        let next_page = if page < last_page { Some(page + 1) } else { None };

        Ok(VolumePage {
            volumes: items,
            pagination: Some(Pagination {
                page,
                per_page,
                next_page,
                last_page: Some(last_page),
                total_entries: Some(total),
            }),
        })
    }

    async fn server_by_id(&self, id: i64) -> Result<Server> {
        let servers = self
            .servers
            .read()
            .map_err(|_| CloudError::Internal("Lock poisoned".to_string()))?;
        servers.get(&id).cloned().ok_or(CloudError::NotFound)
    }

    async fn action_by_id(&self, id: i64) -> Result<Action> {
        Self::pop_error(&self.action_errors)?;

        let mut actions = self
            .actions
            .write()
            .map_err(|_| CloudError::Internal("Lock poisoned".to_string()))?;
        let statuses = actions.get_mut(&id).ok_or(CloudError::NotFound)?;
        let status = if statuses.len() > 1 {
            statuses.pop_front().unwrap_or(ActionStatus::Success)
        } else {
            statuses.front().copied().unwrap_or(ActionStatus::Success)
        };
        Ok(action_with_status(id, status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn volume(id: i64, name: &str, size: i64) -> Volume {
        Volume {
            id,
            name: name.to_string(),
            size,
            location: "fsn1".to_string(),
            server: None,
            labels: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn test_create_allocates_past_seeded_ids() {
        let api = MockApi::new().with_volume(volume(40, "seeded", 10));

        let created = api
            .create_volume(VolumeCreateOpts {
                name: "fresh".to_string(),
                size: 16,
                location: "fsn1".to_string(),
                labels: HashMap::new(),
            })
            .await
            .unwrap();

        assert_eq!(created.volume.id, 41);
        assert_eq!(api.create_calls(), 1);
        assert!(api.volume_by_name("seeded").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_attach_consumes_script_and_polls_step_through() {
        let api = MockApi::new()
            .with_volume(volume(1, "data", 10))
            .with_action_script(vec![
                ActionStatus::Running,
                ActionStatus::Running,
                ActionStatus::Success,
            ]);

        let action = api.attach_volume(1, 7).await.unwrap().unwrap();
        assert_eq!(action.status, ActionStatus::Running);
        assert_eq!(api.volume(1).unwrap().server, Some(7));

        assert_eq!(
            api.action_by_id(action.id).await.unwrap().status,
            ActionStatus::Running
        );
        assert_eq!(
            api.action_by_id(action.id).await.unwrap().status,
            ActionStatus::Success
        );
        // Terminal status keeps repeating.
        assert_eq!(
            api.action_by_id(action.id).await.unwrap().status,
            ActionStatus::Success
        );
    }

    #[tokio::test]
    async fn test_detach_without_script_reports_no_action() {
        let api = MockApi::new().with_volume(Volume {
            server: Some(3),
            ..volume(1, "data", 10)
        });

        let action = api.detach_volume(1).await.unwrap();
        assert!(action.is_none());
        assert_eq!(api.volume(1).unwrap().server, None);
    }

    #[tokio::test]
    async fn test_scripted_error_fails_only_next_call() {
        let api = MockApi::new().with_volume(volume(1, "data", 10)).with_attach_error(
            CloudError::Api {
                code: "locked".to_string(),
                message: "volume is locked".to_string(),
            },
        );

        let err = api.attach_volume(1, 7).await.unwrap_err();
        assert!(matches!(err, CloudError::Api { .. }));
        assert!(api.attach_volume(1, 7).await.is_ok());
    }

    #[tokio::test]
    async fn test_list_volumes_paginates() {
        let mut api = MockApi::new();
        for id in 1..=5 {
            api = api.with_volume(volume(id, &format!("vol-{id}"), 10));
        }

        let page = api
            .list_volumes(ListOpts { page: 1, per_page: 2 })
            .await
            .unwrap();
        assert_eq!(page.volumes.len(), 2);
        let pagination = page.pagination.unwrap();
        assert_eq!(pagination.next_page, Some(2));
        assert_eq!(pagination.last_page, Some(3));
        assert_eq!(pagination.total_entries, Some(5));

        let last = api
            .list_volumes(ListOpts { page: 3, per_page: 2 })
            .await
            .unwrap();
        assert_eq!(last.volumes.len(), 1);
        assert_eq!(last.pagination.unwrap().next_page, None);
    }

    #[tokio::test]
    async fn test_delete_missing_volume_is_not_found() {
        let api = MockApi::new();
        assert!(api.delete_volume(99).await.unwrap_err().is_not_found());
    }
}
