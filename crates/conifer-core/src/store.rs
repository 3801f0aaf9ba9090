//! The configuration store: reads, validated writes, and reverts.
//!
//! Exactly one live [`Settings`] document exists. Reads before the first
//! write observe the built-in default document, so there is no "unconfigured"
//! error state. Writes are whole-document: validate against the current node
//! groups, commit with a single storage put, then append the audit record
//! and fire the change webhook.
//!
//! The commit is the linearization point. Audit append and webhook delivery
//! run after it and are best-effort: their failures never un-commit the
//! document, they surface as warnings on an otherwise successful outcome.
//! Concurrent writers are not serialized against each other; the later
//! commit wins wholesale.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::{Error, Result};
use crate::events::{AdminEvent, AdminEventPayload, EventLog};
use crate::keys;
use crate::node_group::NodeGroupStore;
use crate::settings::Settings;
use crate::storage::{StorageBackend, WritePrecondition};
use crate::validation::validate_settings;

/// Delivers configuration-change notifications to an external receiver.
///
/// Implementations are best-effort with a bounded deadline; a failed or slow
/// delivery must not block or fail the commit it describes.
#[async_trait]
pub trait ChangeNotifier: Send + Sync + 'static {
    /// Delivers one change notification to `url`.
    async fn notify(&self, url: &str, user: &str, payload: &AdminEventPayload) -> Result<()>;
}

/// Outcome of a successful configuration write.
#[derive(Debug, Clone, PartialEq)]
pub struct SetOutcome {
    /// The live document the write replaced.
    pub previous: Settings,
    /// Degraded-success notices: the commit stood, but a post-commit step
    /// (audit append, webhook delivery) failed.
    pub warnings: Vec<String>,
}

/// Store of the single live configuration document.
#[derive(Clone)]
pub struct SettingsStore {
    storage: Arc<dyn StorageBackend>,
    node_groups: NodeGroupStore,
    events: EventLog,
    notifier: Option<Arc<dyn ChangeNotifier>>,
}

impl SettingsStore {
    /// Creates a store over the given backend and collaborators.
    #[must_use]
    pub fn new(
        storage: Arc<dyn StorageBackend>,
        node_groups: NodeGroupStore,
        events: EventLog,
    ) -> Self {
        Self {
            storage,
            node_groups,
            events,
            notifier: None,
        }
    }

    /// Attaches a change notifier fired after each successful commit.
    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn ChangeNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Returns the live document.
    ///
    /// Before the first write this is [`Settings::default`].
    pub async fn get(&self) -> Result<Settings> {
        let data = match self.storage.get(keys::SETTINGS_KEY).await {
            Ok(data) => data,
            Err(err) if err.is_not_found() => return Ok(Settings::default()),
            Err(err) => return Err(err),
        };
        serde_json::from_slice(&data).map_err(Error::serialization)
    }

    /// Validates and commits a candidate document.
    ///
    /// Any violation rejects the whole write with
    /// [`Error::ValidationFailed`] carrying every violation found; storage is
    /// untouched. On success the audit record and webhook run post-commit,
    /// and their failures come back in [`SetOutcome::warnings`].
    pub async fn set(&self, candidate: Settings, user: &str) -> Result<SetOutcome> {
        let previous = self.get().await?;

        let node_groups = self.node_groups.list().await?;
        let violations = validate_settings(&candidate, &node_groups);
        if !violations.is_empty() {
            return Err(Error::validation(violations));
        }

        let data = serde_json::to_vec(&candidate).map_err(Error::serialization)?;
        self.storage
            .put(keys::SETTINGS_KEY, Bytes::from(data), WritePrecondition::None)
            .await?;

        tracing::info!(user = %user, "configuration committed");

        let mut warnings = Vec::new();
        let payload = AdminEventPayload::ConfigChange {
            before: Box::new(previous.clone()),
            after: Box::new(candidate.clone()),
        };

        if let Err(err) = self
            .events
            .record_config_change(previous.clone(), candidate.clone(), user)
            .await
        {
            tracing::warn!(error = %err, "audit append failed after commit");
            warnings.push(format!(
                "failed to record configuration change event: {err}"
            ));
        }

        if let (Some(notifier), Some(url)) =
            (self.notifier.as_ref(), candidate.notify.webhook_url.as_ref())
        {
            if let Err(err) = notifier.notify(url, user, &payload).await {
                tracing::warn!(url = %url, error = %err, "change notification failed");
                warnings.push(format!("failed to deliver change notification: {err}"));
            }
        }

        Ok(SetOutcome { previous, warnings })
    }

    /// Restores the `before` snapshot of a configuration-change record.
    ///
    /// The snapshot re-validates against the node groups as they exist now,
    /// then commits through the normal write path: a new audit record is
    /// appended and history is never rewritten. Returns the degraded-success
    /// warnings of that commit.
    pub async fn revert(&self, guid: &str, user: &str) -> Result<Vec<String>> {
        if guid.is_empty() {
            return Err(Error::InvalidInput(
                "revert guid must not be empty".to_string(),
            ));
        }

        let event = self
            .events
            .find(guid)
            .await?
            .ok_or_else(|| Error::resource_not_found("admin event", guid))?;

        let AdminEvent { payload, .. } = event;
        let AdminEventPayload::ConfigChange { before, .. } = payload else {
            return Err(Error::InvalidInput(format!(
                "event {guid} is not a configuration change"
            )));
        };

        tracing::info!(guid = %guid, user = %user, "reverting configuration");
        let outcome = self.set(*before, user).await?;
        Ok(outcome.warnings)
    }
}

impl std::fmt::Debug for SettingsStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsStore")
            .field("notifier", &self.notifier.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node_group::NodeGroup;
    use crate::settings::ContainerPool;
    use crate::storage::{DocumentMeta, MemoryBackend, WriteResult};
    use std::sync::Mutex;

    fn fixture() -> (SettingsStore, NodeGroupStore, EventLog) {
        let storage: Arc<dyn StorageBackend> = Arc::new(MemoryBackend::new());
        fixture_over(storage)
    }

    fn fixture_over(storage: Arc<dyn StorageBackend>) -> (SettingsStore, NodeGroupStore, EventLog) {
        let node_groups = NodeGroupStore::new(Arc::clone(&storage));
        let events = EventLog::new(Arc::clone(&storage));
        let store = SettingsStore::new(storage, node_groups.clone(), events.clone());
        (store, node_groups, events)
    }

    fn valid_settings(api_url: &str) -> Settings {
        let mut settings = Settings::default();
        settings.api_url = api_url.to_string();
        settings
    }

    /// Backend wrapper that fails puts under one key prefix.
    struct FailingBackend {
        inner: MemoryBackend,
        fail_put_prefix: &'static str,
    }

    #[async_trait]
    impl StorageBackend for FailingBackend {
        async fn get(&self, path: &str) -> Result<Bytes> {
            self.inner.get(path).await
        }

        async fn put(
            &self,
            path: &str,
            data: Bytes,
            precondition: WritePrecondition,
        ) -> Result<WriteResult> {
            if path.starts_with(self.fail_put_prefix) {
                return Err(Error::storage(format!("injected write failure: {path}")));
            }
            self.inner.put(path, data, precondition).await
        }

        async fn delete(&self, path: &str) -> Result<()> {
            self.inner.delete(path).await
        }

        async fn list(&self, prefix: &str) -> Result<Vec<DocumentMeta>> {
            self.inner.list(prefix).await
        }

        async fn head(&self, path: &str) -> Result<Option<DocumentMeta>> {
            self.inner.head(path).await
        }
    }

    /// Notifier that records calls, optionally failing them.
    #[derive(Default)]
    struct RecordingNotifier {
        calls: Mutex<Vec<(String, String)>>,
        fail: bool,
    }

    #[async_trait]
    impl ChangeNotifier for RecordingNotifier {
        async fn notify(
            &self,
            url: &str,
            user: &str,
            _payload: &AdminEventPayload,
        ) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push((url.to_string(), user.to_string()));
            if self.fail {
                return Err(Error::storage("receiver unreachable"));
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn default_document_exists_before_first_write() {
        let (store, _, _) = fixture();
        let settings = store.get().await.unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[tokio::test]
    async fn invalid_candidate_leaves_storage_untouched() {
        let (store, _, events) = fixture();
        let mut candidate = Settings::default();
        candidate.ui.csrf_key = "short".to_string();

        let err = store.set(candidate, "admin").await.unwrap_err();
        let Error::ValidationFailed { errors } = &err else {
            panic!("unexpected error: {err:?}");
        };
        assert_eq!(
            errors,
            &vec![
                "API hostname must not be empty".to_string(),
                "CSRF key must be 32 characters long".to_string(),
            ]
        );
        assert_eq!(
            err.to_string(),
            "API hostname must not be empty, CSRF key must be 32 characters long"
        );

        assert_eq!(store.get().await.unwrap(), Settings::default());
        assert!(events.paginate(None, 10).await.unwrap().events.is_empty());
    }

    #[tokio::test]
    async fn committed_write_is_read_back_and_audited() {
        let (store, _, events) = fixture();
        let candidate = valid_settings("https://ci.example.com");

        let outcome = store.set(candidate.clone(), "admin").await.unwrap();
        assert_eq!(outcome.previous, Settings::default());
        assert!(outcome.warnings.is_empty());

        assert_eq!(store.get().await.unwrap(), candidate);

        let page = events.paginate(None, 10).await.unwrap();
        assert_eq!(page.events.len(), 1);
        let event = &page.events[0];
        assert_eq!(event.user, "admin");
        match &event.payload {
            AdminEventPayload::ConfigChange { before, after } => {
                assert_eq!(**before, Settings::default());
                assert_eq!(**after, candidate);
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[tokio::test]
    async fn pool_validation_sees_current_node_groups() {
        let (store, node_groups, _) = fixture();
        node_groups
            .upsert(&NodeGroup::new("valid-distro"))
            .await
            .unwrap();

        let mut candidate = valid_settings("https://ci.example.com");
        candidate.container_pools.pools = vec![ContainerPool {
            id: "test-pool-1".to_string(),
            distro: "valid-distro".to_string(),
            max_containers: 100,
        }];

        store.set(candidate.clone(), "admin").await.unwrap();
        assert_eq!(store.get().await.unwrap(), candidate);
    }

    #[tokio::test]
    async fn audit_failure_degrades_but_does_not_uncommit() {
        let storage: Arc<dyn StorageBackend> = Arc::new(FailingBackend {
            inner: MemoryBackend::new(),
            fail_put_prefix: keys::EVENTS_PREFIX,
        });
        let (store, _, _) = fixture_over(storage);
        let candidate = valid_settings("https://ci.example.com");

        let outcome = store.set(candidate.clone(), "admin").await.unwrap();
        assert_eq!(outcome.warnings.len(), 1);
        assert!(
            outcome.warnings[0].starts_with("failed to record configuration change event:"),
            "unexpected warning: {}",
            outcome.warnings[0]
        );

        assert_eq!(store.get().await.unwrap(), candidate);
    }

    #[tokio::test]
    async fn notifier_fires_after_commit() {
        let (store, _, _) = fixture();
        let notifier = Arc::new(RecordingNotifier::default());
        let store = store.with_notifier(Arc::clone(&notifier) as Arc<dyn ChangeNotifier>);

        let mut candidate = valid_settings("https://ci.example.com");
        candidate.notify.webhook_url = Some("https://hooks.example.com/conifer".to_string());

        let outcome = store.set(candidate, "admin").await.unwrap();
        assert!(outcome.warnings.is_empty());

        let calls = notifier.calls.lock().unwrap();
        assert_eq!(
            *calls,
            vec![(
                "https://hooks.example.com/conifer".to_string(),
                "admin".to_string()
            )]
        );
    }

    #[tokio::test]
    async fn notifier_failure_degrades_but_does_not_uncommit() {
        let (store, _, _) = fixture();
        let notifier = Arc::new(RecordingNotifier {
            fail: true,
            ..RecordingNotifier::default()
        });
        let store = store.with_notifier(notifier as Arc<dyn ChangeNotifier>);

        let mut candidate = valid_settings("https://ci.example.com");
        candidate.notify.webhook_url = Some("https://hooks.example.com/conifer".to_string());

        let outcome = store.set(candidate.clone(), "admin").await.unwrap();
        assert_eq!(outcome.warnings.len(), 1);
        assert!(outcome.warnings[0].starts_with("failed to deliver change notification:"));
        assert_eq!(store.get().await.unwrap(), candidate);
    }

    #[tokio::test]
    async fn no_notification_without_webhook_url() {
        let (store, _, _) = fixture();
        let notifier = Arc::new(RecordingNotifier::default());
        let store = store.with_notifier(Arc::clone(&notifier) as Arc<dyn ChangeNotifier>);

        store
            .set(valid_settings("https://ci.example.com"), "admin")
            .await
            .unwrap();

        assert!(notifier.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn revert_rejects_empty_guid() {
        let (store, _, _) = fixture();
        let err = store.revert("", "admin").await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn revert_unknown_guid_is_not_found() {
        let (store, _, _) = fixture();
        let err = store
            .revert("01ARZ3NDEKTSV4RRFFQ69G5FAV", "admin")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn revert_rejects_task_restart_events() {
        let (store, _, events) = fixture();
        let start = chrono::Utc::now();
        let event = events
            .record_task_restart(vec!["task-1".to_string()], start, start, "admin")
            .await
            .unwrap();

        let err = store.revert(&event.guid, "admin").await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(err.to_string().contains("not a configuration change"));
    }

    #[tokio::test]
    async fn revert_restores_snapshot_through_a_new_event() {
        let (store, _, events) = fixture();

        let one = valid_settings("https://one.example.com");
        let two = valid_settings("https://two.example.com");
        store.set(one.clone(), "admin").await.unwrap();
        // Audit timestamps are millisecond-precision; keep the records
        // strictly ordered.
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        store.set(two.clone(), "admin").await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;

        // The change that produced `two` is the newest record.
        let page = events.paginate(None, 1).await.unwrap();
        let change_guid = page.events[0].guid.clone();

        let warnings = store.revert(&change_guid, "admin").await.unwrap();
        assert!(warnings.is_empty());
        assert_eq!(store.get().await.unwrap(), one);

        // History grew; nothing was rewritten.
        let page = events.paginate(None, 10).await.unwrap();
        assert_eq!(page.events.len(), 3);
        match &page.events[0].payload {
            AdminEventPayload::ConfigChange { before, after } => {
                assert_eq!(**before, two);
                assert_eq!(**after, one);
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[tokio::test]
    async fn revert_revalidates_against_current_node_groups() {
        let (store, node_groups, events) = fixture();
        node_groups
            .upsert(&NodeGroup::new("valid-distro"))
            .await
            .unwrap();

        let mut pooled = valid_settings("https://ci.example.com");
        pooled.container_pools.pools = vec![ContainerPool {
            id: "test-pool-1".to_string(),
            distro: "valid-distro".to_string(),
            max_containers: 100,
        }];
        store.set(pooled, "admin").await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;

        let plain = valid_settings("https://ci.example.com");
        store.set(plain, "admin").await.unwrap();
        let change_guid = events.paginate(None, 1).await.unwrap().events[0].guid.clone();

        // The pooled snapshot now references a node group that is gone.
        node_groups.delete("valid-distro").await.unwrap();

        let err = store.revert(&change_guid, "admin").await.unwrap_err();
        let Error::ValidationFailed { errors } = err else {
            panic!("expected validation failure");
        };
        assert_eq!(
            errors,
            vec!["error finding distro for container pool test-pool-1"]
        );
    }
}
