//! Pre-built test fixtures for common test scenarios.
//!
//! Provides a wired-up control plane over in-memory storage plus factory
//! functions that create test data with sensible defaults.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use conifer_core::settings::{ContainerPool, NaiveUser, Settings};
use conifer_core::{
    EventLog, FinishedTask, FinishedTaskStore, MemoryBackend, NodeGroup, NodeGroupStore,
    SettingsStore, StorageBackend, TaskQueueItem, TaskQueueStore, TaskRestarter,
};

/// Node group id that container pools may reference.
pub const VALID_DISTRO: &str = "valid-distro";

/// Node group id that is itself assigned to a pool, so pools referencing it
/// are rejected.
pub const INVALID_DISTRO: &str = "invalid-distro";

/// Pool id used by the standard fixtures.
pub const TEST_POOL: &str = "test-pool-1";

/// A fully wired control plane over shared in-memory storage.
pub struct TestContext {
    /// The shared backend every store below reads and writes.
    pub storage: Arc<MemoryBackend>,
    /// Node group definitions.
    pub node_groups: NodeGroupStore,
    /// Audit event log.
    pub events: EventLog,
    /// Per-node-group task queues.
    pub queues: TaskQueueStore,
    /// Finished-task registry.
    pub finished: FinishedTaskStore,
    /// The configuration store.
    pub settings: SettingsStore,
}

impl TestContext {
    /// Creates a context with empty storage.
    #[must_use]
    pub fn new() -> Self {
        let storage = Arc::new(MemoryBackend::new());
        let backend: Arc<dyn StorageBackend> = Arc::clone(&storage) as Arc<dyn StorageBackend>;

        let node_groups = NodeGroupStore::new(Arc::clone(&backend));
        let events = EventLog::new(Arc::clone(&backend));
        let queues = TaskQueueStore::new(Arc::clone(&backend));
        let finished = FinishedTaskStore::new(Arc::clone(&backend));
        let settings = SettingsStore::new(backend, node_groups.clone(), events.clone());

        Self {
            storage,
            node_groups,
            events,
            queues,
            finished,
            settings,
        }
    }

    /// Builds a restarter over this context's stores.
    #[must_use]
    pub fn restarter(&self) -> TaskRestarter {
        TaskRestarter::new(
            self.finished.clone(),
            self.queues.clone(),
            self.events.clone(),
        )
    }

    /// Seeds the standard two-group fleet: [`VALID_DISTRO`] unassigned and
    /// [`INVALID_DISTRO`] already bound to [`TEST_POOL`].
    pub async fn seed_fleet(&self) {
        self.node_groups
            .upsert(&node_group(VALID_DISTRO))
            .await
            .expect("seed valid node group");
        self.node_groups
            .upsert(&pooled_node_group(INVALID_DISTRO, TEST_POOL))
            .await
            .expect("seed pooled node group");
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// A node group with no pool assignment.
pub fn node_group(id: &str) -> NodeGroup {
    let mut group = NodeGroup::new(id);
    group.provider = "ec2".to_string();
    group.arch = "linux_amd64".to_string();
    group
}

/// A node group already bound to a container pool.
pub fn pooled_node_group(id: &str, pool: &str) -> NodeGroup {
    let mut group = node_group(id);
    group.container_pool = Some(pool.to_string());
    group
}

/// A container pool referencing the given node group.
pub fn container_pool(id: &str, distro: &str) -> ContainerPool {
    ContainerPool {
        id: id.to_string(),
        distro: distro.to_string(),
        max_containers: 100,
    }
}

/// A fully populated settings document that passes validation against the
/// standard fleet seeded by [`TestContext::seed_fleet`].
pub fn sample_settings() -> Settings {
    let mut settings = Settings::default();

    settings.api_url = "https://ci.example.com".to_string();

    settings.alerts.smtp.server = "smtp.example.com".to_string();
    settings.alerts.smtp.port = 2525;
    settings.alerts.smtp.use_ssl = true;
    settings.alerts.smtp.username = "smtpuser".to_string();
    settings.alerts.smtp.password = "smtppass".to_string();
    settings.alerts.smtp.from = "alerts@example.com".to_string();
    settings.alerts.smtp.admin_email = vec!["admin@example.com".to_string()];

    settings.api.http_listen_addr = ":8080".to_string();

    settings.auth.naive.users = vec![NaiveUser {
        username: "alice".to_string(),
        display_name: "Alice".to_string(),
        password: "hunter2".to_string(),
        email: "alice@example.com".to_string(),
    }];
    settings.auth.github.client_id = "github-client".to_string();
    settings.auth.github.client_secret = "github-secret".to_string();
    settings.auth.github.organization = "example-org".to_string();
    settings.auth.github.users = vec!["alice".to_string()];

    settings.container_pools.pools = vec![container_pool(TEST_POOL, VALID_DISTRO)];

    settings.host_init.ssh_timeout_secs = 20;

    settings.jira.host = "jira.example.com".to_string();
    settings.jira.username = "jirabot".to_string();
    settings.jira.password = "jirapass".to_string();
    settings.jira.default_project = "CI".to_string();

    settings.job_queue.name = "service".to_string();
    settings.job_queue.local_storage = 1024;
    settings.job_queue.workers = 8;

    settings.logger.default_level = "info".to_string();
    settings.logger.threshold_level = "warning".to_string();
    settings.logger.buffer.use_async = false;
    settings.logger.buffer.duration_secs = 10;
    settings.logger.buffer.count = 100;

    settings.notify.smtp.server = "smtp.example.com".to_string();
    settings.notify.smtp.port = 2525;
    settings.notify.smtp.from = "notify@example.com".to_string();

    settings.providers.aws.key = "aws-key".to_string();
    settings.providers.aws.secret = "aws-secret".to_string();
    settings.providers.docker.api_version = "1.41".to_string();
    settings.providers.gce.client_email = "svc@project.iam.example.com".to_string();
    settings.providers.gce.private_key = "gce-private-key".to_string();
    settings.providers.gce.private_key_id = "gce-key-id".to_string();
    settings.providers.gce.project_id = "example-project".to_string();
    settings.providers.openstack.identity_endpoint = "https://keystone.example.com".to_string();
    settings.providers.openstack.username = "osuser".to_string();
    settings.providers.openstack.password = "ospass".to_string();
    settings.providers.openstack.domain_name = "default".to_string();
    settings.providers.openstack.project_name = "ci".to_string();
    settings.providers.openstack.region = "region-1".to_string();
    settings.providers.vsphere.host = "vcenter.example.com".to_string();
    settings.providers.vsphere.username = "vsuser".to_string();
    settings.providers.vsphere.password = "vspass".to_string();

    settings.repo_tracker.num_new_revisions_to_fetch = 10;
    settings.repo_tracker.max_revisions_to_search = 50;
    settings.repo_tracker.max_concurrent_requests = 2;

    settings.scheduler.task_finder = "legacy".to_string();

    settings.service_flags.host_init_disabled = true;

    settings.slack.token = "xoxb-token".to_string();
    settings.slack.level = "info".to_string();
    settings.slack.options.channel = "#ci".to_string();
    settings.slack.options.hostname = "ci.example.com".to_string();
    settings.slack.options.name = "conifer".to_string();

    settings.splunk.server_url = "https://splunk.example.com".to_string();
    settings.splunk.token = "splunk-token".to_string();
    settings.splunk.channel = "ci".to_string();

    settings.ui.url = "https://ci.example.com".to_string();
    settings.ui.help_url = "https://docs.example.com".to_string();
    settings.ui.http_listen_addr = ":9090".to_string();
    settings.ui.csrf_key = "12345678901234567890123456789012".to_string();
    settings.ui.cache_templates = true;

    settings
}

/// A queue item with the given id and placeholder metadata.
pub fn queue_item(id: &str) -> TaskQueueItem {
    TaskQueueItem {
        id: id.to_string(),
        display_name: format!("compile {id}"),
        build_variant: "ubuntu2204".to_string(),
        project: "conifer".to_string(),
        revision: "deadbeef".to_string(),
        requester: "gitter_request".to_string(),
        priority: 0,
        expected_duration_ms: 60_000,
    }
}

/// A finished task on the given node group.
pub fn finished_task(
    id: &str,
    node_group: &str,
    status: &str,
    finish_time: DateTime<Utc>,
) -> FinishedTask {
    FinishedTask {
        id: id.to_string(),
        display_name: format!("compile {id}"),
        node_group: node_group.to_string(),
        build_variant: "ubuntu2204".to_string(),
        project: "conifer".to_string(),
        revision: "deadbeef".to_string(),
        requester: "gitter_request".to_string(),
        status: status.to_string(),
        finish_time,
        expected_duration_ms: 60_000,
    }
}
