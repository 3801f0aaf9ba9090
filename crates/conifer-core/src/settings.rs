//! The cluster configuration document.
//!
//! [`Settings`] is the single, process-wide configuration document that
//! governs scheduling, provisioning, and provider credentials for the whole
//! fleet. Exactly one live copy exists at a time; it is always the result of
//! a successfully validated write (see [`crate::store::SettingsStore`]).
//!
//! The struct tree below is the wire format: snake_case JSON, tolerant of
//! missing sections (every section defaults). A default document exists
//! logically before the first write, so reads never fail with "not found".

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// The cluster configuration document.
///
/// Mutated only through whole-document replacement; there are no partial
/// updates. Field-level invariants are enforced by
/// [`crate::validation::validate_settings`] before any write is accepted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct Settings {
    /// Externally reachable API hostname. Must not be empty.
    pub api_url: String,
    /// Alerting e-mail delivery settings.
    pub alerts: AlertsConfig,
    /// API server listener settings.
    pub api: ApiConfig,
    /// Authentication provider settings.
    pub auth: AuthConfig,
    /// Execution pool (container pool) definitions.
    pub container_pools: ContainerPoolsConfig,
    /// Host provisioning settings.
    pub host_init: HostInitConfig,
    /// Jira issue tracker integration.
    pub jira: JiraConfig,
    /// Internal background job queue settings.
    pub job_queue: JobQueueConfig,
    /// Logging levels and buffering.
    pub logger: LoggerConfig,
    /// Outbound notification settings.
    pub notify: NotifyConfig,
    /// Per-cloud-provider credentials.
    pub providers: CloudProviders,
    /// Repository polling limits.
    pub repo_tracker: RepoTrackerConfig,
    /// Scheduler strategy selectors.
    pub scheduler: SchedulerConfig,
    /// Feature flags disabling individual platform services.
    pub service_flags: ServiceFlags,
    /// Slack notification settings.
    pub slack: SlackConfig,
    /// Splunk log shipping settings.
    pub splunk: SplunkConfig,
    /// Users granted platform-wide administrative rights.
    pub super_users: Vec<String>,
    /// Web console settings.
    pub ui: UiConfig,
}

/// Alerting e-mail delivery settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct AlertsConfig {
    /// SMTP relay used for alert mail.
    pub smtp: SmtpConfig,
}

/// SMTP relay settings, shared by alerting and notifications.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct SmtpConfig {
    /// Relay hostname.
    pub server: String,
    /// Relay port.
    pub port: u16,
    /// Whether to connect over TLS.
    pub use_ssl: bool,
    /// Relay username.
    pub username: String,
    /// Relay password.
    pub password: String,
    /// Sender address.
    pub from: String,
    /// Addresses receiving administrative mail.
    pub admin_email: Vec<String>,
}

/// API server listener settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct ApiConfig {
    /// Listen address of the API server, e.g. `:8080`.
    pub http_listen_addr: String,
}

/// Authentication provider settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct AuthConfig {
    /// Static user list, for small installations.
    pub naive: NaiveAuthConfig,
    /// GitHub OAuth provider.
    pub github: GithubAuthConfig,
}

/// Static user list authentication.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct NaiveAuthConfig {
    /// The configured users.
    pub users: Vec<NaiveUser>,
}

/// A statically configured user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct NaiveUser {
    /// Login name.
    pub username: String,
    /// Display name shown in the console.
    pub display_name: String,
    /// Password (stored as configured; hashing is the deployment's concern).
    pub password: String,
    /// Contact address.
    pub email: String,
}

/// GitHub OAuth authentication.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct GithubAuthConfig {
    /// OAuth application client id.
    pub client_id: String,
    /// OAuth application client secret.
    pub client_secret: String,
    /// Organization whose members may log in.
    pub organization: String,
    /// Additional users allowed outside the organization.
    pub users: Vec<String>,
}

/// Execution pool definitions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct ContainerPoolsConfig {
    /// All configured pools.
    pub pools: Vec<ContainerPool>,
}

/// A capacity-bounded scheduling domain bound to exactly one node group.
///
/// `distro` must reference an existing node group, and that node group must
/// not itself be assigned to a pool (no nested pooling). `id` is unique
/// across all pools and `max_containers` is strictly positive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct ContainerPool {
    /// Pool identifier, unique across all pools.
    pub id: String,
    /// Id of the node group whose hosts run this pool's containers.
    pub distro: String,
    /// Maximum number of containers the pool may run at once.
    pub max_containers: i32,
}

/// Host provisioning settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct HostInitConfig {
    /// Seconds to wait for SSH to come up on a new host.
    pub ssh_timeout_secs: u64,
}

/// Jira issue tracker integration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct JiraConfig {
    /// Jira server hostname.
    pub host: String,
    /// Service account username.
    pub username: String,
    /// Service account password.
    pub password: String,
    /// Project receiving auto-filed issues.
    pub default_project: String,
}

/// Internal background job queue settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct JobQueueConfig {
    /// Queue name.
    pub name: String,
    /// Local storage size for queued jobs.
    pub local_storage: i32,
    /// Worker pool size.
    pub workers: i32,
}

/// Logging levels and buffering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct LoggerConfig {
    /// Default log level: one of `debug`, `info`, `warning`, `error`.
    pub default_level: String,
    /// Level at or above which messages are always flushed.
    pub threshold_level: String,
    /// Log buffering settings.
    pub buffer: LogBufferConfig,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            default_level: "info".to_string(),
            threshold_level: "warning".to_string(),
            buffer: LogBufferConfig::default(),
        }
    }
}

/// Log buffering settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct LogBufferConfig {
    /// Whether log writes are buffered off the hot path.
    pub use_async: bool,
    /// Flush interval in seconds.
    pub duration_secs: u64,
    /// Number of messages buffered before a forced flush.
    pub count: usize,
}

/// Outbound notification settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct NotifyConfig {
    /// SMTP relay used for notification mail.
    pub smtp: SmtpConfig,
    /// When set, configuration changes are POSTed to this URL after commit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
}

/// Per-cloud-provider credentials.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct CloudProviders {
    /// Amazon Web Services.
    pub aws: AwsConfig,
    /// Docker hosts.
    pub docker: DockerConfig,
    /// Google Compute Engine.
    pub gce: GceConfig,
    /// OpenStack clusters.
    pub openstack: OpenStackConfig,
    /// VMware vSphere clusters.
    pub vsphere: VSphereConfig,
}

/// AWS credentials.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct AwsConfig {
    /// Access key id.
    pub key: String,
    /// Secret access key.
    pub secret: String,
}

/// Docker provider settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct DockerConfig {
    /// Docker Engine API version to speak.
    pub api_version: String,
}

/// GCE service account credentials.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct GceConfig {
    /// Service account e-mail.
    pub client_email: String,
    /// Service account private key (PEM).
    pub private_key: String,
    /// Private key id.
    pub private_key_id: String,
    /// GCP project id.
    pub project_id: String,
}

/// OpenStack credentials.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct OpenStackConfig {
    /// Keystone identity endpoint.
    pub identity_endpoint: String,
    /// Username.
    pub username: String,
    /// Password.
    pub password: String,
    /// Domain name.
    pub domain_name: String,
    /// Project name.
    pub project_name: String,
    /// Region.
    pub region: String,
}

/// vSphere credentials.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct VSphereConfig {
    /// vCenter hostname.
    pub host: String,
    /// Username.
    pub username: String,
    /// Password.
    pub password: String,
}

/// Repository polling limits.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct RepoTrackerConfig {
    /// Revisions fetched for a repository seen for the first time.
    pub num_new_revisions_to_fetch: i32,
    /// Upper bound on revisions searched when catching up.
    pub max_revisions_to_search: i32,
    /// Concurrent polling requests across all repositories.
    pub max_concurrent_requests: i32,
}

/// Scheduler strategy selectors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Which task finder implementation the scheduler runs.
    pub task_finder: String,
}

/// Feature flags disabling individual platform services.
///
/// All flags default to off (service enabled).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct ServiceFlags {
    /// Stop dispatching tasks to hosts.
    pub task_dispatch_disabled: bool,
    /// Stop provisioning new hosts.
    pub host_init_disabled: bool,
    /// Stop the background monitor.
    pub monitor_disabled: bool,
    /// Stop alert delivery.
    pub alerts_disabled: bool,
    /// Stop repository polling.
    pub repotracker_disabled: bool,
    /// Stop the scheduler entirely.
    pub scheduler_disabled: bool,
}

/// Slack notification settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct SlackConfig {
    /// Bot token.
    pub token: String,
    /// Minimum level relayed to Slack.
    pub level: String,
    /// Message routing options.
    pub options: SlackOptions,
}

/// Slack message routing options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct SlackOptions {
    /// Channel receiving messages.
    pub channel: String,
    /// Hostname reported in messages.
    pub hostname: String,
    /// Bot display name.
    pub name: String,
}

/// Splunk log shipping settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct SplunkConfig {
    /// HEC endpoint URL.
    pub server_url: String,
    /// HEC token.
    pub token: String,
    /// Splunk channel.
    pub channel: String,
}

/// Web console settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct UiConfig {
    /// Externally reachable console URL.
    pub url: String,
    /// Help/documentation URL linked from the console.
    pub help_url: String,
    /// Listen address of the console server.
    pub http_listen_addr: String,
    /// CSRF signing key. When set, must be exactly 32 characters.
    pub csrf_key: String,
    /// Whether rendered templates are cached.
    pub cache_templates: bool,
    /// Whether session cookies require HTTPS.
    pub secure_cookies: bool,
}
