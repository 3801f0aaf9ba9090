//! `OpenAPI` (3.1) specification generation for `conifer-api`.
//!
//! The generated spec is served by tooling and used to detect breaking API
//! changes in CI.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

/// `OpenAPI` documentation for the conifer admin REST API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Conifer API",
        description = "Cluster configuration control plane REST API"
    ),
    paths(
        crate::routes::settings::get_settings,
        crate::routes::settings::update_settings,
        crate::routes::settings::revert_settings,
        crate::routes::events::list_events,
        crate::routes::restart::restart_tasks,
        crate::routes::task_queue::get_task_queue,
        crate::routes::task_queue::clear_task_queue,
    ),
    components(
        schemas(
            crate::error::ApiErrorBody,
            crate::routes::settings::UpdateSettingsResponse,
            crate::routes::settings::RevertRequest,
            crate::routes::settings::RevertResponse,
            crate::routes::restart::RestartRequest,
            crate::routes::restart::RestartResponse,
            crate::routes::task_queue::TaskQueueResponse,
            conifer_core::settings::Settings,
            conifer_core::settings::AlertsConfig,
            conifer_core::settings::SmtpConfig,
            conifer_core::settings::ApiConfig,
            conifer_core::settings::AuthConfig,
            conifer_core::settings::NaiveAuthConfig,
            conifer_core::settings::NaiveUser,
            conifer_core::settings::GithubAuthConfig,
            conifer_core::settings::ContainerPoolsConfig,
            conifer_core::settings::ContainerPool,
            conifer_core::settings::HostInitConfig,
            conifer_core::settings::JiraConfig,
            conifer_core::settings::JobQueueConfig,
            conifer_core::settings::LoggerConfig,
            conifer_core::settings::LogBufferConfig,
            conifer_core::settings::NotifyConfig,
            conifer_core::settings::CloudProviders,
            conifer_core::settings::AwsConfig,
            conifer_core::settings::DockerConfig,
            conifer_core::settings::GceConfig,
            conifer_core::settings::OpenStackConfig,
            conifer_core::settings::VSphereConfig,
            conifer_core::settings::RepoTrackerConfig,
            conifer_core::settings::SchedulerConfig,
            conifer_core::settings::ServiceFlags,
            conifer_core::settings::SlackConfig,
            conifer_core::settings::SlackOptions,
            conifer_core::settings::SplunkConfig,
            conifer_core::settings::UiConfig,
            conifer_core::events::AdminEvent,
            conifer_core::events::AdminEventPayload,
            conifer_core::events::EventPage,
            conifer_core::events::PageLink,
            conifer_core::queue::TaskQueueItem,
        )
    ),
    tags(
        (name = "settings", description = "Configuration document operations"),
        (name = "events", description = "Audit trail operations"),
        (name = "restart", description = "Failed task restart"),
        (name = "task_queue", description = "Task queue inspection"),
    ),
    modifiers(&SecurityAddon),
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearerAuth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

/// Returns the generated `OpenAPI` spec.
#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

/// Returns the generated `OpenAPI` spec serialized as pretty JSON.
///
/// # Errors
///
/// Returns an error if JSON serialization fails (should not happen).
pub fn openapi_json() -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&openapi())
}
