//! Task restart routes.
//!
//! ## Routes
//!
//! - `POST /admin/restart` - Re-queue failed tasks from a completion-time window

use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use conifer_core::RestartOptions;

use crate::context::RequestContext;
use crate::error::{ApiError, ApiErrorBody};
use crate::server::AppState;

/// Request to restart failed tasks.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RestartRequest {
    /// Start of the completion-time window, inclusive.
    pub start_time: DateTime<Utc>,
    /// End of the completion-time window, inclusive.
    pub end_time: DateTime<Utc>,
    /// When true, report candidates without touching any queue.
    #[serde(default)]
    pub dry_run: bool,
}

/// Restart outcome.
#[derive(Debug, Serialize, ToSchema)]
pub struct RestartResponse {
    /// Ids of tasks put back on a dispatch queue (or, on a dry run, the
    /// tasks that would be).
    pub tasks_restarted: Vec<String>,
    /// Ids of tasks that could not be re-queued.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tasks_errored: Option<Vec<String>>,
    /// Degraded-success notices, e.g. an audit append that failed after the
    /// queues were already updated.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Creates restart routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/restart", post(restart_tasks))
}

/// Restart failed tasks whose finish time falls inside the window.
///
/// POST /admin/restart
#[utoipa::path(
    post,
    path = "/admin/restart",
    tag = "restart",
    request_body = RestartRequest,
    responses(
        (status = 200, description = "Restart outcome", body = RestartResponse),
        (status = 400, description = "Reversed time window", body = ApiErrorBody),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
        (status = 503, description = "Storage unavailable", body = ApiErrorBody),
    ),
    security(
        ("bearerAuth" = [])
    )
)]
pub(crate) async fn restart_tasks(
    ctx: RequestContext,
    State(state): State<Arc<AppState>>,
    Json(req): Json<RestartRequest>,
) -> Result<impl IntoResponse, ApiError> {
    tracing::info!(
        user = %ctx.user,
        start_time = %req.start_time,
        end_time = %req.end_time,
        dry_run = req.dry_run,
        "Restarting failed tasks"
    );

    let opts = RestartOptions {
        start_time: req.start_time,
        end_time: req.end_time,
        dry_run: req.dry_run,
    };

    let summary = state
        .restarter()
        .restart_tasks(opts, &ctx.user)
        .await
        .map_err(ApiError::from)?;

    if !req.dry_run {
        crate::metrics::record_tasks_restarted(summary.restarted.len() as u64);
    }

    Ok(Json(RestartResponse {
        tasks_restarted: summary.restarted,
        tasks_errored: if summary.errored.is_empty() {
            None
        } else {
            Some(summary.errored)
        },
        warnings: summary.warnings,
    }))
}
