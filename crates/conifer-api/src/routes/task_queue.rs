//! Task queue inspection routes.
//!
//! ## Routes
//!
//! - `GET    /admin/task_queue` - Inspect one node group's pending queue
//! - `DELETE /admin/task_queue` - Clear one node group's pending queue

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use conifer_core::TaskQueueItem;

use crate::context::RequestContext;
use crate::error::{ApiError, ApiErrorBody};
use crate::server::AppState;

/// Query parameters selecting a queue.
#[derive(Debug, Deserialize, IntoParams)]
pub struct TaskQueueQuery {
    /// Node group whose queue is addressed.
    pub distro: Option<String>,
}

/// One node group's pending queue.
#[derive(Debug, Serialize, ToSchema)]
pub struct TaskQueueResponse {
    /// Node group the queue belongs to.
    pub distro: String,
    /// Number of pending items.
    pub length: usize,
    /// Pending items in dispatch order.
    pub items: Vec<TaskQueueItem>,
}

/// Creates task queue routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/task_queue", get(get_task_queue).delete(clear_task_queue))
}

/// Inspect a node group's pending queue.
///
/// GET /admin/task_queue
#[utoipa::path(
    get,
    path = "/admin/task_queue",
    tag = "task_queue",
    params(TaskQueueQuery),
    responses(
        (status = 200, description = "The pending queue; empty for unknown node groups", body = TaskQueueResponse),
        (status = 400, description = "Missing distro parameter", body = ApiErrorBody),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
        (status = 503, description = "Storage unavailable", body = ApiErrorBody),
    ),
    security(
        ("bearerAuth" = [])
    )
)]
pub(crate) async fn get_task_queue(
    ctx: RequestContext,
    State(state): State<Arc<AppState>>,
    Query(query): Query<TaskQueueQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let distro = require_distro(query)?;
    tracing::debug!(user = %ctx.user, distro = %distro, "Fetching task queue");

    let queue = state
        .task_queues()
        .load(&distro)
        .await
        .map_err(ApiError::from)?;

    Ok(Json(TaskQueueResponse {
        distro,
        length: queue.len(),
        items: queue.items,
    }))
}

/// Clear a node group's pending queue.
///
/// Clearing a missing or already-empty queue succeeds.
///
/// DELETE /admin/task_queue
#[utoipa::path(
    delete,
    path = "/admin/task_queue",
    tag = "task_queue",
    params(TaskQueueQuery),
    responses(
        (status = 200, description = "Queue cleared"),
        (status = 400, description = "Missing distro parameter", body = ApiErrorBody),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
        (status = 503, description = "Storage unavailable", body = ApiErrorBody),
    ),
    security(
        ("bearerAuth" = [])
    )
)]
pub(crate) async fn clear_task_queue(
    ctx: RequestContext,
    State(state): State<Arc<AppState>>,
    Query(query): Query<TaskQueueQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let distro = require_distro(query)?;
    tracing::info!(user = %ctx.user, distro = %distro, "Clearing task queue");

    state
        .task_queues()
        .clear(&distro)
        .await
        .map_err(ApiError::from)?;

    Ok(StatusCode::OK)
}

fn require_distro(query: TaskQueueQuery) -> Result<String, ApiError> {
    query
        .distro
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::bad_request("distro query parameter is required"))
}
