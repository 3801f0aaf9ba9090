//! HTTP route handlers.

pub mod events;
pub mod restart;
pub mod settings;
pub mod task_queue;

use std::sync::Arc;

use axum::Router;

use crate::server::AppState;

/// `/admin` routes (authenticated).
pub fn admin_routes() -> Router<Arc<AppState>> {
    Router::new()
        .merge(settings::routes())
        .merge(events::routes())
        .merge(restart::routes())
        .merge(task_queue::routes())
}
