//! Audit trail routes.
//!
//! ## Routes
//!
//! - `GET /admin/events` - Most-recent-first page of audit records

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use utoipa::IntoParams;

use conifer_core::EventPage;
use conifer_core::events::DEFAULT_PAGE_LIMIT;

use crate::context::RequestContext;
use crate::error::{ApiError, ApiErrorBody};
use crate::server::AppState;

/// Query parameters for the event page.
#[derive(Debug, Deserialize, IntoParams)]
pub struct EventsQuery {
    /// Cursor: only records strictly earlier than this RFC3339 timestamp
    /// are returned. Omit for the newest page.
    pub ts: Option<String>,
    /// Page size.
    pub limit: Option<usize>,
}

/// Creates event routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/events", get(list_events))
}

/// List audit records, newest first.
///
/// GET /admin/events
#[utoipa::path(
    get,
    path = "/admin/events",
    tag = "events",
    params(EventsQuery),
    responses(
        (status = 200, description = "One page of audit records with continuation metadata", body = EventPage),
        (status = 400, description = "Unparseable cursor", body = ApiErrorBody),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
        (status = 503, description = "Storage unavailable", body = ApiErrorBody),
    ),
    security(
        ("bearerAuth" = [])
    )
)]
pub(crate) async fn list_events(
    ctx: RequestContext,
    State(state): State<Arc<AppState>>,
    Query(query): Query<EventsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let before = query.ts.as_deref().map(parse_cursor).transpose()?;
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_LIMIT);

    tracing::debug!(user = %ctx.user, ?before, limit, "Listing admin events");

    let page = state
        .event_log()
        .paginate(before, limit)
        .await
        .map_err(ApiError::from)?;
    Ok(Json(page))
}

fn parse_cursor(raw: &str) -> Result<DateTime<Utc>, ApiError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| ApiError::bad_request(format!("invalid ts parameter: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_accepts_millisecond_rfc3339() {
        let parsed = parse_cursor("2017-06-12T11:00:00.123Z").expect("valid cursor");
        assert_eq!(parsed.timestamp_millis() % 1000, 123);
    }

    #[test]
    fn cursor_rejects_garbage() {
        let err = parse_cursor("yesterday").expect_err("invalid cursor");
        assert!(err.message().contains("invalid ts parameter"));
    }
}
