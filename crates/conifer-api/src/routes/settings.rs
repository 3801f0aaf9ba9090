//! Settings document routes.
//!
//! ## Routes
//!
//! - `GET  /admin/settings` - Fetch the live configuration document
//! - `POST /admin/settings` - Validate and commit a candidate document
//! - `POST /admin/revert` - Restore the `before` snapshot of a past change

use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use conifer_core::{Error, Settings};

use crate::context::RequestContext;
use crate::error::{ApiError, ApiErrorBody};
use crate::server::AppState;

/// Response to a committed configuration change.
#[derive(Debug, Serialize, ToSchema)]
pub struct UpdateSettingsResponse {
    /// The document as committed.
    #[serde(flatten)]
    pub settings: Settings,
    /// Degraded-success notices: the commit stood, but a post-commit step
    /// (audit append, webhook delivery) failed.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Request to revert a past configuration change.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RevertRequest {
    /// Audit record guid whose `before` snapshot should be restored.
    pub guid: String,
}

/// Response to a revert.
#[derive(Debug, Serialize, ToSchema)]
pub struct RevertResponse {
    /// Degraded-success notices from the restoring commit.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Creates settings routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/settings", get(get_settings).post(update_settings))
        .route("/revert", post(revert_settings))
}

/// Fetch the live configuration document.
///
/// GET /admin/settings
#[utoipa::path(
    get,
    path = "/admin/settings",
    tag = "settings",
    responses(
        (status = 200, description = "Live configuration document", body = Settings),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
        (status = 503, description = "Storage unavailable", body = ApiErrorBody),
    ),
    security(
        ("bearerAuth" = [])
    )
)]
pub(crate) async fn get_settings(
    ctx: RequestContext,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    tracing::debug!(user = %ctx.user, "Fetching settings");

    let settings = state.settings_store().get().await.map_err(ApiError::from)?;
    Ok(Json(settings))
}

/// Validate and commit a candidate configuration document.
///
/// POST /admin/settings
#[utoipa::path(
    post,
    path = "/admin/settings",
    tag = "settings",
    request_body = Settings,
    responses(
        (status = 200, description = "Candidate committed", body = UpdateSettingsResponse),
        (status = 400, description = "Candidate rejected; the message lists every violation", body = ApiErrorBody),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
        (status = 503, description = "Storage unavailable", body = ApiErrorBody),
    ),
    security(
        ("bearerAuth" = [])
    )
)]
pub(crate) async fn update_settings(
    ctx: RequestContext,
    State(state): State<Arc<AppState>>,
    Json(candidate): Json<Settings>,
) -> Result<impl IntoResponse, ApiError> {
    tracing::info!(user = %ctx.user, "Updating settings");

    let committed = candidate.clone();
    let outcome = match state.settings_store().set(candidate, &ctx.user).await {
        Ok(outcome) => outcome,
        Err(e) => {
            if matches!(e, Error::ValidationFailed { .. }) {
                crate::metrics::record_validation_failure();
            }
            return Err(e.into());
        }
    };

    crate::metrics::record_config_commit();
    if !outcome.warnings.is_empty() {
        tracing::warn!(
            user = %ctx.user,
            warnings = ?outcome.warnings,
            "Configuration committed with degraded post-commit steps"
        );
    }

    Ok(Json(UpdateSettingsResponse {
        settings: committed,
        warnings: outcome.warnings,
    }))
}

/// Restore the `before` snapshot of a past configuration change.
///
/// POST /admin/revert
#[utoipa::path(
    post,
    path = "/admin/revert",
    tag = "settings",
    request_body = RevertRequest,
    responses(
        (status = 200, description = "Snapshot restored through a new commit", body = RevertResponse),
        (status = 400, description = "Empty guid, non-configuration event, or failed re-validation", body = ApiErrorBody),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
        (status = 404, description = "No audit record with that guid", body = ApiErrorBody),
        (status = 503, description = "Storage unavailable", body = ApiErrorBody),
    ),
    security(
        ("bearerAuth" = [])
    )
)]
pub(crate) async fn revert_settings(
    ctx: RequestContext,
    State(state): State<Arc<AppState>>,
    Json(req): Json<RevertRequest>,
) -> Result<impl IntoResponse, ApiError> {
    tracing::info!(user = %ctx.user, guid = %req.guid, "Reverting configuration change");

    let warnings = state
        .settings_store()
        .revert(&req.guid, &ctx.user)
        .await
        .map_err(ApiError::from)?;

    crate::metrics::record_config_commit();
    Ok(Json(RevertResponse { warnings }))
}
