//! API server implementation.
//!
//! Provides health, metrics, and admin endpoints for the conifer control
//! plane.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::middleware;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use conifer_core::storage::{MemoryBackend, StorageBackend};
use conifer_core::{
    ChangeNotifier, EventLog, FinishedTaskStore, NodeGroupStore, Result, SettingsStore,
    TaskQueueStore, TaskRestarter,
};

use crate::config::{Config, CorsConfig};
use crate::webhook::WebhookNotifier;

// ============================================================================
// Health Response
// ============================================================================

/// Health check response.
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
}

/// Readiness check response.
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct ReadyResponse {
    /// Whether the service is ready to accept requests.
    pub ready: bool,
    /// Failure detail when not ready.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

// ============================================================================
// Application State
// ============================================================================

/// Shared application state for all request handlers.
#[derive(Clone)]
pub struct AppState {
    config: Config,
    storage: Arc<dyn StorageBackend>,
    settings: SettingsStore,
    events: EventLog,
    queues: TaskQueueStore,
    restarter: TaskRestarter,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("storage", &"<StorageBackend>")
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Creates application state over the given storage backend.
    ///
    /// All domain stores share the one backend; the settings store carries
    /// a webhook notifier bounded by the configured delivery deadline.
    #[must_use]
    pub fn new(config: Config, storage: Arc<dyn StorageBackend>) -> Self {
        let node_groups = NodeGroupStore::new(Arc::clone(&storage));
        let events = EventLog::new(Arc::clone(&storage));
        let queues = TaskQueueStore::new(Arc::clone(&storage));
        let finished = FinishedTaskStore::new(Arc::clone(&storage));

        let notifier: Arc<dyn ChangeNotifier> = Arc::new(WebhookNotifier::new(
            Duration::from_secs(config.webhook_timeout_secs),
        ));
        let settings = SettingsStore::new(Arc::clone(&storage), node_groups, events.clone())
            .with_notifier(notifier);
        let restarter = TaskRestarter::new(finished, queues.clone(), events.clone());

        Self {
            config,
            storage,
            settings,
            events,
            queues,
            restarter,
        }
    }

    /// Returns the server configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the storage backend.
    #[must_use]
    pub fn storage_backend(&self) -> Arc<dyn StorageBackend> {
        Arc::clone(&self.storage)
    }

    /// Returns the settings document store.
    #[must_use]
    pub fn settings_store(&self) -> &SettingsStore {
        &self.settings
    }

    /// Returns the audit record log.
    #[must_use]
    pub fn event_log(&self) -> &EventLog {
        &self.events
    }

    /// Returns the per-node-group task queue store.
    #[must_use]
    pub fn task_queues(&self) -> &TaskQueueStore {
        &self.queues
    }

    /// Returns the failed-task restarter.
    #[must_use]
    pub fn restarter(&self) -> &TaskRestarter {
        &self.restarter
    }
}

// ============================================================================
// Route Handlers
// ============================================================================

/// Health check endpoint handler.
///
/// Returns 200 OK if the service is alive. This is a shallow check that
/// doesn't verify dependencies.
async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Readiness check endpoint handler.
///
/// Returns 200 OK if the service is ready to accept requests.
/// Checks dependencies like storage connectivity.
async fn ready(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    // Shallow connectivity check. A `head` on a missing key is sufficient to
    // validate the storage path.
    let check_key = "__conifer/ready-check";
    match state.storage_backend().head(check_key).await {
        Ok(_) => (
            StatusCode::OK,
            Json(ReadyResponse {
                ready: true,
                message: None,
            }),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadyResponse {
                ready: false,
                message: Some(format!("storage check failed: {e}")),
            }),
        ),
    }
}

// ============================================================================
// Server
// ============================================================================

/// The conifer API server.
pub struct Server {
    config: Config,
    storage: Arc<dyn StorageBackend>,
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("config", &self.config)
            .field("storage", &"<StorageBackend>")
            .finish()
    }
}

impl Server {
    /// Creates a new server with the given configuration.
    ///
    /// Defaults to in-memory storage; use `with_storage_backend` for
    /// production.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config,
            storage: Arc::new(MemoryBackend::new()),
        }
    }

    /// Creates a new server with an explicit storage backend.
    #[must_use]
    pub fn with_storage_backend(config: Config, storage: Arc<dyn StorageBackend>) -> Self {
        Self { config, storage }
    }

    /// Creates a new `ServerBuilder`.
    #[must_use]
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// Returns the server configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Creates the router with all routes and middleware.
    fn create_router(&self) -> Router {
        let state = Arc::new(AppState::new(self.config.clone(), Arc::clone(&self.storage)));

        let cors = self.build_cors_layer();

        let auth_layer =
            middleware::from_fn_with_state(Arc::clone(&state), crate::context::auth_middleware);
        let metrics_layer = middleware::from_fn(crate::metrics::metrics_middleware);

        Router::new()
            // Health, ready, and metrics endpoints (no auth required)
            .route("/health", get(health))
            .route("/ready", get(ready))
            .route("/metrics", get(crate::metrics::serve_metrics))
            // Admin routes (auth via RequestContext extractor)
            .nest("/admin", crate::routes::admin_routes().layer(auth_layer))
            // Middleware (order matters): metrics outermost for timing, then trace, then CORS.
            .layer(cors)
            .layer(TraceLayer::new_for_http())
            .layer(metrics_layer)
            .with_state(state)
    }

    /// Builds the CORS layer from configuration.
    fn build_cors_layer(&self) -> CorsLayer {
        let cors_config = &self.config.cors;
        let cors = Self::build_cors_base(cors_config);
        Self::apply_cors_allowed_origins(cors, cors_config)
    }

    fn build_cors_base(cors_config: &CorsConfig) -> CorsLayer {
        CorsLayer::new()
            .allow_methods([
                Method::GET,
                Method::HEAD,
                Method::POST,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([
                header::AUTHORIZATION,
                header::CONTENT_TYPE,
                header::ACCEPT,
                header::HeaderName::from_static("api-user"),
                header::HeaderName::from_static("x-request-id"),
            ])
            .expose_headers([
                header::CONTENT_TYPE,
                header::CONTENT_LENGTH,
                header::HeaderName::from_static("x-request-id"),
            ])
            .max_age(Duration::from_secs(cors_config.max_age_seconds))
    }

    fn cors_allows_any_origin(cors_config: &CorsConfig) -> bool {
        cors_config.allowed_origins.len() == 1
            && cors_config
                .allowed_origins
                .first()
                .is_some_and(|origin| origin == "*")
    }

    fn parse_cors_origins(cors_config: &CorsConfig) -> Vec<HeaderValue> {
        let mut allowed = Vec::new();
        for origin in &cors_config.allowed_origins {
            match HeaderValue::from_str(origin) {
                Ok(value) => allowed.push(value),
                Err(_) => {
                    tracing::error!(
                        origin = %origin,
                        "Invalid CORS origin; expected a valid HeaderValue"
                    );
                }
            }
        }
        allowed
    }

    fn apply_cors_allowed_origins(cors: CorsLayer, cors_config: &CorsConfig) -> CorsLayer {
        if cors_config.allowed_origins.is_empty() {
            return cors;
        }

        if Self::cors_allows_any_origin(cors_config) {
            return cors.allow_origin(Any);
        }

        if cors_config
            .allowed_origins
            .iter()
            .any(|origin| origin == "*")
        {
            tracing::error!(
                origins = ?cors_config.allowed_origins,
                "Invalid CORS config: '*' must be the only allowed origin"
            );
            return cors;
        }

        let allowed = Self::parse_cors_origins(cors_config);

        if allowed.is_empty() {
            tracing::warn!("All configured CORS origins were invalid; disabling CORS");
            cors
        } else {
            tracing::info!(origins = ?cors_config.allowed_origins, "CORS configured");
            cors.allow_origin(AllowOrigin::list(allowed))
        }
    }

    /// Starts the server and blocks until shutdown.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid for the selected
    /// posture or the listen port cannot be bound.
    pub async fn serve(&self) -> Result<()> {
        self.validate_config()?;

        crate::metrics::init_metrics();

        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.port));
        let router = self.create_router();

        tracing::info!(
            port = self.config.port,
            debug = self.config.debug,
            "Starting conifer API server"
        );

        let listener =
            tokio::net::TcpListener::bind(addr)
                .await
                .map_err(|e| conifer_core::Error::Internal {
                    message: format!("failed to bind to {addr}: {e}"),
                })?;

        axum::serve(listener, router)
            .await
            .map_err(|e| conifer_core::Error::Internal {
                message: format!("server error: {e}"),
            })?;

        Ok(())
    }

    /// Creates a test router for the server.
    ///
    /// This is useful for integration tests where you want to drive the
    /// routes without binding a port.
    #[doc(hidden)]
    #[must_use]
    pub fn test_router(&self) -> Router {
        self.create_router()
    }

    fn validate_config(&self) -> Result<()> {
        // No wildcard origins in production.
        if !self.config.debug
            && self
                .config
                .cors
                .allowed_origins
                .iter()
                .any(|origin| origin == "*")
        {
            return Err(conifer_core::Error::InvalidInput(
                "cors.allowed_origins cannot include '*' when debug=false".to_string(),
            ));
        }

        if !self.config.debug && self.config.jwt.hs256_secret.is_none() {
            return Err(conifer_core::Error::InvalidInput(
                "jwt.hs256_secret (CONIFER_JWT_SECRET) is required when debug=false".to_string(),
            ));
        }

        Ok(())
    }
}

/// Builder for constructing a server.
pub struct ServerBuilder {
    config: Config,
    storage: Arc<dyn StorageBackend>,
}

impl std::fmt::Debug for ServerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerBuilder")
            .field("config", &self.config)
            .field("storage", &"<StorageBackend>")
            .finish()
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self {
            config: Config::default(),
            storage: Arc::new(MemoryBackend::new()),
        }
    }
}

impl ServerBuilder {
    /// Creates a new server builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the HTTP port.
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Enables debug mode.
    ///
    /// See `Config::debug` for behavior changes (header-based auth vs
    /// Authorization).
    #[must_use]
    pub fn debug(mut self, enabled: bool) -> Self {
        self.config.debug = enabled;
        self
    }

    /// Sets the JWT HS256 secret used for bearer token verification.
    ///
    /// Required when `debug` is false.
    #[must_use]
    pub fn jwt_hs256_secret(mut self, secret: impl Into<String>) -> Self {
        self.config.jwt.hs256_secret = Some(secret.into());
        self
    }

    /// Sets the storage backend used by request handlers.
    ///
    /// By default, the server uses an in-memory backend intended only for
    /// tests and local development.
    #[must_use]
    pub fn storage_backend(mut self, storage: Arc<dyn StorageBackend>) -> Self {
        self.storage = storage;
        self
    }

    /// Builds the server.
    #[must_use]
    pub fn build(self) -> Server {
        Server {
            config: self.config,
            storage: self.storage,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
