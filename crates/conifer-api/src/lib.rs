//! # conifer-api
//!
//! HTTP composition layer for the conifer control plane.
//!
//! This crate provides the API surface for conifer, handling:
//!
//! - **Authentication**: Principal identification via JWT or debug headers
//! - **Routing**: Admin endpoint configuration
//! - **Service Wiring**: Composition of the settings, event, and queue stores
//! - **Observability**: Metrics, tracing, and health checks
//!
//! ## Design Principles
//!
//! This crate is a **thin composition layer** with no domain policy.
//! All business logic lives in `conifer-core`.
//!
//! ## Endpoints
//!
//! ```text
//! GET    /health              - Health check
//! GET    /ready               - Readiness check
//! GET    /metrics             - Prometheus metrics
//! GET    /admin/settings      - Fetch the live settings document
//! POST   /admin/settings      - Validate and commit a candidate document
//! POST   /admin/revert        - Undo a recorded configuration change
//! GET    /admin/events        - Page through the audit record feed
//! POST   /admin/restart       - Requeue failed tasks in a time window
//! GET    /admin/task_queue    - Inspect a node group's task queue
//! DELETE /admin/task_queue    - Clear a node group's task queue
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use conifer_api::server::Server;
//!
//! let server = Server::builder()
//!     .port(8080)
//!     .jwt_hs256_secret("secret")
//!     .build();
//!
//! server.serve().await?;
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod context;
pub mod error;
pub mod metrics;
pub mod openapi;
pub mod routes;
pub mod server;
pub mod webhook;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::context::RequestContext;
    pub use crate::error::{ApiError, ApiResult};
    pub use crate::server::Server;
}
