//! # conifer-core
//!
//! Core types and stores for the Conifer CI platform control plane.
//!
//! This crate holds everything the API server builds on:
//!
//! - **Settings**: the single live cluster configuration document
//! - **Validation**: whole-document checks that report every violation
//! - **Events**: the append-only audit log with cursor pagination
//! - **Stores**: configuration, node group, task queue, and finished-task
//!   stores over one document storage trait
//! - **Storage Backends**: in-memory (tests, debug) and SQLite (production)
//!
//! ## Crate Boundary
//!
//! `conifer-core` owns the domain semantics; it has no HTTP surface. The
//! API crate translates requests into calls on these stores and maps
//! [`Error`] values onto status codes.
//!
//! ## Example
//!
//! ```rust
//! use conifer_core::prelude::*;
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<()> {
//! let storage: Arc<dyn StorageBackend> = Arc::new(MemoryBackend::new());
//! let store = SettingsStore::new(
//!     Arc::clone(&storage),
//!     NodeGroupStore::new(Arc::clone(&storage)),
//!     EventLog::new(storage),
//! );
//!
//! // The default document exists before the first write.
//! let settings = store.get().await?;
//! assert!(settings.api_url.is_empty());
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod events;
pub mod keys;
pub mod node_group;
pub mod observability;
pub mod queue;
pub mod restart;
pub mod settings;
pub mod sqlite;
pub mod storage;
pub mod store;
pub mod validation;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust
/// use conifer_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::events::{AdminEvent, AdminEventPayload, EventLog, EventPage, PageLink};
    pub use crate::node_group::{NodeGroup, NodeGroupStore};
    pub use crate::queue::{TaskQueue, TaskQueueItem, TaskQueueStore};
    pub use crate::restart::{
        FinishedTask, FinishedTaskStore, RestartOptions, RestartSummary, TaskRestarter,
    };
    pub use crate::settings::{ContainerPool, Settings};
    pub use crate::sqlite::SqliteBackend;
    pub use crate::storage::{
        DocumentMeta, MemoryBackend, StorageBackend, WritePrecondition, WriteResult,
    };
    pub use crate::store::{ChangeNotifier, SetOutcome, SettingsStore};
}

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use events::{AdminEvent, AdminEventPayload, EventLog, EventPage, PageLink};
pub use node_group::{NodeGroup, NodeGroupStore};
pub use observability::{init_logging, LogFormat};
pub use queue::{TaskQueue, TaskQueueItem, TaskQueueStore};
pub use restart::{FinishedTask, FinishedTaskStore, RestartOptions, RestartSummary, TaskRestarter};
pub use settings::{ContainerPool, Settings};
pub use sqlite::SqliteBackend;
pub use storage::{DocumentMeta, MemoryBackend, StorageBackend, WritePrecondition, WriteResult};
pub use store::{ChangeNotifier, SetOutcome, SettingsStore};
