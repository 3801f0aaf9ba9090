//! `conifer-api` binary entrypoint.
//!
//! Loads configuration from environment variables and starts the HTTP server.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]

use std::sync::Arc;

use anyhow::Result;

use conifer_api::config::Config;
use conifer_api::server::Server;
use conifer_core::observability::{LogFormat, init_logging};
use conifer_core::sqlite::SqliteBackend;
use conifer_core::storage::{MemoryBackend, StorageBackend};

fn choose_log_format(config: &Config) -> LogFormat {
    if config.debug {
        LogFormat::Pretty
    } else {
        LogFormat::Json
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    init_logging(choose_log_format(&config));

    let storage: Arc<dyn StorageBackend> = if let Some(path) = config.db_path.as_deref() {
        tracing::info!(path = %path.display(), "Using SQLite storage backend");
        Arc::new(SqliteBackend::new(path))
    } else {
        if !config.debug {
            anyhow::bail!("CONIFER_DB_PATH is required when CONIFER_DEBUG=false");
        }
        tracing::warn!("CONIFER_DB_PATH not set; using in-memory storage backend (debug only)");
        Arc::new(MemoryBackend::new())
    };

    let server = Server::with_storage_backend(config, storage);
    server.serve().await?;
    Ok(())
}
