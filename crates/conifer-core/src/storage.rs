//! Document storage abstraction for the control plane.
//!
//! Every durable thing conifer owns (the live configuration document, the
//! append-only admin event log, node group records, per-node-group dispatch
//! queues, finished task records) is a JSON document behind this trait.
//!
//! The contract the rest of the crate depends on:
//! - writes are all-or-nothing at the document level; readers always observe
//!   a fully formed prior or current value, never a partial write
//! - conditional writes (`WritePrecondition`) are decided atomically with
//!   the write itself
//! - there is no in-process lock shared across requests; backends provide
//!   the only coordination
//!
//! Backends: [`MemoryBackend`] for tests and debug runs, and
//! [`SqliteBackend`](crate::sqlite::SqliteBackend) for durable single-node
//! deployments.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::error::{Error, Result};

/// Precondition for conditional writes.
///
/// The version token is opaque; backends interpret it according to their
/// own versioning scheme.
#[derive(Debug, Clone)]
pub enum WritePrecondition {
    /// Write only if the document does not exist.
    DoesNotExist,
    /// Write only if the document's version matches the given token.
    MatchesVersion(String),
    /// Write unconditionally (last writer wins).
    None,
}

/// Result of a conditional write.
#[derive(Debug, Clone)]
pub enum WriteResult {
    /// Write succeeded, returns new version token.
    Success {
        /// The new version token after the write.
        version: String,
    },
    /// Precondition failed, returns current version token.
    PreconditionFailed {
        /// The current version that caused the precondition to fail.
        current_version: String,
    },
}

/// Metadata about a stored document.
#[derive(Debug, Clone)]
pub struct DocumentMeta {
    /// Document path (key).
    pub path: String,
    /// Document size in bytes.
    pub size: u64,
    /// Document version token.
    pub version: String,
    /// Last modification timestamp.
    pub last_modified: Option<DateTime<Utc>>,
}

/// Storage backend trait for control-plane documents.
#[async_trait]
pub trait StorageBackend: Send + Sync + 'static {
    /// Reads an entire document.
    ///
    /// Returns `Error::NotFound` if the document doesn't exist.
    async fn get(&self, path: &str) -> Result<Bytes>;

    /// Writes a document with an optional precondition.
    ///
    /// Returns `WriteResult::PreconditionFailed` if the precondition is not
    /// met. A failed precondition is a normal result, never an error.
    async fn put(
        &self,
        path: &str,
        data: Bytes,
        precondition: WritePrecondition,
    ) -> Result<WriteResult>;

    /// Deletes a document.
    ///
    /// Succeeds even if the document doesn't exist (idempotent).
    async fn delete(&self, path: &str) -> Result<()>;

    /// Lists documents with the given prefix.
    ///
    /// Returns an empty vec if nothing matches. Ordering is unspecified;
    /// callers requiring deterministic order sort the results themselves.
    async fn list(&self, prefix: &str) -> Result<Vec<DocumentMeta>>;

    /// Reads document metadata without content.
    ///
    /// Returns `None` if the document doesn't exist.
    async fn head(&self, path: &str) -> Result<Option<DocumentMeta>>;
}

/// In-memory storage backend for tests and debug deployments.
///
/// Thread-safe via `RwLock`. State is lost on process exit, so production
/// deployments use the SQLite backend instead.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    documents: Arc<RwLock<HashMap<String, StoredDocument>>>,
}

#[derive(Debug, Clone)]
struct StoredDocument {
    data: Bytes,
    /// Numeric version stored as i64 internally, exposed as String via API.
    version: i64,
    last_modified: DateTime<Utc>,
}

impl MemoryBackend {
    /// Creates a new empty memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn get(&self, path: &str) -> Result<Bytes> {
        let documents = self.documents.read().map_err(|_| Error::Internal {
            message: "lock poisoned".into(),
        })?;

        documents
            .get(path)
            .map(|d| d.data.clone())
            .ok_or_else(|| Error::NotFound(format!("document not found: {path}")))
    }

    async fn put(
        &self,
        path: &str,
        data: Bytes,
        precondition: WritePrecondition,
    ) -> Result<WriteResult> {
        let mut documents = self.documents.write().map_err(|_| Error::Internal {
            message: "lock poisoned".into(),
        })?;

        let current = documents.get(path);

        match precondition {
            WritePrecondition::DoesNotExist => {
                if let Some(doc) = current {
                    return Ok(WriteResult::PreconditionFailed {
                        current_version: doc.version.to_string(),
                    });
                }
            }
            WritePrecondition::MatchesVersion(expected) => {
                let expected_num: i64 = expected.parse().unwrap_or(-1);
                match current {
                    Some(doc) if doc.version != expected_num => {
                        return Ok(WriteResult::PreconditionFailed {
                            current_version: doc.version.to_string(),
                        });
                    }
                    None => {
                        return Ok(WriteResult::PreconditionFailed {
                            current_version: "0".to_string(),
                        });
                    }
                    _ => {}
                }
            }
            WritePrecondition::None => {}
        }

        let new_version = current.map_or(1, |d| d.version + 1);
        documents.insert(
            path.to_string(),
            StoredDocument {
                data,
                version: new_version,
                last_modified: Utc::now(),
            },
        );
        drop(documents);

        Ok(WriteResult::Success {
            version: new_version.to_string(),
        })
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.documents
            .write()
            .map_err(|_| Error::Internal {
                message: "lock poisoned".into(),
            })?
            .remove(path);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<DocumentMeta>> {
        let documents = self.documents.read().map_err(|_| Error::Internal {
            message: "lock poisoned".into(),
        })?;

        Ok(documents
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(path, doc)| DocumentMeta {
                path: path.clone(),
                size: doc.data.len() as u64,
                version: doc.version.to_string(),
                last_modified: Some(doc.last_modified),
            })
            .collect())
    }

    async fn head(&self, path: &str) -> Result<Option<DocumentMeta>> {
        let documents = self.documents.read().map_err(|_| Error::Internal {
            message: "lock poisoned".into(),
        })?;

        Ok(documents.get(path).map(|doc| DocumentMeta {
            path: path.to_string(),
            size: doc.data.len() as u64,
            version: doc.version.to_string(),
            last_modified: Some(doc.last_modified),
        }))
    }
}
