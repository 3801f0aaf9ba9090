//! SQLite-backed document storage.
//!
//! Production deployments persist documents in a single SQLite file. Every
//! operation opens a short-lived connection guarded by one process-wide
//! mutex, so writes are serialized and the WAL journal keeps readers cheap.
//! The whole operation runs on the blocking thread pool; the mutex is never
//! held across an await point.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{Error, Result};
use crate::storage::{DocumentMeta, StorageBackend, WritePrecondition, WriteResult};

fn db_err(prefix: &str, err: impl std::fmt::Display) -> Error {
    Error::storage(format!("{prefix}: {err}"))
}

/// Past the last codepoint any document path can start with, so a half-open
/// range scan covers exactly one prefix.
const PREFIX_SCAN_END: char = '\u{10FFFF}';

/// Document storage in a single SQLite database file.
pub struct SqliteBackend {
    db_path: Arc<PathBuf>,
    lock: Arc<Mutex<()>>,
}

impl SqliteBackend {
    /// Creates a backend over the given database file.
    ///
    /// The file and its parent directory are created on first use.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: Arc::new(path.into()),
            lock: Arc::new(Mutex::new(())),
        }
    }

    async fn run<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let db_path = Arc::clone(&self.db_path);
        let lock = Arc::clone(&self.lock);
        tokio::task::spawn_blocking(move || {
            let _guard = lock.lock().map_err(|_| Error::Internal {
                message: "lock poisoned".into(),
            })?;
            let mut conn = open_connection(&db_path)?;
            op(&mut conn)
        })
        .await
        .map_err(|err| Error::Internal {
            message: format!("storage task failed: {err}"),
        })?
    }
}

fn open_connection(db_path: &Path) -> Result<Connection> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| db_err("create parent dir", e))?;
    }
    let conn = Connection::open(db_path).map_err(|e| db_err("open sqlite db", e))?;
    conn.pragma_update(None, "journal_mode", "WAL")
        .map_err(|e| db_err("set journal_mode", e))?;
    conn.pragma_update(None, "synchronous", "NORMAL")
        .map_err(|e| db_err("set synchronous", e))?;
    ensure_schema(&conn)?;
    Ok(conn)
}

fn ensure_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS documents (
            path TEXT PRIMARY KEY,
            data BLOB NOT NULL,
            version INTEGER NOT NULL,
            last_modified_ms INTEGER NOT NULL
        );
        ",
    )
    .map_err(|e| db_err("ensure schema", e))?;
    Ok(())
}

fn row_meta(path: String, size: i64, version: i64, modified_ms: i64) -> DocumentMeta {
    DocumentMeta {
        path,
        size: u64::try_from(size).unwrap_or(0),
        version: version.to_string(),
        last_modified: Utc.timestamp_millis_opt(modified_ms).single(),
    }
}

#[async_trait]
impl StorageBackend for SqliteBackend {
    async fn get(&self, path: &str) -> Result<Bytes> {
        let path = path.to_string();
        self.run(move |conn| {
            let data: Option<Vec<u8>> = conn
                .query_row(
                    "SELECT data FROM documents WHERE path = ?1",
                    params![path],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|e| db_err("read document", e))?;
            data.map(Bytes::from)
                .ok_or_else(|| Error::NotFound(format!("document not found: {path}")))
        })
        .await
    }

    async fn put(
        &self,
        path: &str,
        data: Bytes,
        precondition: WritePrecondition,
    ) -> Result<WriteResult> {
        let path = path.to_string();
        self.run(move |conn| {
            let tx = conn.transaction().map_err(|e| db_err("begin tx", e))?;
            let current: Option<i64> = tx
                .query_row(
                    "SELECT version FROM documents WHERE path = ?1",
                    params![path],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|e| db_err("read version", e))?;

            match precondition {
                WritePrecondition::DoesNotExist => {
                    if let Some(version) = current {
                        return Ok(WriteResult::PreconditionFailed {
                            current_version: version.to_string(),
                        });
                    }
                }
                WritePrecondition::MatchesVersion(expected) => {
                    let expected_num: i64 = expected.parse().unwrap_or(-1);
                    match current {
                        Some(version) if version != expected_num => {
                            return Ok(WriteResult::PreconditionFailed {
                                current_version: version.to_string(),
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

            let new_version = current.map_or(1, |v| v + 1);
            tx.execute(
                "INSERT INTO documents (path, data, version, last_modified_ms)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(path) DO UPDATE SET
                     data = excluded.data,
                     version = excluded.version,
                     last_modified_ms = excluded.last_modified_ms",
                params![path, data.as_ref(), new_version, Utc::now().timestamp_millis()],
            )
            .map_err(|e| db_err("write document", e))?;
            tx.commit().map_err(|e| db_err("commit tx", e))?;

            Ok(WriteResult::Success {
                version: new_version.to_string(),
            })
        })
        .await
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let path = path.to_string();
        self.run(move |conn| {
            conn.execute("DELETE FROM documents WHERE path = ?1", params![path])
                .map_err(|e| db_err("delete document", e))?;
            Ok(())
        })
        .await
    }

    async fn list(&self, prefix: &str) -> Result<Vec<DocumentMeta>> {
        // Range scan instead of LIKE: prefixes contain `_`, which LIKE
        // treats as a wildcard.
        let start = prefix.to_string();
        let end = format!("{prefix}{PREFIX_SCAN_END}");
        self.run(move |conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT path, LENGTH(data), version, last_modified_ms
                     FROM documents
                     WHERE path >= ?1 AND path < ?2
                     ORDER BY path ASC",
                )
                .map_err(|e| db_err("prepare list", e))?;
            let rows = stmt
                .query_map(params![start, end], |row| {
                    Ok(row_meta(row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
                })
                .map_err(|e| db_err("query list", e))?;

            let mut out = Vec::new();
            for row in rows {
                out.push(row.map_err(|e| db_err("row decode", e))?);
            }
            Ok(out)
        })
        .await
    }

    async fn head(&self, path: &str) -> Result<Option<DocumentMeta>> {
        let path = path.to_string();
        self.run(move |conn| {
            conn.query_row(
                "SELECT path, LENGTH(data), version, last_modified_ms
                 FROM documents WHERE path = ?1",
                params![path],
                |row| Ok(row_meta(row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()
            .map_err(|e| db_err("read head", e))
        })
        .await
    }
}

impl std::fmt::Debug for SqliteBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteBackend")
            .field("db_path", &self.db_path)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(dir: &tempfile::TempDir) -> SqliteBackend {
        SqliteBackend::new(dir.path().join("conifer.db"))
    }

    #[tokio::test]
    async fn roundtrip_preserves_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend(&dir);
        let data = Bytes::from_static(b"{\"api_url\":\"https://ci.example.com\"}");

        backend
            .put("admin/settings.json", data.clone(), WritePrecondition::None)
            .await
            .unwrap();
        let read = backend.get("admin/settings.json").await.unwrap();
        assert_eq!(read, data);
    }

    #[tokio::test]
    async fn get_missing_document_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend(&dir);
        let err = backend.get("admin/absent.json").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn documents_survive_reopening_the_database() {
        let dir = tempfile::tempdir().unwrap();
        let data = Bytes::from_static(b"persistent");

        {
            let backend = backend(&dir);
            backend
                .put("admin/settings.json", data.clone(), WritePrecondition::None)
                .await
                .unwrap();
        }

        let reopened = backend(&dir);
        assert_eq!(reopened.get("admin/settings.json").await.unwrap(), data);
    }

    #[tokio::test]
    async fn does_not_exist_precondition_rejects_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend(&dir);
        let key = "admin/events/01.json";

        backend
            .put(key, Bytes::from_static(b"first"), WritePrecondition::DoesNotExist)
            .await
            .unwrap();
        let result = backend
            .put(key, Bytes::from_static(b"second"), WritePrecondition::DoesNotExist)
            .await
            .unwrap();

        assert!(matches!(result, WriteResult::PreconditionFailed { .. }));
        assert_eq!(backend.get(key).await.unwrap(), Bytes::from_static(b"first"));
    }

    #[tokio::test]
    async fn matches_version_precondition_detects_stale_writer() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend(&dir);
        let key = "admin/settings.json";

        let WriteResult::Success { version } = backend
            .put(key, Bytes::from_static(b"v1"), WritePrecondition::None)
            .await
            .unwrap()
        else {
            panic!("first write should succeed");
        };

        backend
            .put(key, Bytes::from_static(b"v2"), WritePrecondition::None)
            .await
            .unwrap();

        let stale = backend
            .put(
                key,
                Bytes::from_static(b"v3"),
                WritePrecondition::MatchesVersion(version),
            )
            .await
            .unwrap();
        assert!(matches!(
            stale,
            WriteResult::PreconditionFailed { current_version } if current_version == "2"
        ));
    }

    #[tokio::test]
    async fn list_scopes_to_prefix_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend(&dir);

        for key in [
            "fleet/node-groups/beta.json",
            "fleet/node-groups/alpha.json",
            "scheduler/task-queues/alpha.json",
        ] {
            backend
                .put(key, Bytes::from_static(b"{}"), WritePrecondition::None)
                .await
                .unwrap();
        }

        let metas = backend.list("fleet/node-groups/").await.unwrap();
        let paths: Vec<&str> = metas.iter().map(|m| m.path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["fleet/node-groups/alpha.json", "fleet/node-groups/beta.json"]
        );
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend(&dir);
        let key = "scheduler/task-queues/d1.json";

        backend
            .put(key, Bytes::from_static(b"{}"), WritePrecondition::None)
            .await
            .unwrap();
        backend.delete(key).await.unwrap();
        backend.delete(key).await.unwrap();
        assert!(backend.get(key).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn head_reports_version_and_size() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend(&dir);
        let key = "admin/settings.json";

        backend
            .put(key, Bytes::from_static(b"12345"), WritePrecondition::None)
            .await
            .unwrap();
        backend
            .put(key, Bytes::from_static(b"123456"), WritePrecondition::None)
            .await
            .unwrap();

        let meta = backend.head(key).await.unwrap().unwrap();
        assert_eq!(meta.version, "2");
        assert_eq!(meta.size, 6);
        assert!(meta.last_modified.is_some());

        assert!(backend.head("admin/absent.json").await.unwrap().is_none());
    }
}
