//! Administrative audit events.
//!
//! Every accepted configuration change and task restart appends one
//! [`AdminEvent`] to a durable, append-only log. Records are immutable once
//! written: the log exposes no update or delete operation, and the storage
//! write carries a does-not-exist precondition so an existing record can
//! never be replaced.
//!
//! Events are keyed by their ULID guid. ULIDs sort lexicographically by
//! creation time at millisecond precision, and the stored timestamp is
//! truncated to the same precision from the same instant, so key order and
//! timestamp order always agree. Pagination walks keys newest-first and
//! compares cursors against stored timestamps exactly.

use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;
use utoipa::ToSchema;

use crate::error::{Error, Result};
use crate::keys;
use crate::settings::Settings;
use crate::storage::{StorageBackend, WritePrecondition, WriteResult};

/// Query parameter carrying the pagination cursor.
pub const KEY_QUERY_PARAM: &str = "ts";

/// Query parameter carrying the page size.
pub const LIMIT_QUERY_PARAM: &str = "limit";

/// Link relation of the follow-up page.
pub const NEXT_RELATION: &str = "next";

/// Page size used when the caller does not specify one.
pub const DEFAULT_PAGE_LIMIT: usize = 10;

/// Truncates a timestamp to millisecond precision.
///
/// Audit timestamps are persisted and compared at millisecond precision;
/// anything finer would make cursor round-trips through RFC 3339 lossy.
#[must_use]
pub fn truncate_to_millis(ts: DateTime<Utc>) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ts.timestamp_millis())
        .single()
        .unwrap_or(ts)
}

/// What an audit record describes.
///
/// The wire form is internally tagged on `kind`, so consumers can dispatch
/// without trying every variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind")]
pub enum AdminEventPayload {
    /// A configuration document was replaced.
    #[serde(rename = "configuration-change")]
    ConfigChange {
        /// The live document before the commit.
        before: Box<Settings>,
        /// The committed document.
        after: Box<Settings>,
    },
    /// Finished tasks were reset to run again.
    #[serde(rename = "task-restart")]
    TaskRestart {
        /// Ids of the tasks that were restarted.
        restarted: Vec<String>,
        /// Start of the completion-time window, inclusive.
        start_time: DateTime<Utc>,
        /// End of the completion-time window, inclusive.
        end_time: DateTime<Utc>,
    },
}

impl AdminEventPayload {
    /// Returns the wire tag of this payload.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::ConfigChange { .. } => "configuration-change",
            Self::TaskRestart { .. } => "task-restart",
        }
    }
}

/// One immutable audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AdminEvent {
    /// Unique record identifier (ULID).
    pub guid: String,
    /// When the record was created (UTC, millisecond precision).
    pub timestamp: DateTime<Utc>,
    /// Principal that performed the operation.
    pub user: String,
    /// What happened.
    pub payload: AdminEventPayload,
}

/// One page of audit records, newest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct EventPage {
    /// The records on this page.
    pub events: Vec<AdminEvent>,
    /// How to request the records older than this page, when the page is
    /// non-empty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<PageLink>,
}

/// Self-describing cursor metadata for the follow-up page.
///
/// Carries everything a client needs to build the next request without
/// out-of-band knowledge: the cursor value, which query parameters to put it
/// and the limit in, and the link relation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PageLink {
    /// Cursor value: RFC 3339 timestamp of the last record on this page.
    pub key: String,
    /// Page size to request.
    pub limit: usize,
    /// Link relation, always `next`.
    pub relation: String,
    /// Query parameter the cursor goes in, always `ts`.
    pub key_query_param: String,
    /// Query parameter the page size goes in, always `limit`.
    pub limit_query_param: String,
}

impl PageLink {
    fn next(last: &AdminEvent, limit: usize) -> Self {
        Self {
            key: last
                .timestamp
                .to_rfc3339_opts(SecondsFormat::Millis, true),
            limit,
            relation: NEXT_RELATION.to_string(),
            key_query_param: KEY_QUERY_PARAM.to_string(),
            limit_query_param: LIMIT_QUERY_PARAM.to_string(),
        }
    }
}

/// Append-only log of administrative audit records.
#[derive(Clone)]
pub struct EventLog {
    storage: Arc<dyn StorageBackend>,
}

impl EventLog {
    /// Creates a log over the given backend.
    #[must_use]
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self { storage }
    }

    /// Appends a configuration-change record.
    pub async fn record_config_change(
        &self,
        before: Settings,
        after: Settings,
        user: &str,
    ) -> Result<AdminEvent> {
        self.append(
            AdminEventPayload::ConfigChange {
                before: Box::new(before),
                after: Box::new(after),
            },
            user,
        )
        .await
    }

    /// Appends a task-restart record.
    pub async fn record_task_restart(
        &self,
        restarted: Vec<String>,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        user: &str,
    ) -> Result<AdminEvent> {
        self.append(
            AdminEventPayload::TaskRestart {
                restarted,
                start_time,
                end_time,
            },
            user,
        )
        .await
    }

    async fn append(&self, payload: AdminEventPayload, user: &str) -> Result<AdminEvent> {
        let now = truncate_to_millis(Utc::now());
        // Deriving the ULID from the stored instant keeps key order and
        // timestamp order in lockstep.
        let guid = Ulid::from_datetime(now.into()).to_string();

        let event = AdminEvent {
            guid: guid.clone(),
            timestamp: now,
            user: user.to_string(),
            payload,
        };

        let data = serde_json::to_vec(&event).map_err(Error::serialization)?;
        let result = self
            .storage
            .put(
                &keys::event_key(&guid),
                Bytes::from(data),
                WritePrecondition::DoesNotExist,
            )
            .await?;

        match result {
            WriteResult::Success { .. } => Ok(event),
            WriteResult::PreconditionFailed { .. } => Err(Error::Internal {
                message: format!("audit record {guid} already exists"),
            }),
        }
    }

    /// Fetches a record by guid.
    pub async fn find(&self, guid: &str) -> Result<Option<AdminEvent>> {
        let data = match self.storage.get(&keys::event_key(guid)).await {
            Ok(data) => data,
            Err(err) if err.is_not_found() => return Ok(None),
            Err(err) => return Err(err),
        };
        let event = serde_json::from_slice(&data).map_err(Error::serialization)?;
        Ok(Some(event))
    }

    /// Returns up to `limit` records, newest first.
    ///
    /// With a cursor, only records whose timestamp is strictly earlier are
    /// eligible, so the record a cursor was taken from is never delivered
    /// twice. The page carries a [`PageLink`] whenever it is non-empty.
    pub async fn paginate(
        &self,
        before: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<EventPage> {
        let mut metas = self.storage.list(keys::EVENTS_PREFIX).await?;
        metas.sort_by(|a, b| b.path.cmp(&a.path));

        let mut events = Vec::new();
        for meta in metas {
            if events.len() == limit {
                break;
            }
            let data = match self.storage.get(&meta.path).await {
                Ok(data) => data,
                Err(err) if err.is_not_found() => continue,
                Err(err) => return Err(err),
            };
            let event: AdminEvent = serde_json::from_slice(&data).map_err(Error::serialization)?;
            if let Some(cursor) = before {
                if event.timestamp >= cursor {
                    continue;
                }
            }
            events.push(event);
        }

        let next = events.last().map(|last| PageLink::next(last, limit));
        Ok(EventPage { events, next })
    }
}

impl std::fmt::Debug for EventLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLog").finish_non_exhaustive()
    }
}
