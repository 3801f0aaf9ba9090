//! Per-node-group task queues.
//!
//! The scheduler produces one ordered queue of runnable tasks per node
//! group. Queues are always written wholesale: a save replaces whatever was
//! stored for that group, and item order is the dispatch order. A group with
//! no stored queue reads back as an empty queue, so consumers never
//! distinguish "never scheduled" from "drained".

use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{Error, Result};
use crate::keys;
use crate::storage::{StorageBackend, WritePrecondition};

/// One runnable task waiting for dispatch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct TaskQueueItem {
    /// Task identifier.
    pub id: String,
    /// Human-readable task name.
    pub display_name: String,
    /// Build variant the task belongs to.
    pub build_variant: String,
    /// Project the task belongs to.
    pub project: String,
    /// Revision the task runs against.
    pub revision: String,
    /// What requested the task, e.g. `gitter_request` or `patch_request`.
    pub requester: String,
    /// Scheduling priority. Higher runs sooner.
    pub priority: i64,
    /// Predicted runtime in milliseconds.
    pub expected_duration_ms: u64,
}

/// The ordered dispatch queue of one node group.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct TaskQueue {
    /// Node group this queue feeds.
    pub node_group: String,
    /// Tasks in dispatch order.
    pub items: Vec<TaskQueueItem>,
}

impl TaskQueue {
    /// Creates a queue for the given group.
    #[must_use]
    pub fn new(node_group: impl Into<String>, items: Vec<TaskQueueItem>) -> Self {
        Self {
            node_group: node_group.into(),
            items,
        }
    }

    /// Number of queued tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the queue holds no tasks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Durable store of per-node-group task queues.
#[derive(Clone)]
pub struct TaskQueueStore {
    storage: Arc<dyn StorageBackend>,
}

impl TaskQueueStore {
    /// Creates a store over the given backend.
    #[must_use]
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self { storage }
    }

    /// Persists a queue, replacing the group's previous queue entirely.
    pub async fn save(&self, queue: &TaskQueue) -> Result<()> {
        if queue.node_group.is_empty() {
            return Err(Error::InvalidInput(
                "task queue node group must not be empty".to_string(),
            ));
        }
        let data = serde_json::to_vec(queue).map_err(Error::serialization)?;
        self.storage
            .put(
                &keys::task_queue_key(&queue.node_group),
                Bytes::from(data),
                WritePrecondition::None,
            )
            .await?;
        Ok(())
    }

    /// Loads a group's queue. A group with no stored queue is empty.
    pub async fn load(&self, node_group: &str) -> Result<TaskQueue> {
        if node_group.is_empty() {
            return Err(Error::InvalidInput(
                "task queue node group must not be empty".to_string(),
            ));
        }
        let data = match self.storage.get(&keys::task_queue_key(node_group)).await {
            Ok(data) => data,
            Err(err) if err.is_not_found() => {
                return Ok(TaskQueue::new(node_group, Vec::new()));
            }
            Err(err) => return Err(err),
        };
        serde_json::from_slice(&data).map_err(Error::serialization)
    }

    /// Drops a group's queue. Clearing an absent queue succeeds.
    pub async fn clear(&self, node_group: &str) -> Result<()> {
        if node_group.is_empty() {
            return Err(Error::InvalidInput(
                "task queue node group must not be empty".to_string(),
            ));
        }
        self.storage.delete(&keys::task_queue_key(node_group)).await
    }
}

impl std::fmt::Debug for TaskQueueStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskQueueStore").finish_non_exhaustive()
    }
}
