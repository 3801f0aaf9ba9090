//! Restarting finished tasks.
//!
//! Operators occasionally need to re-run every task that failed inside some
//! time window, typically after an infrastructure incident. The restarter
//! scans the finished-task registry, rebuilds queue items for the failures,
//! and appends them to each task's node group dispatch queue. A dry run
//! reports what would be restarted without touching any queue.

use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{Error, Result};
use crate::events::EventLog;
use crate::keys;
use crate::queue::{TaskQueueItem, TaskQueueStore};
use crate::storage::{StorageBackend, WritePrecondition};

/// Terminal status of a task that failed.
pub const TASK_FAILED: &str = "failed";

/// Terminal status of a task that succeeded.
pub const TASK_SUCCEEDED: &str = "success";

/// A task that has reached a terminal status.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct FinishedTask {
    /// Task identifier.
    pub id: String,
    /// Human-readable task name.
    pub display_name: String,
    /// Node group the task ran on.
    pub node_group: String,
    /// Build variant the task belongs to.
    pub build_variant: String,
    /// Project the task belongs to.
    pub project: String,
    /// Revision the task ran against.
    pub revision: String,
    /// What requested the task.
    pub requester: String,
    /// Terminal status, `failed` or `success`.
    pub status: String,
    /// When the task finished (UTC).
    pub finish_time: DateTime<Utc>,
    /// Observed runtime in milliseconds, used as the expectation on re-run.
    pub expected_duration_ms: u64,
}

impl FinishedTask {
    fn queue_item(&self) -> TaskQueueItem {
        TaskQueueItem {
            id: self.id.clone(),
            display_name: self.display_name.clone(),
            build_variant: self.build_variant.clone(),
            project: self.project.clone(),
            revision: self.revision.clone(),
            requester: self.requester.clone(),
            priority: 0,
            expected_duration_ms: self.expected_duration_ms,
        }
    }
}

/// Registry of tasks that have reached a terminal status.
#[derive(Clone)]
pub struct FinishedTaskStore {
    storage: Arc<dyn StorageBackend>,
}

impl FinishedTaskStore {
    /// Creates a registry over the given backend.
    #[must_use]
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self { storage }
    }

    /// Records a terminal task, replacing any earlier record for the same id.
    pub async fn record(&self, task: &FinishedTask) -> Result<()> {
        if task.id.is_empty() {
            return Err(Error::InvalidInput(
                "finished task id must not be empty".to_string(),
            ));
        }
        let data = serde_json::to_vec(task).map_err(Error::serialization)?;
        self.storage
            .put(
                &keys::finished_task_key(&task.id),
                Bytes::from(data),
                WritePrecondition::None,
            )
            .await?;
        Ok(())
    }

    /// Returns tasks that finished inside the inclusive window, ordered by
    /// finish time then id.
    pub async fn list_window(
        &self,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Result<Vec<FinishedTask>> {
        let metas = self.storage.list(keys::FINISHED_TASKS_PREFIX).await?;
        let mut tasks = Vec::new();
        for meta in metas {
            let data = match self.storage.get(&meta.path).await {
                Ok(data) => data,
                Err(err) if err.is_not_found() => continue,
                Err(err) => return Err(err),
            };
            let task: FinishedTask = serde_json::from_slice(&data).map_err(Error::serialization)?;
            if task.finish_time >= start_time && task.finish_time <= end_time {
                tasks.push(task);
            }
        }
        tasks.sort_by(|a, b| {
            a.finish_time
                .cmp(&b.finish_time)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(tasks)
    }
}

impl std::fmt::Debug for FinishedTaskStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FinishedTaskStore").finish_non_exhaustive()
    }
}

/// Bounds and mode of a restart request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartOptions {
    /// Start of the completion-time window, inclusive.
    pub start_time: DateTime<Utc>,
    /// End of the completion-time window, inclusive.
    pub end_time: DateTime<Utc>,
    /// When set, report candidates without mutating any queue.
    pub dry_run: bool,
}

/// Outcome of a restart request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RestartSummary {
    /// Ids of tasks put back on a dispatch queue (or, on a dry run, the
    /// tasks that would be).
    pub restarted: Vec<String>,
    /// Ids of tasks that could not be re-queued.
    pub errored: Vec<String>,
    /// Degraded-success notices, e.g. an audit append that failed after the
    /// queues were already updated.
    pub warnings: Vec<String>,
}

/// Re-queues failed tasks from a completion-time window.
#[derive(Clone)]
pub struct TaskRestarter {
    finished: FinishedTaskStore,
    queues: TaskQueueStore,
    events: EventLog,
}

impl TaskRestarter {
    /// Creates a restarter over the given stores.
    #[must_use]
    pub fn new(finished: FinishedTaskStore, queues: TaskQueueStore, events: EventLog) -> Self {
        Self {
            finished,
            queues,
            events,
        }
    }

    /// Restarts every failed task whose finish time falls inside the window.
    ///
    /// Tasks are grouped by node group and appended to each group's queue
    /// with one load-modify-save per group. A group whose queue cannot be
    /// updated contributes its task ids to `errored` while the remaining
    /// groups still proceed. One task-restart audit record is appended when
    /// anything was restarted; if that append fails the restart stands and
    /// the failure surfaces as a warning.
    pub async fn restart_tasks(
        &self,
        opts: RestartOptions,
        user: &str,
    ) -> Result<RestartSummary> {
        if opts.end_time < opts.start_time {
            return Err(Error::InvalidInput(
                "end time cannot be before start time".to_string(),
            ));
        }

        let candidates: Vec<FinishedTask> = self
            .finished
            .list_window(opts.start_time, opts.end_time)
            .await?
            .into_iter()
            .filter(|task| task.status == TASK_FAILED)
            .collect();

        if opts.dry_run {
            return Ok(RestartSummary {
                restarted: candidates.into_iter().map(|t| t.id).collect(),
                ..RestartSummary::default()
            });
        }

        let mut by_group: BTreeMap<String, Vec<FinishedTask>> = BTreeMap::new();
        for task in candidates {
            by_group.entry(task.node_group.clone()).or_default().push(task);
        }

        let mut summary = RestartSummary::default();
        for (node_group, tasks) in by_group {
            match self.requeue_group(&node_group, &tasks).await {
                Ok(()) => summary.restarted.extend(tasks.into_iter().map(|t| t.id)),
                Err(err) => {
                    tracing::warn!(
                        node_group = %node_group,
                        error = %err,
                        "failed to re-queue restarted tasks"
                    );
                    summary.errored.extend(tasks.into_iter().map(|t| t.id));
                }
            }
        }

        if !summary.restarted.is_empty() {
            if let Err(err) = self
                .events
                .record_task_restart(
                    summary.restarted.clone(),
                    opts.start_time,
                    opts.end_time,
                    user,
                )
                .await
            {
                summary
                    .warnings
                    .push(format!("failed to record task restart event: {err}"));
            }
        }

        Ok(summary)
    }

    async fn requeue_group(&self, node_group: &str, tasks: &[FinishedTask]) -> Result<()> {
        let mut queue = self.queues.load(node_group).await?;
        for task in tasks {
            // A task already waiting for dispatch is not queued twice.
            if queue.items.iter().any(|item| item.id == task.id) {
                continue;
            }
            queue.items.push(task.queue_item());
        }
        self.queues.save(&queue).await
    }
}

impl std::fmt::Debug for TaskRestarter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRestarter").finish_non_exhaustive()
    }
}
