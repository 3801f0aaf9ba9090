//! Storage key layout for control-plane documents.
//!
//! All durable state lives under a small, fixed set of prefixes:
//!
//! | Prefix | Contents | Writer |
//! |--------|----------|--------|
//! | `admin/settings.json` | the single live configuration document | control plane |
//! | `admin/events/` | append-only admin event log, one document per event | control plane |
//! | `fleet/node-groups/` | node group (distro) records | fleet administration |
//! | `scheduler/task-queues/` | one dispatch queue document per node group | scheduler, control plane |
//! | `tasks/finished/` | finished task records consulted by restart | fleet |
//!
//! Keys are plain strings; identifiers are ULIDs or operator-chosen ids that
//! never contain `/`.

/// Key of the single live configuration document.
pub const SETTINGS_KEY: &str = "admin/settings.json";

/// Prefix of the admin event log.
pub const EVENTS_PREFIX: &str = "admin/events/";

/// Prefix of node group records.
pub const NODE_GROUPS_PREFIX: &str = "fleet/node-groups/";

/// Prefix of per-node-group dispatch queue documents.
pub const TASK_QUEUES_PREFIX: &str = "scheduler/task-queues/";

/// Prefix of finished task records.
pub const FINISHED_TASKS_PREFIX: &str = "tasks/finished/";

/// Key of the admin event with the given guid.
#[must_use]
pub fn event_key(guid: &str) -> String {
    format!("{EVENTS_PREFIX}{guid}.json")
}

/// Key of the node group record with the given id.
#[must_use]
pub fn node_group_key(id: &str) -> String {
    format!("{NODE_GROUPS_PREFIX}{id}.json")
}

/// Key of the dispatch queue document for the given node group.
#[must_use]
pub fn task_queue_key(node_group: &str) -> String {
    format!("{TASK_QUEUES_PREFIX}{node_group}.json")
}

/// Key of the finished task record with the given task id.
#[must_use]
pub fn finished_task_key(task_id: &str) -> String {
    format!("{FINISHED_TASKS_PREFIX}{task_id}.json")
}
