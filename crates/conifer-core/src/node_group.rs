//! Node groups: named classes of worker hosts.
//!
//! A node group describes a homogeneous set of hosts (same provider, same
//! image) that tasks can be scheduled onto. Container pools in
//! [`crate::settings::Settings`] reference node groups by id; the validator
//! resolves those references against the groups stored here.

use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{Error, Result};
use crate::keys;
use crate::storage::{StorageBackend, WritePrecondition};

/// A named class of worker hosts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct NodeGroup {
    /// Unique identifier, e.g. `ubuntu2204-large`.
    pub id: String,
    /// Cloud provider the group's hosts run on.
    pub provider: String,
    /// Host architecture, e.g. `linux_amd64`.
    pub arch: String,
    /// Container pool this group's hosts are assigned to, if any.
    ///
    /// A group assigned to a pool cannot itself back another pool.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_pool: Option<String>,
}

impl NodeGroup {
    /// Creates a group with the given id and no pool assignment.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }
}

/// Durable store of node group definitions.
#[derive(Clone)]
pub struct NodeGroupStore {
    storage: Arc<dyn StorageBackend>,
}

impl NodeGroupStore {
    /// Creates a store over the given backend.
    #[must_use]
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self { storage }
    }

    /// Writes a group, replacing any existing definition with the same id.
    pub async fn upsert(&self, group: &NodeGroup) -> Result<()> {
        if group.id.is_empty() {
            return Err(Error::InvalidInput(
                "node group id must not be empty".to_string(),
            ));
        }
        let data = serde_json::to_vec(group).map_err(Error::serialization)?;
        self.storage
            .put(
                &keys::node_group_key(&group.id),
                Bytes::from(data),
                WritePrecondition::None,
            )
            .await?;
        Ok(())
    }

    /// Fetches a group by id.
    pub async fn get(&self, id: &str) -> Result<NodeGroup> {
        let data = match self.storage.get(&keys::node_group_key(id)).await {
            Ok(data) => data,
            Err(err) if err.is_not_found() => {
                return Err(Error::resource_not_found("node group", id));
            }
            Err(err) => return Err(err),
        };
        serde_json::from_slice(&data).map_err(Error::serialization)
    }

    /// Lists all groups, ordered by id.
    pub async fn list(&self) -> Result<Vec<NodeGroup>> {
        let metas = self.storage.list(keys::NODE_GROUPS_PREFIX).await?;
        let mut groups = Vec::with_capacity(metas.len());
        for meta in metas {
            let data = match self.storage.get(&meta.path).await {
                Ok(data) => data,
                // Deleted between list and get; skip rather than fail the scan.
                Err(err) if err.is_not_found() => continue,
                Err(err) => return Err(err),
            };
            let group: NodeGroup = serde_json::from_slice(&data).map_err(Error::serialization)?;
            groups.push(group);
        }
        groups.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(groups)
    }

    /// Removes a group. Removing an unknown id is not an error.
    pub async fn delete(&self, id: &str) -> Result<()> {
        self.storage.delete(&keys::node_group_key(id)).await
    }
}

impl std::fmt::Debug for NodeGroupStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeGroupStore").finish_non_exhaustive()
    }
}
