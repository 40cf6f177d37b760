//! Persisted apply state
//!
//! The state file is the only thing that outlives a planning pass. It maps
//! each stable resource key to the attributes last applied and the remote ID
//! the remote system assigned.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{CoreError, CoreResult};
use crate::graph::ResourceDag;
use crate::resource::{Attributes, RemoteId, ResourceKey, ResourceKind};

/// Current on-disk format version
pub const STATE_VERSION: u32 = 1;

/// State file containing every applied resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateFile {
    #[serde(default = "default_version")]
    pub version: u32,

    /// When this state was last modified
    pub updated_at: DateTime<Utc>,

    /// Applied resources keyed by stable key
    #[serde(default)]
    pub resources: BTreeMap<ResourceKey, ResourceState>,
}

fn default_version() -> u32 {
    STATE_VERSION
}

/// Last-known-good snapshot of one resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceState {
    pub kind: ResourceKind,

    pub remote_id: RemoteId,

    /// Attributes as of the last successful create or update
    #[serde(default)]
    pub attributes: Attributes,

    /// Keys this resource depended on when it was applied.
    ///
    /// Kept so deletes can be ordered without the configuration.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<ResourceKey>,
}

impl Default for StateFile {
    fn default() -> Self {
        Self::new()
    }
}

impl StateFile {
    /// Create an empty state
    pub fn new() -> Self {
        Self {
            version: STATE_VERSION,
            updated_at: Utc::now(),
            resources: BTreeMap::new(),
        }
    }

    /// Load state from a file path; a missing file is an empty state
    pub fn load(path: &Path) -> CoreResult<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let content = std::fs::read_to_string(path).map_err(|e| CoreError::IoWithPath {
            path: path.display().to_string(),
            source: e,
        })?;
        let state: StateFile = serde_json::from_str(&content)?;
        state.check_keys()?;
        Ok(state)
    }

    /// Save state to a file path atomically
    ///
    /// Writes to a PID-suffixed temp file and renames it into place.
    pub fn save(&self, path: &Path) -> CoreResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| CoreError::IoWithPath {
                path: parent.display().to_string(),
                source: e,
            })?;
        }

        let temp_path = path.with_extension(format!("json.{}.tmp", std::process::id()));
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&temp_path, &json).map_err(|e| CoreError::IoWithPath {
            path: temp_path.display().to_string(),
            source: e,
        })?;
        std::fs::rename(&temp_path, path).map_err(|e| {
            let _ = std::fs::remove_file(&temp_path);
            CoreError::IoWithPath {
                path: path.display().to_string(),
                source: e,
            }
        })?;
        Ok(())
    }

    /// Save, or remove the file once nothing is left in state
    pub fn persist(&self, path: &Path) -> CoreResult<()> {
        if !self.is_empty() {
            return self.save(path);
        }
        if path.exists() {
            std::fs::remove_file(path).map_err(|e| CoreError::IoWithPath {
                path: path.display().to_string(),
                source: e,
            })?;
            log::info!("All resources destroyed, removed {}", path.display());
        }
        Ok(())
    }

    /// Every key must carry a known kind prefix that matches its entry
    fn check_keys(&self) -> CoreResult<()> {
        for (key, entry) in &self.resources {
            match key.kind() {
                Some(kind) if kind == entry.kind => {}
                Some(kind) => {
                    return Err(CoreError::StateCorrupt {
                        key: key.to_string(),
                        reason: format!("key prefix '{kind}' disagrees with kind '{}'", entry.kind),
                    })
                }
                None => {
                    return Err(CoreError::StateCorrupt {
                        key: key.to_string(),
                        reason: "key does not start with a known resource kind".to_string(),
                    })
                }
            }
        }
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&ResourceState> {
        self.resources.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.resources.contains_key(key)
    }

    pub fn remote_id(&self, key: &str) -> Option<&RemoteId> {
        self.resources.get(key).map(|r| &r.remote_id)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Insert or replace a resource's snapshot
    pub fn upsert(&mut self, key: ResourceKey, entry: ResourceState) {
        self.resources.insert(key, entry);
        self.updated_at = Utc::now();
    }

    pub fn remove(&mut self, key: &str) -> Option<ResourceState> {
        let removed = self.resources.remove(key);
        if removed.is_some() {
            self.updated_at = Utc::now();
        }
        removed
    }

    /// Entries of one kind, keyed by declared name
    pub fn by_kind(&self, kind: ResourceKind) -> impl Iterator<Item = (&str, &ResourceState)> {
        self.resources
            .iter()
            .filter(move |(_, entry)| entry.kind == kind)
            .map(|(key, entry)| (key.name(), entry))
    }

    /// Highest numeric remote ID in state, if any
    pub fn max_numeric_id(&self) -> Option<u64> {
        self.resources
            .values()
            .filter_map(|r| r.remote_id.as_str().parse::<u64>().ok())
            .max()
    }

    /// Dependency graph of the recorded `depends_on` edges.
    ///
    /// Dependencies that are no longer in state are ignored; they are already
    /// gone and impose no ordering.
    pub fn dag(&self) -> ResourceDag {
        let mut dag = ResourceDag::new();
        for key in self.resources.keys() {
            dag.add_node(key);
        }
        for (key, entry) in &self.resources {
            for dep in entry.depends_on.iter().filter(|d| self.contains(d.as_str())) {
                dag.add_dependency(key, dep);
            }
        }
        dag
    }
}

#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
