//! Remote resource operations
//!
//! The executor drives a [`RemoteClient`]; the crate ships only
//! [`SimulatedRemote`], an in-process implementation that behaves like the
//! dbt Cloud API closely enough to exercise planning and apply end to end.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

use crate::plan::Action;
use crate::resource::{Attributes, RemoteId, ResourceKey, ResourceKind};
use crate::state::StateFile;

/// Failure reported by the remote system
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct RemoteError {
    pub message: String,

    /// Raw response body, when the remote returned one
    pub response: Option<String>,
}

impl RemoteError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            response: None,
        }
    }

    pub fn with_response(mut self, response: impl Into<String>) -> Self {
        self.response = Some(response.into());
        self
    }
}

/// Result type alias for RemoteError
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Everything the remote needs to act on one resource
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemoteRequest {
    pub kind: ResourceKind,
    pub key: ResourceKey,
    pub attributes: Attributes,

    /// Remote IDs of dependencies, keyed by API field (`environment_id`, ...)
    pub references: BTreeMap<String, RemoteId>,

    /// Set for update and delete
    pub remote_id: Option<RemoteId>,
}

impl RemoteRequest {
    /// The remote ID an update or delete targets
    pub fn target(&self) -> RemoteResult<&RemoteId> {
        self.remote_id
            .as_ref()
            .ok_or_else(|| RemoteError::new(format!("{} has no remote ID", self.key)))
    }
}

/// Remote resource operations
///
/// Implementations must be Send + Sync; calls are issued one at a time.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// Create a resource, returning the ID the remote assigned
    async fn create(&self, request: &RemoteRequest) -> RemoteResult<RemoteId>;

    /// Update the resource identified by `request.remote_id`
    async fn update(&self, request: &RemoteRequest) -> RemoteResult<()>;

    /// Delete the resource identified by `request.remote_id`
    async fn delete(&self, request: &RemoteRequest) -> RemoteResult<()>;

    /// Client name for logging
    fn name(&self) -> &'static str;
}

/// A call received by [`SimulatedRemote`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemoteCall {
    pub action: Action,
    pub key: ResourceKey,
    pub remote_id: Option<RemoteId>,
}

#[derive(Debug, Default)]
struct Simulation {
    next_id: u64,
    live: BTreeMap<RemoteId, ResourceKey>,
    calls: Vec<RemoteCall>,
    fail_on: HashSet<ResourceKey>,
}

/// In-process remote with sequential numeric IDs.
///
/// Every call is recorded. Requests that target or reference an ID the
/// simulation does not know about are rejected, as are keys registered with
/// [`fail_on`](Self::fail_on).
#[derive(Debug)]
pub struct SimulatedRemote {
    inner: Mutex<Simulation>,
}

impl Default for SimulatedRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedRemote {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Simulation {
                next_id: 1,
                ..Simulation::default()
            }),
        }
    }

    /// A simulation that already holds everything recorded in `state`.
    ///
    /// New IDs start above the highest numeric ID in state.
    pub fn from_state(state: &StateFile) -> Self {
        let remote = Self::new();
        {
            let mut sim = remote.lock();
            sim.next_id = state.max_numeric_id().map_or(1, |max| max + 1);
            for (key, entry) in &state.resources {
                sim.live.insert(entry.remote_id.clone(), key.clone());
            }
        }
        remote
    }

    /// Make every call for `key` fail
    pub fn fail_on(&self, key: &str) {
        if let Some(key) = ResourceKey::try_new(key) {
            self.lock().fail_on.insert(key);
        }
    }

    /// Stop failing calls for `key`
    pub fn clear_failure(&self, key: &str) {
        self.lock().fail_on.remove(key);
    }

    /// Calls received so far, in order
    pub fn calls(&self) -> Vec<RemoteCall> {
        self.lock().calls.clone()
    }

    /// Number of resources currently held
    pub fn live_count(&self) -> usize {
        self.lock().live.len()
    }

    fn lock(&self) -> MutexGuard<'_, Simulation> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Simulation {
    fn record(&mut self, action: Action, request: &RemoteRequest) -> RemoteResult<()> {
        self.calls.push(RemoteCall {
            action,
            key: request.key.clone(),
            remote_id: request.remote_id.clone(),
        });

        if self.fail_on.contains(&request.key) {
            return Err(RemoteError::new(format!(
                "simulated failure for {}",
                request.key
            ))
            .with_response(r#"{"status":{"code":500,"is_success":false}}"#));
        }
        for (field, id) in &request.references {
            if !self.live.contains_key(id) {
                return Err(RemoteError::new(format!(
                    "{field} {id} does not exist"
                ))
                .with_response(r#"{"status":{"code":404,"is_success":false}}"#));
            }
        }
        Ok(())
    }

    fn existing(&self, request: &RemoteRequest) -> RemoteResult<RemoteId> {
        let id = request.target()?;
        if !self.live.contains_key(id) {
            return Err(RemoteError::new(format!(
                "{} {id} does not exist",
                request.kind
            ))
            .with_response(r#"{"status":{"code":404,"is_success":false}}"#));
        }
        Ok(id.clone())
    }
}

#[async_trait]
impl RemoteClient for SimulatedRemote {
    async fn create(&self, request: &RemoteRequest) -> RemoteResult<RemoteId> {
        let mut sim = self.lock();
        sim.record(Action::Create, request)?;

        let id = RemoteId::try_new(sim.next_id.to_string())
            .ok_or_else(|| RemoteError::new("empty remote ID"))?;
        sim.next_id += 1;
        sim.live.insert(id.clone(), request.key.clone());
        Ok(id)
    }

    async fn update(&self, request: &RemoteRequest) -> RemoteResult<()> {
        let mut sim = self.lock();
        sim.record(Action::Update, request)?;
        let id = sim.existing(request)?;
        sim.live.insert(id, request.key.clone());
        Ok(())
    }

    async fn delete(&self, request: &RemoteRequest) -> RemoteResult<()> {
        let mut sim = self.lock();
        sim.record(Action::Delete, request)?;
        let id = sim.existing(request)?;
        sim.live.remove(&id);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "simulated"
    }
}

#[cfg(test)]
#[path = "remote_test.rs"]
mod tests;
