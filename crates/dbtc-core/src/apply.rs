//! Executing plans against a remote with incremental state persistence
//!
//! Operations run strictly in plan order. State is written after every
//! successful operation, so a failed or cancelled run leaves a state file that
//! a fresh plan can pick up from without redoing completed work.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::plan::{plan_destroy, Action, Operation, Plan};
use crate::remote::{RemoteClient, RemoteError, RemoteRequest};
use crate::resource::{RemoteId, ResourceKey};
use crate::state::{ResourceState, StateFile};

/// File name the run journal is written under, next to the state file
pub const JOURNAL_FILE: &str = "last_apply.json";

/// Final status of an apply or destroy run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Running => write!(f, "running"),
            RunStatus::Completed => write!(f, "completed"),
            RunStatus::Failed => write!(f, "failed"),
            RunStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// An operation that went through
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationRecord {
    pub action: Action,
    pub key: ResourceKey,

    /// Remote ID of the resource; `None` once deleted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<RemoteId>,

    pub completed_at: DateTime<Utc>,

    /// Time spent on the operation (in milliseconds)
    pub duration_ms: u64,
}

/// The operation that stopped the run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedOperation {
    pub action: Action,
    pub key: ResourceKey,
    pub failed_at: DateTime<Utc>,
    pub error: String,

    /// Raw remote response, when there was one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,

    /// Set when the remote side succeeded and only saving state failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<RemoteId>,
}

/// Record of one apply or destroy run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyJournal {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
    pub completed: Vec<OperationRecord>,
    pub failed: Option<FailedOperation>,

    /// Keys whose operations never started
    pub pending: Vec<ResourceKey>,
}

impl ApplyJournal {
    pub fn new(pending: Vec<ResourceKey>) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string()[..8].to_string(),
            started_at: Utc::now(),
            finished_at: None,
            status: RunStatus::Running,
            completed: Vec::new(),
            failed: None,
            pending,
        }
    }

    fn mark_completed(&mut self, op: &Operation, remote_id: Option<RemoteId>, duration_ms: u64) {
        self.pending.retain(|k| k != &op.key);
        self.completed.push(OperationRecord {
            action: op.action,
            key: op.key.clone(),
            remote_id,
            completed_at: Utc::now(),
            duration_ms,
        });
    }

    fn mark_failed(&mut self, op: &Operation, error: &CoreError) {
        self.pending.retain(|k| k != &op.key);
        let (response, remote_id) = match error {
            CoreError::RemoteOperation { source, .. } => (source.response.clone(), None),
            CoreError::StateNotSaved { remote_id, .. } => (None, Some(remote_id.clone())),
            _ => (None, None),
        };
        self.failed = Some(FailedOperation {
            action: op.action,
            key: op.key.clone(),
            failed_at: Utc::now(),
            error: error.to_string(),
            response,
            remote_id,
        });
        self.finish(RunStatus::Failed);
    }

    fn finish(&mut self, status: RunStatus) {
        self.status = status;
        self.finished_at = Some(Utc::now());
    }

    /// Load a journal from a file path; `None` when no run was recorded
    pub fn load(path: &Path) -> CoreResult<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path).map_err(|e| io_error(path, e))?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    /// Save the journal to a file path atomically
    pub fn save(&self, path: &Path) -> CoreResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
        }
        let temp_path = path.with_extension("json.tmp");
        std::fs::write(&temp_path, serde_json::to_string_pretty(self)?)
            .map_err(|e| io_error(&temp_path, e))?;
        std::fs::rename(&temp_path, path).map_err(|e| {
            let _ = std::fs::remove_file(&temp_path);
            io_error(path, e)
        })?;
        Ok(())
    }

    pub fn total_duration_ms(&self) -> u64 {
        self.completed.iter().map(|r| r.duration_ms).sum()
    }
}

/// Outcome of a run: the journal, the state as it stands, and the error that
/// halted the run, if any
#[derive(Debug)]
pub struct ApplyResult {
    pub journal: ApplyJournal,
    pub state: StateFile,
    pub error: Option<CoreError>,
}

impl ApplyResult {
    /// True only when every operation ran
    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.journal.status == RunStatus::Completed
    }

    /// The final state, or the halting error
    pub fn into_result(self) -> CoreResult<StateFile> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.state),
        }
    }
}

/// Runs plans one operation at a time and owns the state for the run
pub struct Executor {
    remote: Arc<dyn RemoteClient>,
    state: StateFile,
    state_path: Option<PathBuf>,
    cancel: Arc<AtomicBool>,
}

impl Executor {
    pub fn new(remote: Arc<dyn RemoteClient>, state: StateFile) -> Self {
        Self {
            remote,
            state,
            state_path: None,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Persist state to `path` after every successful operation
    pub fn with_state_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.state_path = Some(path.into());
        self
    }

    /// Share a cancellation flag with the caller; once set, the run stops
    /// before its next operation
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    /// Execute `plan` in order, halting at the first failure
    pub async fn apply(mut self, plan: &Plan) -> ApplyResult {
        let mut journal = ApplyJournal::new(plan.keys());
        log::info!(
            "Applying {} operation(s) with the {} remote (run {})",
            plan.len(),
            self.remote.name(),
            journal.run_id
        );

        for op in &plan.operations {
            if self.cancel.load(Ordering::SeqCst) {
                log::warn!(
                    "Run cancelled with {} operation(s) not started",
                    journal.pending.len()
                );
                journal.finish(RunStatus::Cancelled);
                return self.into_result(journal, None);
            }

            let started = Instant::now();
            match self.execute(op).await {
                Ok(remote_id) => {
                    let duration_ms = started.elapsed().as_millis() as u64;
                    journal.mark_completed(op, remote_id, duration_ms);
                }
                Err(e) => {
                    log::error!("{e}");
                    journal.mark_failed(op, &e);
                    return self.into_result(journal, Some(e));
                }
            }
        }

        journal.finish(RunStatus::Completed);
        log::info!(
            "Run {} completed: {} operation(s) in {}ms",
            journal.run_id,
            journal.completed.len(),
            journal.total_duration_ms()
        );
        self.into_result(journal, None)
    }

    /// Delete everything in state, dependents first
    pub async fn destroy(self) -> ApplyResult {
        match plan_destroy(&self.state) {
            Ok(plan) => self.apply(&plan).await,
            Err(e) => {
                let mut journal = ApplyJournal::new(Vec::new());
                journal.finish(RunStatus::Failed);
                self.into_result(journal, Some(e))
            }
        }
    }

    fn into_result(self, journal: ApplyJournal, error: Option<CoreError>) -> ApplyResult {
        ApplyResult {
            journal,
            state: self.state,
            error,
        }
    }

    async fn execute(&mut self, op: &Operation) -> CoreResult<Option<RemoteId>> {
        match op.action {
            Action::Create => {
                let request = self.request(op, None)?;
                let remote_id = self
                    .remote
                    .create(&request)
                    .await
                    .map_err(|source| remote_failure(op, source))?;
                log::info!("Created {} (id {remote_id})", op.key);
                self.record(op, &remote_id).map_err(|e| not_saved(op, &remote_id, e))?;
                Ok(Some(remote_id))
            }
            Action::Update => {
                let remote_id = self.recorded_id(op)?;
                let request = self.request(op, Some(remote_id.clone()))?;
                self.remote
                    .update(&request)
                    .await
                    .map_err(|source| remote_failure(op, source))?;
                log::info!("Updated {} (id {remote_id})", op.key);
                self.record(op, &remote_id).map_err(|e| not_saved(op, &remote_id, e))?;
                Ok(Some(remote_id))
            }
            Action::Delete => {
                let Some(remote_id) = self.state.remote_id(op.key.as_str()).cloned() else {
                    log::debug!("{} is not in state, nothing to delete", op.key);
                    return Ok(None);
                };
                let request = RemoteRequest {
                    kind: op.kind,
                    key: op.key.clone(),
                    attributes: op.attributes.clone(),
                    references: BTreeMap::new(),
                    remote_id: Some(remote_id.clone()),
                };
                self.remote
                    .delete(&request)
                    .await
                    .map_err(|source| remote_failure(op, source))?;
                log::info!("Deleted {} (id {remote_id})", op.key);

                self.state.remove(op.key.as_str());
                self.persist().map_err(|e| not_saved(op, &remote_id, e))?;
                Ok(None)
            }
        }
    }

    /// Build a request, resolving every dependency to its current remote ID
    fn request(&self, op: &Operation, remote_id: Option<RemoteId>) -> CoreResult<RemoteRequest> {
        let mut references = BTreeMap::new();
        for dep in &op.dependencies {
            let id = self.state.remote_id(dep.key.as_str()).ok_or_else(|| {
                CoreError::UnresolvedReference {
                    key: op.key.to_string(),
                    field: dep.field.clone(),
                    dependency: dep.key.to_string(),
                }
            })?;
            references.insert(dep.field.clone(), id.clone());
        }
        Ok(RemoteRequest {
            kind: op.kind,
            key: op.key.clone(),
            attributes: op.attributes.clone(),
            references,
            remote_id,
        })
    }

    /// Snapshot the applied attributes and persist
    fn record(&mut self, op: &Operation, remote_id: &RemoteId) -> CoreResult<()> {
        self.state.upsert(
            op.key.clone(),
            ResourceState {
                kind: op.kind,
                remote_id: remote_id.clone(),
                attributes: op.attributes.clone(),
                depends_on: op.dependencies.iter().map(|d| d.key.clone()).collect(),
            },
        );
        self.persist()
    }

    fn recorded_id(&self, op: &Operation) -> CoreResult<RemoteId> {
        self.state
            .remote_id(op.key.as_str())
            .cloned()
            .ok_or_else(|| CoreError::StateCorrupt {
                key: op.key.to_string(),
                reason: format!("cannot {} a resource that is not in state", op.action),
            })
    }

    fn persist(&self) -> CoreResult<()> {
        match &self.state_path {
            Some(path) => self.state.persist(path),
            None => Ok(()),
        }
    }
}

fn remote_failure(op: &Operation, source: RemoteError) -> CoreError {
    CoreError::RemoteOperation {
        action: op.action.to_string(),
        key: op.key.to_string(),
        source,
    }
}

fn not_saved(op: &Operation, remote_id: &RemoteId, source: CoreError) -> CoreError {
    CoreError::StateNotSaved {
        action: op.action.to_string(),
        key: op.key.to_string(),
        remote_id: remote_id.clone(),
        source: Box::new(source),
    }
}

fn io_error(path: &Path, source: std::io::Error) -> CoreError {
    CoreError::IoWithPath {
        path: path.display().to_string(),
        source,
    }
}

#[cfg(test)]
#[path = "apply_test.rs"]
mod tests;
