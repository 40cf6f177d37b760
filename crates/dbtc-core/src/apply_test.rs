use super::*;
use crate::graph::ResourceGraph;
use crate::plan::plan;
use crate::remote::{RemoteResult, SimulatedRemote};
use crate::validate::validate;
use async_trait::async_trait;
use std::sync::atomic::AtomicUsize;
use tempfile::tempdir;

const CONFIG: &str = r#"
project:
  name: analytics
  dbt_account_id: 1
  dbt_host_url: https://cloud.getdbt.com
credentials:
  - name: warehouse
    type: snowflake
environments:
  - name: Production
    type: deployment
    credential: warehouse
jobs:
  - name: Daily Run
    environment: Production
    credential: warehouse
    commands: [dbt build]
"#;

fn graph(yaml: &str) -> ResourceGraph {
    let raw: serde_yaml::Value = serde_yaml::from_str(yaml).unwrap();
    ResourceGraph::build(&validate(&raw).unwrap()).unwrap()
}

fn keys(state: &StateFile) -> Vec<&str> {
    state.resources.keys().map(|k| k.as_str()).collect()
}

#[tokio::test]
async fn test_apply_creates_everything() {
    let remote = Arc::new(SimulatedRemote::new());
    let plan = plan(&graph(CONFIG), &StateFile::new()).unwrap();

    let result = Executor::new(remote.clone(), StateFile::new()).apply(&plan).await;

    assert!(result.is_success());
    assert_eq!(result.journal.status, RunStatus::Completed);
    assert_eq!(result.journal.completed.len(), 4);
    assert!(result.journal.pending.is_empty());
    assert!(result.journal.finished_at.is_some());
    assert_eq!(result.state.len(), 4);
    assert_eq!(remote.live_count(), 4);

    let job = result.state.get("job.Daily Run").unwrap();
    assert_eq!(job.remote_id, "4");
    assert_eq!(job.depends_on.len(), 3);
}

#[tokio::test]
async fn test_references_resolved_from_state() {
    let remote = Arc::new(SimulatedRemote::new());
    let desired = graph(CONFIG);
    let plan = plan(&desired, &StateFile::new()).unwrap();
    let state = Executor::new(remote.clone(), StateFile::new())
        .apply(&plan)
        .await
        .into_result()
        .unwrap();

    // Every create that referenced another resource found it live
    assert_eq!(remote.calls().len(), 4);
    assert_eq!(state.remote_id("project.analytics").unwrap(), "1");
}

#[tokio::test]
async fn test_failure_halts_and_keeps_prior_progress() {
    let dir = tempdir().unwrap();
    let state_path = dir.path().join("state.json");
    let remote = Arc::new(SimulatedRemote::new());
    remote.fail_on("environment.Production");

    let plan = plan(&graph(CONFIG), &StateFile::new()).unwrap();
    let result = Executor::new(remote.clone(), StateFile::new())
        .with_state_path(&state_path)
        .apply(&plan)
        .await;

    assert!(!result.is_success());
    assert_eq!(result.journal.status, RunStatus::Failed);
    let failed = result.journal.failed.as_ref().unwrap();
    assert_eq!(failed.key, "environment.Production");
    assert!(failed.response.is_some());
    assert_eq!(result.journal.pending, vec![ResourceKey::try_new("job.Daily Run").unwrap()]);
    assert!(matches!(
        result.error,
        Some(CoreError::RemoteOperation { ref key, .. }) if key == "environment.Production"
    ));

    // Durable state holds exactly what succeeded
    let on_disk = StateFile::load(&state_path).unwrap();
    assert_eq!(keys(&on_disk), vec!["credential.warehouse", "project.analytics"]);
    assert_eq!(on_disk, result.state);
}

#[tokio::test]
async fn test_failed_update_keeps_last_known_good() {
    let remote = Arc::new(SimulatedRemote::new());
    let state = Executor::new(remote.clone(), StateFile::new())
        .apply(&plan(&graph(CONFIG), &StateFile::new()).unwrap())
        .await
        .into_result()
        .unwrap();

    let changed = graph(&CONFIG.replace("[dbt build]", "[dbt run]"));
    let update = plan(&changed, &state).unwrap();
    assert_eq!(update.operations[0].action, Action::Update);

    remote.fail_on("job.Daily Run");
    let result = Executor::new(remote.clone(), state.clone()).apply(&update).await;
    assert!(result.error.is_some());
    assert_eq!(
        result.state.get("job.Daily Run").unwrap().attributes["commands"],
        serde_json::json!(["dbt build"])
    );

    remote.clear_failure("job.Daily Run");
    let result = Executor::new(remote, state).apply(&update).await;
    assert!(result.is_success());
    assert_eq!(
        result.state.get("job.Daily Run").unwrap().attributes["commands"],
        serde_json::json!(["dbt run"])
    );
}

#[tokio::test]
async fn test_cancel_before_first_operation() {
    let remote = Arc::new(SimulatedRemote::new());
    let plan = plan(&graph(CONFIG), &StateFile::new()).unwrap();

    let cancel = Arc::new(AtomicBool::new(true));
    let result = Executor::new(remote.clone(), StateFile::new())
        .with_cancel_flag(cancel)
        .apply(&plan)
        .await;

    assert_eq!(result.journal.status, RunStatus::Cancelled);
    assert!(!result.is_success());
    assert!(result.error.is_none());
    assert_eq!(result.journal.pending.len(), 4);
    assert!(result.state.is_empty());
    assert!(remote.calls().is_empty());
}

/// Delegates to a [`SimulatedRemote`] and raises the cancel flag once its
/// `cancel_after`-th call has gone through
struct CancellingRemote {
    inner: SimulatedRemote,
    cancel: Arc<AtomicBool>,
    cancel_after: usize,
    calls: AtomicUsize,
}

impl CancellingRemote {
    fn tick(&self) {
        if self.calls.fetch_add(1, Ordering::SeqCst) + 1 == self.cancel_after {
            self.cancel.store(true, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl RemoteClient for CancellingRemote {
    async fn create(&self, request: &RemoteRequest) -> RemoteResult<RemoteId> {
        let id = self.inner.create(request).await?;
        self.tick();
        Ok(id)
    }

    async fn update(&self, request: &RemoteRequest) -> RemoteResult<()> {
        self.inner.update(request).await?;
        self.tick();
        Ok(())
    }

    async fn delete(&self, request: &RemoteRequest) -> RemoteResult<()> {
        self.inner.delete(request).await?;
        self.tick();
        Ok(())
    }

    fn name(&self) -> &'static str {
        "cancelling"
    }
}

#[tokio::test]
async fn test_cancel_mid_run_keeps_completed_operations() {
    let dir = tempdir().unwrap();
    let state_path = dir.path().join("state.json");
    let desired = graph(CONFIG);
    let plan = plan(&desired, &StateFile::new()).unwrap();
    let planned: Vec<String> = plan.keys().iter().map(|k| k.to_string()).collect();

    let cancel = Arc::new(AtomicBool::new(false));
    let remote = Arc::new(CancellingRemote {
        inner: SimulatedRemote::new(),
        cancel: Arc::clone(&cancel),
        cancel_after: 2,
        calls: AtomicUsize::new(0),
    });
    let result = Executor::new(remote, StateFile::new())
        .with_state_path(&state_path)
        .with_cancel_flag(cancel)
        .apply(&plan)
        .await;

    assert_eq!(result.journal.status, RunStatus::Cancelled);
    assert!(result.error.is_none());
    assert_eq!(result.journal.completed.len(), 2);
    let pending: Vec<String> = result.journal.pending.iter().map(|k| k.to_string()).collect();
    assert_eq!(pending, planned[2..].to_vec());

    let on_disk = StateFile::load(&state_path).unwrap();
    let mut expected = planned[..2].to_vec();
    expected.sort();
    assert_eq!(keys(&on_disk), expected);

    let resume = crate::plan::plan(&desired, &on_disk).unwrap();
    let resumed: Vec<String> = resume.keys().iter().map(|k| k.to_string()).collect();
    assert_eq!(resumed, planned[2..].to_vec());
    assert!(resume.operations.iter().all(|op| op.action == Action::Create));
}

#[tokio::test]
async fn test_unsaved_state_reports_remote_id() {
    let dir = tempdir().unwrap();
    // A regular file where the state directory should be
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, "").unwrap();

    let remote = Arc::new(SimulatedRemote::new());
    let plan = plan(&graph(CONFIG), &StateFile::new()).unwrap();
    let result = Executor::new(remote.clone(), StateFile::new())
        .with_state_path(blocker.join("state.json"))
        .apply(&plan)
        .await;

    match &result.error {
        Some(CoreError::StateNotSaved {
            key,
            remote_id,
            source,
            ..
        }) => {
            assert_eq!(key, "project.analytics");
            assert_eq!(remote_id, "1");
            assert!(matches!(**source, CoreError::IoWithPath { .. }));
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(result.error.as_ref().unwrap().to_string().contains("remote id 1"));

    let failed = result.journal.failed.as_ref().unwrap();
    assert_eq!(failed.remote_id.as_ref().unwrap(), "1");
    assert!(failed.response.is_none());
    assert!(result.journal.completed.is_empty());
    assert_eq!(remote.live_count(), 1);
}

#[tokio::test]
async fn test_destroy_removes_state_file() {
    let dir = tempdir().unwrap();
    let state_path = dir.path().join("state.json");
    let remote = Arc::new(SimulatedRemote::new());

    let state = Executor::new(remote.clone(), StateFile::new())
        .with_state_path(&state_path)
        .apply(&plan(&graph(CONFIG), &StateFile::new()).unwrap())
        .await
        .into_result()
        .unwrap();
    assert!(state_path.exists());

    let result = Executor::new(remote.clone(), state)
        .with_state_path(&state_path)
        .destroy()
        .await;
    assert!(result.is_success());
    assert!(result.state.is_empty());
    assert!(!state_path.exists());
    assert_eq!(remote.live_count(), 0);

    let deleted: Vec<String> = result
        .journal
        .completed
        .iter()
        .map(|r| r.key.to_string())
        .collect();
    assert_eq!(
        deleted,
        vec![
            "job.Daily Run",
            "environment.Production",
            "credential.warehouse",
            "project.analytics",
        ]
    );
}

#[tokio::test]
async fn test_update_of_unknown_resource_is_state_error() {
    let remote = Arc::new(SimulatedRemote::new());
    let desired = graph(CONFIG);
    let mut plan = plan(&desired, &StateFile::new()).unwrap();
    plan.operations.truncate(1);
    plan.operations[0].action = Action::Update;

    let result = Executor::new(remote, StateFile::new()).apply(&plan).await;
    assert!(matches!(result.error, Some(CoreError::StateCorrupt { .. })));
}

#[tokio::test]
async fn test_missing_dependency_id_is_unresolved() {
    let remote = Arc::new(SimulatedRemote::new());
    let mut plan = plan(&graph(CONFIG), &StateFile::new()).unwrap();
    // Drop the project create so its dependents cannot resolve project_id
    plan.operations.remove(0);

    let result = Executor::new(remote.clone(), StateFile::new()).apply(&plan).await;
    match result.error {
        Some(CoreError::UnresolvedReference { field, .. }) => assert_eq!(field, "project_id"),
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(remote.calls().is_empty());
}

#[test]
fn test_journal_save_and_load() {
    let dir = tempdir().unwrap();
    let path = dir.path().join(JOURNAL_FILE);

    let journal = ApplyJournal::new(vec![ResourceKey::try_new("project.a").unwrap()]);
    journal.save(&path).unwrap();

    let loaded = ApplyJournal::load(&path).unwrap().unwrap();
    assert_eq!(loaded.run_id, journal.run_id);
    assert_eq!(loaded.run_id.len(), 8);
    assert_eq!(loaded.status, RunStatus::Running);
    assert_eq!(loaded.pending.len(), 1);
    assert!(ApplyJournal::load(&dir.path().join("missing.json"))
        .unwrap()
        .is_none());
}

#[test]
fn test_journal_io_errors_name_the_path() {
    let dir = tempdir().unwrap();
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, "").unwrap();
    let path = blocker.join(JOURNAL_FILE);

    let err = ApplyJournal::new(Vec::new()).save(&path).unwrap_err();
    match err {
        CoreError::IoWithPath { path: failed, .. } => assert!(failed.ends_with("blocker")),
        other => panic!("unexpected error: {other}"),
    }

    // A directory in place of the journal cannot be read as a file
    let dir_path = dir.path().join("journal_dir");
    std::fs::create_dir(&dir_path).unwrap();
    assert!(matches!(
        ApplyJournal::load(&dir_path),
        Err(CoreError::IoWithPath { .. })
    ));
}
