use super::*;
use crate::resource::{Attributes, ResourceKey};
use crate::state::ResourceState;

fn add(state: &mut StateFile, key: &str, id: &str) {
    let key = ResourceKey::try_new(key).unwrap();
    state.upsert(
        key.clone(),
        ResourceState {
            kind: key.kind().unwrap(),
            remote_id: RemoteId::try_new(id).unwrap(),
            attributes: Attributes::new(),
            depends_on: Vec::new(),
        },
    );
}

#[test]
fn test_outputs_by_name() {
    let mut state = StateFile::new();
    add(&mut state, "project.analytics", "1");
    add(&mut state, "repository.analytics", "2");
    add(&mut state, "credential.warehouse", "3");
    add(&mut state, "environment.Production", "4");
    add(&mut state, "environment.Development", "5");
    add(&mut state, "job.Daily Run", "6");
    add(&mut state, "environment_variable.DBT_TARGET", "7");

    let out = outputs(&state).unwrap();
    assert_eq!(out.project_id, "1");
    assert_eq!(out.repository_id.as_ref().unwrap(), "2");
    assert_eq!(out.credential_ids["warehouse"], "3");
    assert_eq!(out.environment_ids.len(), 2);
    assert_eq!(out.environment_ids["Production"], "4");
    assert_eq!(out.job_ids["Daily Run"], "6");
}

#[test]
fn test_repository_is_optional() {
    let mut state = StateFile::new();
    add(&mut state, "project.analytics", "1");
    let out = outputs(&state).unwrap();
    assert!(out.repository_id.is_none());
    assert!(out.job_ids.is_empty());
}

#[test]
fn test_empty_state_is_incomplete() {
    match outputs(&StateFile::new()).unwrap_err() {
        CoreError::IncompleteState { missing } => assert_eq!(missing, "project"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_missing_project_is_incomplete() {
    let mut state = StateFile::new();
    add(&mut state, "environment.Production", "4");
    assert!(matches!(
        outputs(&state),
        Err(CoreError::IncompleteState { .. })
    ));
}

fn depend(state: &mut StateFile, key: &str, on: &str) {
    state
        .resources
        .get_mut(key)
        .unwrap()
        .depends_on
        .push(ResourceKey::try_new(on).unwrap());
}

#[test]
fn test_renamed_project_awaiting_delete() {
    let mut state = StateFile::new();
    add(&mut state, "project.alpha", "1");
    add(&mut state, "repository.alpha", "2");
    add(&mut state, "project.beta", "3");
    add(&mut state, "repository.beta", "4");
    add(&mut state, "environment.Production", "5");
    depend(&mut state, "repository.beta", "project.beta");
    depend(&mut state, "environment.Production", "project.beta");

    let out = outputs(&state).unwrap();
    assert_eq!(out.project_id, "3");
    assert_eq!(out.repository_id.as_ref().unwrap(), "4");
}

#[test]
fn test_two_projects_without_single_owner_is_incomplete() {
    let mut state = StateFile::new();
    add(&mut state, "project.a", "1");
    add(&mut state, "project.b", "2");
    match outputs(&state).unwrap_err() {
        CoreError::IncompleteState { missing } => {
            assert!(missing.contains("'a', 'b'"));
            assert!(missing.contains("run apply again"));
        }
        other => panic!("unexpected error: {other}"),
    }

    add(&mut state, "environment.Production", "3");
    add(&mut state, "job.nightly", "4");
    depend(&mut state, "environment.Production", "project.a");
    depend(&mut state, "job.nightly", "project.b");
    assert!(matches!(
        outputs(&state),
        Err(CoreError::IncompleteState { .. })
    ));
}

#[test]
fn test_outputs_serialize() {
    let mut state = StateFile::new();
    add(&mut state, "project.analytics", "1");
    add(&mut state, "job.nightly", "9");
    let json = serde_json::to_value(outputs(&state).unwrap()).unwrap();
    assert_eq!(json["project_id"], "1");
    assert!(json["repository_id"].is_null());
    assert_eq!(json["job_ids"]["nightly"], "9");
}
