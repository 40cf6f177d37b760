//! Projecting remote IDs out of applied state

use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::{CoreError, CoreResult};
use crate::resource::{RemoteId, ResourceKey, ResourceKind};
use crate::state::{ResourceState, StateFile};

/// Remote IDs of the applied resources, keyed by declared name
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outputs {
    pub project_id: RemoteId,
    pub repository_id: Option<RemoteId>,
    pub environment_ids: BTreeMap<String, RemoteId>,
    pub credential_ids: BTreeMap<String, RemoteId>,
    pub job_ids: BTreeMap<String, RemoteId>,
}

/// Extract outputs from `state`.
///
/// The project is required; everything else may be empty.
pub fn outputs(state: &StateFile) -> CoreResult<Outputs> {
    let (project_key, project) = current_project(state)?;

    let ids = |kind| -> BTreeMap<String, RemoteId> {
        state
            .by_kind(kind)
            .map(|(name, entry)| (name.to_string(), entry.remote_id.clone()))
            .collect()
    };

    // Repositories are keyed by the project they belong to
    let repository = ResourceKey::new(ResourceKind::Repository, project_key.name());

    Ok(Outputs {
        project_id: project.remote_id.clone(),
        repository_id: state.remote_id(repository.as_str()).cloned(),
        environment_ids: ids(ResourceKind::Environment),
        credential_ids: ids(ResourceKind::Credential),
        job_ids: ids(ResourceKind::Job),
    })
}

/// The project the rest of state belongs to.
///
/// Renaming a project creates the new one first and deletes the old one
/// last, so an interrupted apply can leave both in state. The current one is
/// then the only project that other entries still depend on.
fn current_project(state: &StateFile) -> CoreResult<(&ResourceKey, &ResourceState)> {
    let projects: Vec<(&ResourceKey, &ResourceState)> = state
        .resources
        .iter()
        .filter(|(_, entry)| entry.kind == ResourceKind::Project)
        .collect();
    if projects.len() <= 1 {
        return projects
            .into_iter()
            .next()
            .ok_or_else(|| CoreError::IncompleteState {
                missing: ResourceKind::Project.to_string(),
            });
    }

    let depended_on: Vec<(&ResourceKey, &ResourceState)> = projects
        .iter()
        .copied()
        .filter(|(key, _)| {
            state
                .resources
                .values()
                .any(|entry| entry.depends_on.contains(key))
        })
        .collect();
    match depended_on.as_slice() {
        [current] => Ok(*current),
        _ => {
            let names: Vec<&str> = projects.iter().map(|(key, _)| key.name()).collect();
            Err(CoreError::IncompleteState {
                missing: format!(
                    "a single current project (found '{}'); run apply again to finish replacing the project",
                    names.join("', '")
                ),
            })
        }
    }
}

#[cfg(test)]
#[path = "outputs_test.rs"]
mod tests;
