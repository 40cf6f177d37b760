//! Diffing the desired resource graph against prior state

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::error::CoreResult;
use crate::graph::ResourceGraph;
use crate::resource::{Attributes, Dependency, Resource, ResourceKey, ResourceKind};
use crate::state::{ResourceState, StateFile};

/// What an operation does to a remote resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create,
    Update,
    Delete,
}

impl Action {
    /// Single-character marker used in plan listings
    pub fn symbol(self) -> char {
        match self {
            Action::Create => '+',
            Action::Update => '~',
            Action::Delete => '-',
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Create => write!(f, "create"),
            Action::Update => write!(f, "update"),
            Action::Delete => write!(f, "delete"),
        }
    }
}

/// One step of a plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub action: Action,
    pub key: ResourceKey,
    pub kind: ResourceKind,

    /// Desired attributes; empty for deletes
    #[serde(default)]
    pub attributes: Attributes,

    /// Dependencies whose remote IDs the operation needs
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<Dependency>,

    /// Attribute (or reference field) names that differ, for updates
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub changed: Vec<String>,
}

impl Operation {
    fn create(resource: &Resource) -> Self {
        Self {
            action: Action::Create,
            key: resource.key.clone(),
            kind: resource.kind,
            attributes: resource.attributes.clone(),
            dependencies: resource.dependencies.clone(),
            changed: Vec::new(),
        }
    }

    fn update(resource: &Resource, changed: Vec<String>) -> Self {
        Self {
            action: Action::Update,
            changed,
            ..Self::create(resource)
        }
    }

    fn delete(key: ResourceKey, prior: &ResourceState) -> Self {
        Self {
            action: Action::Delete,
            key,
            kind: prior.kind,
            attributes: Attributes::new(),
            dependencies: Vec::new(),
            changed: Vec::new(),
        }
    }
}

/// Ordered operations reconciling desired configuration with state.
///
/// Creates and updates come first in dependency order, then deletes with
/// dependents ahead of their dependencies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub operations: Vec<Operation>,
}

impl Plan {
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn summary(&self) -> PlanSummary {
        let count = |action: Action| {
            self.operations
                .iter()
                .filter(|op| op.action == action)
                .count()
        };
        PlanSummary {
            create: count(Action::Create),
            update: count(Action::Update),
            delete: count(Action::Delete),
        }
    }

    /// Keys touched by the plan, in execution order
    pub fn keys(&self) -> Vec<ResourceKey> {
        self.operations.iter().map(|op| op.key.clone()).collect()
    }
}

/// Operation counts by action
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PlanSummary {
    pub create: usize,
    pub update: usize,
    pub delete: usize,
}

impl fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Plan: {} to add, {} to change, {} to destroy.",
            self.create, self.update, self.delete
        )
    }
}

/// Compute the operations needed to move `state` to `desired`.
///
/// Pure: nothing is read or written besides the two arguments.
pub fn plan(desired: &ResourceGraph, state: &StateFile) -> CoreResult<Plan> {
    let mut operations = Vec::new();

    for resource in desired.ordered() {
        match state.get(resource.key.as_str()) {
            None => operations.push(Operation::create(resource)),
            Some(prior) => {
                let changed = changed_fields(resource, prior);
                if !changed.is_empty() {
                    operations.push(Operation::update(resource, changed));
                }
            }
        }
    }

    for key in state.dag().reverse_topological_order()? {
        if desired.contains(key.as_str()) {
            continue;
        }
        if let Some(prior) = state.get(key.as_str()) {
            operations.push(Operation::delete(key, prior));
        }
    }

    let plan = Plan { operations };
    log::debug!("{}", plan.summary());
    Ok(plan)
}

/// Delete everything recorded in `state`, dependents first
pub fn plan_destroy(state: &StateFile) -> CoreResult<Plan> {
    let operations = state
        .dag()
        .reverse_topological_order()?
        .into_iter()
        .filter_map(|key| {
            let prior = state.get(key.as_str())?;
            Some(Operation::delete(key, prior))
        })
        .collect();
    Ok(Plan { operations })
}

/// Names of attributes whose values differ, followed by reference fields that
/// now point somewhere else. Remote IDs never take part.
fn changed_fields(resource: &Resource, prior: &ResourceState) -> Vec<String> {
    let mut changed: Vec<String> = resource
        .attributes
        .keys()
        .chain(prior.attributes.keys())
        .filter(|name| resource.attributes.get(*name) != prior.attributes.get(*name))
        .cloned()
        .collect();
    changed.sort();
    changed.dedup();

    let recorded: HashSet<&ResourceKey> = prior.depends_on.iter().collect();
    for dep in &resource.dependencies {
        if !recorded.contains(&dep.key) && !changed.contains(&dep.field) {
            changed.push(dep.field.clone());
        }
    }
    changed
}

#[cfg(test)]
#[path = "plan_test.rs"]
mod tests;
