//! Resource graph building and deterministic topological ordering

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde_json::json;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use crate::config::ValidatedConfig;
use crate::error::{CoreError, CoreResult};
use crate::resource::{Attributes, Resource, ResourceKey, ResourceKind};

/// A directed graph of resource keys.
///
/// Edges point from a dependent to its dependency (`job -> environment`).
/// Node indices follow insertion order, which is the tie-break when several
/// nodes are ready at once, so identical input always sorts identically.
#[derive(Debug, Default)]
pub struct ResourceDag {
    graph: DiGraph<ResourceKey, ()>,
    node_map: HashMap<ResourceKey, NodeIndex>,
}

impl ResourceDag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node, returning the existing index if the key is already present
    pub fn add_node(&mut self, key: &ResourceKey) -> NodeIndex {
        if let Some(&idx) = self.node_map.get(key) {
            return idx;
        }
        let idx = self.graph.add_node(key.clone());
        self.node_map.insert(key.clone(), idx);
        idx
    }

    /// Record that `dependent` must be created after `dependency`
    pub fn add_dependency(&mut self, dependent: &ResourceKey, dependency: &ResourceKey) {
        let from = self.add_node(dependent);
        let to = self.add_node(dependency);
        self.graph.add_edge(from, to, ());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.node_map.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Keys in dependency order (dependencies first), via Kahn's algorithm.
    ///
    /// Among ready nodes the earliest inserted is emitted first.
    pub fn topological_order(&self) -> CoreResult<Vec<ResourceKey>> {
        let n = self.graph.node_count();
        let mut unmet: Vec<usize> = self
            .graph
            .node_indices()
            .map(|idx| self.graph.edges_directed(idx, Direction::Outgoing).count())
            .collect();
        let mut ready: BinaryHeap<Reverse<usize>> = unmet
            .iter()
            .enumerate()
            .filter(|(_, count)| **count == 0)
            .map(|(i, _)| Reverse(i))
            .collect();

        let mut order = Vec::with_capacity(n);
        while let Some(Reverse(i)) = ready.pop() {
            let idx = NodeIndex::new(i);
            order.push(self.graph[idx].clone());
            for edge in self.graph.edges_directed(idx, Direction::Incoming) {
                let dependent = edge.source().index();
                unmet[dependent] -= 1;
                if unmet[dependent] == 0 {
                    ready.push(Reverse(dependent));
                }
            }
        }

        if order.len() < n {
            return Err(CoreError::CircularDependency {
                cycle: self.find_cycle_path(&unmet),
            });
        }
        Ok(order)
    }

    /// Keys in reverse dependency order (dependents first)
    pub fn reverse_topological_order(&self) -> CoreResult<Vec<ResourceKey>> {
        let mut order = self.topological_order()?;
        order.reverse();
        Ok(order)
    }

    /// Walk unemitted nodes along dependency edges until one repeats.
    ///
    /// Every node left over by Kahn's algorithm has an unmet dependency that
    /// is itself left over, so the walk always closes a loop.
    fn find_cycle_path(&self, unmet: &[usize]) -> String {
        let Some(start) = unmet.iter().position(|count| *count > 0) else {
            return String::new();
        };

        let mut path: Vec<NodeIndex> = vec![NodeIndex::new(start)];
        let mut current = NodeIndex::new(start);
        loop {
            let next = self
                .graph
                .edges_directed(current, Direction::Outgoing)
                .map(|e| e.target())
                .filter(|t| unmet[t.index()] > 0)
                .min_by_key(|t| t.index());
            let Some(next) = next else { break };

            if let Some(pos) = path.iter().position(|p| *p == next) {
                let mut cycle: Vec<String> =
                    path[pos..].iter().map(|i| self.graph[*i].to_string()).collect();
                cycle.push(self.graph[next].to_string());
                return cycle.join(" -> ");
            }
            path.push(next);
            current = next;
        }

        path.iter()
            .map(|i| self.graph[*i].to_string())
            .collect::<Vec<_>>()
            .join(" -> ")
    }

    /// Direct dependencies of a key
    pub fn dependencies(&self, key: &str) -> Vec<ResourceKey> {
        self.neighbors(key, Direction::Outgoing)
    }

    /// Direct dependents of a key
    pub fn dependents(&self, key: &str) -> Vec<ResourceKey> {
        self.neighbors(key, Direction::Incoming)
    }

    fn neighbors(&self, key: &str, direction: Direction) -> Vec<ResourceKey> {
        let Some(&idx) = self.node_map.get(key) else {
            return Vec::new();
        };
        let mut out: Vec<NodeIndex> = self
            .graph
            .edges_directed(idx, direction)
            .map(|e| match direction {
                Direction::Outgoing => e.target(),
                Direction::Incoming => e.source(),
            })
            .collect();
        out.sort_by_key(|i| i.index());
        out.dedup();
        out.into_iter().map(|i| self.graph[i].clone()).collect()
    }
}

/// The desired set of resources for one planning pass
#[derive(Debug)]
pub struct ResourceGraph {
    dag: ResourceDag,
    resources: Vec<Resource>,
    index: HashMap<ResourceKey, usize>,
    order: Vec<usize>,
}

impl ResourceGraph {
    /// Expand a validated configuration into resource nodes and edges
    pub fn build(config: &ValidatedConfig) -> CoreResult<Self> {
        Self::from_resources(expand(config))
    }

    /// Assemble a graph from already expanded resources.
    ///
    /// Fails on duplicate keys, on dependencies that name no resource in the
    /// set, and on cycles.
    pub fn from_resources(resources: Vec<Resource>) -> CoreResult<Self> {
        let mut dag = ResourceDag::new();
        let mut index = HashMap::with_capacity(resources.len());

        for (i, resource) in resources.iter().enumerate() {
            if index.insert(resource.key.clone(), i).is_some() {
                return Err(CoreError::DuplicateResource {
                    key: resource.key.to_string(),
                });
            }
            dag.add_node(&resource.key);
        }

        for resource in &resources {
            for dep in &resource.dependencies {
                if !index.contains_key(&dep.key) {
                    return Err(CoreError::UnresolvedReference {
                        key: resource.key.to_string(),
                        field: dep.field.clone(),
                        dependency: dep.key.to_string(),
                    });
                }
                dag.add_dependency(&resource.key, &dep.key);
            }
        }

        let order = dag
            .topological_order()?
            .iter()
            .filter_map(|key| index.get(key).copied())
            .collect();

        log::debug!("Built resource graph with {} node(s)", resources.len());

        Ok(Self {
            dag,
            resources,
            index,
            order,
        })
    }

    pub fn get(&self, key: &str) -> Option<&Resource> {
        self.index.get(key).map(|&i| &self.resources[i])
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Resources in declaration (insertion) order
    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    /// Resources in topological order, dependencies first
    pub fn ordered(&self) -> impl Iterator<Item = &Resource> {
        self.order.iter().map(|&i| &self.resources[i])
    }

    pub fn dag(&self) -> &ResourceDag {
        &self.dag
    }
}

/// Turn a JSON object into attributes, dropping unset (null) fields
fn attributes(value: serde_json::Value) -> Attributes {
    match value {
        serde_json::Value::Object(fields) => {
            fields.into_iter().filter(|(_, v)| !v.is_null()).collect()
        }
        _ => Attributes::new(),
    }
}

/// Expand configuration entities into resources, in insertion order:
/// project, repository, credentials, environments, variables, jobs, overrides.
fn expand(config: &ValidatedConfig) -> Vec<Resource> {
    let project = &config.project;
    let project_key = ResourceKey::new(ResourceKind::Project, &project.name);
    let mut out = Vec::new();

    out.push(Resource::new(
        ResourceKind::Project,
        &project.name,
        attributes(json!({
            "name": project.name,
            "dbt_account_id": project.dbt_account_id,
            "dbt_host_url": project.dbt_host_url,
            "description": project.description,
        })),
    ));

    if let Some(repo) = &project.repository {
        out.push(
            Resource::new(
                ResourceKind::Repository,
                &project.name,
                attributes(json!({
                    "remote_url": repo.remote_url,
                    "git_provider": repo.git_provider,
                    "git_clone_strategy": repo.git_clone_strategy,
                })),
            )
            .depends_on("project_id", project_key.clone()),
        );
    }

    for cred in &config.credentials {
        out.push(
            Resource::new(
                ResourceKind::Credential,
                &cred.name,
                attributes(json!({
                    "name": cred.name,
                    "type": cred.credential_type,
                    "auth_fields": cred.auth_fields,
                })),
            )
            .depends_on("project_id", project_key.clone()),
        );
    }

    for env in &config.environments {
        let mut resource = Resource::new(
            ResourceKind::Environment,
            &env.name,
            attributes(json!({
                "name": env.name,
                "type": env.env_type,
                "deployment_type": env.deployment_type,
                "credential": env.credential,
                "dbt_version": env.dbt_version,
                "custom_branch": env.custom_branch,
            })),
        )
        .depends_on("project_id", project_key.clone());
        if let Some(cred) = &env.credential {
            resource = resource.depends_on(
                "credential_id",
                ResourceKey::new(ResourceKind::Credential, cred),
            );
        }
        out.push(resource);
    }

    for var in &config.environment_variables {
        let mut resource = Resource::new(
            ResourceKind::EnvironmentVariable,
            &var.key,
            attributes(json!({
                "key": var.key,
                "environment_values": var.environment_values,
            })),
        )
        .depends_on("project_id", project_key.clone());
        // Values are keyed by environment name, so these edges only order creation
        for env in var.scoped_environments() {
            resource = resource.depends_on(
                &format!("environment_values.{env}"),
                ResourceKey::new(ResourceKind::Environment, env),
            );
        }
        out.push(resource);
    }

    for job in &config.jobs {
        let mut resource = Resource::new(
            ResourceKind::Job,
            &job.name,
            attributes(json!({
                "name": job.name,
                "environment": job.environment,
                "credential": job.credential,
                "schedule": job.schedule,
                "commands": job.commands,
                "num_threads": job.num_threads,
                "timeout_seconds": job.timeout_seconds,
                "target_name": job.target_name,
                "generate_docs": job.generate_docs,
            })),
        )
        .depends_on("project_id", project_key.clone())
        .depends_on(
            "environment_id",
            ResourceKey::new(ResourceKind::Environment, &job.environment),
        );
        if let Some(cred) = &job.credential {
            resource = resource.depends_on(
                "credential_id",
                ResourceKey::new(ResourceKind::Credential, cred),
            );
        }
        out.push(resource);
    }

    for o in &config.environment_variable_job_overrides {
        out.push(
            Resource::new(
                ResourceKind::EnvironmentVariableJobOverride,
                &o.name(),
                attributes(json!({
                    "job": o.job,
                    "key": o.key,
                    "value": o.value,
                })),
            )
            .depends_on("job_id", ResourceKey::new(ResourceKind::Job, &o.job))
            .depends_on(
                "environment_variable_id",
                ResourceKey::new(ResourceKind::EnvironmentVariable, &o.key),
            ),
        );
    }

    out
}

#[cfg(test)]
#[path = "graph_test.rs"]
mod tests;
