//! Typed resource nodes and their stable identities

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::newtype_string::define_newtype_string;

/// Declared attributes of a resource, compared structurally during planning.
///
/// References to other resources are stored by declared name, never by
/// remote ID, so the map is fully determined by the configuration.
pub type Attributes = BTreeMap<String, serde_json::Value>;

define_newtype_string! {
    /// Identifier assigned by the remote system when a resource is created.
    pub struct RemoteId;
}

define_newtype_string! {
    /// Stable resource identity of the form `<kind>.<name>`.
    ///
    /// Used as the diffing key between the desired graph and prior state.
    pub struct ResourceKey;
}

impl ResourceKey {
    /// Build the key for a resource of `kind` declared as `name`.
    pub fn new(kind: ResourceKind, name: &str) -> Self {
        Self(format!("{}.{}", kind.as_str(), name))
    }

    /// The kind prefix, if it names a known resource kind.
    pub fn kind(&self) -> Option<ResourceKind> {
        self.0.split_once('.').and_then(|(kind, _)| kind.parse().ok())
    }

    /// The declared name (everything after the first `.`).
    pub fn name(&self) -> &str {
        self.0.split_once('.').map(|(_, name)| name).unwrap_or("")
    }
}

/// The kinds of dbt Cloud resource the compiler manages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Project,
    Repository,
    Environment,
    Credential,
    Job,
    EnvironmentVariable,
    EnvironmentVariableJobOverride,
}

impl ResourceKind {
    /// Every kind, in the order the graph builder expands them.
    pub const ALL: [ResourceKind; 7] = [
        ResourceKind::Project,
        ResourceKind::Repository,
        ResourceKind::Credential,
        ResourceKind::Environment,
        ResourceKind::EnvironmentVariable,
        ResourceKind::Job,
        ResourceKind::EnvironmentVariableJobOverride,
    ];

    /// The key prefix for this kind
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Project => "project",
            ResourceKind::Repository => "repository",
            ResourceKind::Environment => "environment",
            ResourceKind::Credential => "credential",
            ResourceKind::Job => "job",
            ResourceKind::EnvironmentVariable => "environment_variable",
            ResourceKind::EnvironmentVariableJobOverride => "environment_variable_job_override",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResourceKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown resource kind '{s}'"))
    }
}

/// A named creation-order dependency.
///
/// `field` is the attribute the remote API expects the dependency's ID under
/// (for example `environment_id` on a job).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub field: String,
    pub key: ResourceKey,
}

impl Dependency {
    pub fn new(field: &str, key: ResourceKey) -> Self {
        Self {
            field: field.to_string(),
            key,
        }
    }
}

/// One node of the resource graph
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub key: ResourceKey,
    pub kind: ResourceKind,
    pub attributes: Attributes,
    pub dependencies: Vec<Dependency>,
}

impl Resource {
    pub fn new(kind: ResourceKind, name: &str, attributes: Attributes) -> Self {
        Self {
            key: ResourceKey::new(kind, name),
            kind,
            attributes,
            dependencies: Vec::new(),
        }
    }

    /// Add a dependency on `key`, exposed to the remote API as `field`.
    pub fn depends_on(mut self, field: &str, key: ResourceKey) -> Self {
        self.dependencies.push(Dependency::new(field, key));
        self
    }

    /// Keys of every resource this one depends on
    pub fn dependency_keys(&self) -> Vec<ResourceKey> {
        self.dependencies.iter().map(|d| d.key.clone()).collect()
    }
}

/// Prefix that marks an environment variable as secret
pub const SECRET_PREFIX: &str = "DBT_ENV_SECRET";

/// Whether a variable key holds a secret value
pub fn is_secret_key(key: &str) -> bool {
    key.starts_with(SECRET_PREFIX)
}

/// Mask sensitive attribute values for human-readable output.
///
/// Credential auth fields and every value of a `DBT_ENV_SECRET*` variable are replaced;
/// everything else is returned unchanged.
pub fn redact(kind: ResourceKind, attributes: &Attributes) -> Attributes {
    const MASK: &str = "(sensitive)";
    let is_secret_var = attributes
        .get("key")
        .and_then(|v| v.as_str())
        .is_some_and(is_secret_key);

    attributes
        .iter()
        .map(|(name, value)| {
            let masked = match (kind, name.as_str()) {
                (ResourceKind::Credential, "auth_fields") => mask_each(value, MASK),
                (ResourceKind::EnvironmentVariable, "environment_values") if is_secret_var => {
                    mask_each(value, MASK)
                }
                (ResourceKind::EnvironmentVariableJobOverride, "value") if is_secret_var => {
                    serde_json::Value::from(MASK)
                }
                _ => value.clone(),
            };
            (name.clone(), masked)
        })
        .collect()
}

/// Keep an object's keys and replace every value with `mask`
fn mask_each(value: &serde_json::Value, mask: &str) -> serde_json::Value {
    match value {
        serde_json::Value::Object(fields) => serde_json::Value::Object(
            fields
                .keys()
                .map(|k| (k.clone(), serde_json::Value::from(mask)))
                .collect(),
        ),
        _ => serde_json::Value::from(mask),
    }
}

#[cfg(test)]
#[path = "resource_test.rs"]
mod tests;
