//! Configuration loading and the typed configuration tree
//!
//! The YAML file is first read into an untyped [`serde_yaml::Value`]; the
//! [`validate`](crate::validate) module then maps it onto [`ValidatedConfig`].
//! Nothing downstream of validation sees the untyped form.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use crate::error::{CoreError, CoreResult};

/// Top-level keys accepted in the configuration file
pub const TOP_LEVEL_KEYS: [&str; 6] = [
    "project",
    "environments",
    "credentials",
    "jobs",
    "environment_variables",
    "environment_variable_job_overrides",
];

/// Load the configuration file as untyped YAML
pub fn load_raw(path: &Path) -> CoreResult<serde_yaml::Value> {
    if !path.exists() {
        return Err(CoreError::ConfigNotFound {
            path: path.display().to_string(),
        });
    }
    let content = std::fs::read_to_string(path).map_err(|e| CoreError::IoWithPath {
        path: path.display().to_string(),
        source: e,
    })?;
    parse_raw(&content)
}

/// Parse configuration text as untyped YAML
pub fn parse_raw(content: &str) -> CoreResult<serde_yaml::Value> {
    serde_yaml::from_str(content).map_err(|e| CoreError::ConfigParse {
        message: e.to_string(),
    })
}

/// Values supplied outside the file that replace `project.*` fields.
///
/// These play the role of module input variables: the account ID and host URL
/// usually come from the environment rather than being committed to YAML.
#[derive(Debug, Clone, Default)]
pub struct VarOverrides {
    pub dbt_account_id: Option<String>,
    pub dbt_host_url: Option<String>,
}

impl VarOverrides {
    pub fn is_empty(&self) -> bool {
        self.dbt_account_id.is_none() && self.dbt_host_url.is_none()
    }

    /// Write the overrides into `raw.project`.
    ///
    /// A missing or non-mapping `project` is left untouched so that validation
    /// reports it at its real path.
    pub fn apply(&self, raw: &mut serde_yaml::Value) {
        let Some(project) = raw
            .get_mut("project")
            .and_then(serde_yaml::Value::as_mapping_mut)
        else {
            return;
        };
        if let Some(id) = &self.dbt_account_id {
            project.insert("dbt_account_id".into(), id.as_str().into());
        }
        if let Some(url) = &self.dbt_host_url {
            project.insert("dbt_host_url".into(), url.as_str().into());
        }
    }
}

/// A fully validated configuration
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidatedConfig {
    pub project: ProjectConfig,
    pub environments: Vec<EnvironmentConfig>,
    pub credentials: Vec<CredentialConfig>,
    pub jobs: Vec<JobConfig>,
    pub environment_variables: Vec<EnvironmentVariableConfig>,
    pub environment_variable_job_overrides: Vec<JobOverrideConfig>,
}

/// The single project a configuration describes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectConfig {
    pub name: String,
    pub dbt_account_id: u64,
    pub dbt_host_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository: Option<RepositoryConfig>,
}

/// Git repository attached to the project
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RepositoryConfig {
    pub remote_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_clone_strategy: Option<String>,
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvironmentType {
    Deployment,
    Development,
}

impl EnvironmentType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "deployment" => Some(EnvironmentType::Deployment),
            "development" => Some(EnvironmentType::Development),
            _ => None,
        }
    }
}

impl fmt::Display for EnvironmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnvironmentType::Deployment => write!(f, "deployment"),
            EnvironmentType::Development => write!(f, "development"),
        }
    }
}

/// Deployment flavour of a deployment environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentType {
    Production,
    Staging,
}

impl DeploymentType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "production" => Some(DeploymentType::Production),
            "staging" => Some(DeploymentType::Staging),
            _ => None,
        }
    }
}

impl fmt::Display for DeploymentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeploymentType::Production => write!(f, "production"),
            DeploymentType::Staging => write!(f, "staging"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnvironmentConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub env_type: EnvironmentType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deployment_type: Option<DeploymentType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dbt_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_branch: Option<String>,
}

/// Warehouse credential; `auth_fields` is provider specific and kept opaque
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CredentialConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub credential_type: String,
    pub auth_fields: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobConfig {
    pub name: String,
    pub environment: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule: Option<String>,
    pub commands: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_threads: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generate_docs: Option<bool>,
}

/// Scope under which a variable's project-wide default is stored
pub const PROJECT_SCOPE: &str = "project";

/// One environment variable and all of its values.
///
/// Entries in the file that share a `key` are merged into a single variable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnvironmentVariableConfig {
    pub key: String,
    /// Value per scope: [`PROJECT_SCOPE`] or an environment name
    pub environment_values: BTreeMap<String, String>,
}

impl EnvironmentVariableConfig {
    /// Environments that have their own value
    pub fn scoped_environments(&self) -> impl Iterator<Item = &str> {
        self.environment_values
            .keys()
            .map(String::as_str)
            .filter(|scope| *scope != PROJECT_SCOPE)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobOverrideConfig {
    pub job: String,
    pub key: String,
    pub value: String,
}

impl JobOverrideConfig {
    /// Declared name used in the override's stable key
    pub fn name(&self) -> String {
        format!("{}.{}", self.job, self.key)
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
