//! Import of an exported account snapshot
//!
//! A snapshot is the JSON export of an existing dbt Cloud account: account
//! level objects under `globals`, and every project with its environments,
//! jobs and environment variables. Importing maps one of those projects onto
//! a [`ValidatedConfig`] and records what could not be carried over, either
//! as an [`Exclusion`] or as a [`Placeholder`] that needs a manual decision.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt::{self, Write};
use std::path::Path;

use crate::config::{
    CredentialConfig, DeploymentType, EnvironmentConfig, EnvironmentType,
    EnvironmentVariableConfig, JobConfig, ProjectConfig, RepositoryConfig, ValidatedConfig,
    PROJECT_SCOPE,
};
use crate::error::{CoreError, CoreResult};
use crate::resource::is_secret_key;
use crate::validate::{env_var_key_pattern, validate_config};

/// Host written when no other host URL is given
pub const DEFAULT_HOST_URL: &str = "https://cloud.getdbt.com";

/// Value written in place of a secret under [`SecretHandling::Redact`]
pub const REDACTED: &str = "REDACTED";

/// An exported dbt Cloud account
#[derive(Debug, Clone, Deserialize)]
pub struct AccountSnapshot {
    pub account_id: u64,
    #[serde(default)]
    pub account_name: Option<String>,
    #[serde(default)]
    pub globals: SnapshotGlobals,
    #[serde(default)]
    pub projects: Vec<SnapshotProject>,
}

impl AccountSnapshot {
    /// Read a snapshot from a JSON file
    pub fn load(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| CoreError::IoWithPath {
            path: path.display().to_string(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(|e| CoreError::Import {
            message: format!("{} is not a valid snapshot: {e}", path.display()),
        })
    }
}

/// Account level objects, keyed by their snapshot key
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SnapshotGlobals {
    #[serde(default)]
    pub connections: BTreeMap<String, SnapshotConnection>,
    #[serde(default)]
    pub repositories: BTreeMap<String, SnapshotRepository>,
    /// Sections a configuration cannot express (service tokens, groups, ...)
    #[serde(flatten)]
    pub other: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotConnection {
    #[serde(default)]
    pub name: Option<String>,
    /// Warehouse adapter, e.g. `snowflake`
    #[serde(default, rename = "type")]
    pub connection_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotRepository {
    pub remote_url: String,
    #[serde(default)]
    pub git_clone_strategy: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotProject {
    pub key: String,
    #[serde(default)]
    pub id: Option<u64>,
    pub name: String,
    #[serde(default)]
    pub repository_key: Option<String>,
    #[serde(default)]
    pub environments: Vec<SnapshotEnvironment>,
    #[serde(default)]
    pub environment_variables: Vec<SnapshotVariable>,
    #[serde(default)]
    pub jobs: Vec<SnapshotJob>,
    #[serde(default = "default_true")]
    pub include_in_conversion: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotEnvironment {
    pub key: String,
    pub name: String,
    #[serde(rename = "type")]
    pub env_type: String,
    #[serde(default)]
    pub connection_key: Option<String>,
    #[serde(default)]
    pub credential: Option<SnapshotCredential>,
    #[serde(default)]
    pub dbt_version: Option<String>,
    #[serde(default)]
    pub custom_branch: Option<String>,
    /// Carries `deployment_type` for deployment environments
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
    #[serde(default = "default_true")]
    pub include_in_conversion: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotCredential {
    pub token_name: String,
    pub schema: String,
    #[serde(default)]
    pub catalog: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotJob {
    pub key: String,
    pub name: String,
    pub environment_key: String,
    #[serde(default)]
    pub execute_steps: Vec<String>,
    #[serde(default)]
    pub triggers: BTreeMap<String, Value>,
    #[serde(default)]
    pub settings: BTreeMap<String, Value>,
    #[serde(default = "default_true")]
    pub include_in_conversion: bool,
}

/// A variable with its project default and values keyed by environment name
#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotVariable {
    pub name: String,
    #[serde(default)]
    pub project_default: Option<String>,
    #[serde(default)]
    pub environment_values: BTreeMap<String, String>,
    #[serde(default = "default_true")]
    pub include_in_conversion: bool,
}

fn default_true() -> bool {
    true
}

/// What to write for `DBT_ENV_SECRET*` variables
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecretHandling {
    /// Leave the variable out and report it as excluded
    Omit,
    /// Keep the variable with every value set to [`REDACTED`]
    #[default]
    Redact,
    /// Keep the variable with `${var.<lowercase key>}` in every value
    Placeholder,
}

impl fmt::Display for SecretHandling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecretHandling::Omit => write!(f, "omit"),
            SecretHandling::Redact => write!(f, "redact"),
            SecretHandling::Placeholder => write!(f, "placeholder"),
        }
    }
}

/// Import settings, usually read from a mapping file and refined by flags
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImportOptions {
    /// Project to import, by key or numeric ID; needed when the snapshot
    /// holds more than one
    pub project: Option<String>,
    /// Account ID to write instead of the snapshot's own
    pub account_id: Option<u64>,
    pub host_url: Option<String>,
    pub secret_handling: SecretHandling,
    /// Also import objects marked `include_in_conversion: false`
    pub include_inactive: bool,
    pub exclude: ExcludeKeys,
}

impl ImportOptions {
    /// Read options from a YAML mapping file
    pub fn load(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| CoreError::IoWithPath {
            path: path.display().to_string(),
            source: e,
        })?;
        serde_yaml::from_str(&content).map_err(|e| CoreError::ConfigParse {
            message: format!("{}: {e}", path.display()),
        })
    }
}

/// Snapshot keys left out of the import on request
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExcludeKeys {
    pub environments: Vec<String>,
    pub jobs: Vec<String>,
    pub environment_variables: Vec<String>,
}

impl ExcludeKeys {
    /// Add an exclusion written as `<kind>:<key>`, e.g. `job:nightly`
    pub fn add(&mut self, entry: &str) -> CoreResult<()> {
        let invalid = || CoreError::Import {
            message: format!(
                "exclusion '{entry}' must be written as environment:<key>, job:<key> or environment_variable:<name>"
            ),
        };
        let (kind, key) = entry
            .split_once(':')
            .filter(|(_, key)| !key.is_empty())
            .ok_or_else(invalid)?;
        let keys = match kind {
            "environment" => &mut self.environments,
            "job" => &mut self.jobs,
            "environment_variable" => &mut self.environment_variables,
            _ => return Err(invalid()),
        };
        keys.push(key.to_string());
        Ok(())
    }
}

/// A snapshot object that did not make it into the configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Exclusion {
    pub resource_type: String,
    pub key: String,
    pub reason: String,
}

/// A value the configuration needs but the snapshot could not supply
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Placeholder {
    pub id: String,
    pub description: String,
}

/// Outcome of importing one project
#[derive(Debug, Clone, Serialize)]
pub struct ImportResult {
    pub account_id: u64,
    pub project_key: String,
    pub imported_at: DateTime<Utc>,
    pub secret_handling: SecretHandling,
    pub config: ValidatedConfig,
    pub exclusions: Vec<Exclusion>,
    pub placeholders: Vec<Placeholder>,
}

/// Map one project of `snapshot` onto a configuration.
///
/// The result has already passed validation, so it can be written out and
/// planned as is.
pub fn import_snapshot(
    snapshot: &AccountSnapshot,
    options: &ImportOptions,
) -> CoreResult<ImportResult> {
    let mut importer = Importer::new(snapshot, options);
    let project = importer.select_project()?;
    log::info!(
        "Importing project '{}' from account {}",
        project.key,
        snapshot.account_id
    );

    let project_config = importer.project(project);
    let environments = importer.environments(project);
    let jobs = importer.jobs(project, &environments.by_key);
    let variables = importer.variables(project, &environments.by_name);
    importer.unused_globals();

    let config = ValidatedConfig {
        project: project_config,
        environments: environments.environments,
        credentials: environments.credentials,
        jobs,
        environment_variables: variables,
        environment_variable_job_overrides: Vec::new(),
    };
    // Validate what a user would read back from the written file
    let raw = serde_yaml::to_value(&config).map_err(|e| CoreError::Import {
        message: format!("cannot render configuration: {e}"),
    })?;
    let config = validate_config(&raw)?;

    log::info!(
        "Imported {} environment(s), {} job(s), {} variable(s); {} exclusion(s)",
        config.environments.len(),
        config.jobs.len(),
        config.environment_variables.len(),
        importer.exclusions.len()
    );
    Ok(ImportResult {
        account_id: snapshot.account_id,
        project_key: project.key.clone(),
        imported_at: Utc::now(),
        secret_handling: options.secret_handling,
        config,
        exclusions: importer.exclusions,
        placeholders: importer.placeholders,
    })
}

impl ImportResult {
    /// The configuration as YAML, headed by a comment naming its source
    pub fn to_yaml(&self) -> CoreResult<String> {
        let body = serde_yaml::to_string(&self.config).map_err(|e| CoreError::Import {
            message: format!("cannot render configuration: {e}"),
        })?;
        Ok(format!(
            "# Imported from account {} (project '{}') at {}\n# Secret values: {}\n{body}",
            self.account_id,
            self.project_key,
            self.imported_at.format("%Y-%m-%d %H:%M:%S UTC"),
            self.secret_handling
        ))
    }

    /// Markdown report of everything that was left out
    pub fn exclusions_report(&self) -> String {
        let mut out = String::new();
        out.push_str("# Import Exclusions Report\n\n");
        let _ = writeln!(
            out,
            "**Generated:** {}",
            self.imported_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
        let _ = writeln!(out, "**Source Account:** {}", self.account_id);
        let _ = writeln!(out, "**Project:** {}\n", self.project_key);
        out.push_str("## Summary\n\n");
        let _ = writeln!(out, "**Total Exclusions:** {}\n", self.exclusions.len());

        if self.exclusions.is_empty() {
            out.push_str("*No resources were excluded during import.*\n");
            return out;
        }

        let mut by_type: BTreeMap<&str, Vec<&Exclusion>> = BTreeMap::new();
        let mut by_reason: BTreeMap<&str, usize> = BTreeMap::new();
        for exclusion in &self.exclusions {
            by_type
                .entry(exclusion.resource_type.as_str())
                .or_default()
                .push(exclusion);
            *by_reason.entry(exclusion.reason.as_str()).or_default() += 1;
        }

        out.push_str("### By Resource Type\n\n");
        for (resource_type, items) in &by_type {
            let _ = writeln!(out, "- **{resource_type}:** {}", items.len());
        }

        out.push_str("\n### By Reason\n\n");
        let mut reasons: Vec<(&str, usize)> = by_reason.into_iter().collect();
        reasons.sort_by(|a, b| b.1.cmp(&a.1));
        for (reason, count) in reasons {
            let _ = writeln!(out, "- **{reason}:** {count}");
        }

        out.push_str("\n---\n\n## Detailed Exclusions\n");
        for (resource_type, items) in &by_type {
            let _ = writeln!(out, "\n### {}\n", title(resource_type));
            out.push_str("| Key | Reason |\n|-----|--------|\n");
            for exclusion in items {
                let _ = writeln!(out, "| `{}` | {} |", exclusion.key, exclusion.reason);
            }
        }
        out
    }

    /// JSON manifest of the placeholders that need a manual decision
    pub fn lookups_manifest(&self) -> Value {
        let placeholders: BTreeMap<&str, &str> = self
            .placeholders
            .iter()
            .map(|p| (p.id.as_str(), p.description.as_str()))
            .collect();
        serde_json::json!({
            "_metadata": {
                "generated_at": self.imported_at.to_rfc3339(),
                "account_id": self.account_id,
                "project": self.project_key,
                "total_placeholders": self.placeholders.len(),
            },
            "placeholders": placeholders,
            "instructions": "Each placeholder stands for something the snapshot could not supply. \
                Create or look up the object in the target account, then edit the configuration \
                to reference it.",
        })
    }
}

/// `environment_variable` -> `Environment Variable`
fn title(resource_type: &str) -> String {
    resource_type
        .split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn non_empty(s: &str) -> Option<String> {
    (!s.trim().is_empty()).then(|| s.to_string())
}

fn non_empty_opt(s: &Option<String>) -> Option<String> {
    s.as_deref().and_then(non_empty)
}

/// Hands out unique names, suffixing repeats with `_2`, `_3`, ...
#[derive(Default)]
struct UniqueNames {
    taken: HashSet<String>,
}

impl UniqueNames {
    fn reserving(names: &[&str]) -> Self {
        Self {
            taken: names.iter().map(|n| n.to_string()).collect(),
        }
    }

    fn claim(&mut self, name: &str) -> String {
        let mut candidate = name.to_string();
        let mut n = 2;
        while self.taken.contains(&candidate) {
            candidate = format!("{name}_{n}");
            n += 1;
        }
        self.taken.insert(candidate.clone());
        candidate
    }
}

#[derive(Default)]
struct ImportedEnvironments {
    environments: Vec<EnvironmentConfig>,
    credentials: Vec<CredentialConfig>,
    /// Snapshot environment key -> configured name
    by_key: HashMap<String, String>,
    /// Snapshot environment name -> configured name
    by_name: HashMap<String, String>,
}

struct Importer<'a> {
    snapshot: &'a AccountSnapshot,
    options: &'a ImportOptions,
    exclusions: Vec<Exclusion>,
    placeholders: Vec<Placeholder>,
    used_connections: HashSet<&'a str>,
    used_repositories: HashSet<&'a str>,
}

impl<'a> Importer<'a> {
    fn new(snapshot: &'a AccountSnapshot, options: &'a ImportOptions) -> Self {
        Self {
            snapshot,
            options,
            exclusions: Vec::new(),
            placeholders: Vec::new(),
            used_connections: HashSet::new(),
            used_repositories: HashSet::new(),
        }
    }

    fn exclude(&mut self, resource_type: &str, key: &str, reason: impl Into<String>) {
        let reason = reason.into();
        log::debug!("Excluding {resource_type} '{key}': {reason}");
        self.exclusions.push(Exclusion {
            resource_type: resource_type.to_string(),
            key: key.to_string(),
            reason,
        });
    }

    fn placeholder(&mut self, id: String, description: String) {
        if !self.placeholders.iter().any(|p| p.id == id) {
            self.placeholders.push(Placeholder { id, description });
        }
    }

    fn active(&self, include_in_conversion: bool) -> bool {
        include_in_conversion || self.options.include_inactive
    }

    fn select_project(&mut self) -> CoreResult<&'a SnapshotProject> {
        let snapshot = self.snapshot;
        let projects = &snapshot.projects;
        let listed = || {
            projects
                .iter()
                .map(|p| p.key.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        };

        let selected = match &self.options.project {
            Some(wanted) => projects
                .iter()
                .find(|p| p.key == *wanted || p.id.is_some_and(|id| id.to_string() == *wanted))
                .ok_or_else(|| CoreError::Import {
                    message: format!("project '{wanted}' is not in the snapshot (found: {})", listed()),
                })?,
            None => {
                let active: Vec<&SnapshotProject> = projects
                    .iter()
                    .filter(|p| self.active(p.include_in_conversion))
                    .collect();
                match active.as_slice() {
                    [only] => *only,
                    [] => {
                        return Err(CoreError::Import {
                            message: "the snapshot has no project to import".to_string(),
                        })
                    }
                    many => {
                        return Err(CoreError::Import {
                            message: format!(
                                "the snapshot holds {} projects ({}); choose one by key or ID",
                                many.len(),
                                listed()
                            ),
                        })
                    }
                }
            }
        };

        if !self.active(selected.include_in_conversion) {
            return Err(CoreError::Import {
                message: format!(
                    "project '{}' is marked inactive; include inactive objects to import it",
                    selected.key
                ),
            });
        }

        for other in projects.iter().filter(|p| !std::ptr::eq(*p, selected)) {
            let reason = if self.active(other.include_in_conversion) {
                "Not the selected project"
            } else {
                "Inactive"
            };
            self.exclude("project", &other.key, reason);
        }
        Ok(selected)
    }

    fn project(&mut self, project: &'a SnapshotProject) -> ProjectConfig {
        let snapshot = self.snapshot;
        let repository = match project.repository_key.as_deref() {
            None => None,
            Some(key) => match snapshot.globals.repositories.get(key) {
                Some(repo) => {
                    self.used_repositories.insert(key);
                    Some(RepositoryConfig {
                        remote_url: repo.remote_url.clone(),
                        git_provider: repo
                            .metadata
                            .get("git_provider")
                            .and_then(Value::as_str)
                            .and_then(non_empty),
                        git_clone_strategy: non_empty_opt(&repo.git_clone_strategy),
                    })
                }
                None => {
                    self.placeholder(
                        format!("LOOKUP:{key}"),
                        format!("Repository for project {}", project.name),
                    );
                    None
                }
            },
        };

        ProjectConfig {
            name: project.name.clone(),
            dbt_account_id: self.options.account_id.unwrap_or(snapshot.account_id),
            dbt_host_url: self
                .options
                .host_url
                .clone()
                .unwrap_or_else(|| DEFAULT_HOST_URL.to_string()),
            description: None,
            repository,
        }
    }

    fn environments(&mut self, project: &'a SnapshotProject) -> ImportedEnvironments {
        let mut imported = ImportedEnvironments::default();
        // Variable values use the environment name as scope
        let mut names = UniqueNames::reserving(&[PROJECT_SCOPE]);
        let mut credential_names = UniqueNames::default();
        let mut has_development = false;
        let mut has_production = false;

        for env in &project.environments {
            if self.options.exclude.environments.contains(&env.key) {
                self.exclude("environment", &env.key, "Excluded by filter");
                continue;
            }
            if !self.active(env.include_in_conversion) {
                self.exclude("environment", &env.key, "Inactive");
                continue;
            }
            let Some(env_type) = EnvironmentType::parse(&env.env_type) else {
                self.exclude(
                    "environment",
                    &env.key,
                    format!("Unsupported environment type '{}'", env.env_type),
                );
                continue;
            };
            let deployment_type = match env_type {
                EnvironmentType::Deployment => env
                    .metadata
                    .get("deployment_type")
                    .and_then(Value::as_str)
                    .and_then(DeploymentType::parse),
                EnvironmentType::Development => None,
            };
            if env_type == EnvironmentType::Development && has_development {
                self.exclude(
                    "environment",
                    &env.key,
                    "A project has at most one development environment",
                );
                continue;
            }
            if deployment_type == Some(DeploymentType::Production) && has_production {
                self.exclude(
                    "environment",
                    &env.key,
                    "A project has at most one production environment",
                );
                continue;
            }
            has_development |= env_type == EnvironmentType::Development;
            has_production |= deployment_type == Some(DeploymentType::Production);

            let name = names.claim(&env.name);
            if name != env.name {
                log::info!("Environment '{}' imported as '{}'", env.name, name);
            }
            let credential = env
                .credential
                .as_ref()
                .and_then(|c| self.credential(env, c, &mut credential_names));

            imported.by_key.insert(env.key.clone(), name.clone());
            imported
                .by_name
                .entry(env.name.clone())
                .or_insert_with(|| name.clone());
            imported.environments.push(EnvironmentConfig {
                name,
                env_type,
                deployment_type,
                credential: credential.as_ref().map(|c| c.name.clone()),
                dbt_version: non_empty_opt(&env.dbt_version),
                custom_branch: non_empty_opt(&env.custom_branch),
            });
            imported.credentials.extend(credential);
        }
        imported
    }

    /// The credential of `env`, typed by the warehouse of its connection
    fn credential(
        &mut self,
        env: &'a SnapshotEnvironment,
        credential: &SnapshotCredential,
        names: &mut UniqueNames,
    ) -> Option<CredentialConfig> {
        let snapshot = self.snapshot;
        let Some(connection_key) = env.connection_key.as_deref() else {
            self.exclude("credential", &env.key, "Environment has no connection");
            return None;
        };
        let Some(connection) = snapshot.globals.connections.get(connection_key) else {
            self.placeholder(
                format!("LOOKUP:{connection_key}"),
                format!("Connection for environment {}", env.name),
            );
            self.exclude(
                "credential",
                &env.key,
                format!("Connection '{connection_key}' is not in the snapshot"),
            );
            return None;
        };
        self.used_connections.insert(connection_key);
        let Some(credential_type) = connection.connection_type.as_deref().and_then(non_empty) else {
            self.exclude(
                "credential",
                &env.key,
                format!("Connection '{connection_key}' has no warehouse type"),
            );
            return None;
        };

        let mut auth_fields = BTreeMap::new();
        auth_fields.insert("token_name".to_string(), Value::from(credential.token_name.as_str()));
        auth_fields.insert("schema".to_string(), Value::from(credential.schema.as_str()));
        if let Some(catalog) = non_empty_opt(&credential.catalog) {
            auth_fields.insert("catalog".to_string(), Value::from(catalog));
        }
        Some(CredentialConfig {
            name: names.claim(&env.key),
            credential_type,
            auth_fields,
        })
    }

    fn jobs(
        &mut self,
        project: &'a SnapshotProject,
        environments: &HashMap<String, String>,
    ) -> Vec<JobConfig> {
        let mut names = UniqueNames::default();
        let mut jobs = Vec::new();

        for job in &project.jobs {
            if self.options.exclude.jobs.contains(&job.key) {
                self.exclude("job", &job.key, "Excluded by filter");
                continue;
            }
            if !self.active(job.include_in_conversion) {
                self.exclude("job", &job.key, "Inactive");
                continue;
            }
            let Some(environment) = environments.get(&job.environment_key) else {
                self.exclude(
                    "job",
                    &job.key,
                    format!("Environment '{}' was not imported", job.environment_key),
                );
                continue;
            };
            let commands: Vec<String> = job
                .execute_steps
                .iter()
                .filter_map(|step| non_empty(step))
                .collect();
            if commands.is_empty() {
                self.exclude("job", &job.key, "No execute steps");
                continue;
            }

            let setting = |field: &str| job.settings.get(field);
            jobs.push(JobConfig {
                name: names.claim(&job.name),
                environment: environment.clone(),
                credential: None,
                schedule: self.schedule(job),
                commands,
                num_threads: setting("num_threads")
                    .and_then(Value::as_u64)
                    .filter(|n| *n >= 1),
                timeout_seconds: setting("timeout_seconds").and_then(Value::as_u64),
                target_name: setting("target_name")
                    .and_then(Value::as_str)
                    .and_then(non_empty),
                generate_docs: setting("generate_docs").and_then(Value::as_bool),
            });
        }
        jobs
    }

    /// Cron schedule of a job whose schedule trigger is not switched off
    fn schedule(&mut self, job: &SnapshotJob) -> Option<String> {
        let cron = job
            .settings
            .get("schedule_cron")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|cron| !cron.is_empty())?;
        if job.triggers.get("schedule").and_then(Value::as_bool) == Some(false) {
            return None;
        }
        if cron.split_whitespace().count() != 5 {
            self.exclude(
                "job_schedule",
                &job.key,
                format!("'{cron}' is not a 5-field cron expression"),
            );
            return None;
        }
        Some(cron.to_string())
    }

    fn variables(
        &mut self,
        project: &'a SnapshotProject,
        environments: &HashMap<String, String>,
    ) -> Vec<EnvironmentVariableConfig> {
        let handling = self.options.secret_handling;
        let mut variables = Vec::new();

        for var in &project.environment_variables {
            if self.options.exclude.environment_variables.contains(&var.name) {
                self.exclude("environment_variable", &var.name, "Excluded by filter");
                continue;
            }
            if !env_var_key_pattern().is_match(&var.name) {
                self.exclude(
                    "environment_variable",
                    &var.name,
                    "Key must start with DBT_ and use only letters, digits and '_'",
                );
                continue;
            }
            let secret_value = if is_secret_key(&var.name) {
                match handling {
                    SecretHandling::Omit => {
                        self.exclude("environment_variable", &var.name, "Secret variable omitted");
                        continue;
                    }
                    SecretHandling::Redact => Some(REDACTED.to_string()),
                    SecretHandling::Placeholder => {
                        Some(format!("${{var.{}}}", var.name.to_lowercase()))
                    }
                }
            } else {
                None
            };
            if !self.active(var.include_in_conversion) {
                self.exclude("environment_variable", &var.name, "Inactive");
                continue;
            }

            let mut values = BTreeMap::new();
            if let Some(default) = &var.project_default {
                values.insert(PROJECT_SCOPE.to_string(), default.clone());
            }
            for (env_name, value) in &var.environment_values {
                let scope = if env_name == PROJECT_SCOPE {
                    PROJECT_SCOPE.to_string()
                } else if let Some(name) = environments.get(env_name) {
                    name.clone()
                } else {
                    self.exclude(
                        "environment_variable_value",
                        &format!("{}@{}", var.name, env_name),
                        format!("Environment '{env_name}' was not imported"),
                    );
                    continue;
                };
                values.entry(scope).or_insert_with(|| value.clone());
            }
            if values.is_empty() {
                self.exclude(
                    "environment_variable",
                    &var.name,
                    "No values for imported environments",
                );
                continue;
            }

            if let Some(secret_value) = secret_value {
                if handling == SecretHandling::Placeholder {
                    self.placeholder(secret_value.clone(), format!("Secret value of {}", var.name));
                }
                for value in values.values_mut() {
                    value.clone_from(&secret_value);
                }
            }
            variables.push(EnvironmentVariableConfig {
                key: var.name.clone(),
                environment_values: values,
            });
        }
        variables
    }

    /// Report account objects the imported project does not use
    fn unused_globals(&mut self) {
        let snapshot = self.snapshot;
        let globals = &snapshot.globals;
        for (section, items) in &globals.other {
            let resource_type = section.strip_suffix('s').unwrap_or(section);
            match items {
                Value::Object(items) => {
                    for key in items.keys() {
                        self.exclude(resource_type, key, "No configuration counterpart");
                    }
                }
                _ => log::debug!("Ignoring globals.{section}: not a mapping"),
            }
        }
        for key in globals.connections.keys() {
            if !self.used_connections.contains(key.as_str()) {
                self.exclude("connection", key, "Not used by the imported project");
            }
        }
        for key in globals.repositories.keys() {
            if !self.used_repositories.contains(key.as_str()) {
                self.exclude("repository", key, "Not used by the imported project");
            }
        }
    }
}

#[cfg(test)]
#[path = "import_test.rs"]
mod tests;
