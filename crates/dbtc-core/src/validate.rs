//! Schema validation for the YAML configuration
//!
//! [`validate`] walks the untyped document once, records every violation it
//! finds with the dotted path of the offending value, and only produces a
//! [`ValidatedConfig`] when the document is clean.

use regex::Regex;
use serde::Serialize;
use serde_yaml::{Mapping, Value};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::OnceLock;

use crate::config::{
    CredentialConfig, DeploymentType, EnvironmentConfig, EnvironmentType,
    EnvironmentVariableConfig, JobConfig, JobOverrideConfig, ProjectConfig, RepositoryConfig,
    ValidatedConfig, PROJECT_SCOPE, TOP_LEVEL_KEYS,
};
use crate::error::{CoreError, CoreResult};

/// A single schema violation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    /// Location of the offending value, e.g. `jobs[1].environment`
    pub path: String,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Validate an untyped configuration document.
///
/// Returns every violation found, in document order, when the document is
/// not valid.
pub fn validate(raw: &Value) -> Result<ValidatedConfig, Vec<ValidationError>> {
    let mut v = Validator::default();

    let Some(root) = raw.as_mapping() else {
        v.error("$", "configuration must be a mapping");
        return Err(v.errors);
    };

    for key in root.keys() {
        match key.as_str() {
            Some(k) if TOP_LEVEL_KEYS.contains(&k) => {}
            Some(k) => v.error(k, "unknown top-level key"),
            None => v.error("$", "top-level keys must be strings"),
        }
    }
    for required in ["project", "environments"] {
        if !root.contains_key(required) {
            v.error(required, "is required");
        }
    }

    let project = match root.get("project") {
        Some(value) => v.project(value),
        None => None,
    };

    let credential_names = v.declared_names(root, "credentials", "name", "credential name");
    let environment_names = v.declared_names(root, "environments", "name", "environment name");
    // Variables may repeat a key once per scope, so their keys are not unique
    let variable_keys: HashSet<String> = raw_names(root, "environment_variables", "key")
        .map(|(_, key)| key.to_string())
        .collect();
    let job_names = v.declared_names(root, "jobs", "name", "job name");

    let credentials: Vec<CredentialConfig> = v
        .section(root, "credentials")
        .into_iter()
        .filter_map(|(path, map)| v.credential(&path, map))
        .collect();

    let environments: Vec<EnvironmentConfig> = v
        .section(root, "environments")
        .into_iter()
        .filter_map(|(path, map)| v.environment(&path, map, &credential_names))
        .collect();
    v.environment_constraints(&environments);

    let mut variables: Vec<EnvironmentVariableConfig> = Vec::new();
    for (path, map) in v.section(root, "environment_variables") {
        let Some((key, values)) = v.environment_variable(&path, map, &environment_names) else {
            continue;
        };
        let index = match variables.iter().position(|var| var.key == key) {
            Some(index) => index,
            None => {
                variables.push(EnvironmentVariableConfig {
                    key: key.clone(),
                    environment_values: BTreeMap::new(),
                });
                variables.len() - 1
            }
        };
        for scoped in values {
            let environment_values = &mut variables[index].environment_values;
            if environment_values.contains_key(&scoped.scope) {
                v.error(
                    scoped.path,
                    format!("duplicate value for '{key}' in scope '{}'", scoped.scope),
                );
            } else {
                environment_values.insert(scoped.scope, scoped.value);
            }
        }
    }

    let jobs: Vec<JobConfig> = v
        .section(root, "jobs")
        .into_iter()
        .filter_map(|(path, map)| v.job(&path, map, &environment_names, &credential_names))
        .collect();

    let mut override_pairs = HashSet::new();
    let mut overrides = Vec::new();
    for (path, map) in v.section(root, "environment_variable_job_overrides") {
        let Some(o) = v.job_override(&path, map, &job_names, &variable_keys) else {
            continue;
        };
        if !override_pairs.insert((o.job.clone(), o.key.clone())) {
            v.error(
                path,
                format!("duplicate override of '{}' for job '{}'", o.key, o.job),
            );
        }
        overrides.push(o);
    }

    match project {
        Some(project) if v.errors.is_empty() => Ok(ValidatedConfig {
            project,
            environments,
            credentials,
            jobs,
            environment_variables: variables,
            environment_variable_job_overrides: overrides,
        }),
        _ => Err(v.errors),
    }
}

/// Validate and fold the violations into a single [`CoreError::Validation`]
pub fn validate_config(raw: &Value) -> CoreResult<ValidatedConfig> {
    validate(raw).map_err(|errors| CoreError::Validation { errors })
}

fn account_id_pattern() -> &'static Regex {
    static ACCOUNT_ID: OnceLock<Regex> = OnceLock::new();
    ACCOUNT_ID.get_or_init(|| Regex::new(r"^[0-9]+$").expect("valid regex"))
}

pub(crate) fn env_var_key_pattern() -> &'static Regex {
    static ENV_VAR_KEY: OnceLock<Regex> = OnceLock::new();
    ENV_VAR_KEY.get_or_init(|| Regex::new(r"^DBT_[A-Za-z0-9_]+$").expect("valid regex"))
}

/// String values of `section[*].field` straight from the document, with the
/// index of the item they came from
fn raw_names<'a>(
    root: &'a Mapping,
    section: &str,
    field: &'a str,
) -> impl Iterator<Item = (usize, &'a str)> + 'a {
    root.get(section)
        .and_then(Value::as_sequence)
        .into_iter()
        .flatten()
        .enumerate()
        .filter_map(move |(i, item)| item.get(field).and_then(Value::as_str).map(|name| (i, name)))
}

/// One value of an environment variable as written in the file
struct ScopedValue {
    /// Where the scope was set, for duplicate reporting
    path: String,
    scope: String,
    value: String,
}

/// Accumulates violations while the document is walked
#[derive(Default)]
struct Validator {
    errors: Vec<ValidationError>,
}

impl Validator {
    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ValidationError {
            path: path.into(),
            message: message.into(),
        });
    }

    /// Items of a list-of-mappings section, paired with their paths.
    ///
    /// An absent or null section is an empty list.
    fn section<'a>(&mut self, root: &'a Mapping, key: &str) -> Vec<(String, &'a Mapping)> {
        let items = match root.get(key) {
            None | Some(Value::Null) => return Vec::new(),
            Some(Value::Sequence(items)) => items,
            Some(_) => {
                self.error(key, "must be a list");
                return Vec::new();
            }
        };

        let mut out = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            let path = format!("{key}[{i}]");
            match item.as_mapping() {
                Some(map) => out.push((path, map)),
                None => self.error(path, "must be a mapping"),
            }
        }
        out
    }

    /// Report fields not in `allowed`
    fn known_fields(&mut self, map: &Mapping, path: &str, allowed: &[&str]) {
        for key in map.keys() {
            match key.as_str() {
                Some(k) if allowed.contains(&k) => {}
                Some(k) => self.error(format!("{path}.{k}"), "unknown field"),
                None => self.error(path, "field names must be strings"),
            }
        }
    }

    fn required_str(&mut self, map: &Mapping, path: &str, field: &str) -> Option<String> {
        if matches!(map.get(field), None | Some(Value::Null)) {
            self.error(format!("{path}.{field}"), "is required");
            return None;
        }
        self.optional_str(map, path, field)
    }

    fn optional_str(&mut self, map: &Mapping, path: &str, field: &str) -> Option<String> {
        match map.get(field) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if s.trim().is_empty() => {
                self.error(format!("{path}.{field}"), "must not be empty");
                None
            }
            Some(Value::String(s)) => Some(s.clone()),
            Some(_) => {
                self.error(format!("{path}.{field}"), "must be a string");
                None
            }
        }
    }

    /// A scalar rendered as a string; numbers and booleans are accepted
    fn required_scalar(&mut self, map: &Mapping, path: &str, field: &str) -> Option<String> {
        match map.get(field) {
            None | Some(Value::Null) => {
                self.error(format!("{path}.{field}"), "is required");
                None
            }
            Some(value) => self.scalar(value, &format!("{path}.{field}")),
        }
    }

    fn scalar(&mut self, value: &Value, path: &str) -> Option<String> {
        match value {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => {
                self.error(path, "must be a string, number or boolean");
                None
            }
        }
    }

    fn optional_u64(&mut self, map: &Mapping, path: &str, field: &str, min: u64) -> Option<u64> {
        match map.get(field) {
            None | Some(Value::Null) => None,
            Some(value) => match value.as_u64().filter(|n| *n >= min) {
                Some(n) => Some(n),
                None => {
                    self.error(
                        format!("{path}.{field}"),
                        format!("must be an integer >= {min}"),
                    );
                    None
                }
            },
        }
    }

    fn optional_bool(&mut self, map: &Mapping, path: &str, field: &str) -> Option<bool> {
        match map.get(field) {
            None | Some(Value::Null) => None,
            Some(Value::Bool(b)) => Some(*b),
            Some(_) => {
                self.error(format!("{path}.{field}"), "must be a boolean");
                None
            }
        }
    }

    /// Optional reference to a declared name
    fn reference(
        &mut self,
        map: &Mapping,
        path: &str,
        field: &str,
        known: &HashSet<String>,
        what: &str,
        required: bool,
    ) -> Option<String> {
        let name = if required {
            self.required_str(map, path, field)
        } else {
            self.optional_str(map, path, field)
        }?;
        if !known.contains(&name) {
            self.error(
                format!("{path}.{field}"),
                format!("references unknown {what} '{name}'"),
            );
        }
        Some(name)
    }

    /// Names declared under `section[*].field`, reporting duplicates.
    ///
    /// Read from the raw items so that an entity with an unrelated error still
    /// counts as declared and does not cascade into unknown-reference errors.
    fn declared_names(
        &mut self,
        root: &Mapping,
        section: &str,
        field: &str,
        what: &str,
    ) -> HashSet<String> {
        let mut seen = HashSet::new();
        for (i, name) in raw_names(root, section, field) {
            if !seen.insert(name.to_string()) {
                self.error(
                    format!("{section}[{i}].{field}"),
                    format!("duplicate {what} '{name}'"),
                );
            }
        }
        seen
    }

    fn project(&mut self, value: &Value) -> Option<ProjectConfig> {
        const PATH: &str = "project";
        let Some(map) = value.as_mapping() else {
            self.error(PATH, "must be a mapping");
            return None;
        };
        self.known_fields(
            map,
            PATH,
            &["name", "dbt_account_id", "dbt_host_url", "description", "repository"],
        );

        let name = self.required_str(map, PATH, "name");
        let account_id = self.account_id(map.get("dbt_account_id"));
        let host_url = self.host_url(map.get("dbt_host_url"));
        let description = self.optional_str(map, PATH, "description");
        let repository = match map.get("repository") {
            None | Some(Value::Null) => None,
            Some(value) => self.repository(value),
        };

        Some(ProjectConfig {
            name: name?,
            dbt_account_id: account_id?,
            dbt_host_url: host_url?,
            description,
            repository,
        })
    }

    fn account_id(&mut self, value: Option<&Value>) -> Option<u64> {
        const PATH: &str = "project.dbt_account_id";
        let text = match value {
            None | Some(Value::Null) => {
                self.error(PATH, "is required");
                return None;
            }
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            Some(_) => {
                self.error(PATH, "must be a positive integer");
                return None;
            }
        };

        let parsed = account_id_pattern()
            .is_match(&text)
            .then(|| text.parse::<u64>().ok())
            .flatten()
            .filter(|id| *id > 0);
        if parsed.is_none() {
            self.error(PATH, format!("must be a positive integer, got '{text}'"));
        }
        parsed
    }

    fn host_url(&mut self, value: Option<&Value>) -> Option<String> {
        const PATH: &str = "project.dbt_host_url";
        let text = match value {
            None | Some(Value::Null) => {
                self.error(PATH, "is required");
                return None;
            }
            Some(Value::String(s)) => s.clone(),
            Some(_) => {
                self.error(PATH, "must be a string");
                return None;
            }
        };

        match url::Url::parse(&text) {
            Ok(url) if matches!(url.scheme(), "http" | "https") && url.host().is_some() => {
                Some(text)
            }
            Ok(_) => {
                self.error(PATH, format!("must be an http(s) URL with a host, got '{text}'"));
                None
            }
            Err(e) => {
                self.error(PATH, format!("is not a valid URL ({e}): '{text}'"));
                None
            }
        }
    }

    fn repository(&mut self, value: &Value) -> Option<RepositoryConfig> {
        const PATH: &str = "project.repository";
        let Some(map) = value.as_mapping() else {
            self.error(PATH, "must be a mapping");
            return None;
        };
        self.known_fields(map, PATH, &["remote_url", "git_provider", "git_clone_strategy"]);

        let remote_url = self.required_str(map, PATH, "remote_url");
        let git_provider = self.optional_str(map, PATH, "git_provider");
        let git_clone_strategy = self.optional_str(map, PATH, "git_clone_strategy");

        Some(RepositoryConfig {
            remote_url: remote_url?,
            git_provider,
            git_clone_strategy,
        })
    }

    fn credential(&mut self, path: &str, map: &Mapping) -> Option<CredentialConfig> {
        self.known_fields(map, path, &["name", "type", "auth_fields"]);
        let name = self.required_str(map, path, "name");
        let credential_type = self.required_str(map, path, "type");

        let auth_fields = match map.get("auth_fields") {
            None | Some(Value::Null) => Some(BTreeMap::new()),
            Some(value @ Value::Mapping(_)) => {
                match serde_json::to_value(value) {
                    Ok(serde_json::Value::Object(fields)) => Some(fields.into_iter().collect()),
                    _ => {
                        self.error(
                            format!("{path}.auth_fields"),
                            "must be a mapping with string keys",
                        );
                        None
                    }
                }
            }
            Some(_) => {
                self.error(format!("{path}.auth_fields"), "must be a mapping");
                None
            }
        };

        Some(CredentialConfig {
            name: name?,
            credential_type: credential_type?,
            auth_fields: auth_fields?,
        })
    }

    fn environment(
        &mut self,
        path: &str,
        map: &Mapping,
        credentials: &HashSet<String>,
    ) -> Option<EnvironmentConfig> {
        self.known_fields(
            map,
            path,
            &[
                "name",
                "type",
                "deployment_type",
                "credential",
                "dbt_version",
                "custom_branch",
            ],
        );
        let name = self.required_str(map, path, "name").and_then(|name| {
            if name == PROJECT_SCOPE {
                self.error(
                    format!("{path}.name"),
                    format!("'{PROJECT_SCOPE}' is reserved for project-wide variable values"),
                );
                None
            } else {
                Some(name)
            }
        });

        let env_type = self.required_str(map, path, "type").and_then(|t| {
            let parsed = EnvironmentType::parse(&t);
            if parsed.is_none() {
                self.error(
                    format!("{path}.type"),
                    format!("must be 'deployment' or 'development', got '{t}'"),
                );
            }
            parsed
        });

        let deployment_type = self.optional_str(map, path, "deployment_type").and_then(|t| {
            let parsed = DeploymentType::parse(&t);
            if parsed.is_none() {
                self.error(
                    format!("{path}.deployment_type"),
                    format!("must be 'production' or 'staging', got '{t}'"),
                );
            }
            parsed
        });
        if deployment_type.is_some() && env_type == Some(EnvironmentType::Development) {
            self.error(
                format!("{path}.deployment_type"),
                "is only allowed on deployment environments",
            );
        }

        let credential =
            self.reference(map, path, "credential", credentials, "credential", false);
        let dbt_version = self.optional_str(map, path, "dbt_version");
        let custom_branch = self.optional_str(map, path, "custom_branch");

        Some(EnvironmentConfig {
            name: name?,
            env_type: env_type?,
            deployment_type,
            credential,
            dbt_version,
            custom_branch,
        })
    }

    /// A project holds at most one development and one production environment
    fn environment_constraints(&mut self, environments: &[EnvironmentConfig]) {
        let development = environments
            .iter()
            .filter(|e| e.env_type == EnvironmentType::Development)
            .count();
        if development > 1 {
            self.error(
                "environments",
                format!("at most one development environment is allowed, found {development}"),
            );
        }

        let production = environments
            .iter()
            .filter(|e| e.deployment_type == Some(DeploymentType::Production))
            .count();
        if production > 1 {
            self.error(
                "environments",
                format!("at most one production environment is allowed, found {production}"),
            );
        }
    }

    /// A variable entry: its key and the values it sets.
    ///
    /// An entry sets either one `value` (project-wide, or for the environment
    /// named by `environment_scope`) or an `environment_values` map.
    fn environment_variable(
        &mut self,
        path: &str,
        map: &Mapping,
        environments: &HashSet<String>,
    ) -> Option<(String, Vec<ScopedValue>)> {
        self.known_fields(
            map,
            path,
            &["key", "value", "environment_scope", "environment_values"],
        );
        let key = self.required_str(map, path, "key").and_then(|k| {
            if env_var_key_pattern().is_match(&k) {
                Some(k)
            } else {
                self.error(
                    format!("{path}.key"),
                    format!("must start with DBT_ and contain only letters, digits and '_', got '{k}'"),
                );
                None
            }
        });

        let is_set = |field: &str| !matches!(map.get(field), None | Some(Value::Null));
        let values = match (is_set("value"), is_set("environment_values")) {
            (true, true) => {
                self.error(path, "set either 'value' or 'environment_values', not both");
                None
            }
            (false, false) => {
                self.error(format!("{path}.value"), "is required");
                None
            }
            (true, false) => {
                let value = self.required_scalar(map, path, "value");
                let scope = self.reference(
                    map,
                    path,
                    "environment_scope",
                    environments,
                    "environment",
                    false,
                );
                let scoped = match scope {
                    Some(scope) => ScopedValue {
                        path: format!("{path}.environment_scope"),
                        scope,
                        value: value?,
                    },
                    None => ScopedValue {
                        path: format!("{path}.value"),
                        scope: PROJECT_SCOPE.to_string(),
                        value: value?,
                    },
                };
                Some(vec![scoped])
            }
            (false, true) => {
                if is_set("environment_scope") {
                    self.error(
                        format!("{path}.environment_scope"),
                        "cannot be combined with 'environment_values'",
                    );
                }
                self.environment_values(map, path, environments)
            }
        };

        Some((key?, values?))
    }

    fn environment_values(
        &mut self,
        map: &Mapping,
        path: &str,
        environments: &HashSet<String>,
    ) -> Option<Vec<ScopedValue>> {
        let field = format!("{path}.environment_values");
        let entries = match map.get("environment_values") {
            Some(Value::Mapping(entries)) if !entries.is_empty() => entries,
            _ => {
                self.error(field, "must be a non-empty mapping of scope to value");
                return None;
            }
        };

        let mut values = Vec::with_capacity(entries.len());
        let mut ok = true;
        for (scope, value) in entries {
            let Some(scope) = scope.as_str() else {
                self.error(field.as_str(), "scopes must be strings");
                ok = false;
                continue;
            };
            let scope_path = format!("{field}.{scope}");
            if scope != PROJECT_SCOPE && !environments.contains(scope) {
                self.error(
                    scope_path.as_str(),
                    format!("references unknown environment '{scope}'"),
                );
                ok = false;
            }
            match self.scalar(value, &scope_path) {
                Some(value) => values.push(ScopedValue {
                    path: scope_path,
                    scope: scope.to_string(),
                    value,
                }),
                None => ok = false,
            }
        }
        ok.then_some(values)
    }

    fn job(
        &mut self,
        path: &str,
        map: &Mapping,
        environments: &HashSet<String>,
        credentials: &HashSet<String>,
    ) -> Option<JobConfig> {
        self.known_fields(
            map,
            path,
            &[
                "name",
                "environment",
                "credential",
                "schedule",
                "commands",
                "num_threads",
                "timeout_seconds",
                "target_name",
                "generate_docs",
            ],
        );
        let name = self.required_str(map, path, "name");
        let environment =
            self.reference(map, path, "environment", environments, "environment", true);
        let credential = self.reference(map, path, "credential", credentials, "credential", false);

        let schedule = self.optional_str(map, path, "schedule").and_then(|cron| {
            let fields = cron.split_whitespace().count();
            if fields == 5 {
                Some(cron)
            } else {
                self.error(
                    format!("{path}.schedule"),
                    format!("must be a 5-field cron expression, got '{cron}'"),
                );
                None
            }
        });

        let commands = self.commands(map, path);
        let num_threads = self.optional_u64(map, path, "num_threads", 1);
        let timeout_seconds = self.optional_u64(map, path, "timeout_seconds", 0);
        let target_name = self.optional_str(map, path, "target_name");
        let generate_docs = self.optional_bool(map, path, "generate_docs");

        Some(JobConfig {
            name: name?,
            environment: environment?,
            credential,
            schedule,
            commands: commands?,
            num_threads,
            timeout_seconds,
            target_name,
            generate_docs,
        })
    }

    fn commands(&mut self, map: &Mapping, path: &str) -> Option<Vec<String>> {
        let field = format!("{path}.commands");
        let items = match map.get("commands") {
            None | Some(Value::Null) => {
                self.error(field, "is required");
                return None;
            }
            Some(Value::Sequence(items)) if items.is_empty() => {
                self.error(field, "must contain at least one command");
                return None;
            }
            Some(Value::Sequence(items)) => items,
            Some(_) => {
                self.error(field, "must be a list of strings");
                return None;
            }
        };

        let mut commands = Vec::with_capacity(items.len());
        let mut ok = true;
        for (i, item) in items.iter().enumerate() {
            match item.as_str() {
                Some(cmd) if !cmd.trim().is_empty() => commands.push(cmd.to_string()),
                _ => {
                    self.error(format!("{field}[{i}]"), "must be a non-empty string");
                    ok = false;
                }
            }
        }
        ok.then_some(commands)
    }

    fn job_override(
        &mut self,
        path: &str,
        map: &Mapping,
        jobs: &HashSet<String>,
        variables: &HashSet<String>,
    ) -> Option<JobOverrideConfig> {
        self.known_fields(map, path, &["job", "key", "value"]);
        let job = self.reference(map, path, "job", jobs, "job", true);
        let key = self.reference(map, path, "key", variables, "environment variable", true);
        let value = self.required_scalar(map, path, "value");

        Some(JobOverrideConfig {
            job: job?,
            key: key?,
            value: value?,
        })
    }
}

#[cfg(test)]
#[path = "validate_test.rs"]
mod tests;
