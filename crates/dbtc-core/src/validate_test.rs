use super::*;

const VALID: &str = r#"
project:
  name: analytics
  dbt_account_id: "999999"
  dbt_host_url: https://cloud.getdbt.com
  repository:
    remote_url: git@github.com:acme/analytics.git
    git_provider: github
credentials:
  - name: warehouse
    type: snowflake
    auth_fields:
      user: loader
      password: hunter2
environments:
  - name: Development
    type: development
  - name: Production
    type: deployment
    deployment_type: production
    credential: warehouse
jobs:
  - name: Daily Run
    environment: Production
    credential: warehouse
    schedule: "0 6 * * *"
    commands:
      - dbt build
environment_variables:
  - key: DBT_TARGET
    value: prod
    environment_scope: Production
environment_variable_job_overrides:
  - job: Daily Run
    key: DBT_TARGET
    value: nightly
"#;

fn raw(yaml: &str) -> Value {
    serde_yaml::from_str(yaml).unwrap()
}

fn errors_for(yaml: &str) -> Vec<ValidationError> {
    validate(&raw(yaml)).unwrap_err()
}

fn paths(errors: &[ValidationError]) -> Vec<&str> {
    errors.iter().map(|e| e.path.as_str()).collect()
}

#[test]
fn test_valid_config() {
    let config = validate(&raw(VALID)).unwrap();
    assert_eq!(config.project.name, "analytics");
    assert_eq!(config.project.dbt_account_id, 999_999);
    assert_eq!(
        config.project.repository.as_ref().unwrap().git_provider.as_deref(),
        Some("github")
    );
    assert_eq!(config.environments.len(), 2);
    assert_eq!(
        config.environments[1].deployment_type,
        Some(DeploymentType::Production)
    );
    assert_eq!(config.jobs[0].commands, vec!["dbt build".to_string()]);
    assert_eq!(config.credentials[0].auth_fields.len(), 2);
    assert_eq!(config.environment_variable_job_overrides[0].name(), "Daily Run.DBT_TARGET");
}

#[test]
fn test_numeric_account_id_accepted() {
    let mut doc = raw(VALID);
    doc["project"]["dbt_account_id"] = Value::from(12345);
    let config = validate(&doc).unwrap();
    assert_eq!(config.project.dbt_account_id, 12345);
}

#[test]
fn test_invalid_account_id_single_error() {
    let mut doc = raw(VALID);
    doc["project"]["dbt_account_id"] = Value::from("invalid");

    let errors = validate(&doc).unwrap_err();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].path, "project.dbt_account_id");
    assert!(errors[0].message.contains("positive integer"));
}

#[test]
fn test_zero_account_id_rejected() {
    let mut doc = raw(VALID);
    doc["project"]["dbt_account_id"] = Value::from("0");
    let errors = validate(&doc).unwrap_err();
    assert_eq!(paths(&errors), vec!["project.dbt_account_id"]);
}

#[test]
fn test_invalid_host_url() {
    let mut doc = raw(VALID);
    doc["project"]["dbt_host_url"] = Value::from("not a url");
    let errors = validate(&doc).unwrap_err();
    assert_eq!(paths(&errors), vec!["project.dbt_host_url"]);

    doc["project"]["dbt_host_url"] = Value::from("ftp://cloud.getdbt.com");
    let errors = validate(&doc).unwrap_err();
    assert_eq!(paths(&errors), vec!["project.dbt_host_url"]);
}

#[test]
fn test_missing_required_top_level_keys() {
    let errors = errors_for("credentials: []\n");
    assert_eq!(paths(&errors), vec!["project", "environments"]);
}

#[test]
fn test_root_must_be_mapping() {
    let errors = errors_for("- just\n- a list\n");
    assert_eq!(paths(&errors), vec!["$"]);
}

#[test]
fn test_unknown_top_level_key() {
    let doc = format!("{VALID}\nwebhooks: []\n");
    let errors = errors_for(&doc);
    assert_eq!(paths(&errors), vec!["webhooks"]);
}

#[test]
fn test_all_errors_accumulated() {
    let errors = errors_for(
        r#"
project:
  name: analytics
  dbt_account_id: invalid
  dbt_host_url: nope
environments:
  - name: Production
    type: deployment
  - name: Production
    type: deployment
jobs:
  - name: nightly
    environment: Staging
    commands: [dbt run]
environment_variables:
  - key: DBT_TARGET
    value: prod
environment_variable_job_overrides:
  - job: weekly
    key: DBT_MISSING
    value: x
"#,
    );

    assert_eq!(
        paths(&errors),
        vec![
            "project.dbt_account_id",
            "project.dbt_host_url",
            "environments[1].name",
            "jobs[0].environment",
            "environment_variable_job_overrides[0].job",
            "environment_variable_job_overrides[0].key",
        ]
    );
}

#[test]
fn test_dangling_credential_references() {
    let errors = errors_for(
        r#"
project:
  name: analytics
  dbt_account_id: 1
  dbt_host_url: https://cloud.getdbt.com
environments:
  - name: Production
    type: deployment
    credential: missing
jobs:
  - name: nightly
    environment: Production
    credential: also_missing
    commands: [dbt run]
"#,
    );
    assert_eq!(
        paths(&errors),
        vec!["environments[0].credential", "jobs[0].credential"]
    );
}

#[test]
fn test_reference_to_entity_with_other_error_is_not_dangling() {
    // The environment has a bad type, but its name is still declared.
    let errors = errors_for(
        r#"
project:
  name: analytics
  dbt_account_id: 1
  dbt_host_url: https://cloud.getdbt.com
environments:
  - name: Production
    type: prod
jobs:
  - name: nightly
    environment: Production
    commands: [dbt run]
"#,
    );
    assert_eq!(paths(&errors), vec!["environments[0].type"]);
}

#[test]
fn test_environment_constraints() {
    let errors = errors_for(
        r#"
project:
  name: analytics
  dbt_account_id: 1
  dbt_host_url: https://cloud.getdbt.com
environments:
  - name: Dev A
    type: development
  - name: Dev B
    type: development
    deployment_type: staging
  - name: Prod A
    type: deployment
    deployment_type: production
  - name: Prod B
    type: deployment
    deployment_type: production
"#,
    );
    assert_eq!(
        paths(&errors),
        vec![
            "environments[1].deployment_type",
            "environments",
            "environments",
        ]
    );
}

#[test]
fn test_job_field_checks() {
    let errors = errors_for(
        r#"
project:
  name: analytics
  dbt_account_id: 1
  dbt_host_url: https://cloud.getdbt.com
environments:
  - name: Production
    type: deployment
jobs:
  - name: nightly
    environment: Production
    schedule: "every day"
    commands: []
  - name: hourly
    environment: Production
    commands: [dbt run, 42]
    num_threads: 0
    retries: 3
"#,
    );
    assert_eq!(
        paths(&errors),
        vec![
            "jobs[0].schedule",
            "jobs[0].commands",
            "jobs[1].retries",
            "jobs[1].commands[1]",
            "jobs[1].num_threads",
        ]
    );
}

#[test]
fn test_environment_variable_key_rules() {
    let errors = errors_for(
        r#"
project:
  name: analytics
  dbt_account_id: 1
  dbt_host_url: https://cloud.getdbt.com
environments: []
environment_variables:
  - key: TARGET
    value: prod
  - key: DBT_TARGET
    value: prod
  - key: DBT_TARGET
    value: dev
  - key: DBT_THREADS
    value: 4
    environment_scope: Nowhere
"#,
    );
    assert_eq!(
        paths(&errors),
        vec![
            "environment_variables[0].key",
            "environment_variables[2].value",
            "environment_variables[3].environment_scope",
        ]
    );
    assert_eq!(
        errors[1].message,
        "duplicate value for 'DBT_TARGET' in scope 'project'"
    );
}

const SCOPED: &str = r#"
project:
  name: analytics
  dbt_account_id: 1
  dbt_host_url: https://cloud.getdbt.com
environments:
  - name: Development
    type: development
  - name: Production
    type: deployment
environment_variables:
  - key: DBT_TARGET
    value: prod
    environment_scope: Production
  - key: DBT_TARGET
    value: dev
    environment_scope: Development
  - key: DBT_TARGET
    value: default
"#;

#[test]
fn test_repeated_key_with_distinct_scopes_merges() {
    let config = validate(&raw(SCOPED)).unwrap();
    assert_eq!(config.environment_variables.len(), 1);

    let var = &config.environment_variables[0];
    assert_eq!(var.key, "DBT_TARGET");
    assert_eq!(var.environment_values["Production"], "prod");
    assert_eq!(var.environment_values["Development"], "dev");
    assert_eq!(var.environment_values["project"], "default");
    assert_eq!(
        var.scoped_environments().collect::<Vec<_>>(),
        vec!["Development", "Production"]
    );
}

#[test]
fn test_environment_values_map() {
    let doc = SCOPED.replace(
        &SCOPED[SCOPED.find("environment_variables:").unwrap()..],
        r#"environment_variables:
  - key: DBT_TARGET
    environment_values:
      project: default
      Production: prod
      Development: 3
"#,
    );
    let config = validate(&raw(&doc)).unwrap();
    let var = &config.environment_variables[0];
    assert_eq!(var.environment_values.len(), 3);
    assert_eq!(var.environment_values["Development"], "3");
}

#[test]
fn test_environment_values_errors() {
    let doc = SCOPED.replace(
        &SCOPED[SCOPED.find("environment_variables:").unwrap()..],
        r#"environment_variables:
  - key: DBT_TARGET
    value: x
    environment_values:
      project: y
  - key: DBT_THREADS
    environment_values:
      Staging: 4
  - key: DBT_SCHEMA
    environment_values: {}
  - key: DBT_TARGET
    environment_values:
      Production: prod
  - key: DBT_TARGET
    value: other
    environment_scope: Production
"#,
    );
    let errors = errors_for(&doc);
    assert_eq!(
        paths(&errors),
        vec![
            "environment_variables[0]",
            "environment_variables[1].environment_values.Staging",
            "environment_variables[2].environment_values",
            "environment_variables[4].environment_scope",
        ]
    );
}

#[test]
fn test_environment_named_project_is_reserved() {
    let doc = SCOPED.replace("  - name: Production
", "  - name: project
");
    let errors = errors_for(&doc);
    assert!(paths(&errors).contains(&"environments[1].name"));
}

#[test]
fn test_duplicate_override_pair() {
    let doc = VALID.replace(
        "    value: nightly\n",
        "    value: nightly\n  - job: Daily Run\n    key: DBT_TARGET\n    value: again\n",
    );
    let errors = errors_for(&doc);
    assert_eq!(paths(&errors), vec!["environment_variable_job_overrides[1]"]);
}

#[test]
fn test_scalar_values_are_stringified() {
    let doc = VALID.replace("    value: prod\n", "    value: 4\n");
    let config = validate(&raw(&doc)).unwrap();
    assert_eq!(
        config.environment_variables[0].environment_values["Production"],
        "4"
    );
}

#[test]
fn test_credential_auth_fields_shape() {
    let doc = VALID.replace(
        "    auth_fields:\n      user: loader\n      password: hunter2\n",
        "    auth_fields: [user, password]\n",
    );
    let errors = errors_for(&doc);
    assert_eq!(paths(&errors), vec!["credentials[0].auth_fields"]);
}

#[test]
fn test_section_shape_errors() {
    let errors = errors_for(
        r#"
project:
  name: analytics
  dbt_account_id: 1
  dbt_host_url: https://cloud.getdbt.com
environments: Production
jobs:
  - just a string
"#,
    );
    assert_eq!(paths(&errors), vec!["environments", "jobs[0]"]);
}

#[test]
fn test_validate_config_wraps_errors() {
    let err = validate_config(&raw("environments: []")).unwrap_err();
    match err {
        CoreError::Validation { errors } => assert_eq!(paths(&errors), vec!["project"]),
        other => panic!("unexpected error: {other}"),
    }
}
