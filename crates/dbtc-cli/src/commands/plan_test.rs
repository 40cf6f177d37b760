use super::*;
use dbtc_core::{parse_raw, validate_config, ResourceGraph, ResourceKey, ResourceState};

const CONFIG: &str = r#"
project:
  name: analytics
  dbt_account_id: 1
  dbt_host_url: https://cloud.getdbt.com
credentials:
  - name: warehouse
    type: snowflake
    auth_fields:
      password: hunter2
environments:
  - name: Production
    type: deployment
    credential: warehouse
environment_variables:
  - key: DBT_ENV_SECRET_TOKEN
    value: s3cr3t
"#;

fn graph() -> ResourceGraph {
    ResourceGraph::build(&validate_config(&parse_raw(CONFIG).unwrap()).unwrap()).unwrap()
}

fn applied(graph: &ResourceGraph) -> StateFile {
    let mut state = StateFile::new();
    for (i, r) in graph.ordered().enumerate() {
        state.upsert(
            r.key.clone(),
            ResourceState {
                kind: r.kind,
                remote_id: dbtc_core::RemoteId::try_new((i + 1).to_string()).unwrap(),
                attributes: r.attributes.clone(),
                depends_on: r.dependency_keys(),
            },
        );
    }
    state
}

#[test]
fn test_render_creates_masks_secrets() {
    let state = StateFile::new();
    let plan = plan(&graph(), &state).unwrap();
    let text = render_text(&plan, &state);

    assert!(text.contains("  + create project.analytics\n"));
    assert!(text.contains("  + create credential.warehouse\n"));
    assert!(text.contains("(sensitive)"));
    assert!(!text.contains("hunter2"));
    assert!(!text.contains("s3cr3t"));
    assert!(text.ends_with("Plan: 4 to add, 0 to change, 0 to destroy.\n"));
}

#[test]
fn test_render_update_shows_before_and_after() {
    let graph = graph();
    let mut state = applied(&graph);
    state
        .resources
        .get_mut("environment.Production")
        .unwrap()
        .attributes
        .insert("custom_branch".to_string(), serde_json::json!("main"));

    let plan = plan(&graph, &state).unwrap();
    let text = render_text(&plan, &state);
    assert!(text.contains("  ~ update environment.Production\n"));
    assert!(text.contains("      custom_branch: \"main\" -> null\n"));
    assert!(text.contains("Plan: 0 to add, 1 to change, 0 to destroy."));
}

#[test]
fn test_render_delete_and_empty() {
    let graph = graph();
    let mut state = applied(&graph);
    let text = render_text(&plan(&graph, &state).unwrap(), &state);
    assert_eq!(text, "No changes. Resources match the configuration.\n");

    state.upsert(
        ResourceKey::try_new("job.old").unwrap(),
        ResourceState {
            kind: dbtc_core::ResourceKind::Job,
            remote_id: dbtc_core::RemoteId::try_new("99").unwrap(),
            attributes: Attributes::new(),
            depends_on: Vec::new(),
        },
    );
    let text = render_text(&plan(&graph, &state).unwrap(), &state);
    assert!(text.contains("  - delete job.old\n"));
}

#[test]
fn test_json_report_masks_secrets() {
    let plan = plan(&graph(), &StateFile::new()).unwrap();
    let json = serde_json::to_string(&PlanReport::new(&plan)).unwrap();
    assert!(json.contains("\"create\":4"));
    assert!(!json.contains("hunter2"));
    assert!(!json.contains("s3cr3t"));
}
