//! Ls command implementation

use anyhow::{Context, Result};
use dbtc_core::{ResourceGraph, ResourceKind, StateFile};
use serde::Serialize;

use crate::cli::{GlobalArgs, LsArgs, LsOutput};
use crate::commands::common;

/// One row of the listing
#[derive(Debug, Serialize)]
pub(crate) struct ResourceInfo {
    pub(crate) key: String,
    pub(crate) kind: ResourceKind,
    pub(crate) remote_id: Option<String>,
    pub(crate) depends_on: Vec<String>,
}

/// Execute the ls command
pub async fn execute(args: &LsArgs, global: &GlobalArgs) -> Result<()> {
    let kind = args
        .kind
        .as_deref()
        .map(|k| k.parse::<ResourceKind>().map_err(anyhow::Error::msg))
        .transpose()?;

    let graph = common::build_graph(global)?;
    let state = common::load_state(global)?;
    let resources = collect(&graph, &state, kind);

    match args.output {
        LsOutput::Table => print_table(&resources),
        LsOutput::Json => {
            let json =
                serde_json::to_string_pretty(&resources).context("Failed to serialize to JSON")?;
            println!("{}", json);
        }
    }
    Ok(())
}

/// Resources in dependency order, with remote IDs where state has them
pub(crate) fn collect(
    graph: &ResourceGraph,
    state: &StateFile,
    kind: Option<ResourceKind>,
) -> Vec<ResourceInfo> {
    graph
        .ordered()
        .filter(|r| kind.map_or(true, |k| r.kind == k))
        .map(|r| ResourceInfo {
            key: r.key.to_string(),
            kind: r.kind,
            remote_id: state.remote_id(r.key.as_str()).map(|id| id.to_string()),
            depends_on: r.dependency_keys().iter().map(|k| k.to_string()).collect(),
        })
        .collect()
}

/// Print resources in table format
fn print_table(resources: &[ResourceInfo]) {
    let key_width = resources
        .iter()
        .map(|r| r.key.len())
        .max()
        .unwrap_or(3)
        .max(3);
    let kind_width = resources
        .iter()
        .map(|r| r.kind.as_str().len())
        .max()
        .unwrap_or(4)
        .max(4);
    let id_width = 9;

    println!(
        "{:<key_width$}  {:<kind_width$}  {:<id_width$}  DEPENDS_ON",
        "KEY", "KIND", "REMOTE_ID",
    );
    println!(
        "{:-<key_width$}  {:-<kind_width$}  {:-<id_width$}  {}",
        "",
        "",
        "",
        "-".repeat(40),
    );

    for r in resources {
        let deps = if r.depends_on.is_empty() {
            "-".to_string()
        } else {
            r.depends_on.join(", ")
        };
        println!(
            "{:<key_width$}  {:<kind_width$}  {:<id_width$}  {}",
            r.key,
            r.kind.as_str(),
            r.remote_id.as_deref().unwrap_or("-"),
            deps,
        );
    }

    println!();
    println!("{} resources found", resources.len());
}

#[cfg(test)]
#[path = "ls_test.rs"]
mod tests;
