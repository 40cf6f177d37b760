//! Plan command implementation

use anyhow::{Context, Result};
use dbtc_core::{plan, redact, Action, Attributes, Operation, Plan, PlanSummary, StateFile};
use serde::Serialize;
use std::fmt::Write;

use crate::cli::{GlobalArgs, OutputFormat, PlanArgs};
use crate::commands::common::{self, ExitCode};

/// Plan as printed with `--output json`; secrets are masked
#[derive(Debug, Serialize)]
pub(crate) struct PlanReport {
    pub(crate) summary: PlanSummary,
    pub(crate) operations: Vec<Operation>,
}

impl PlanReport {
    pub(crate) fn new(plan: &Plan) -> Self {
        let operations = plan
            .operations
            .iter()
            .map(|op| Operation {
                attributes: redact(op.kind, &op.attributes),
                ..op.clone()
            })
            .collect();
        Self {
            summary: plan.summary(),
            operations,
        }
    }
}

/// Execute the plan command
pub async fn execute(args: &PlanArgs, global: &GlobalArgs) -> Result<()> {
    let graph = common::build_graph(global)?;
    let state = common::load_state(global)?;
    let plan = plan(&graph, &state)?;

    print_plan(&plan, &state, args.output)?;

    if args.detailed_exitcode && !plan.is_empty() {
        return Err(ExitCode(2).into());
    }
    Ok(())
}

/// Print a plan in the requested format
pub(crate) fn print_plan(plan: &Plan, state: &StateFile, output: OutputFormat) -> Result<()> {
    match output {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&PlanReport::new(plan))
                .context("Failed to serialize plan")?;
            println!("{}", json);
        }
        OutputFormat::Text => print!("{}", render_text(plan, state)),
    }
    Ok(())
}

/// Render a plan as a terraform-style listing
pub(crate) fn render_text(plan: &Plan, state: &StateFile) -> String {
    let mut out = String::new();
    if plan.is_empty() {
        out.push_str("No changes. Resources match the configuration.\n");
        return out;
    }

    out.push_str("dbtc will perform the following actions:\n\n");
    for op in &plan.operations {
        let _ = writeln!(out, "  {} {} {}", op.action.symbol(), op.action, op.key);
        match op.action {
            Action::Create => render_attributes(&mut out, &redact(op.kind, &op.attributes)),
            Action::Update => render_changes(&mut out, op, state),
            Action::Delete => {}
        }
    }
    let _ = writeln!(out, "\n{}", plan.summary());
    out
}

fn render_attributes(out: &mut String, attributes: &Attributes) {
    let width = attributes.keys().map(|k| k.len()).max().unwrap_or(0);
    for (name, value) in attributes {
        let _ = writeln!(out, "      {:<width$} = {}", name, value, width = width);
    }
}

fn render_changes(out: &mut String, op: &Operation, state: &StateFile) {
    let desired = redact(op.kind, &op.attributes);
    let prior = state
        .get(op.key.as_str())
        .map(|p| redact(op.kind, &p.attributes))
        .unwrap_or_default();
    let null = serde_json::Value::Null;

    for name in &op.changed {
        match (prior.get(name), desired.get(name)) {
            (None, None) => {
                let _ = writeln!(out, "      {} (reference changed)", name);
            }
            (before, after) => {
                let _ = writeln!(
                    out,
                    "      {}: {} -> {}",
                    name,
                    before.unwrap_or(&null),
                    after.unwrap_or(&null)
                );
            }
        }
    }
}

#[cfg(test)]
#[path = "plan_test.rs"]
mod tests;
