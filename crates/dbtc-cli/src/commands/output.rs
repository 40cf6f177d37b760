//! Output command implementation

use anyhow::{Context, Result};
use dbtc_core::outputs;
use serde_json::Value;

use crate::cli::{GlobalArgs, OutputArgs, OutputFormat};
use crate::commands::common::{self, ExitCode};

/// Execute the output command
pub async fn execute(args: &OutputArgs, global: &GlobalArgs) -> Result<()> {
    let state = common::load_state(global)?;
    let outputs = outputs(&state)?;
    let all = serde_json::to_value(&outputs).context("Failed to serialize outputs")?;

    let selected = match &args.name {
        Some(name) => match all.get(name) {
            Some(value) => value.clone(),
            None => {
                eprintln!("Unknown output '{}'", name);
                return Err(ExitCode(1).into());
            }
        },
        None => all,
    };

    match args.output {
        OutputFormat::Json => {
            let json =
                serde_json::to_string_pretty(&selected).context("Failed to serialize outputs")?;
            println!("{}", json);
        }
        OutputFormat::Text => print!("{}", render_text(&selected, args.name.is_some())),
    }
    Ok(())
}

/// Render outputs as `name = value` lines, or a single bare value
pub(crate) fn render_text(value: &Value, single: bool) -> String {
    let mut out = String::new();
    match value {
        Value::Object(fields) if !single => {
            for (name, field) in fields {
                out.push_str(&format!("{} = {}\n", name, render_value(field)));
            }
        }
        other => {
            out.push_str(&render_value(other));
            out.push('\n');
        }
    }
    out
}

fn render_value(value: &Value) -> String {
    match value {
        Value::Object(map) if map.is_empty() => "{}".to_string(),
        Value::Object(map) => {
            let lines: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("  \"{}\" = {}", k, v))
                .collect();
            format!("{{\n{}\n}}", lines.join("\n"))
        }
        other => other.to_string(),
    }
}

#[cfg(test)]
#[path = "output_test.rs"]
mod tests;
