//! Validate command implementation

use anyhow::{Context, Result};
use dbtc_core::{CoreError, ResourceGraph, ValidationError};
use serde::Serialize;

use crate::cli::{GlobalArgs, OutputFormat, ValidateArgs};
use crate::commands::common::{self, ExitCode};

#[derive(Debug, Serialize)]
struct ValidationReport {
    valid: bool,
    resources: usize,
    errors: Vec<ValidationError>,
}

/// Execute the validate command
pub async fn execute(args: &ValidateArgs, global: &GlobalArgs) -> Result<()> {
    let report = match common::load_config(global) {
        Ok(config) => {
            // A valid file must also expand into an acyclic graph
            let graph = ResourceGraph::build(&config)?;
            ValidationReport {
                valid: true,
                resources: graph.len(),
                errors: Vec::new(),
            }
        }
        Err(CoreError::Validation { errors }) => ValidationReport {
            valid: false,
            resources: 0,
            errors,
        },
        Err(e) => return Err(e.into()),
    };

    match args.output {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&report)
                .context("Failed to serialize validation report")?;
            println!("{}", json);
        }
        OutputFormat::Text => {
            for error in &report.errors {
                eprintln!("  {}", error);
            }
            if report.valid {
                println!(
                    "Validation passed: {} is valid ({} resources)",
                    global.config.display(),
                    report.resources
                );
            } else {
                eprintln!();
                eprintln!("Validation failed: {} errors", report.errors.len());
            }
        }
    }

    if report.valid {
        Ok(())
    } else {
        Err(ExitCode(1).into())
    }
}
