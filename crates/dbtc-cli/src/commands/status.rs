//! Status command implementation

use anyhow::{Context, Result};
use dbtc_core::{ApplyJournal, RunStatus};
use std::fmt::Write;

use crate::cli::{GlobalArgs, OutputFormat, StatusArgs};
use crate::commands::common;

/// Execute the status command
pub async fn execute(args: &StatusArgs, global: &GlobalArgs) -> Result<()> {
    let path = common::journal_path(&global.state);
    let journal = ApplyJournal::load(&path)
        .with_context(|| format!("Failed to read run journal {}", path.display()))?
        .ok_or_else(|| {
            anyhow::anyhow!(
                "No run recorded at {}. Run 'dbtc apply' first.",
                path.display()
            )
        })?;

    match args.output {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&journal)
                .context("Failed to serialize run journal")?;
            println!("{}", json);
        }
        OutputFormat::Text => print!("{}", render_text(&journal)),
    }
    Ok(())
}

/// Summarise a recorded run
pub(crate) fn render_text(journal: &ApplyJournal) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Run {}: {}", journal.run_id, journal.status);
    let _ = writeln!(out, "  started:  {}", journal.started_at.to_rfc3339());
    if let Some(finished) = journal.finished_at {
        let _ = writeln!(out, "  finished: {}", finished.to_rfc3339());
    }
    let _ = writeln!(
        out,
        "  {} operation(s) completed in {}ms, {} not started",
        journal.completed.len(),
        journal.total_duration_ms(),
        journal.pending.len()
    );

    if let Some(failed) = &journal.failed {
        let _ = writeln!(out, "\nFailed: {} {}", failed.action, failed.key);
        let _ = writeln!(out, "  {}", failed.error);
        if let Some(id) = &failed.remote_id {
            let _ = writeln!(
                out,
                "  Remote id {} exists remotely but is missing from state",
                id
            );
        }
        if let Some(response) = &failed.response {
            let _ = writeln!(out, "  Response: {}", response);
        }
    }

    if !journal.pending.is_empty() {
        out.push_str("\nNot started:\n");
        for key in &journal.pending {
            let _ = writeln!(out, "  {}", key);
        }
    }

    if journal.status != RunStatus::Completed {
        out.push_str("\nRun 'dbtc plan' to see what remains.\n");
    }
    out
}

#[cfg(test)]
#[path = "status_test.rs"]
mod tests;
