//! Shared utilities for CLI commands

use anyhow::{Context, Result};
use dbtc_core::apply::JOURNAL_FILE;
use dbtc_core::{
    load_raw, validate_config, Action, ApplyJournal, ApplyResult, CoreError, CoreResult,
    ResourceGraph, RunStatus, StateFile, ValidatedConfig, VarOverrides,
};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::cli::{GlobalArgs, OutputFormat};

/// Error type representing a non-zero process exit code.
///
/// Use `return Err(ExitCode(N).into())` instead of `std::process::exit(N)`
/// so that RAII destructors run and cleanup happens properly.
#[derive(Debug)]
pub(crate) struct ExitCode(pub(crate) i32);

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Control flow only; main exits with the code and prints nothing.
        write!(f, "")
    }
}

impl std::error::Error for ExitCode {}

/// Overrides for `project.*` taken from flags or environment
pub(crate) fn var_overrides(global: &GlobalArgs) -> VarOverrides {
    VarOverrides {
        dbt_account_id: global.account_id.clone(),
        dbt_host_url: global.host_url.clone(),
    }
}

/// Load, override and validate the configuration file
pub(crate) fn load_config(global: &GlobalArgs) -> CoreResult<ValidatedConfig> {
    let mut raw = load_raw(&global.config)?;
    let overrides = var_overrides(global);
    if !overrides.is_empty() {
        log::info!("Applying project overrides from flags/environment");
        overrides.apply(&mut raw);
    }
    validate_config(&raw)
}

/// Load the configuration and expand it into the desired resource graph
pub(crate) fn build_graph(global: &GlobalArgs) -> Result<ResourceGraph> {
    let config = load_config(global)?;
    let graph = ResourceGraph::build(&config)?;
    log::info!(
        "Loaded {} resource(s) from {}",
        graph.len(),
        global.config.display()
    );
    Ok(graph)
}

/// Load prior state; a missing file is an empty state
pub(crate) fn load_state(global: &GlobalArgs) -> Result<StateFile> {
    StateFile::load(&global.state)
        .with_context(|| format!("Failed to load state from {}", global.state.display()))
}

/// Where the run journal lives for a given state file
pub(crate) fn journal_path(state_path: &Path) -> PathBuf {
    match state_path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.join(JOURNAL_FILE),
        _ => PathBuf::from(JOURNAL_FILE),
    }
}

/// A flag that is set when the process receives Ctrl-C
pub(crate) fn cancel_on_ctrl_c() -> Arc<AtomicBool> {
    let flag = Arc::new(AtomicBool::new(false));
    let signal_flag = Arc::clone(&flag);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nInterrupted, stopping after the current operation...");
            signal_flag.store(true, Ordering::SeqCst);
        }
    });
    flag
}

/// Record, print and convert the outcome of an apply or destroy run
pub(crate) fn finish_run(
    result: ApplyResult,
    global: &GlobalArgs,
    output: OutputFormat,
) -> Result<()> {
    let path = journal_path(&global.state);
    if let Err(e) = result.journal.save(&path) {
        log::warn!("Failed to write run journal {}: {}", path.display(), e);
    }

    match output {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&result.journal)
                .context("Failed to serialize run journal")?;
            println!("{}", json);
        }
        OutputFormat::Text => print_journal(&result.journal),
    }

    if let Some(err) = result.error {
        eprintln!("Error: {}", err);
        if let CoreError::StateNotSaved { key, remote_id, .. } = &err {
            eprintln!(
                "{} exists remotely as id {} but is not in {}; a new apply will create it again.",
                key,
                remote_id,
                global.state.display()
            );
        }
        eprintln!(
            "State holds {} resource(s) at {}; fix the problem and run apply again.",
            result.state.len(),
            global.state.display()
        );
        return Err(ExitCode(1).into());
    }
    if result.journal.status == RunStatus::Cancelled {
        eprintln!(
            "Run cancelled, {} operation(s) not started. State is consistent.",
            result.journal.pending.len()
        );
        return Err(ExitCode(130).into());
    }
    Ok(())
}

fn print_journal(journal: &ApplyJournal) {
    for record in &journal.completed {
        let id = record
            .remote_id
            .as_ref()
            .map(|id| format!(" (id {})", id))
            .unwrap_or_default();
        println!(
            "  {} {}{}  [{}ms]",
            record.action.symbol(),
            record.key,
            id,
            record.duration_ms
        );
    }
    if let Some(failed) = &journal.failed {
        println!("  ! {} {}: {}", failed.action, failed.key, failed.error);
    }

    if journal.status == RunStatus::Completed {
        let count = |action: Action| {
            journal
                .completed
                .iter()
                .filter(|r| r.action == action)
                .count()
        };
        println!();
        println!(
            "Apply complete! Resources: {} added, {} changed, {} destroyed.",
            count(Action::Create),
            count(Action::Update),
            count(Action::Delete)
        );
    }
}

#[cfg(test)]
#[path = "common_test.rs"]
mod tests;
