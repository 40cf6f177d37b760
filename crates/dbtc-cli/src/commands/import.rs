//! Import command implementation

use anyhow::{Context, Result};
use dbtc_core::import::{Exclusion, Placeholder};
use dbtc_core::{import_snapshot, AccountSnapshot, ImportOptions, ImportResult, SecretHandling};
use serde::Serialize;
use std::fmt::Write;
use std::path::{Path, PathBuf};

use crate::cli::{GlobalArgs, ImportArgs, OutputFormat, SecretMode};

/// Exclusions report written next to the imported configuration
pub(crate) const EXCLUSIONS_FILE: &str = "dbtc-import-exclusions.md";

/// Placeholder manifest, written only when there is something to resolve
pub(crate) const LOOKUPS_FILE: &str = "dbtc-import-lookups.json";

/// Files written by one import
#[derive(Debug, Serialize)]
struct Written {
    config: PathBuf,
    exclusions_report: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    lookups_manifest: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct ImportReport<'a> {
    account_id: u64,
    project: &'a str,
    environments: usize,
    credentials: usize,
    jobs: usize,
    environment_variables: usize,
    exclusions: &'a [Exclusion],
    placeholders: &'a [Placeholder],
    files: &'a Written,
}

/// Execute the import command
pub async fn execute(args: &ImportArgs, global: &GlobalArgs) -> Result<()> {
    if global.config.exists() && !args.force {
        anyhow::bail!(
            "{} already exists; pass --force to overwrite it",
            global.config.display()
        );
    }

    let options = import_options(args, global)?;
    let snapshot = AccountSnapshot::load(&args.snapshot)?;
    let result = import_snapshot(&snapshot, &options)?;
    let written = write_outputs(&result, &global.config, args.report_dir.as_deref())?;

    match args.output {
        OutputFormat::Json => {
            let config = &result.config;
            let report = ImportReport {
                account_id: result.account_id,
                project: &result.project_key,
                environments: config.environments.len(),
                credentials: config.credentials.len(),
                jobs: config.jobs.len(),
                environment_variables: config.environment_variables.len(),
                exclusions: &result.exclusions,
                placeholders: &result.placeholders,
                files: &written,
            };
            let json =
                serde_json::to_string_pretty(&report).context("Failed to serialize import report")?;
            println!("{}", json);
        }
        OutputFormat::Text => print!("{}", render_summary(&result, &written)),
    }
    Ok(())
}

/// Options from the mapping file, refined by flags and global overrides
pub(crate) fn import_options(args: &ImportArgs, global: &GlobalArgs) -> Result<ImportOptions> {
    let mut options = match &args.mapping {
        Some(path) => ImportOptions::load(path)?,
        None => ImportOptions::default(),
    };
    if let Some(project) = &args.project {
        options.project = Some(project.clone());
    }
    if let Some(mode) = args.secrets {
        options.secret_handling = secret_handling(mode);
    }
    options.include_inactive |= args.include_inactive;
    for entry in &args.exclude {
        options.exclude.add(entry)?;
    }
    if let Some(id) = &global.account_id {
        let id = id
            .parse::<u64>()
            .with_context(|| format!("--account-id must be a positive integer, got '{id}'"))?;
        options.account_id = Some(id);
    }
    if let Some(url) = &global.host_url {
        options.host_url = Some(url.clone());
    }
    Ok(options)
}

fn secret_handling(mode: SecretMode) -> SecretHandling {
    match mode {
        SecretMode::Omit => SecretHandling::Omit,
        SecretMode::Redact => SecretHandling::Redact,
        SecretMode::Placeholder => SecretHandling::Placeholder,
    }
}

/// Write the configuration and its reports
fn write_outputs(
    result: &ImportResult,
    config_path: &Path,
    report_dir: Option<&Path>,
) -> Result<Written> {
    let report_dir = report_dir
        .or_else(|| config_path.parent())
        .map(Path::to_path_buf)
        .unwrap_or_default();

    write_file(config_path, &result.to_yaml()?)?;

    let exclusions_report = report_dir.join(EXCLUSIONS_FILE);
    write_file(&exclusions_report, &result.exclusions_report())?;

    let lookups_manifest = if result.placeholders.is_empty() {
        None
    } else {
        let path = report_dir.join(LOOKUPS_FILE);
        let json = serde_json::to_string_pretty(&result.lookups_manifest())
            .context("Failed to serialize lookups manifest")?;
        write_file(&path, &json)?;
        Some(path)
    };

    log::info!("Wrote {}", config_path.display());
    Ok(Written {
        config: config_path.to_path_buf(),
        exclusions_report,
        lookups_manifest,
    })
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    std::fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
}

fn render_summary(result: &ImportResult, written: &Written) -> String {
    let config = &result.config;
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Imported project '{}' from account {} into {}",
        result.project_key,
        result.account_id,
        written.config.display()
    );
    let _ = writeln!(
        out,
        "  {} environment(s), {} credential(s), {} job(s), {} variable(s)",
        config.environments.len(),
        config.credentials.len(),
        config.jobs.len(),
        config.environment_variables.len()
    );
    let _ = writeln!(out, "  Secret values: {}", result.secret_handling);
    let _ = writeln!(
        out,
        "  {} object(s) excluded, see {}",
        result.exclusions.len(),
        written.exclusions_report.display()
    );
    if let Some(lookups) = &written.lookups_manifest {
        let _ = writeln!(
            out,
            "  {} placeholder(s) to resolve, see {}",
            result.placeholders.len(),
            lookups.display()
        );
    }
    out.push_str("\nRun 'dbtc plan' to review what would be created.\n");
    out
}

#[cfg(test)]
#[path = "import_test.rs"]
mod tests;
