//! CLI argument definitions using clap derive API

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// dbtc - Plan and apply dbt Cloud resources from a YAML configuration
#[derive(Parser, Debug)]
#[command(name = "dbtc")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all commands
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to the YAML configuration file
    #[arg(
        short,
        long,
        global = true,
        env = "DBTC_CONFIG",
        default_value = "dbt-config.yml"
    )]
    pub config: PathBuf,

    /// Path to the state file
    #[arg(
        short,
        long,
        global = true,
        env = "DBTC_STATE",
        default_value = ".dbtc/state.json"
    )]
    pub state: PathBuf,

    /// dbt Cloud account ID (replaces project.dbt_account_id)
    #[arg(long, global = true, env = "DBT_ACCOUNT_ID")]
    pub account_id: Option<String>,

    /// dbt Cloud host URL (replaces project.dbt_host_url)
    #[arg(long, global = true, env = "DBT_HOST_URL")]
    pub host_url: Option<String>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate the configuration file and report every problem
    Validate(ValidateArgs),

    /// Show the operations needed to reconcile state with the configuration
    Plan(PlanArgs),

    /// Execute the plan and record the result in state
    Apply(ApplyArgs),

    /// Delete every resource recorded in state
    Destroy(DestroyArgs),

    /// Print remote IDs of applied resources
    Output(OutputArgs),

    /// List resources in dependency order
    Ls(LsArgs),

    /// Show the outcome of the last apply or destroy run
    Status(StatusArgs),

    /// Write a configuration from an exported account snapshot
    Import(ImportArgs),
}

/// Text or JSON output
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// JSON output
    Json,
}

/// Arguments for the validate command
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,
}

/// Arguments for the plan command
#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,

    /// Exit with code 2 when the plan is not empty
    #[arg(long)]
    pub detailed_exitcode: bool,
}

/// Arguments for the apply command
#[derive(Args, Debug)]
pub struct ApplyArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,
}

/// Arguments for the destroy command
#[derive(Args, Debug)]
pub struct DestroyArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,
}

/// Arguments for the output command
#[derive(Args, Debug)]
pub struct OutputArgs {
    /// Print only this output (for example `project_id`)
    pub name: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,
}

/// Arguments for the status command
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,
}

/// Arguments for the import command
#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Account snapshot (JSON) to import from
    #[arg(long, value_name = "PATH")]
    pub snapshot: PathBuf,

    /// Import options file (YAML); flags take precedence
    #[arg(long, value_name = "PATH")]
    pub mapping: Option<PathBuf>,

    /// Project to import, by key or ID
    #[arg(long)]
    pub project: Option<String>,

    /// How to write `DBT_ENV_SECRET*` values
    #[arg(long, value_enum)]
    pub secrets: Option<SecretMode>,

    /// Also import objects marked inactive
    #[arg(long)]
    pub include_inactive: bool,

    /// Leave an object out (repeatable), e.g. `job:nightly`
    #[arg(long = "exclude", value_name = "KIND:KEY")]
    pub exclude: Vec<String>,

    /// Where to write the exclusions report and lookups manifest
    /// [default: directory of the configuration file]
    #[arg(long, value_name = "DIR")]
    pub report_dir: Option<PathBuf>,

    /// Overwrite an existing configuration file
    #[arg(long)]
    pub force: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,
}

/// Secret handling modes for import
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretMode {
    /// Leave secret variables out
    Omit,
    /// Write REDACTED for every secret value
    Redact,
    /// Write ${var.<name>} for every secret value
    Placeholder,
}

/// Arguments for the ls command
#[derive(Args, Debug)]
pub struct LsArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub output: LsOutput,

    /// Only list resources of this kind (for example `job`)
    #[arg(short, long)]
    pub kind: Option<String>,
}

/// List output formats
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LsOutput {
    /// Table format
    Table,
    /// JSON output
    Json,
}

#[cfg(test)]
#[path = "cli_test.rs"]
mod tests;
