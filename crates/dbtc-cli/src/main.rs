//! dbtc CLI - plan and apply dbt Cloud resources from YAML

use clap::Parser;

mod cli;
mod commands;

use cli::Cli;
use commands::common::ExitCode;
use commands::{apply, destroy, import, ls, output, plan, status, validate};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level = if cli.global.verbose {
        log::LevelFilter::Info
    } else {
        log::LevelFilter::Warn
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    let result = match &cli.command {
        cli::Commands::Validate(args) => validate::execute(args, &cli.global).await,
        cli::Commands::Plan(args) => plan::execute(args, &cli.global).await,
        cli::Commands::Apply(args) => apply::execute(args, &cli.global).await,
        cli::Commands::Destroy(args) => destroy::execute(args, &cli.global).await,
        cli::Commands::Output(args) => output::execute(args, &cli.global).await,
        cli::Commands::Ls(args) => ls::execute(args, &cli.global).await,
        cli::Commands::Status(args) => status::execute(args, &cli.global).await,
        cli::Commands::Import(args) => import::execute(args, &cli.global).await,
    };

    if let Err(err) = result {
        if let Some(ExitCode(code)) = err.downcast_ref::<ExitCode>() {
            std::process::exit(*code);
        }
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}
