use super::*;
use clap::CommandFactory;

#[test]
fn verify_cli_args() {
    // Validates the entire command tree: short flag conflicts,
    // duplicate args, and other clap definition errors.
    Cli::command().debug_assert();
}

#[test]
fn test_global_flags_after_subcommand() {
    let cli = Cli::try_parse_from([
        "dbtc",
        "plan",
        "--config",
        "infra/dbt.yml",
        "-s",
        "tmp/state.json",
        "--account-id",
        "42",
        "-o",
        "json",
    ])
    .unwrap();

    assert_eq!(cli.global.config, PathBuf::from("infra/dbt.yml"));
    assert_eq!(cli.global.state, PathBuf::from("tmp/state.json"));
    assert_eq!(cli.global.account_id.as_deref(), Some("42"));
    match cli.command {
        Commands::Plan(args) => {
            assert_eq!(args.output, OutputFormat::Json);
            assert!(!args.detailed_exitcode);
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn test_output_takes_optional_name() {
    let cli = Cli::try_parse_from(["dbtc", "output", "project_id"]).unwrap();
    match cli.command {
        Commands::Output(args) => assert_eq!(args.name.as_deref(), Some("project_id")),
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn test_status_accepts_json_output() {
    let cli = Cli::try_parse_from(["dbtc", "status", "-o", "json"]).unwrap();
    match cli.command {
        Commands::Status(args) => assert_eq!(args.output, OutputFormat::Json),
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn test_unknown_output_format_rejected() {
    assert!(Cli::try_parse_from(["dbtc", "ls", "--output", "tree"]).is_err());
}

#[test]
fn test_import_repeats_exclude() {
    let cli = Cli::try_parse_from([
        "dbtc",
        "import",
        "--snapshot",
        "account.json",
        "--secrets",
        "omit",
        "--exclude",
        "job:nightly",
        "--exclude",
        "environment:ci",
    ])
    .unwrap();
    match cli.command {
        Commands::Import(args) => {
            assert_eq!(args.snapshot, PathBuf::from("account.json"));
            assert_eq!(args.secrets, Some(SecretMode::Omit));
            assert_eq!(args.exclude, vec!["job:nightly", "environment:ci"]);
            assert!(!args.force);
        }
        other => panic!("unexpected command: {other:?}"),
    }

    assert!(Cli::try_parse_from(["dbtc", "import"]).is_err());
}
