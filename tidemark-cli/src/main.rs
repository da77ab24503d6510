//! CLI entry point for the tidemark migration tool.
//! Subcommands are generated from the core command table; errors map to
//! differentiated exit codes.

mod output;

use std::process;

use clap::{Arg, ArgMatches, Command, CommandFactory, FromArgMatches, Parser};
use colored::Colorize;

use tidemark_core::commands::registry::{self, CommandSpec, Invocation, COMMANDS};
use tidemark_core::config::DatabaseOptions;
use tidemark_core::error::TidemarkError;
use tidemark_core::Tidemark;

use output::TerminalConsole;

/// Global flags shared by every subcommand.
#[derive(Parser)]
#[command(
    name = "tidemark",
    about = "Knex-style PostgreSQL migrations with named connections",
    version = concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("GIT_HASH"), " ", env!("BUILD_TIME"), ")"
    ),
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
struct Cli {
    /// Config file path
    #[arg(short, long, value_name = "PATH", global = true)]
    config: Option<String>,

    /// Hide log output below errors (command results still print)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// The full command line: global flags plus one subcommand per table row.
fn build_cli() -> Command {
    COMMANDS
        .iter()
        .fold(Cli::command(), |cli, spec| cli.subcommand(subcommand(spec)))
}

fn subcommand(spec: &'static CommandSpec) -> Command {
    let mut command = Command::new(spec.name).about(spec.description);
    for argument in spec.arguments {
        command = command.arg(
            Arg::new(argument.name)
                .help(argument.help)
                .required(argument.required),
        );
    }
    for option in spec.options {
        command = command.arg(
            Arg::new(option.name)
                .long(option.name)
                .value_name(option.value_name)
                .help(option.help),
        );
    }
    command
}

/// Turn the matched subcommand back into an [`Invocation`].
fn invocation(matches: &ArgMatches) -> Result<Invocation, TidemarkError> {
    let (name, sub) = matches
        .subcommand()
        .ok_or_else(|| TidemarkError::UnknownCommand(String::new()))?;
    let spec =
        registry::find(name).ok_or_else(|| TidemarkError::UnknownCommand(name.to_string()))?;

    let mut invocation = Invocation::new(spec.kind);
    for argument in spec.arguments {
        if let Some(value) = sub.get_one::<String>(argument.name) {
            invocation = invocation.with_argument(argument.name, value.as_str());
        }
    }
    for option in spec.options {
        if let Some(value) = sub.get_one::<String>(option.name) {
            invocation = invocation.with_option(option.name, value.as_str());
        }
    }
    Ok(invocation)
}

#[tokio::main]
async fn main() {
    let matches = build_cli().get_matches();
    let cli = Cli::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());

    env_logger::Builder::new()
        .parse_env(env_logger::Env::default().default_filter_or(log_filter(&cli)))
        .format_target(false)
        .format_timestamp(None)
        .init();

    if let Err(e) = run(&cli, &matches).await {
        print_error(&e);
        process::exit(exit_code(&e));
    }
}

/// Map error types to differentiated exit codes.
fn exit_code(error: &TidemarkError) -> i32 {
    match error {
        TidemarkError::ConfigError(_) => 2,
        TidemarkError::ConnectionNotFound { .. } => 2,
        TidemarkError::DatabaseError(_) => 4,
        TidemarkError::MigrationFailed { .. } => 5,
        TidemarkError::MigrationMissing { .. } => 5,
        TidemarkError::LockError(_) => 6,
        _ => 1,
    }
}

/// Load configuration and dispatch the chosen subcommand.
async fn run(cli: &Cli, matches: &ArgMatches) -> Result<(), TidemarkError> {
    let invocation = invocation(matches)?;
    let options = DatabaseOptions::load(cli.config.as_deref())?;
    log::debug!(
        "Loaded configuration; default={}, connections={}",
        options.default,
        options.connections.len()
    );

    let tidemark = Tidemark::new(options);
    let mut console = TerminalConsole::new();
    tidemark.execute(&invocation, &mut console).await
}

/// Print a formatted error message with actionable hints to stderr.
fn print_error(error: &TidemarkError) {
    eprintln!("{} {}", "ERROR:".red().bold(), error);
    if let Some(hint) = hint(error) {
        eprintln!("{}", hint.dimmed());
    }
}

/// Actionable guidance for an error, if there is any.
fn hint(error: &TidemarkError) -> Option<String> {
    match error {
        TidemarkError::ConfigError(_) => Some(
            "Hint: Check your tidemark.toml or set TIDEMARK_DATABASE_URL environment variable."
                .to_string(),
        ),
        TidemarkError::ConnectionNotFound { name, .. } => Some(format!(
            "Hint: Add a [connections.{name}] table to tidemark.toml or pass an existing name to --connection."
        )),
        TidemarkError::DatabaseError(_) => Some(
            "Hint: Verify database is running and connection details are correct.".to_string(),
        ),
        TidemarkError::MigrationMissing { .. } => Some(
            "Hint: Restore the migration file; a completed migration must keep its file."
                .to_string(),
        ),
        _ => None,
    }
}

/// Log level for the global flags; `--quiet` only silences logging.
fn log_filter(cli: &Cli) -> &'static str {
    if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidemark_core::commands::registry::{CommandKind, CONNECTION_OPTION};

    fn parse(args: &[&str]) -> Invocation {
        let matches = build_cli().try_get_matches_from(args.iter().copied()).unwrap();
        invocation(&matches).unwrap()
    }

    #[test]
    fn test_cli_is_well_formed() {
        build_cli().debug_assert();
    }

    #[test]
    fn test_every_table_command_is_a_subcommand() {
        let cli = build_cli();
        for spec in COMMANDS {
            assert!(cli.find_subcommand(spec.name).is_some(), "{}", spec.name);
        }
    }

    #[test]
    fn test_connection_option() {
        let inv = parse(&["tidemark", "migrate", "--connection=reporting"]);
        assert_eq!(inv.kind, CommandKind::Migrate);
        assert_eq!(inv.option(CONNECTION_OPTION), Some("reporting"));

        let inv = parse(&["tidemark", "migrate:status"]);
        assert_eq!(inv.option(CONNECTION_OPTION), None);
    }

    #[test]
    fn test_make_migration_name() {
        let inv = parse(&["tidemark", "-v", "make:migration", "create_users"]);
        assert_eq!(inv.kind, CommandKind::MakeMigration);
        assert_eq!(inv.argument("name"), Some("create_users"));

        assert!(build_cli()
            .try_get_matches_from(["tidemark", "make:migration"])
            .is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let matches = build_cli()
            .try_get_matches_from(["tidemark", "migrate:reset", "-c", "other.toml", "-q"])
            .unwrap();
        let cli = Cli::from_arg_matches(&matches).unwrap();
        assert_eq!(cli.config.as_deref(), Some("other.toml"));
        assert!(cli.quiet);
    }

    #[test]
    fn test_quiet_only_changes_log_level() {
        let quiet = Cli::from_arg_matches(
            &build_cli()
                .try_get_matches_from(["tidemark", "migrate", "-q"])
                .unwrap(),
        )
        .unwrap();
        assert_eq!(log_filter(&quiet), "error");

        let verbose = Cli::from_arg_matches(
            &build_cli()
                .try_get_matches_from(["tidemark", "-v", "migrate"])
                .unwrap(),
        )
        .unwrap();
        assert_eq!(log_filter(&verbose), "debug");
    }

    #[test]
    fn test_connection_not_found_hint_names_only_real_fixes() {
        let error = TidemarkError::ConnectionNotFound {
            name: "analytics-eu".to_string(),
            available: "default".to_string(),
        };
        let hint = hint(&error).unwrap();
        assert!(hint.contains("[connections.analytics-eu]"));
        assert!(hint.contains("--connection"));
        assert!(!hint.contains("TIDEMARK_CONNECTION_"));
    }

    #[test]
    fn test_hint_absent_for_argument_errors() {
        assert!(hint(&TidemarkError::MissingArgument("name".to_string())).is_none());
    }
}
