//! # ahub CLI entry point
//!
//! Parses command-line arguments, indexes the working tree and dispatches
//! to subcommand handlers.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use ahub_cli::equivalent::{run_equivalent, EquivalentArgs};
use ahub_cli::identity::{run_identity, IdentityArgs};
use ahub_cli::reference::{run_refs, RefsArgs};
use ahub_cli::validate::{run_validate, ValidateArgs};
use ahub_cli::CliContext;

/// Asset hub CLI.
///
/// Validates asset documents, detects case collisions, manages resource
/// identities and translates refs to working-tree paths.
#[derive(Parser, Debug)]
#[command(name = "ahub", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Working-tree root (overrides the configuration).
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Path to a YAML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit JSON output and JSON log lines.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate assets and their dependencies.
    Validate(ValidateArgs),

    /// List refs whose names differ only by letter case.
    Equivalent(EquivalentArgs),

    /// Compare or refresh resource identities.
    Identity(IdentityArgs),

    /// Translate between refs and working-tree paths.
    Refs(RefsArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if cli.json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    let ctx = match CliContext::load(cli.root.as_deref(), cli.config.as_deref(), cli.json).await {
        Ok(ctx) => ctx,
        Err(e) => {
            tracing::error!("{e:#}");
            return ExitCode::from(2);
        }
    };
    tracing::debug!(root = %ctx.root().display(), "resolved working tree");

    let result = match &cli.command {
        Commands::Validate(args) => run_validate(args, &ctx).await,
        Commands::Equivalent(args) => run_equivalent(args, &ctx).await,
        Commands::Identity(args) => run_identity(args, &ctx).await,
        Commands::Refs(args) => run_refs(args, &ctx),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(2)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ahub_cli::identity::IdentityCommand;
    use ahub_cli::reference::RefsCommand;

    #[test]
    fn cli_parse_validate_defaults() {
        let cli = Cli::try_parse_from(["ahub", "validate"]).unwrap();
        if let Commands::Validate(args) = cli.command {
            assert!(!args.bare);
            assert_eq!(args.namespace, "/assets/");
        } else {
            panic!("expected validate");
        }
    }

    #[test]
    fn cli_parse_validate_bare_namespace() {
        let cli = Cli::try_parse_from(["ahub", "validate", "--bare", "/assets/props/"]).unwrap();
        if let Commands::Validate(args) = cli.command {
            assert!(args.bare);
            assert_eq!(args.namespace, "/assets/props/");
        } else {
            panic!("expected validate");
        }
    }

    #[test]
    fn cli_parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "ahub", "equivalent", "--root", "/tree", "--json", "-vv",
        ])
        .unwrap();
        assert_eq!(cli.root, Some(PathBuf::from("/tree")));
        assert!(cli.json);
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn cli_parse_identity_compare() {
        let cli =
            Cli::try_parse_from(["ahub", "identity", "compare", "/resources/a.png"]).unwrap();
        match cli.command {
            Commands::Identity(args) => assert!(matches!(
                args.command,
                IdentityCommand::Compare { ref reference } if reference == "/resources/a.png"
            )),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn cli_parse_refs_decode() {
        let cli = Cli::try_parse_from(["ahub", "refs", "decode", "assets/$props/a.mesh"]).unwrap();
        match cli.command {
            Commands::Refs(args) => assert!(matches!(
                args.command,
                RefsCommand::Decode { ref path } if path == "assets/$props/a.mesh"
            )),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn cli_rejects_missing_subcommand() {
        assert!(Cli::try_parse_from(["ahub"]).is_err());
    }
}
