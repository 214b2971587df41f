//! `ddb` — the interactive front end over a distributed fleet of GDB/MI
//! sessions. A thin binary: parse arguments, wire up logging, load the
//! config, build an [`Orchestrator`], run it until the REPL hits EOF or a
//! signal arrives.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use ddb_config::Config;
use ddb_orchestrator::Orchestrator;
use ddb_telemetry::{LogConfig, LogFormat};

/// Exit code used on `Ctrl+C`/`SIGTERM`, matching a shell's own convention
/// for a process killed by `SIGINT` (128 + 2).
const EXIT_INTERRUPTED: u8 = 130;

/// `ddb [--debug] [-v|--version] <config.yaml>`.
#[derive(Parser)]
#[command(name = "ddb", version, about = "Distributed GDB/MI debugger aggregator", disable_version_flag = true)]
struct Cli {
    /// Enables debug-level logging.
    #[arg(long)]
    debug: bool,

    /// Prints version information and exits.
    #[arg(short = 'v', long = "version", action = clap::ArgAction::Version)]
    #[allow(dead_code)]
    version: bool,

    /// Path to the aggregator's YAML config file.
    config: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_config = if cli.debug { LogConfig::debug() } else { LogConfig::default() }.with_format(LogFormat::Compact);
    if let Err(err) = ddb_telemetry::setup_logging(&log_config) {
        eprintln!("warning: failed to initialize logging: {err}");
    }

    match run(cli).await {
        Ok(Outcome::Normal) => ExitCode::SUCCESS,
        Ok(Outcome::Interrupted) => ExitCode::from(EXIT_INTERRUPTED),
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

/// How the run loop ended, so `main` can pick the right process exit code.
enum Outcome {
    /// The REPL hit EOF, or the fleet shut itself down (no sessions left).
    Normal,
    /// `Ctrl+C` or `SIGTERM` arrived.
    Interrupted,
}

async fn run(cli: Cli) -> anyhow::Result<Outcome> {
    let config = Config::load(&cli.config)
        .with_context(|| format!("failed to load config from {}", cli.config.display()))?;

    let orchestrator = Orchestrator::new(config);
    orchestrator.start().await.context("failed to start the configured sessions")?;

    let outcome = tokio::select! {
        () = orchestrator.run_repl("(ddb) ") => Outcome::Normal,
        () = orchestrator.wait_for_shutdown_signal() => Outcome::Interrupted,
    };
    orchestrator.shutdown().await;
    Ok(outcome)
}
