//! phaseflow CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Completed
//! - 1: General error or failed phase
//! - 2: Invalid arguments or missing prerequisite
//! - 3: Blocked
//! - 4: Early stop
//! - 5: Requires approval

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;

use commands::{Cli, Commands, RunStopped};

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const INVALID_ARGS: u8 = 2;
    pub const BLOCKED: u8 = 3;
    pub const EARLY_STOP: u8 = 4;
    pub const REQUIRES_APPROVAL: u8 = 5;
}

fn init_logging(cli: &Cli) {
    let default_level = if cli.verbose {
        "phaseflow=debug"
    } else if cli.quiet {
        "phaseflow=warn"
    } else {
        "phaseflow=info"
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},warn", default_level)));

    let registry = tracing_subscriber::registry().with(filter);
    // Already initialized is fine
    let _ = if cli.log_json {
        registry
            .with(fmt::layer().json().with_target(false).with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()
    };
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli);

    let result = match cli.command {
        Commands::Run(args) => commands::run::execute(args).await,
        Commands::Phases(args) => commands::phases::execute(args).await,
    };

    match result {
        Ok(()) => ExitCode::from(ExitCodes::SUCCESS),
        Err(e) => {
            let exit_code = categorize_error(&e);
            eprintln!("Error: {:#}", e);
            ExitCode::from(exit_code)
        }
    }
}

/// Map an error to its exit code
fn categorize_error(e: &anyhow::Error) -> u8 {
    if let Some(stopped) = e.downcast_ref::<RunStopped>() {
        return stopped.exit_code();
    }
    if let Some(phaseflow_orchestrator::OrchestratorError::MissingPrerequisite { .. }) =
        e.downcast_ref::<phaseflow_orchestrator::OrchestratorError>()
    {
        return ExitCodes::INVALID_ARGS;
    }

    let msg = e.to_string().to_lowercase();
    if msg.contains("argument") || msg.contains("not a valid phase") {
        ExitCodes::INVALID_ARGS
    } else {
        ExitCodes::GENERAL_ERROR
    }
}
