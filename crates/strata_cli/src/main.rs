//! Strata CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error
//! - 2: Configuration error
//! - 3: Missing credential
//! - 4: Resource not found

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{filter::LevelFilter, fmt, prelude::*, EnvFilter};

use strata_iac::{ErrorCategory, IacError, ResourceFamily};
use strata_spec::SpecError;

mod commands;

use commands::{Cli, Commands};

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const CONFIG_ERROR: u8 = 2;
    pub const MISSING_CREDENTIAL: u8 = 3;
    pub const RESOURCE_NOT_FOUND: u8 = 4;
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.global.verbose {
        "debug"
    } else if cli.global.quiet {
        "warn"
    } else {
        "info"
    };

    // Initialize logging
    let mut filter = EnvFilter::from_default_env().add_directive(LevelFilter::WARN.into());
    if let Ok(directive) = format!("strata={}", level).parse() {
        filter = filter.add_directive(directive);
    }
    let log_result = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .try_init();

    if log_result.is_err() {
        // Logging already initialized, continue
    }

    let result = match cli.command {
        Commands::Vpc => commands::provision::execute(&cli.global, &[ResourceFamily::Vpc]),
        Commands::Ec2 => commands::provision::execute(&cli.global, &[ResourceFamily::Compute]),
        Commands::Db => commands::provision::execute(&cli.global, &[ResourceFamily::Database]),
        Commands::All => commands::provision::execute(&cli.global, &ResourceFamily::all()),
        Commands::Validate(args) => commands::validate::execute(&cli.global, args),
    };

    match result {
        Ok(()) => ExitCode::from(ExitCodes::SUCCESS),
        Err(e) => {
            let exit_code = categorize_error(&e);
            eprintln!("❌ Error: {:#}", e);
            ExitCode::from(exit_code)
        }
    }
}

/// Map the first typed error in the chain to an exit code.
fn categorize_error(e: &anyhow::Error) -> u8 {
    for cause in e.chain() {
        if let Some(err) = cause.downcast_ref::<IacError>() {
            return match err.category() {
                ErrorCategory::Config => ExitCodes::CONFIG_ERROR,
                ErrorCategory::MissingCredential => ExitCodes::MISSING_CREDENTIAL,
                ErrorCategory::ResourceNotFound => ExitCodes::RESOURCE_NOT_FOUND,
                ErrorCategory::Other => ExitCodes::GENERAL_ERROR,
            };
        }
        if cause.downcast_ref::<SpecError>().is_some() {
            return ExitCodes::CONFIG_ERROR;
        }
    }
    ExitCodes::GENERAL_ERROR
}
