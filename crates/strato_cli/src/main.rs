//! strato CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error
//! - 2: Invalid arguments
//! - 3: Deploy aborted
//! - 4: Template/placeholder error
//! - 5: Secret or crypto error

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;

use commands::{Cli, Commands};

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const INVALID_ARGS: u8 = 2;
    pub const DEPLOY_ABORTED: u8 = 3;
    pub const TEMPLATE_ERROR: u8 = 4;
    pub const SECRET_ERROR: u8 = 5;
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    let log_result = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(
            EnvFilter::from_default_env()
                .add_directive("strato=info".parse().unwrap())
                .add_directive("warn".parse().unwrap()),
        )
        .try_init();

    if log_result.is_err() {
        // Logging already initialized, continue
    }

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Keys(args) => commands::keys::execute(args).await,
        Commands::Secrets(args) => commands::secrets::execute(args).await,
        Commands::Deploy(args) => commands::deploy::execute(args, false).await,
        Commands::Preview(args) => commands::deploy::execute(args, true).await,
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

/// Categorize error to determine exit code
fn categorize_error(e: &anyhow::Error) -> u8 {
    let msg = e.to_string().to_lowercase();

    if msg.contains("aborted") || msg.contains("panicked") || msg.contains("cancelled") {
        ExitCodes::DEPLOY_ABORTED
    } else if msg.contains("placeholder") || msg.contains("template") {
        ExitCodes::TEMPLATE_ERROR
    } else if msg.contains("secret") || msg.contains("decrypt") || msg.contains("encrypt") || msg.contains("key") {
        ExitCodes::SECRET_ERROR
    } else if msg.contains("argument") || msg.contains("option") || msg.contains("not found") {
        ExitCodes::INVALID_ARGS
    } else {
        ExitCodes::GENERAL_ERROR
    }
}
