//! tesla-recorder - scheduled Tesla charge-state recorder
//!
//! Each invocation sweeps every configured account:
//! - Refreshes OAuth tokens when the Fleet API rejects them
//! - Checks vehicle state before asking for telemetry, so sleeping cars stay asleep
//! - Writes charge state to InfluxDB as time-series points

mod cli;
mod core;
mod fleet;
mod logging;
mod settings;
mod sink;
mod sweep;

use clap::Parser;
use cli::{exit_codes, Cli, CommandContext, Commands};

fn main() {
    let exit_code = run();
    std::process::exit(exit_code);
}

fn run() -> i32 {
    let cli = Cli::parse();

    let ctx = match CommandContext::resolve(&cli) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("Error: {}", e);
            return exit_codes::CONFIG_ERROR;
        }
    };

    // Initialize logging
    let log_file = cli.log_destination(&ctx.settings);
    if let Err(e) = logging::init(cli.verbose, cli.json_output, log_file.as_deref()) {
        eprintln!("Failed to initialize logging: {}", e);
        return exit_codes::UNEXPECTED_FAILURE;
    }

    // Accounts and vehicles are processed strictly one at a time
    let rt = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create runtime: {}", e);
            return exit_codes::UNEXPECTED_FAILURE;
        }
    };

    tracing::info!("starting");

    let command = cli.command;
    let result = rt.block_on(async move {
        match command {
            Commands::RecordStatus(args) => cli::record_status::run(&ctx, args).await,
            Commands::Register => cli::register::run(&ctx).await,
            Commands::Authorize(args) => cli::authorize::run(&ctx, args).await,
            Commands::Config(args) => cli::config::run(&ctx, args).await,
        }
    });

    match result {
        Ok(()) => exit_codes::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            cli::categorize_error(&e)
        }
    }
}
