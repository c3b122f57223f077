use anyhow::Context;
use bz2fb::cli::commands;
use bz2fb::cli::{Cli, Commands};
use bz2fb::logging::init_logging;
use bz2fb::MigrateError;
use clap::Parser;
use std::process::ExitCode;
use tracing::debug;

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(err) = init_logging(cli.verbose, cli.quiet, cli.log_file.as_deref())
        .context("failed to initialize logging")
    {
        eprintln!("Error: {err:#}");
        return ExitCode::FAILURE;
    }

    let result = match &cli.command {
        Commands::Migrate(args) => commands::migrate::execute(args, cli.quiet),
        Commands::Check(args) => commands::check::execute(args, cli.quiet),
        Commands::GenConfig(args) => commands::gen_config::execute(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => report(&err),
    }
}

fn report(err: &MigrateError) -> ExitCode {
    debug!(error = ?err, "Command failed");
    eprintln!("Error: {err}");
    u8::try_from(err.exit_code()).map_or(ExitCode::FAILURE, ExitCode::from)
}
