//! Migrate command implementation.
//!
//! Reads the export, logs on, gates on the sanity check and runs both phases.

use super::{load_config, progress_bar, read_records};
use crate::cli::MigrateArgs;
use crate::convert::{self, MigrationReport};
use crate::error::Result;
use crate::target::FogBugzClient;
use tracing::info;

/// Execute the migrate command.
///
/// # Errors
///
/// Returns an error if configuration is incomplete, the export is invalid,
/// any value is unmapped, or the target reports a failure.
pub fn execute(args: &MigrateArgs, quiet: bool) -> Result<()> {
    let config = load_config(&args.target)?;
    let settings = config.target_settings()?;
    let records = read_records(&args.file)?;

    let mut client = FogBugzClient::connect(settings)?;
    info!(user = client.user(), "Logged on to FogBugz");

    let progress = progress_bar(quiet || args.json);
    let outcome = convert::migrate(
        &mut client,
        &records,
        &config.mappings,
        &config.migration,
        &progress,
    );
    progress.finish_and_clear();
    let report = outcome?;

    client.logout()?;
    info!(
        records = report.records,
        created = report.created,
        updated = report.updated,
        resolved = report.resolved,
        closed = report.closed,
        "Migration complete"
    );

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if !quiet {
        print_summary(&report);
    }
    Ok(())
}

fn print_summary(report: &MigrationReport) {
    println!("Migrated {} Bugzilla bugs:", report.records);
    println!("  created:        {}", report.created);
    println!("  updated:        {}", report.updated);
    println!("  unchanged:      {}", report.unchanged);
    println!("  notes appended: {}", report.notes_appended);
    println!("  resolved:       {}", report.resolved);
    println!("  reassigned:     {}", report.reassigned);
    println!("  closed:         {}", report.closed);
    println!("  already final:  {}", report.already_final);
    println!("  left open:      {}", report.left_open);
}
