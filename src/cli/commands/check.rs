//! Check command implementation.
//!
//! Runs only the sanity check: nothing is written to FogBugz.

use super::{load_config, read_records};
use crate::cli::CheckArgs;
use crate::error::{MigrateError, Result};
use crate::sanity;
use crate::target::{CaseStore, FogBugzClient};
use serde::Serialize;
use tracing::info;

#[derive(Debug, Serialize)]
struct CheckOutput<'a> {
    records: usize,
    missing: &'a [String],
}

/// Execute the check command.
///
/// # Errors
///
/// Returns [`MigrateError::UnmappedValues`] if anything is missing, or any
/// configuration, export or connection error.
pub fn execute(args: &CheckArgs, quiet: bool) -> Result<()> {
    let config = load_config(&args.target)?;
    let settings = config.target_settings()?;
    let records = read_records(&args.file)?;

    let mut client = FogBugzClient::connect(settings)?;
    info!(summary = %client.references().summary(), "Loaded FogBugz reference data");

    let missing: Vec<String> = sanity::check(&records, &config.mappings, client.references())
        .into_iter()
        .collect();
    client.logout()?;

    if args.json {
        let output = CheckOutput {
            records: records.len(),
            missing: &missing,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else if missing.is_empty() && !quiet {
        println!("All values in {} bugs are mapped", records.len());
    }

    if missing.is_empty() {
        Ok(())
    } else {
        Err(MigrateError::UnmappedValues(missing))
    }
}
