//! Gen-config command implementation.

use super::read_records;
use crate::cli::GenConfigArgs;
use crate::config::template::Vocabulary;
use crate::error::{MigrateError, Result};
use std::fs;
use tracing::info;

/// Execute the gen-config command.
///
/// # Errors
///
/// Returns an error if the export cannot be read, or the output file exists
/// without `--force` or cannot be written.
pub fn execute(args: &GenConfigArgs) -> Result<()> {
    let records = read_records(&args.file)?;
    let rendered = Vocabulary::scan(&records).render()?;

    match &args.output {
        Some(path) => {
            if path.exists() && !args.force {
                return Err(MigrateError::Config(format!(
                    "{} already exists; pass --force to overwrite",
                    path.display()
                )));
            }
            fs::write(path, rendered)?;
            info!(path = %path.display(), records = records.len(), "Wrote config template");
        }
        None => print!("{rendered}"),
    }
    Ok(())
}
