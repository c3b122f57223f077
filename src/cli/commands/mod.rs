//! Subcommand implementations.

pub mod check;
pub mod gen_config;
pub mod migrate;

use crate::cli::TargetArgs;
use crate::config::Config;
use crate::error::Result;
use crate::model::SourceRecord;
use crate::source;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::IsTerminal;
use std::path::Path;

/// Load the config file and apply flag/environment overrides.
///
/// # Errors
///
/// Returns an error if the config file cannot be loaded.
pub fn load_config(target: &TargetArgs) -> Result<Config> {
    let mut config = Config::load(target.config.as_deref())?;
    config.apply_overrides(&target.overrides());
    Ok(config)
}

/// Read every bug in the export.
///
/// # Errors
///
/// Returns an error if the export cannot be read or parsed.
pub fn read_records(path: &Path) -> Result<Vec<SourceRecord>> {
    source::read_file(path)
}

/// A progress bar on stderr, hidden when quiet or not on a terminal.
#[must_use]
pub fn progress_bar(quiet: bool) -> ProgressBar {
    if quiet || !std::io::stderr().is_terminal() {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(0);
    if let Ok(style) =
        ProgressStyle::with_template("{msg:18} [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
    {
        bar.set_style(style.progress_chars("=> "));
    }
    bar
}
