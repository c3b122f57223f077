//! Command-line interface definitions.

pub mod commands;

use crate::config::CliOverrides;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Migrate a Bugzilla XML export into FogBugz.
#[derive(Parser, Debug)]
#[command(name = "bz2fb", author, version, about, long_about = None)]
pub struct Cli {
    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Also write JSON-formatted logs to this file
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create, update and finalize a FogBugz case for every Bugzilla bug
    Migrate(MigrateArgs),

    /// Report every Bugzilla value that has no FogBugz counterpart
    Check(CheckArgs),

    /// Write a starter config file mapping every value in an export to itself
    GenConfig(GenConfigArgs),
}

/// Connection and config options shared by commands that talk to FogBugz.
#[derive(Args, Debug, Clone, Default)]
pub struct TargetArgs {
    /// The URL of the api.xml file for the FogBugz installation
    #[arg(short = 'a', long = "fogbugz-address", env = "BZ2FB_URL", value_name = "URL")]
    pub url: Option<String>,

    /// The email address of a FogBugz user account
    #[arg(short = 'u', long = "fogbugz-user", env = "BZ2FB_USER", value_name = "EMAIL")]
    pub user: Option<String>,

    /// The password of the FogBugz user account
    #[arg(
        short = 'p',
        long = "fogbugz-password",
        env = "BZ2FB_PASSWORD",
        hide_env_values = true,
        value_name = "PASSWORD"
    )]
    pub password: Option<String>,

    /// Config file with mappings and engine options (default: ./bz2fb.yaml if present)
    #[arg(short = 'c', long = "config", value_name = "PATH")]
    pub config: Option<PathBuf>,
}

impl TargetArgs {
    #[must_use]
    pub fn overrides(&self) -> CliOverrides {
        CliOverrides {
            url: self.url.clone(),
            user: self.user.clone(),
            password: self.password.clone(),
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct MigrateArgs {
    /// Bugzilla XML export to migrate
    #[arg(value_name = "BUGZILLA_FILE")]
    pub file: PathBuf,

    #[command(flatten)]
    pub target: TargetArgs,

    /// Print the run report as JSON on stdout
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct CheckArgs {
    /// Bugzilla XML export to check
    #[arg(value_name = "BUGZILLA_FILE")]
    pub file: PathBuf,

    #[command(flatten)]
    pub target: TargetArgs,

    /// Print the missing values as JSON on stdout
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct GenConfigArgs {
    /// Bugzilla XML export to scan
    #[arg(value_name = "BUGZILLA_FILE")]
    pub file: PathBuf,

    /// Where to write the config (default: stdout)
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Overwrite the output file if it exists
    #[arg(long)]
    pub force: bool,
}
