//! Configuration management for `bz2fb`.
//!
//! Configuration sources and precedence (highest wins):
//! 1. CLI flags
//! 2. Environment variables (`BZ2FB_URL`, `BZ2FB_USER`, `BZ2FB_PASSWORD`)
//! 3. The YAML config file (`-c`, or `bz2fb.yaml` in the working directory)
//! 4. Defaults
//!
//! Flags and environment variables are both resolved by clap, so they reach
//! this module as a single [`CliOverrides`] layer.

pub mod template;

use crate::convert::MigrationOptions;
use crate::error::{MigrateError, Result};
use crate::target::{RetryPolicy, TargetSettings};
use crate::target::retry::DEFAULT_MAX_ATTEMPTS;
use crate::translate::TranslationMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Config file picked up from the working directory when `-c` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "bz2fb.yaml";
/// HTTP timeout applied to every request unless configured.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Connection settings for the FogBugz installation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetSection {
    /// URL of the installation's `api.xml` descriptor.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_attempts: Option<u32>,
}

/// The whole config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub target: TargetSection,
    pub migration: MigrationOptions,
    pub mappings: TranslationMap,
}

/// Values given on the command line or through the environment.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub url: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
}

impl Config {
    /// Parse a config document.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is malformed or has unknown sections.
    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(contents)?)
    }

    /// Read and parse a config file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            MigrateError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_yaml_str(&contents)
    }

    /// Load the explicit config file, or the default one if it exists.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicit path is missing, or any file present
    /// cannot be parsed.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        Self::load_with_default(explicit, Path::new(DEFAULT_CONFIG_FILE))
    }

    fn load_with_default(explicit: Option<&Path>, default_path: &Path) -> Result<Self> {
        let path: Option<PathBuf> = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None if default_path.is_file() => Some(default_path.to_path_buf()),
            None => None,
        };

        match path {
            Some(path) => {
                debug!(path = %path.display(), "Loading config file");
                Self::from_file(&path)
            }
            None => {
                debug!("No config file, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Merge CLI and environment values on top of the file's.
    pub fn apply_overrides(&mut self, cli: &CliOverrides) {
        if let Some(url) = &cli.url {
            self.target.url = Some(url.clone());
        }
        if let Some(user) = &cli.user {
            self.target.user = Some(user.clone());
        }
        if let Some(password) = &cli.password {
            self.target.password = Some(password.clone());
        }
    }

    /// Connection settings for the client.
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming the first of url, user or
    /// password that is missing.
    pub fn target_settings(&self) -> Result<TargetSettings> {
        let required = |value: &Option<String>, name: &str, flag: &str| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .ok_or_else(|| {
                    MigrateError::Config(format!(
                        "missing FogBugz {name}; pass {flag} or set target.{name} in the config file"
                    ))
                })
        };

        Ok(TargetSettings {
            url: required(&self.target.url, "url", "-a/--fogbugz-address")?,
            user: required(&self.target.user, "user", "-u/--fogbugz-user")?,
            password: self
                .target
                .password
                .clone()
                .filter(|p| !p.is_empty())
                .ok_or_else(|| {
                    MigrateError::Config(
                        "missing FogBugz password; pass -p/--fogbugz-password or set target.password in the config file"
                            .to_string(),
                    )
                })?,
            timeout: Duration::from_secs(self.target.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
            retry: RetryPolicy::with_max_attempts(
                self.target.retry_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS),
            ),
        })
    }
}
