//! Error types for `bz2fb`.
//!
//! Every failure in the migration engine is fatal to the run. Unmapped
//! vocabulary values are the one exception: the sanity checker collects
//! them into a single [`MigrateError::UnmappedValues`] before any mutation.

use crate::model::MissingValue;
use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, MigrateError>;

/// All errors raised by the migration engine and its collaborators.
#[derive(Debug, Error)]
pub enum MigrateError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("Malformed XML in {context}: {source}")]
    Xml {
        context: String,
        #[source]
        source: roxmltree::Error,
    },

    /// Transport-level failure after retries were exhausted, or an HTTP status error.
    #[error("HTTP request for {operation} failed: {message}")]
    Http { operation: String, message: String },

    /// The server answered with an `<error>` envelope.
    #[error("Error {code} during {operation}: {message}")]
    Remote {
        operation: String,
        code: i64,
        message: String,
    },

    #[error("Unexpected response to {operation}: {detail}")]
    UnexpectedResponse { operation: String, detail: String },

    #[error(
        "The FogBugz API reports a minimum version of {min_version}, but this client implements version {supported}"
    )]
    UnsupportedApiVersion { min_version: u32, supported: u32 },

    #[error("Not logged in to FogBugz")]
    NotLoggedIn,

    #[error("Marker collision: Bugzilla bug {source_id} matches FogBugz cases {case_ids:?}")]
    MarkerCollision { source_id: u64, case_ids: Vec<u64> },

    #[error("No FogBugz case found for Bugzilla bug {source_id}")]
    CaseNotFound { source_id: u64 },

    #[error("Bugzilla bug {source_id} is resolved as a duplicate but names no original bug")]
    MissingDuplicateOf { source_id: u64 },

    #[error(
        "Bugzilla bug {source_id} is a duplicate of bug {duplicate_of}, which has no FogBugz case"
    )]
    DuplicateTargetMissing { source_id: u64, duplicate_of: u64 },

    #[error("Bugzilla bug {source_id} has not been ensured before finalizing")]
    NotEnsured { source_id: u64 },

    #[error("Bugzilla bug {source_id} references an unmapped value: {missing}")]
    Unmapped {
        source_id: u64,
        missing: MissingValue,
    },

    #[error("{} unmapped value(s) in the Bugzilla data:\n  {}", .0.len(), .0.join("\n  "))]
    UnmappedValues(Vec<String>),
}

impl MigrateError {
    /// Build a validation error for a named field.
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn unexpected(operation: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::UnexpectedResponse {
            operation: operation.into(),
            detail: detail.into(),
        }
    }

    pub fn xml(context: impl Into<String>, source: roxmltree::Error) -> Self {
        Self::Xml {
            context: context.into(),
            source,
        }
    }

    /// Process exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::UnmappedValues(_) => 2,
            _ => 1,
        }
    }
}
