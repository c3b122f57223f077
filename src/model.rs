//! Data types shared by the source reader, the engine and the target client.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Prefix of the correlation marker stored in the FogBugz `sComputer` field.
pub const MARKER_PREFIX: &str = "BugzillaBugId";

/// Encode a Bugzilla bug id as the marker written into a migrated case.
#[must_use]
pub fn marker_for(source_id: u64) -> String {
    format!("{MARKER_PREFIX}: {source_id}")
}

/// Recover the bug id from a marker value.
///
/// Only an exact `BugzillaBugId: <digits>` value parses; surrounding text or
/// a trailing suffix makes the value unrecognized.
#[must_use]
pub fn parse_marker(value: &str) -> Option<u64> {
    let digits = value
        .trim()
        .strip_prefix(MARKER_PREFIX)?
        .strip_prefix(':')?
        .strip_prefix(' ')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// One Bugzilla bug, as read from the XML export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceRecord {
    pub id: u64,
    pub title: String,
    pub created: DateTime<Utc>,
    pub changed: DateTime<Utc>,
    pub product: String,
    pub component: String,
    pub version: String,
    pub milestone: String,
    pub platform: String,
    pub os: String,
    pub status: String,
    pub resolution: String,
    pub priority: String,
    pub severity: String,
    pub reporter: String,
    pub assignee: String,
    pub duplicate_of: Option<u64>,
    pub cc: Vec<String>,
    pub blocks: Vec<u64>,
    pub depends_on: Vec<u64>,
    pub notes: Vec<Note>,
    pub attachments: Vec<Attachment>,
}

impl SourceRecord {
    /// Minimal record with empty vocabulary fields; used by the reader as a
    /// starting point and by tests as a fixture base.
    #[must_use]
    pub fn new(id: u64, title: impl Into<String>, created: DateTime<Utc>) -> Self {
        Self {
            id,
            title: title.into(),
            created,
            changed: created,
            product: String::new(),
            component: String::new(),
            version: String::new(),
            milestone: String::new(),
            platform: String::new(),
            os: String::new(),
            status: String::new(),
            resolution: String::new(),
            priority: String::new(),
            severity: String::new(),
            reporter: String::new(),
            assignee: String::new(),
            duplicate_of: None,
            cc: Vec::new(),
            blocks: Vec::new(),
            depends_on: Vec::new(),
            notes: Vec::new(),
            attachments: Vec::new(),
        }
    }
}

/// A Bugzilla comment (`long_desc`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Note {
    pub author: String,
    pub timestamp: DateTime<Utc>,
    pub body: String,
}

/// Attachment metadata. Payloads are never migrated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attachment {
    pub id: u64,
    pub filename: String,
    pub description: String,
    pub mime_type: String,
    pub date: Option<DateTime<Utc>>,
    pub obsolete: bool,
    pub patch: bool,
    pub private: bool,
}

/// A FogBugz status as listed by `listStatuses`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetStatus {
    pub id: u64,
    pub name: String,
    pub resolved: bool,
}

/// Field values sent on `new` and `edit`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseFields {
    pub title: String,
    pub project_id: u64,
    pub area_id: u64,
    pub fix_for_id: Option<u64>,
    pub priority_id: u64,
    pub assigned_to_id: u64,
    pub version: String,
    pub marker: String,
    pub opened: DateTime<Utc>,
}

/// One entry of a case's event history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseEvent {
    pub id: u64,
    pub verb: String,
    pub text: String,
}

/// A FogBugz case as returned by a marker search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetCase {
    pub id: u64,
    pub open: bool,
    pub title: String,
    pub project_id: u64,
    pub area_id: u64,
    pub fix_for_id: Option<u64>,
    pub priority_id: u64,
    pub assigned_to_id: u64,
    pub status_id: u64,
    pub version: String,
    pub marker: String,
    pub events: Vec<CaseEvent>,
}

impl TargetCase {
    /// True if any event's text contains `body`.
    #[must_use]
    pub fn has_event_containing(&self, body: &str) -> bool {
        let needle = body.trim();
        self.events.iter().any(|event| event.text.contains(needle))
    }
}

/// A source value with no counterpart in the target vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MissingValue {
    User(String),
    Project(String),
    Area { project: String, area: String },
    FixFor { project: String, fix_for: String },
    Priority(String),
    Status(String),
}

impl fmt::Display for MissingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(user) => write!(f, "User '{user}'"),
            Self::Project(project) => write!(f, "Project '{project}'"),
            Self::Area { project, area } => write!(f, "Project '{project}' area '{area}'"),
            Self::FixFor { project, fix_for } => {
                write!(f, "Project '{project}' Fix-For '{fix_for}'")
            }
            Self::Priority(priority) => write!(f, "Priority '{priority}'"),
            Self::Status(status) => write!(f, "Status '{status}'"),
        }
    }
}
