//! The FogBugz side of the migration.
//!
//! # Submodules
//!
//! - [`fogbugz`] - Authenticated XML API client
//! - [`retry`] - Bounded retry for transient transport failures
//! - [`xml`] - Response envelope checks and payload parsing
//!
//! The engine talks to the target only through [`CaseStore`], so the whole
//! two-phase protocol can run against an in-memory store in tests.

pub mod fogbugz;
pub mod retry;
pub mod xml;

pub use fogbugz::{FogBugzClient, TargetSettings};
pub use retry::RetryPolicy;

use crate::error::Result;
use crate::model::{CaseFields, TargetCase, TargetStatus};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Business-level operations against the target issue tracker.
///
/// Lookups live on [`ReferenceCache`]. Everything here may touch the network
/// and every error is fatal to the run.
pub trait CaseStore {
    /// Reference data loaded at login.
    fn references(&self) -> &ReferenceCache;

    /// Find the case created for a Bugzilla bug. More than one match is an error.
    fn find_by_marker(&self, source_id: u64) -> Result<Option<TargetCase>>;

    /// Create a new open case and return its id.
    fn create_case(&mut self, fields: &CaseFields, opening_comment: &str) -> Result<u64>;

    /// Overwrite every tracked field of an existing case.
    fn update_case(&mut self, case_id: u64, fields: &CaseFields, comment: &str) -> Result<()>;

    fn append_note(&mut self, case_id: u64, note: &str) -> Result<()>;

    fn resolve_as_status(
        &mut self,
        case_id: u64,
        status: &TargetStatus,
        as_of: DateTime<Utc>,
    ) -> Result<()>;

    fn resolve_as_duplicate(
        &mut self,
        case_id: u64,
        status: &TargetStatus,
        as_of: DateTime<Utc>,
        duplicate_of_case: u64,
    ) -> Result<()>;

    fn reassign(&mut self, case_id: u64, owner_id: u64, comment: &str) -> Result<()>;

    fn close(&mut self, case_id: u64) -> Result<()>;
}

/// Target vocabulary, name to id, loaded once per session.
#[derive(Debug, Clone, Default)]
pub struct ReferenceCache {
    projects: HashMap<String, u64>,
    areas: HashMap<(u64, String), u64>,
    project_fix_fors: HashMap<(u64, String), u64>,
    global_fix_fors: HashMap<String, u64>,
    priorities: HashMap<String, u64>,
    users: HashMap<String, u64>,
    statuses: HashMap<String, TargetStatus>,
}

impl ReferenceCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_project(&mut self, name: impl Into<String>, id: u64) {
        self.projects.insert(name.into(), id);
    }

    pub fn insert_area(&mut self, project_id: u64, name: impl Into<String>, id: u64) {
        self.areas.insert((project_id, name.into()), id);
    }

    /// Register a fix-for; `None` marks a global fix-for usable by every project.
    pub fn insert_fix_for(&mut self, project_id: Option<u64>, name: impl Into<String>, id: u64) {
        match project_id {
            Some(project_id) => {
                self.project_fix_fors.insert((project_id, name.into()), id);
            }
            None => {
                self.global_fix_fors.insert(name.into(), id);
            }
        }
    }

    pub fn insert_priority(&mut self, name: impl Into<String>, id: u64) {
        self.priorities.insert(name.into(), id);
    }

    pub fn insert_user(&mut self, email: &str, id: u64) {
        self.users.insert(email.trim().to_lowercase(), id);
    }

    pub fn insert_status(&mut self, status: TargetStatus) {
        self.statuses.insert(status.name.clone(), status);
    }

    #[must_use]
    pub fn find_project_id(&self, name: &str) -> Option<u64> {
        self.projects.get(name).copied()
    }

    #[must_use]
    pub fn find_area_id(&self, project_id: u64, name: &str) -> Option<u64> {
        self.areas.get(&(project_id, name.to_string())).copied()
    }

    /// Project fix-fors shadow global ones of the same name.
    #[must_use]
    pub fn find_fix_for_id(&self, project_id: u64, name: &str) -> Option<u64> {
        self.project_fix_fors
            .get(&(project_id, name.to_string()))
            .or_else(|| self.global_fix_fors.get(name))
            .copied()
    }

    #[must_use]
    pub fn find_priority_id(&self, name: &str) -> Option<u64> {
        self.priorities.get(name).copied()
    }

    /// Emails compare case-insensitively.
    #[must_use]
    pub fn find_user_id(&self, email: &str) -> Option<u64> {
        self.users.get(&email.trim().to_lowercase()).copied()
    }

    #[must_use]
    pub fn find_status_by_name(&self, name: &str) -> Option<&TargetStatus> {
        self.statuses.get(name)
    }

    /// Entry counts per kind, for the login summary.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{} projects, {} areas, {} fix-fors, {} priorities, {} people, {} statuses",
            self.projects.len(),
            self.areas.len(),
            self.project_fix_fors.len() + self.global_fix_fors.len(),
            self.priorities.len(),
            self.users.len(),
            self.statuses.len()
        )
    }
}
