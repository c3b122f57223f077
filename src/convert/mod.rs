//! The two-phase Bugzilla to FogBugz conversion.
//!
//! Phase 1 (ensure) makes sure every bug exists as an open case, creating
//! or updating it and appending any notes the case lacks. Phase 2 (finalize)
//! applies the terminal status, links duplicates, restores the original
//! reporter and closes. No bug is finalized before every bug is ensured,
//! because a duplicate may point at a bug later in the export.
//!
//! Nothing is persisted between runs: the marker stored on each case is
//! searched again every time, which makes re-running safe.

pub mod record;

pub use record::{ConvertedCase, NoteText, ResolvedRefs, convert_record, resolve_references};

use crate::error::{MigrateError, Result};
use crate::model::{CaseFields, SourceRecord, TargetCase};
use crate::sanity;
use crate::target::CaseStore;
use crate::translate::TranslationMap;
use indicatif::ProgressBar;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

/// Engine settings tied to the target installation's vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationOptions {
    /// Status of cases that need no terminal transition.
    pub active_status: String,
    /// Status that requires a duplicate-of link.
    pub duplicate_status: String,
    /// The built-in account closed cases are assigned to.
    pub closed_person_id: u64,
}

impl Default for MigrationOptions {
    fn default() -> Self {
        Self {
            active_status: "Active".to_string(),
            duplicate_status: "Resolved (Duplicate)".to_string(),
            closed_person_id: 1,
        }
    }
}

/// Where a bug stands within the current run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordState {
    Unseen,
    Ensured,
    Finalized,
}

/// Counts of what a run did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    pub records: usize,
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub notes_appended: usize,
    pub resolved: usize,
    pub reassigned: usize,
    pub closed: usize,
    pub already_final: usize,
    pub left_open: usize,
}

impl MigrationReport {
    /// Number of mutating calls the run issued.
    #[must_use]
    pub const fn mutations(&self) -> usize {
        self.created + self.updated + self.notes_appended + self.resolved + self.reassigned + self.closed
    }
}

/// Drives the ensure and finalize phases against a [`CaseStore`].
pub struct Converter<'a, S: CaseStore> {
    store: &'a mut S,
    map: &'a TranslationMap,
    options: &'a MigrationOptions,
    states: HashMap<u64, RecordState>,
    report: MigrationReport,
}

impl<'a, S: CaseStore> Converter<'a, S> {
    pub fn new(store: &'a mut S, map: &'a TranslationMap, options: &'a MigrationOptions) -> Self {
        Self {
            store,
            map,
            options,
            states: HashMap::new(),
            report: MigrationReport::default(),
        }
    }

    #[must_use]
    pub fn state(&self, source_id: u64) -> RecordState {
        self.states
            .get(&source_id)
            .copied()
            .unwrap_or(RecordState::Unseen)
    }

    #[must_use]
    pub fn report(&self) -> &MigrationReport {
        &self.report
    }

    #[must_use]
    pub fn into_report(self) -> MigrationReport {
        self.report
    }

    /// Normalize a record against the store's reference data.
    ///
    /// # Errors
    ///
    /// Fails if any reference is unmapped.
    pub fn convert(&self, record: &SourceRecord) -> Result<ConvertedCase> {
        convert_record(record, self.map, self.store.references(), self.options)
    }

    /// Run both phases over `records`, all of phase 1 before any of phase 2.
    ///
    /// # Errors
    ///
    /// Stops at the first failing record; records already processed stay migrated.
    pub fn run(&mut self, records: &[SourceRecord], progress: &ProgressBar) -> Result<()> {
        progress.set_length(records.len() as u64);

        progress.set_message("Ensuring cases");
        progress.set_position(0);
        for record in records {
            self.ensure(record)?;
            progress.inc(1);
        }
        info!(records = records.len(), "Phase 1 complete");

        progress.set_message("Finalizing cases");
        progress.set_position(0);
        for record in records {
            self.finalize(record)?;
            progress.inc(1);
        }
        info!(records = records.len(), "Phase 2 complete");

        self.report.records = records.len();
        Ok(())
    }

    /// Phase 1: create the case, or bring an existing one up to date. Always leaves it open.
    ///
    /// # Errors
    ///
    /// Fails on any lookup miss or store error.
    pub fn ensure(&mut self, record: &SourceRecord) -> Result<()> {
        let converted = self.convert(record)?;
        match self.store.find_by_marker(record.id)? {
            Some(existing) => self.refresh(&converted, &existing)?,
            None => self.create(&converted)?,
        }
        self.states.insert(record.id, RecordState::Ensured);
        Ok(())
    }

    /// Phase 2: apply the terminal status, duplicate link, reporter and close.
    ///
    /// # Errors
    ///
    /// Fails if the record was not ensured in this run, its case cannot be
    /// found, or a duplicate cannot be linked.
    pub fn finalize(&mut self, record: &SourceRecord) -> Result<()> {
        if self.state(record.id) != RecordState::Ensured {
            return Err(MigrateError::NotEnsured {
                source_id: record.id,
            });
        }

        let converted = self.convert(record)?;
        let existing = self.fetch(record.id)?;

        if converted.status.name == self.options.active_status {
            debug!(source_id = record.id, case_id = existing.id, "Case stays active");
            self.report.left_open += 1;
        } else if existing.status_id == converted.status.id {
            debug!(source_id = record.id, case_id = existing.id, "Case already finalized");
            self.report.already_final += 1;
        } else {
            self.resolve(&converted, &existing)?;
            self.restore_reporter_and_close(&converted)?;
        }

        self.states.insert(record.id, RecordState::Finalized);
        Ok(())
    }

    fn fetch(&self, source_id: u64) -> Result<TargetCase> {
        self.store
            .find_by_marker(source_id)?
            .ok_or(MigrateError::CaseNotFound { source_id })
    }

    fn create(&mut self, converted: &ConvertedCase) -> Result<()> {
        let case_id = self
            .store
            .create_case(&converted.fields, &converted.provenance)?;
        self.report.created += 1;
        info!(source_id = converted.source_id, case_id, "Created case for bug");

        for note in &converted.notes {
            self.store.append_note(case_id, &note.text)?;
            self.report.notes_appended += 1;
        }
        Ok(())
    }

    fn refresh(&mut self, converted: &ConvertedCase, existing: &TargetCase) -> Result<()> {
        // A finalized case was handed back to its reporter; that owner stands.
        let finalized = existing.status_id == converted.status.id
            && converted.status.name != self.options.active_status;
        let mut fields = converted.fields.clone();
        if finalized {
            fields.assigned_to_id = existing.assigned_to_id;
        }

        if fields_differ(&fields, existing) {
            let comment = format!("Updated from Bugzilla bug {}", converted.source_id);
            self.store.update_case(existing.id, &fields, &comment)?;
            self.report.updated += 1;
        } else {
            debug!(source_id = converted.source_id, case_id = existing.id, "Case is current");
            self.report.unchanged += 1;
        }

        for note in &converted.notes {
            if existing.has_event_containing(&note.body) {
                continue;
            }
            self.store.append_note(existing.id, &note.text)?;
            self.report.notes_appended += 1;
        }
        Ok(())
    }

    fn resolve(&mut self, converted: &ConvertedCase, existing: &TargetCase) -> Result<()> {
        if converted.status.name == self.options.duplicate_status {
            let duplicate_of = converted
                .duplicate_of
                .ok_or(MigrateError::MissingDuplicateOf {
                    source_id: converted.source_id,
                })?;
            let original = self.store.find_by_marker(duplicate_of)?.ok_or(
                MigrateError::DuplicateTargetMissing {
                    source_id: converted.source_id,
                    duplicate_of,
                },
            )?;
            self.store.resolve_as_duplicate(
                existing.id,
                &converted.status,
                converted.resolved_at,
                original.id,
            )?;
        } else {
            self.store
                .resolve_as_status(existing.id, &converted.status, converted.resolved_at)?;
        }
        self.report.resolved += 1;
        Ok(())
    }

    fn restore_reporter_and_close(&mut self, converted: &ConvertedCase) -> Result<()> {
        // Resolving may reassign the case, so look at it again.
        let current = self.fetch(converted.source_id)?;

        if current.assigned_to_id != converted.reporter_id
            && current.assigned_to_id != self.options.closed_person_id
        {
            let comment = format!(
                "Assigned to the original reporter of Bugzilla bug {}",
                converted.source_id
            );
            self.store
                .reassign(current.id, converted.reporter_id, &comment)?;
            self.report.reassigned += 1;
        }

        if current.open && !converted.open {
            self.store.close(current.id)?;
            self.report.closed += 1;
        }
        Ok(())
    }
}

/// A missing fix-for leaves whatever FogBugz assigned in place.
fn fields_differ(fields: &CaseFields, existing: &TargetCase) -> bool {
    fields.title != existing.title
        || fields.project_id != existing.project_id
        || fields.area_id != existing.area_id
        || fields
            .fix_for_id
            .is_some_and(|fix_for_id| existing.fix_for_id != Some(fix_for_id))
        || fields.assigned_to_id != existing.assigned_to_id
        || fields.priority_id != existing.priority_id
        || fields.version != existing.version
}

/// Gate on the sanity check, then run both phases.
///
/// # Errors
///
/// Returns [`MigrateError::UnmappedValues`] before any mutation if the
/// sanity check finds anything, otherwise the first engine error.
pub fn migrate<S: CaseStore>(
    store: &mut S,
    records: &[SourceRecord],
    map: &TranslationMap,
    options: &MigrationOptions,
    progress: &ProgressBar,
) -> Result<MigrationReport> {
    let missing = sanity::check(records, map, store.references());
    if !missing.is_empty() {
        return Err(MigrateError::UnmappedValues(missing.into_iter().collect()));
    }

    let mut converter = Converter::new(store, map, options);
    converter.run(records, progress)?;
    Ok(converter.into_report())
}
