#![allow(dead_code)]

use bz2fb::convert::{self, MigrationOptions, MigrationReport};
use bz2fb::error::{MigrateError, Result};
use bz2fb::model::{CaseEvent, CaseFields, TargetCase, TargetStatus, marker_for};
use bz2fb::target::{CaseStore, ReferenceCache};
use bz2fb::translate::TranslationMap;
use chrono::{DateTime, Utc};
use indicatif::ProgressBar;
use std::collections::BTreeMap;
use std::sync::Once;

pub mod fake_fogbugz;
pub mod fixtures;

static INIT: Once = Once::new();

pub fn init_test_logging() {
    INIT.call_once(|| {
        bz2fb::logging::init_test_logging();
    });
}

/// Person id of the account the migration logs on as.
pub const MIGRATION_USER_ID: u64 = 2;
/// FogBugz's built-in CLOSED person.
pub const CLOSED_PERSON_ID: u64 = 1;
/// Fix-for FogBugz gives a new case when `new` names none.
pub const DEFAULT_FIX_FOR_ID: u64 = 1;

/// A mutating call the engine issued, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Create { case_id: u64 },
    Update { case_id: u64 },
    AppendNote { case_id: u64 },
    Resolve { case_id: u64, status: String },
    ResolveDuplicate { case_id: u64, original: u64 },
    Reassign { case_id: u64, owner_id: u64 },
    Close { case_id: u64 },
}

/// In-memory FogBugz that behaves like the real service where the engine
/// cares: a case created without a fix-for gets the default one, resolving
/// hands the case to the acting user, closing hands it to the CLOSED person,
/// and marker search is exact.
#[derive(Debug)]
pub struct FakeStore {
    refs: ReferenceCache,
    pub cases: BTreeMap<u64, TargetCase>,
    pub calls: Vec<Call>,
    next_case_id: u64,
    next_event_id: u64,
}

impl FakeStore {
    pub fn new(refs: ReferenceCache) -> Self {
        init_test_logging();
        Self {
            refs,
            cases: BTreeMap::new(),
            calls: Vec::new(),
            next_case_id: 100,
            next_event_id: 1,
        }
    }

    /// Seed a case directly, as if an earlier tool had created it.
    pub fn insert_case(&mut self, case: TargetCase) {
        self.next_case_id = self.next_case_id.max(case.id + 1);
        self.cases.insert(case.id, case);
    }

    pub fn case_for(&self, source_id: u64) -> &TargetCase {
        let marker = marker_for(source_id);
        self.cases
            .values()
            .find(|case| case.marker == marker)
            .unwrap_or_else(|| panic!("no case for bug {source_id}"))
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    fn status_id(&self, name: &str) -> u64 {
        self.refs
            .find_status_by_name(name)
            .map(|status| status.id)
            .unwrap_or_else(|| panic!("fake has no status {name}"))
    }

    fn event(&mut self, verb: &str, text: &str) -> CaseEvent {
        let id = self.next_event_id;
        self.next_event_id += 1;
        CaseEvent {
            id,
            verb: verb.to_string(),
            text: text.to_string(),
        }
    }

    fn case_mut(&mut self, case_id: u64) -> Result<&mut TargetCase> {
        self.cases.get_mut(&case_id).ok_or_else(|| MigrateError::Remote {
            operation: "edit".into(),
            code: 3,
            message: format!("Case {case_id} does not exist"),
        })
    }

    fn push_event(&mut self, case_id: u64, verb: &str, text: &str) -> Result<&mut TargetCase> {
        let event = self.event(verb, text);
        let case = self.case_mut(case_id)?;
        case.events.push(event);
        Ok(case)
    }
}

fn apply_fields(case: &mut TargetCase, fields: &CaseFields) {
    case.title.clone_from(&fields.title);
    case.project_id = fields.project_id;
    case.area_id = fields.area_id;
    if fields.fix_for_id.is_some() {
        case.fix_for_id = fields.fix_for_id;
    }
    case.priority_id = fields.priority_id;
    case.assigned_to_id = fields.assigned_to_id;
    case.version.clone_from(&fields.version);
}

impl CaseStore for FakeStore {
    fn references(&self) -> &ReferenceCache {
        &self.refs
    }

    fn find_by_marker(&self, source_id: u64) -> Result<Option<TargetCase>> {
        let marker = marker_for(source_id);
        let matches: Vec<&TargetCase> = self
            .cases
            .values()
            .filter(|case| case.marker == marker)
            .collect();
        match matches.as_slice() {
            [] => Ok(None),
            [case] => Ok(Some((*case).clone())),
            many => Err(MigrateError::MarkerCollision {
                source_id,
                case_ids: many.iter().map(|case| case.id).collect(),
            }),
        }
    }

    fn create_case(&mut self, fields: &CaseFields, opening_comment: &str) -> Result<u64> {
        let case_id = self.next_case_id;
        self.next_case_id += 1;
        let event = self.event("Opened", opening_comment);
        let mut case = TargetCase {
            id: case_id,
            open: true,
            title: String::new(),
            project_id: 0,
            area_id: 0,
            fix_for_id: Some(DEFAULT_FIX_FOR_ID),
            priority_id: 0,
            assigned_to_id: 0,
            status_id: self.status_id("Active"),
            version: String::new(),
            marker: fields.marker.clone(),
            events: vec![event],
        };
        apply_fields(&mut case, fields);
        self.cases.insert(case_id, case);
        self.calls.push(Call::Create { case_id });
        Ok(case_id)
    }

    fn update_case(&mut self, case_id: u64, fields: &CaseFields, comment: &str) -> Result<()> {
        let case = self.push_event(case_id, "Edited", comment)?;
        apply_fields(case, fields);
        self.calls.push(Call::Update { case_id });
        Ok(())
    }

    fn append_note(&mut self, case_id: u64, note: &str) -> Result<()> {
        self.push_event(case_id, "Edited", note)?;
        self.calls.push(Call::AppendNote { case_id });
        Ok(())
    }

    fn resolve_as_status(
        &mut self,
        case_id: u64,
        status: &TargetStatus,
        _as_of: DateTime<Utc>,
    ) -> Result<()> {
        let case = self.push_event(case_id, "Resolved", &status.name)?;
        case.status_id = status.id;
        case.assigned_to_id = MIGRATION_USER_ID;
        self.calls.push(Call::Resolve {
            case_id,
            status: status.name.clone(),
        });
        Ok(())
    }

    fn resolve_as_duplicate(
        &mut self,
        case_id: u64,
        status: &TargetStatus,
        _as_of: DateTime<Utc>,
        duplicate_of_case: u64,
    ) -> Result<()> {
        let text = format!("Duplicate of {duplicate_of_case}");
        let case = self.push_event(case_id, "Resolved", &text)?;
        case.status_id = status.id;
        case.assigned_to_id = MIGRATION_USER_ID;
        self.calls.push(Call::ResolveDuplicate {
            case_id,
            original: duplicate_of_case,
        });
        Ok(())
    }

    fn reassign(&mut self, case_id: u64, owner_id: u64, comment: &str) -> Result<()> {
        let case = self.push_event(case_id, "Assigned", comment)?;
        case.assigned_to_id = owner_id;
        self.calls.push(Call::Reassign { case_id, owner_id });
        Ok(())
    }

    fn close(&mut self, case_id: u64) -> Result<()> {
        let case = self.push_event(case_id, "Closed", "")?;
        case.open = false;
        case.assigned_to_id = CLOSED_PERSON_ID;
        self.calls.push(Call::Close { case_id });
        Ok(())
    }
}

/// Run a full migration with default options and a hidden progress bar.
pub fn migrate(
    store: &mut FakeStore,
    records: &[bz2fb::model::SourceRecord],
    map: &TranslationMap,
) -> Result<MigrationReport> {
    convert::migrate(
        store,
        records,
        map,
        &MigrationOptions::default(),
        &ProgressBar::hidden(),
    )
}
