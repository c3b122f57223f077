use super::MIGRATION_USER_ID;
use bz2fb::model::{Note, SourceRecord, TargetStatus};
use bz2fb::target::ReferenceCache;
use bz2fb::translate::TranslationMap;
use chrono::{DateTime, Duration, TimeZone, Utc};

pub const PROJECT_REPLAY: u64 = 5;
pub const AREA_SERVER: u64 = 50;
pub const AREA_INSTALLER: u64 = 51;
pub const FIX_FOR_2_0: u64 = 7;
pub const QA_ID: u64 = 10;
pub const DEV_ID: u64 = 11;

pub fn status(id: u64, name: &str, resolved: bool) -> TargetStatus {
    TargetStatus {
        id,
        name: name.to_string(),
        resolved,
    }
}

/// A small FogBugz installation.
pub fn references() -> ReferenceCache {
    let mut refs = ReferenceCache::new();
    refs.insert_project("Replay", PROJECT_REPLAY);
    refs.insert_area(PROJECT_REPLAY, "Server", AREA_SERVER);
    refs.insert_area(PROJECT_REPLAY, "Installer", AREA_INSTALLER);
    refs.insert_fix_for(Some(PROJECT_REPLAY), "2.0", FIX_FOR_2_0);
    refs.insert_priority("Must Fix", 1);
    refs.insert_priority("Fix If Time", 3);
    refs.insert_user("migrator@example.com", MIGRATION_USER_ID);
    refs.insert_user("qa@example.com", QA_ID);
    refs.insert_user("dev@example.com", DEV_ID);
    refs.insert_status(status(1, "Active", false));
    refs.insert_status(status(2, "Resolved (Fixed)", true));
    refs.insert_status(status(3, "Resolved (Duplicate)", true));
    refs.insert_status(status(4, "Resolved (Won't Fix)", true));
    refs
}

/// Mappings matching [`references`].
pub fn mappings() -> TranslationMap {
    let mut map = TranslationMap::default();
    map.milestones.insert("---".into(), String::new());
    map.priorities.insert("P1".into(), "Must Fix".into());
    map.priorities.insert("P3".into(), "Fix If Time".into());
    for status in ["NEW", "ASSIGNED", "REOPENED"] {
        map.statuses.insert(status.into(), "Active".into());
    }
    map.statuses
        .insert("RESOLVED::FIXED".into(), "Resolved (Fixed)".into());
    map.statuses
        .insert("RESOLVED::DUPLICATE".into(), "Resolved (Duplicate)".into());
    map.statuses
        .insert("RESOLVED::WONTFIX".into(), "Resolved (Won't Fix)".into());
    map
}

pub fn created_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2009, 8, 20, 14, 33, 0).unwrap()
}

/// An open, fully mappable bug reported by QA and assigned to Dev.
pub fn bug(id: u64, title: &str) -> SourceRecord {
    let mut record = SourceRecord::new(id, title, created_at());
    record.changed = created_at() + Duration::days(1);
    record.product = "Replay".into();
    record.component = "Server".into();
    record.version = "1.0".into();
    record.milestone = "---".into();
    record.status = "NEW".into();
    record.priority = "P1".into();
    record.severity = "normal".into();
    record.reporter = "qa@example.com".into();
    record.assignee = "dev@example.com".into();
    record
}

pub fn with_status(mut record: SourceRecord, status: &str, resolution: &str) -> SourceRecord {
    record.status = status.into();
    record.resolution = resolution.into();
    record
}

pub fn with_note(mut record: SourceRecord, author: &str, body: &str) -> SourceRecord {
    let offset = i64::try_from(record.notes.len()).unwrap_or(0);
    record.notes.push(Note {
        author: author.into(),
        timestamp: created_at() + Duration::hours(offset + 1),
        body: body.into(),
    });
    record
}

pub fn duplicate_of(record: SourceRecord, original: u64) -> SourceRecord {
    let mut record = with_status(record, "RESOLVED", "DUPLICATE");
    record.duplicate_of = Some(original);
    record
}
