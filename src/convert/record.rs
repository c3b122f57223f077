//! Per-record normalization: Bugzilla fields to FogBugz ids and event text.
//!
//! [`resolve_references`] is the single lookup path shared by the sanity
//! checker and the engine, so both agree on what counts as unmapped.

use super::MigrationOptions;
use crate::error::{MigrateError, Result};
use crate::model::{CaseFields, MissingValue, Note, SourceRecord, TargetStatus, marker_for};
use crate::target::ReferenceCache;
use crate::translate::{FieldKind, TranslationMap, is_open};
use chrono::{DateTime, Utc};
use std::fmt::Write as _;

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M UTC";

/// Target ids for every reference a record carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRefs {
    pub project_id: u64,
    pub area_id: u64,
    pub fix_for_id: Option<u64>,
    pub priority_id: u64,
    pub assigned_to_id: u64,
    pub reporter_id: u64,
    pub status: TargetStatus,
}

/// A note ready to append: the source body for matching, and the event text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteText {
    pub body: String,
    pub text: String,
}

/// Everything the engine needs to ensure and finalize one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertedCase {
    pub source_id: u64,
    pub fields: CaseFields,
    pub reporter_id: u64,
    pub status: TargetStatus,
    pub open: bool,
    /// Set only when `status` is the duplicate status.
    pub duplicate_of: Option<u64>,
    pub resolved_at: DateTime<Utc>,
    pub notes: Vec<NoteText>,
    pub provenance: String,
}

/// Translate and look up every reference of `record`.
///
/// A missing project skips the area and fix-for lookups, which need a
/// project to be scoped to. An empty translated milestone means no fix-for.
///
/// # Errors
///
/// Returns every missing value found for this record.
pub fn resolve_references(
    record: &SourceRecord,
    map: &TranslationMap,
    refs: &ReferenceCache,
) -> std::result::Result<ResolvedRefs, Vec<MissingValue>> {
    let mut missing = Vec::new();
    let product = Some(record.product.as_str());

    let mut find_user = |source: &str| {
        let email = map.translate(FieldKind::User, source);
        let id = refs.find_user_id(email);
        if id.is_none() {
            missing.push(MissingValue::User(email.to_string()));
        }
        id
    };
    let reporter_id = find_user(&record.reporter);
    let assigned_to_id = find_user(&record.assignee);

    let project = map.translate(FieldKind::Product, &record.product);
    let project_id = refs.find_project_id(project);
    let (area_id, fix_for_id) = match project_id {
        Some(project_id) => {
            let area = map.translate_scoped(FieldKind::Component, product, &record.component);
            let area_id = refs.find_area_id(project_id, area);
            if area_id.is_none() {
                missing.push(MissingValue::Area {
                    project: project.to_string(),
                    area: area.to_string(),
                });
            }

            let fix_for = map
                .translate_scoped(FieldKind::Milestone, product, &record.milestone)
                .trim();
            let fix_for_id = if fix_for.is_empty() {
                Some(None)
            } else {
                let id = refs.find_fix_for_id(project_id, fix_for);
                if id.is_none() {
                    missing.push(MissingValue::FixFor {
                        project: project.to_string(),
                        fix_for: fix_for.to_string(),
                    });
                }
                id.map(Some)
            };
            (area_id, fix_for_id)
        }
        None => {
            missing.push(MissingValue::Project(project.to_string()));
            (None, None)
        }
    };

    let priority = map.translate(FieldKind::Priority, &record.priority);
    let priority_id = refs.find_priority_id(priority);
    if priority_id.is_none() {
        missing.push(MissingValue::Priority(priority.to_string()));
    }

    let status_name = map.translate_status(&record.status, &record.resolution);
    let status = refs.find_status_by_name(&status_name).cloned();
    if status.is_none() {
        missing.push(MissingValue::Status(status_name));
    }

    match (
        project_id,
        area_id,
        fix_for_id,
        priority_id,
        assigned_to_id,
        reporter_id,
        status,
    ) {
        (
            Some(project_id),
            Some(area_id),
            Some(fix_for_id),
            Some(priority_id),
            Some(assigned_to_id),
            Some(reporter_id),
            Some(status),
        ) if missing.is_empty() => Ok(ResolvedRefs {
            project_id,
            area_id,
            fix_for_id,
            priority_id,
            assigned_to_id,
            reporter_id,
            status,
        }),
        _ => Err(missing),
    }
}

/// Normalize one Bugzilla bug into the shape the engine writes.
///
/// # Errors
///
/// Returns [`MigrateError::Unmapped`] for the first unresolvable reference.
/// The sanity checker runs first, so this only fires on a contract violation.
pub fn convert_record(
    record: &SourceRecord,
    map: &TranslationMap,
    refs: &ReferenceCache,
    options: &MigrationOptions,
) -> Result<ConvertedCase> {
    let resolved = resolve_references(record, map, refs).map_err(|missing| {
        MigrateError::Unmapped {
            source_id: record.id,
            missing: missing
                .into_iter()
                .next()
                .unwrap_or_else(|| MissingValue::Status(record.status.clone())),
        }
    })?;

    let version = map
        .translate_scoped(FieldKind::Version, Some(&record.product), &record.version)
        .to_string();
    let duplicate_of = if resolved.status.name == options.duplicate_status {
        record.duplicate_of
    } else {
        None
    };

    Ok(ConvertedCase {
        source_id: record.id,
        fields: CaseFields {
            title: case_title(record),
            project_id: resolved.project_id,
            area_id: resolved.area_id,
            fix_for_id: resolved.fix_for_id,
            priority_id: resolved.priority_id,
            assigned_to_id: resolved.assigned_to_id,
            version,
            marker: marker_for(record.id),
            opened: record.created,
        },
        reporter_id: resolved.reporter_id,
        status: resolved.status,
        open: is_open(&record.status),
        duplicate_of,
        resolved_at: record.changed,
        notes: record.notes.iter().filter_map(note_text).collect(),
        provenance: provenance_note(record),
    })
}

/// Case title with the Bugzilla id appended.
#[must_use]
pub fn case_title(record: &SourceRecord) -> String {
    format!("{} [Bugzilla #{}]", record.title.trim(), record.id)
}

fn note_text(note: &Note) -> Option<NoteText> {
    let body = note.body.trim();
    if body.is_empty() {
        return None;
    }
    Some(NoteText {
        body: body.to_string(),
        text: format!(
            "{} wrote on {}:\n\n{}",
            note.author,
            note.timestamp.format(DATE_FORMAT),
            body
        ),
    })
}

/// Opening comment documenting where the case came from.
#[must_use]
pub fn provenance_note(record: &SourceRecord) -> String {
    let mut note = format!(
        "Migrated from Bugzilla [Bug {}] - {}\nOriginally reported by {} on {}\n",
        record.id,
        record.title.trim(),
        record.reporter,
        record.created.format(DATE_FORMAT)
    );

    let _ = writeln!(
        note,
        "Product: {} / Component: {}",
        record.product, record.component
    );
    if !record.severity.is_empty() {
        let _ = writeln!(note, "Severity: {}", record.severity);
    }
    let platform = format!("{} {}", record.platform, record.os);
    if !platform.trim().is_empty() {
        let _ = writeln!(note, "Platform: {}", platform.trim());
    }
    if !record.cc.is_empty() {
        let _ = writeln!(note, "CC: {}", record.cc.join(", "));
    }
    if !record.blocks.is_empty() {
        let _ = writeln!(note, "Blocks: {}", join_ids(&record.blocks));
    }
    if !record.depends_on.is_empty() {
        let _ = writeln!(note, "Depends on: {}", join_ids(&record.depends_on));
    }
    if !record.attachments.is_empty() {
        note.push_str("Attachments (not migrated):\n");
        for attachment in &record.attachments {
            let mut flags = vec![attachment.mime_type.as_str()];
            if attachment.patch {
                flags.push("patch");
            }
            if attachment.obsolete {
                flags.push("obsolete");
            }
            if attachment.private {
                flags.push("private");
            }
            flags.retain(|flag| !flag.is_empty());
            let _ = writeln!(
                note,
                "  #{} {} ({}) - {}",
                attachment.id,
                attachment.filename,
                flags.join(", "),
                attachment.description
            );
        }
    }

    note.trim_end().to_string()
}

fn join_ids(ids: &[u64]) -> String {
    ids.iter()
        .map(u64::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
