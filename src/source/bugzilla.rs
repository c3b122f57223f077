//! Bugzilla XML export reader (`<bugzilla><bug>...</bug></bugzilla>`).

use crate::error::{MigrateError, Result};
use crate::model::{Attachment, Note, SourceRecord};
use chrono::{DateTime, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use roxmltree::{Document, Node, ParsingOptions};
use std::fs;
use std::path::Path;
use tracing::{debug, info, trace};

static DUPLICATE_NOTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\*\*\* This bug has been marked as a duplicate of (?:bug )?(\d+) \*\*\*")
        .expect("duplicate note pattern is valid")
});

/// Read and parse an export file.
///
/// # Errors
///
/// Fails if the file cannot be read or is not a valid export.
pub fn read_file(path: &Path) -> Result<Vec<SourceRecord>> {
    info!(path = %path.display(), "Reading Bugzilla export");
    let contents = fs::read_to_string(path)?;
    let records = read_bugs(&contents)?;
    info!(count = records.len(), "Read Bugzilla bugs");
    Ok(records)
}

/// Parse every `<bug>` of an export document, in file order.
///
/// Bugs exported with an `error` attribute (e.g. `NotFound`) are skipped.
///
/// # Errors
///
/// Fails on malformed XML, a missing `<bugzilla>` root, or an invalid bug.
pub fn read_bugs(xml: &str) -> Result<Vec<SourceRecord>> {
    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    let doc = Document::parse_with_options(xml, options)
        .map_err(|e| MigrateError::xml("Bugzilla export", e))?;
    let root = doc.root_element();
    if !root.has_tag_name("bugzilla") {
        return Err(MigrateError::validation(
            "export",
            format!("expected <bugzilla> root, found <{}>", root.tag_name().name()),
        ));
    }

    let mut records = Vec::new();
    for node in root.children().filter(|n| n.has_tag_name("bug")) {
        if let Some(error) = node.attribute("error") {
            debug!(error, "Skipping bug exported with an error");
            continue;
        }
        records.push(parse_bug(node)?);
    }
    Ok(records)
}

fn parse_bug(node: Node<'_, '_>) -> Result<SourceRecord> {
    let id = match text(node, "bug_id").map(str::parse::<u64>) {
        Some(Ok(id)) if id > 0 => id,
        Some(_) => return Err(MigrateError::validation("bug_id", "must be a positive integer")),
        None => return Err(MigrateError::validation("bug_id", "missing")),
    };
    let created = text(node, "creation_ts")
        .map(parse_timestamp)
        .transpose()?
        .ok_or_else(|| MigrateError::validation("creation_ts", format!("missing for bug {id}")))?;

    let mut record = SourceRecord::new(id, "", created);
    let mut changed = None;

    for elem in node.children().filter(Node::is_element) {
        let value = elem.text().unwrap_or_default().trim();
        match elem.tag_name().name() {
            "bug_id" | "creation_ts" => {}
            "short_desc" => record.title = value.to_string(),
            "delta_ts" => changed = Some(parse_timestamp(value)?),
            "product" => record.product = value.to_string(),
            "component" => record.component = value.to_string(),
            "version" => record.version = value.to_string(),
            "rep_platform" => record.platform = value.to_string(),
            "op_sys" => record.os = value.to_string(),
            "bug_status" => record.status = value.to_string(),
            "resolution" => record.resolution = value.to_string(),
            "priority" => record.priority = value.to_string(),
            "bug_severity" => record.severity = value.to_string(),
            "target_milestone" => record.milestone = value.to_string(),
            "reporter" => record.reporter = value.to_string(),
            "assigned_to" => record.assignee = value.to_string(),
            "cc" => record.cc.push(value.to_string()),
            "blocked" => record.blocks.push(parse_id("blocked", value)?),
            "dependson" => record.depends_on.push(parse_id("dependson", value)?),
            "dup_id" => record.duplicate_of = Some(parse_id("dup_id", value)?),
            "long_desc" => record.notes.push(parse_note(elem)?),
            "attachment" => record.attachments.push(parse_attachment(elem)?),
            other => trace!(bug = id, element = other, "Ignoring Bugzilla element"),
        }
    }

    record.changed = changed.unwrap_or(created);
    if record.duplicate_of.is_none() {
        record.duplicate_of = record
            .notes
            .iter()
            .rev()
            .find_map(|note| duplicate_from_note(&note.body));
    }

    Ok(record)
}

fn parse_note(node: Node<'_, '_>) -> Result<Note> {
    let timestamp = text(node, "bug_when")
        .map(parse_timestamp)
        .transpose()?
        .ok_or_else(|| MigrateError::validation("bug_when", "missing on comment"))?;
    Ok(Note {
        author: text(node, "who").unwrap_or_default().to_string(),
        timestamp,
        body: raw_text(node, "thetext").unwrap_or_default().to_string(),
    })
}

fn parse_attachment(node: Node<'_, '_>) -> Result<Attachment> {
    let flag = |name: &str| node.attribute(name).is_some_and(|v| v.trim() == "1");
    Ok(Attachment {
        id: text(node, "attachid")
            .or_else(|| text(node, "attach_id"))
            .map(|v| parse_id("attachid", v))
            .transpose()?
            .unwrap_or_default(),
        filename: text(node, "filename").unwrap_or_default().to_string(),
        description: text(node, "desc").unwrap_or_default().to_string(),
        mime_type: text(node, "type").unwrap_or_default().to_string(),
        date: text(node, "date").map(parse_timestamp).transpose()?,
        obsolete: flag("isobsolete"),
        patch: flag("ispatch"),
        private: flag("isprivate"),
    })
}

/// The bug a comment declares this one a duplicate of, if any.
#[must_use]
pub fn duplicate_from_note(body: &str) -> Option<u64> {
    DUPLICATE_NOTE
        .captures_iter(body)
        .last()
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Parse a Bugzilla timestamp into UTC.
///
/// Accepts `YYYY-MM-DD HH:MM[:SS]` optionally followed by a numeric offset
/// (`-0700`) or a zone abbreviation. Abbreviations are ignored and the time
/// is taken as UTC.
///
/// # Errors
///
/// Returns a validation error for any other shape.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    let value = value.trim();
    for format in ["%Y-%m-%d %H:%M:%S %z", "%Y-%m-%d %H:%M %z"] {
        if let Ok(parsed) = DateTime::parse_from_str(value, format) {
            return Ok(parsed.with_timezone(&Utc));
        }
    }

    let naive = value
        .rsplit_once(' ')
        .filter(|(_, zone)| zone.chars().all(|c| c.is_ascii_alphabetic()))
        .map_or(value, |(rest, _)| rest);
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(naive, format) {
            return Ok(parsed.and_utc());
        }
    }

    Err(MigrateError::validation(
        "timestamp",
        format!("unrecognized Bugzilla timestamp '{value}'"),
    ))
}

fn parse_id(field: &str, value: &str) -> Result<u64> {
    value
        .trim()
        .parse()
        .map_err(|_| MigrateError::validation(field, format!("'{value}' is not a bug id")))
}

fn raw_text<'a>(node: Node<'a, '_>, name: &str) -> Option<&'a str> {
    node.children()
        .find(|n| n.has_tag_name(name))
        .and_then(|n| n.text())
}

fn text<'a>(node: Node<'a, '_>, name: &str) -> Option<&'a str> {
    raw_text(node, name).map(str::trim).filter(|v| !v.is_empty())
}
