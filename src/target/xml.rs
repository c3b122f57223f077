//! Parsing of FogBugz XML API responses.
//!
//! Every response is a `<response>` document. A server-side failure is
//! reported as `<error code="N">text</error>` and is checked before any
//! payload field is read.

use super::ReferenceCache;
use crate::error::{MigrateError, Result};
use crate::model::{CaseEvent, TargetCase, TargetStatus, parse_marker};
use roxmltree::{Document, Node};
use tracing::trace;

/// Columns requested on every marker search.
pub const CASE_COLUMNS: &[&str] = &[
    "ixBug",
    "fOpen",
    "sTitle",
    "ixProject",
    "ixArea",
    "ixFixFor",
    "ixPriority",
    "ixPersonAssignedTo",
    "ixStatus",
    "sVersion",
    "sComputer",
    "events",
];

/// Contents of the `api.xml` discovery document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiDescriptor {
    pub version: u32,
    pub min_version: u32,
    /// Endpoint path relative to the descriptor's origin, e.g. `api.asp?`.
    pub url: String,
}

/// Parse a response body and fail on a server-reported error envelope.
///
/// # Errors
///
/// Returns [`MigrateError::Xml`] for malformed XML,
/// [`MigrateError::Remote`] for an `<error>` envelope and
/// [`MigrateError::UnexpectedResponse`] when the root is not `<response>`.
pub fn parse_response<'a>(operation: &str, body: &'a str) -> Result<Document<'a>> {
    let doc = Document::parse(body).map_err(|e| MigrateError::xml(operation, e))?;
    let root = doc.root_element();
    if !root.has_tag_name("response") {
        return Err(MigrateError::unexpected(
            operation,
            format!("root element <{}>", root.tag_name().name()),
        ));
    }

    if let Some(error) = child(root, "error") {
        let code = error
            .attribute("code")
            .and_then(|code| code.trim().parse::<i64>().ok())
            .unwrap_or(-1);
        return Err(MigrateError::Remote {
            operation: operation.to_string(),
            code,
            message: error.text().unwrap_or_default().trim().to_string(),
        });
    }

    Ok(doc)
}

/// Check a mutating call's response for an error envelope.
///
/// # Errors
///
/// See [`parse_response`].
pub fn check_response(operation: &str, body: &str) -> Result<()> {
    parse_response(operation, body).map(|_| ())
}

/// # Errors
///
/// Fails if the descriptor lacks `version`, `minversion` or `url`.
pub fn parse_api_descriptor(body: &str) -> Result<ApiDescriptor> {
    const OP: &str = "api.xml";
    let doc = parse_response(OP, body)?;
    let root = doc.root_element();

    let version = required_text(OP, root, "version")?;
    let min_version = required_text(OP, root, "minversion")?;
    let url = required_text(OP, root, "url")?;

    Ok(ApiDescriptor {
        version: parse_number(OP, "version", version)?,
        min_version: parse_number(OP, "minversion", min_version)?,
        url: url.to_string(),
    })
}

/// # Errors
///
/// Fails on an error envelope or when no `<token>` is present.
pub fn parse_token(body: &str) -> Result<String> {
    let doc = parse_response("logon", body)?;
    let token = required_text("logon", doc.root_element(), "token")?;
    if token.is_empty() {
        return Err(MigrateError::unexpected("logon", "empty token"));
    }
    Ok(token.to_string())
}

/// # Errors
///
/// Fails when the `<projects>` list is missing or an entry is malformed.
pub fn parse_projects(body: &str, cache: &mut ReferenceCache) -> Result<usize> {
    const OP: &str = "listProjects";
    let doc = parse_response(OP, body)?;
    let entries = list_entries(OP, &doc, "projects", "project")?;
    for node in &entries {
        let id = required_u64(OP, *node, "ixProject")?;
        let name = required_text(OP, *node, "sProject")?;
        cache.insert_project(name, id);
    }
    Ok(entries.len())
}

/// # Errors
///
/// Fails when the `<areas>` list is missing or an entry is malformed.
pub fn parse_areas(body: &str, cache: &mut ReferenceCache) -> Result<usize> {
    const OP: &str = "listAreas";
    let doc = parse_response(OP, body)?;
    let entries = list_entries(OP, &doc, "areas", "area")?;
    for node in &entries {
        let id = required_u64(OP, *node, "ixArea")?;
        let project_id = required_u64(OP, *node, "ixProject")?;
        let name = required_text(OP, *node, "sArea")?;
        cache.insert_area(project_id, name, id);
    }
    Ok(entries.len())
}

/// Fix-fors without a project (empty or `-1` `ixProject`) are global.
///
/// # Errors
///
/// Fails when the `<fixfors>` list is missing or an entry is malformed.
pub fn parse_fix_fors(body: &str, cache: &mut ReferenceCache) -> Result<usize> {
    const OP: &str = "listFixFors";
    let doc = parse_response(OP, body)?;
    let entries = list_entries(OP, &doc, "fixfors", "fixfor")?;
    for node in &entries {
        let id = required_u64(OP, *node, "ixFixFor")?;
        let name = required_text(OP, *node, "sFixFor")?;
        let project_id = child_text(*node, "ixProject").and_then(|v| v.parse::<u64>().ok());
        cache.insert_fix_for(project_id, name, id);
    }
    Ok(entries.len())
}

/// Priorities are registered both by name and by their `N - Name` display form.
///
/// # Errors
///
/// Fails when the `<priorities>` list is missing or an entry is malformed.
pub fn parse_priorities(body: &str, cache: &mut ReferenceCache) -> Result<usize> {
    const OP: &str = "listPriorities";
    let doc = parse_response(OP, body)?;
    let entries = list_entries(OP, &doc, "priorities", "priority")?;
    for node in &entries {
        let id = required_u64(OP, *node, "ixPriority")?;
        let name = required_text(OP, *node, "sPriority")?;
        cache.insert_priority(format!("{id} - {name}"), id);
        cache.insert_priority(name, id);
    }
    Ok(entries.len())
}

/// # Errors
///
/// Fails when the `<people>` list is missing or an entry is malformed.
pub fn parse_people(body: &str, cache: &mut ReferenceCache) -> Result<usize> {
    const OP: &str = "listPeople";
    let doc = parse_response(OP, body)?;
    let entries = list_entries(OP, &doc, "people", "person")?;
    let mut count = 0;
    for node in &entries {
        let id = required_u64(OP, *node, "ixPerson")?;
        // Virtual accounts may have no email; they cannot be a migration target.
        match child_text(*node, "sEmail") {
            Some(email) if !email.is_empty() => {
                cache.insert_user(email, id);
                count += 1;
            }
            _ => trace!(id, "Skipping person without email"),
        }
    }
    Ok(count)
}

/// # Errors
///
/// Fails when the `<statuses>` list is missing or an entry is malformed.
pub fn parse_statuses(body: &str, cache: &mut ReferenceCache) -> Result<usize> {
    const OP: &str = "listStatuses";
    let doc = parse_response(OP, body)?;
    let entries = list_entries(OP, &doc, "statuses", "status")?;
    for node in &entries {
        cache.insert_status(TargetStatus {
            id: required_u64(OP, *node, "ixStatus")?,
            name: required_text(OP, *node, "sStatus")?.to_string(),
            resolved: child_bool(*node, "fResolved"),
        });
    }
    Ok(entries.len())
}

/// Parse a marker search result.
///
/// # Errors
///
/// Only cases whose `sComputer` decodes back to `source_id` count as
/// matches; the server's text search may also return cases of longer ids.
///
/// Returns [`MigrateError::MarkerCollision`] when more than one case matches,
/// and [`MigrateError::UnexpectedResponse`] when neither `<case>` elements
/// nor an empty `<cases count="0">` wrapper are present.
pub fn parse_search(source_id: u64, body: &str) -> Result<Option<TargetCase>> {
    const OP: &str = "search";
    let doc = parse_response(OP, body)?;

    let returned: Vec<Node<'_, '_>> = doc
        .descendants()
        .filter(|n| n.has_tag_name("case"))
        .collect();

    if returned.is_empty() {
        let empty = doc
            .descendants()
            .find(|n| n.has_tag_name("cases"))
            .and_then(|n| n.attribute("count"))
            .is_some_and(|count| count.trim() == "0");
        if !empty {
            return Err(MigrateError::unexpected(
                OP,
                "neither <case> elements nor an empty <cases> list",
            ));
        }
    }

    let matching: Vec<Node<'_, '_>> = returned
        .iter()
        .copied()
        .filter(|n| {
            parse_marker(child_text(*n, "sComputer").unwrap_or_default()) == Some(source_id)
        })
        .collect();
    if matching.len() < returned.len() {
        trace!(
            source_id,
            returned = returned.len(),
            matching = matching.len(),
            "Ignored search results with a different marker"
        );
    }

    match matching.as_slice() {
        [] => Ok(None),
        [node] => parse_case(*node).map(Some),
        many => Err(MigrateError::MarkerCollision {
            source_id,
            case_ids: many.iter().filter_map(|n| case_id(*n)).collect(),
        }),
    }
}

/// Extract the new case id from a `new` response.
///
/// # Errors
///
/// Fails on an error envelope or when no `<case ixBug="N">` is returned.
pub fn parse_new_case(body: &str) -> Result<u64> {
    const OP: &str = "new";
    let doc = parse_response(OP, body)?;
    doc.descendants()
        .find(|n| n.has_tag_name("case"))
        .and_then(case_id)
        .ok_or_else(|| MigrateError::unexpected(OP, "no <case ixBug> in response"))
}

fn parse_case(node: Node<'_, '_>) -> Result<TargetCase> {
    const OP: &str = "search";
    let id = case_id(node).ok_or_else(|| MigrateError::unexpected(OP, "case without ixBug"))?;

    let events = child(node, "events")
        .map(|events| {
            events
                .children()
                .filter(|n| n.has_tag_name("event"))
                .map(|event| CaseEvent {
                    id: child_text(event, "ixBugEvent")
                        .or_else(|| event.attribute("ixBugEvent"))
                        .and_then(|v| v.trim().parse().ok())
                        .unwrap_or_default(),
                    verb: child_text(event, "sVerb").unwrap_or_default().to_string(),
                    text: child_raw_text(event, "s").unwrap_or_default().to_string(),
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(TargetCase {
        id,
        open: child_bool(node, "fOpen"),
        title: child_text(node, "sTitle").unwrap_or_default().to_string(),
        project_id: required_u64(OP, node, "ixProject")?,
        area_id: required_u64(OP, node, "ixArea")?,
        fix_for_id: child_text(node, "ixFixFor").and_then(|v| v.parse().ok()),
        priority_id: required_u64(OP, node, "ixPriority")?,
        assigned_to_id: required_u64(OP, node, "ixPersonAssignedTo")?,
        status_id: required_u64(OP, node, "ixStatus")?,
        version: child_text(node, "sVersion").unwrap_or_default().to_string(),
        marker: child_text(node, "sComputer").unwrap_or_default().to_string(),
        events,
    })
}

fn case_id(node: Node<'_, '_>) -> Option<u64> {
    node.attribute("ixBug")
        .or_else(|| child_text(node, "ixBug"))
        .and_then(|v| v.trim().parse().ok())
}

fn list_entries<'a, 'i>(
    operation: &str,
    doc: &'a Document<'i>,
    wrapper: &str,
    entry: &str,
) -> Result<Vec<Node<'a, 'i>>> {
    let list = child(doc.root_element(), wrapper)
        .ok_or_else(|| MigrateError::unexpected(operation, format!("missing <{wrapper}>")))?;
    Ok(list.children().filter(|n| n.has_tag_name(entry)).collect())
}

fn child<'a, 'i>(node: Node<'a, 'i>, name: &str) -> Option<Node<'a, 'i>> {
    node.children().find(|n| n.has_tag_name(name))
}

fn child_raw_text<'a>(node: Node<'a, '_>, name: &str) -> Option<&'a str> {
    child(node, name).and_then(|n| n.text())
}

fn child_text<'a>(node: Node<'a, '_>, name: &str) -> Option<&'a str> {
    child_raw_text(node, name)
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn child_bool(node: Node<'_, '_>, name: &str) -> bool {
    matches!(child_text(node, name), Some("true" | "1"))
}

fn required_text<'a>(operation: &str, node: Node<'a, '_>, name: &str) -> Result<&'a str> {
    child_text(node, name)
        .ok_or_else(|| MigrateError::unexpected(operation, format!("missing <{name}>")))
}

fn required_u64(operation: &str, node: Node<'_, '_>, name: &str) -> Result<u64> {
    let value = required_text(operation, node, name)?;
    parse_number(operation, name, value)
}

fn parse_number<T: std::str::FromStr>(operation: &str, name: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| MigrateError::unexpected(operation, format!("<{name}> is not a number: {value}")))
}
