//! Pre-flight check for unmapped Bugzilla values.
//!
//! Runs the engine's translation and lookup path over every record without
//! touching the target, and reports each unresolvable value once.

use crate::convert::resolve_references;
use crate::model::SourceRecord;
use crate::target::ReferenceCache;
use crate::translate::TranslationMap;
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// Collect a sorted, deduplicated description of every missing value.
///
/// An empty set means the migration can proceed.
pub fn check<'r, I>(records: I, map: &TranslationMap, refs: &ReferenceCache) -> BTreeSet<String>
where
    I: IntoIterator<Item = &'r SourceRecord>,
{
    let mut missing = BTreeSet::new();
    let mut checked = 0usize;

    for record in records {
        checked += 1;
        if let Err(values) = resolve_references(record, map, refs) {
            for value in values {
                let description = value.to_string();
                if missing.insert(description) {
                    warn!(source_id = record.id, missing = %value, "Unmapped value");
                }
            }
        }
    }

    debug!(checked, missing = missing.len(), "Sanity check complete");
    missing
}
