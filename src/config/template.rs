//! Starter config generation from a Bugzilla export (`gen-config`).
//!
//! Every vocabulary value found in the export is written out mapped to
//! itself, so the operator only edits the entries that differ.

use super::Config;
use crate::error::Result;
use crate::model::SourceRecord;
use crate::translate::{ProductOverrides, RESOLVED_FIXED, RESOLVED_STATUS, TranslationMap};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Bugzilla's placeholder for "no milestone".
const NO_MILESTONE: &str = "---";

const HEADER: &str = "\
# bz2fb configuration generated from a Bugzilla export.
#
# Every value found in the export is mapped to itself. Edit the right-hand
# side wherever the FogBugz name differs, then run `bz2fb check` until it
# reports nothing missing.
#
# The target section can also be given with -a/-u/-p or BZ2FB_URL,
# BZ2FB_USER and BZ2FB_PASSWORD.
";

/// Vocabulary collected from one product's bugs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductVocabulary {
    pub components: BTreeSet<String>,
    pub milestones: BTreeSet<String>,
    pub versions: BTreeSet<String>,
}

/// Every distinct value a migration would need to translate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Vocabulary {
    pub products: BTreeMap<String, ProductVocabulary>,
    pub statuses: BTreeSet<String>,
    /// Resolutions of `RESOLVED` bugs only; other statuses ignore them.
    pub resolutions: BTreeSet<String>,
    pub priorities: BTreeSet<String>,
    pub users: BTreeSet<String>,
}

impl Vocabulary {
    /// Collect the vocabulary of `records`.
    #[must_use]
    pub fn scan(records: &[SourceRecord]) -> Self {
        let mut vocab = Self::default();
        for record in records {
            if !record.product.is_empty() {
                let product = vocab.products.entry(record.product.clone()).or_default();
                insert_nonempty(&mut product.components, &record.component);
                insert_nonempty(&mut product.milestones, &record.milestone);
                insert_nonempty(&mut product.versions, &record.version);
            }
            insert_nonempty(&mut vocab.statuses, &record.status);
            if record.status == RESOLVED_STATUS {
                insert_nonempty(&mut vocab.resolutions, &record.resolution);
            }
            insert_nonempty(&mut vocab.priorities, &record.priority);
            insert_nonempty(&mut vocab.users, &record.reporter);
            insert_nonempty(&mut vocab.users, &record.assignee);
            for cc in &record.cc {
                insert_nonempty(&mut vocab.users, cc);
            }
        }

        debug!(
            products = vocab.products.len(),
            statuses = vocab.statuses.len(),
            resolutions = vocab.resolutions.len(),
            priorities = vocab.priorities.len(),
            users = vocab.users.len(),
            "Scanned export vocabulary"
        );
        vocab
    }

    /// Identity translation tables with FogBugz status defaults filled in.
    #[must_use]
    pub fn to_mappings(&self) -> TranslationMap {
        let mut map = TranslationMap::default();

        for (product, vocab) in &self.products {
            map.products.insert(product.clone(), product.clone());
            let overrides = ProductOverrides {
                components: identity(&vocab.components),
                milestones: vocab
                    .milestones
                    .iter()
                    .filter(|m| m.as_str() != NO_MILESTONE)
                    .map(|m| (m.clone(), m.clone()))
                    .collect(),
                versions: identity(&vocab.versions),
            };
            if vocab.milestones.contains(NO_MILESTONE) {
                map.milestones.insert(NO_MILESTONE.to_string(), String::new());
            }
            map.product_overrides.insert(product.clone(), overrides);
        }

        map.priorities = identity(&self.priorities);
        map.users = identity(&self.users);

        for status in &self.statuses {
            if status == RESOLVED_STATUS {
                for resolution in &self.resolutions {
                    let target = default_resolution_status(resolution)
                        .map_or_else(|| resolution.clone(), str::to_string);
                    map.statuses
                        .insert(format!("{RESOLVED_STATUS}::{resolution}"), target);
                }
            } else if let Some(target) = default_status(status) {
                map.statuses.insert(status.clone(), target.to_string());
            } else {
                map.statuses.insert(status.clone(), status.clone());
            }
        }

        map
    }

    /// Render a complete config file.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render(&self) -> Result<String> {
        let config = Config {
            mappings: self.to_mappings(),
            ..Config::default()
        };
        let body = serde_yaml::to_string(&config)?;
        Ok(format!("{HEADER}\n{body}"))
    }
}

fn insert_nonempty(set: &mut BTreeSet<String>, value: &str) {
    let value = value.trim();
    if !value.is_empty() {
        set.insert(value.to_string());
    }
}

fn identity(values: &BTreeSet<String>) -> BTreeMap<String, String> {
    values.iter().map(|v| (v.clone(), v.clone())).collect()
}

fn default_status(status: &str) -> Option<&'static str> {
    match status {
        "NEW" | "ASSIGNED" | "REOPENED" | "UNCONFIRMED" => Some("Active"),
        "CLOSED" | "VERIFIED" => Some(RESOLVED_FIXED),
        _ => None,
    }
}

fn default_resolution_status(resolution: &str) -> Option<&'static str> {
    match resolution {
        "FIXED" => Some(RESOLVED_FIXED),
        "DUPLICATE" => Some("Resolved (Duplicate)"),
        "WONTFIX" | "INVALID" => Some("Resolved (Won't Fix)"),
        "LATER" | "REMIND" => Some("Resolved (Postponed)"),
        "WORKSFORME" => Some("Resolved (Not Reproducible)"),
        _ => None,
    }
}
