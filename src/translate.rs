//! Field translation from Bugzilla vocabulary to FogBugz vocabulary.
//!
//! Every table maps a source value to a target value. A value with no entry
//! translates to itself. Component, milestone and version lookups are scoped
//! by the source product: a product override wins over the global table.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Bugzilla status whose resolution carries the real outcome.
pub const RESOLVED_STATUS: &str = "RESOLVED";
/// Target status for `CLOSED` and `VERIFIED` bugs, regardless of the table.
pub const RESOLVED_FIXED: &str = "Resolved (Fixed)";

const TERMINAL_STATUSES: [&str; 2] = ["CLOSED", "VERIFIED"];

/// Which table a value is translated through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Product,
    Component,
    Milestone,
    Version,
    Priority,
    User,
}

/// Per-product overrides for scoped field kinds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductOverrides {
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub components: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub milestones: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub versions: BTreeMap<String, String>,
}

/// The translation tables loaded from the `mappings` section of the config.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslationMap {
    pub products: BTreeMap<String, String>,
    pub components: BTreeMap<String, String>,
    pub milestones: BTreeMap<String, String>,
    pub versions: BTreeMap<String, String>,
    pub priorities: BTreeMap<String, String>,
    pub users: BTreeMap<String, String>,
    /// Keys are either a bare status, a bare resolution, or `RESOLVED::<resolution>`.
    pub statuses: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub product_overrides: BTreeMap<String, ProductOverrides>,
}

impl TranslationMap {
    /// Translate an unscoped value.
    #[must_use]
    pub fn translate<'a>(&'a self, kind: FieldKind, value: &'a str) -> &'a str {
        self.translate_scoped(kind, None, value)
    }

    /// Translate a value, consulting the product's overrides first.
    #[must_use]
    pub fn translate_scoped<'a>(
        &'a self,
        kind: FieldKind,
        product: Option<&str>,
        value: &'a str,
    ) -> &'a str {
        if let Some(overrides) = product.and_then(|p| self.product_overrides.get(p)) {
            let scoped = match kind {
                FieldKind::Component => Some(&overrides.components),
                FieldKind::Milestone => Some(&overrides.milestones),
                FieldKind::Version => Some(&overrides.versions),
                FieldKind::Product | FieldKind::Priority | FieldKind::User => None,
            };
            if let Some(mapped) = scoped.and_then(|table| table.get(value)) {
                return mapped;
            }
        }

        self.table(kind).get(value).map_or(value, String::as_str)
    }

    /// Translate a Bugzilla status/resolution pair into one FogBugz status name.
    #[must_use]
    pub fn translate_status(&self, status: &str, resolution: &str) -> String {
        if TERMINAL_STATUSES.contains(&status) {
            return RESOLVED_FIXED.to_string();
        }

        if status == RESOLVED_STATUS {
            let composite = format!("{RESOLVED_STATUS}::{resolution}");
            return self
                .statuses
                .get(&composite)
                .or_else(|| self.statuses.get(resolution))
                .map_or_else(|| resolution.to_string(), Clone::clone);
        }

        self.statuses
            .get(status)
            .map_or_else(|| status.to_string(), Clone::clone)
    }

    fn table(&self, kind: FieldKind) -> &BTreeMap<String, String> {
        match kind {
            FieldKind::Product => &self.products,
            FieldKind::Component => &self.components,
            FieldKind::Milestone => &self.milestones,
            FieldKind::Version => &self.versions,
            FieldKind::Priority => &self.priorities,
            FieldKind::User => &self.users,
        }
    }
}

/// Whether a bug with this Bugzilla status stays open in FogBugz.
#[must_use]
pub fn is_open(status: &str) -> bool {
    !TERMINAL_STATUSES.contains(&status)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map() -> TranslationMap {
        let mut map = TranslationMap::default();
        map.components
            .insert("MSI Installer".into(), "Installer".into());
        map.milestones.insert("---".into(), "Undecided".into());
        map.statuses.insert("NEW".into(), "Active".into());
        map.statuses
            .insert("RESOLVED::WORKSFORME".into(), "Resolved (Not Reproducible)".into());
        map.statuses
            .insert("DUPLICATE".into(), "Resolved (Duplicate)".into());
        map.statuses.insert("CLOSED".into(), "FBClosed".into());
        map
    }

    #[test]
    fn unmapped_values_pass_through() {
        let map = map();
        assert_eq!(map.translate(FieldKind::Product, "Replay"), "Replay");
        assert_eq!(map.translate(FieldKind::User, "a@b.com"), "a@b.com");
        assert_eq!(map.translate_status("ASSIGNED", ""), "ASSIGNED");
    }

    #[test]
    fn configured_values_translate() {
        let map = map();
        assert_eq!(map.translate(FieldKind::Component, "MSI Installer"), "Installer");
        assert_eq!(map.translate(FieldKind::Milestone, "---"), "Undecided");
        assert_eq!(map.translate_status("NEW", ""), "Active");
    }

    #[test]
    fn closed_and_verified_always_resolve_fixed() {
        let map = map();
        assert_eq!(map.translate_status("CLOSED", "WONTFIX"), RESOLVED_FIXED);
        assert_eq!(map.translate_status("VERIFIED", "INVALID"), RESOLVED_FIXED);
        assert!(!is_open("CLOSED"));
        assert!(!is_open("VERIFIED"));
        assert!(is_open("RESOLVED"));
    }

    #[test]
    fn resolved_status_translates_the_resolution() {
        let map = map();
        assert_eq!(
            map.translate_status("RESOLVED", "WORKSFORME"),
            "Resolved (Not Reproducible)"
        );
        assert_eq!(
            map.translate_status("RESOLVED", "DUPLICATE"),
            "Resolved (Duplicate)"
        );
        assert_eq!(map.translate_status("RESOLVED", "MOVED"), "MOVED");
    }

    #[test]
    fn product_overrides_win_over_global_table() {
        let mut map = map();
        let mut overrides = ProductOverrides::default();
        overrides
            .components
            .insert("MSI Installer".into(), "Setup".into());
        map.product_overrides.insert("Replay".into(), overrides);

        assert_eq!(
            map.translate_scoped(FieldKind::Component, Some("Replay"), "MSI Installer"),
            "Setup"
        );
        assert_eq!(
            map.translate_scoped(FieldKind::Component, Some("Other"), "MSI Installer"),
            "Installer"
        );
        assert_eq!(
            map.translate_scoped(FieldKind::Milestone, Some("Replay"), "---"),
            "Undecided"
        );
    }
}
