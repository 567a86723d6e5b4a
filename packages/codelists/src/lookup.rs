//! Shared label → code lookup.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

/// A cloneable handle to one category's label → code map.
///
/// Every clone points at the same map. [`Lookup::replace`] swaps the
/// contents in place, so holders of earlier clones see the new entries.
/// Labels without a code map to `None`.
#[derive(Debug, Clone, Default)]
pub struct Lookup {
    entries: Arc<RwLock<BTreeMap<String, Option<String>>>>,
}

impl Lookup {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a lookup holding `entries`.
    #[must_use]
    pub fn from_entries(entries: BTreeMap<String, Option<String>>) -> Self {
        Self {
            entries: Arc::new(RwLock::new(entries)),
        }
    }

    /// Replaces the contents in place.
    pub fn replace(&self, entries: BTreeMap<String, Option<String>>) {
        *self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner) = entries;
    }

    /// Code for `label`. `None` if the label is unknown or has no code.
    #[must_use]
    pub fn code(&self, label: &str) -> Option<String> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(label)
            .cloned()
            .flatten()
    }

    /// Code for `label`, or the label itself when no code is known.
    #[must_use]
    pub fn resolve(&self, label: &str) -> String {
        self.code(label).unwrap_or_else(|| label.to_string())
    }

    /// Whether `label` is listed.
    #[must_use]
    pub fn contains(&self, label: &str) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(label)
    }

    /// All labels, sorted.
    #[must_use]
    pub fn labels(&self) -> Vec<String> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// A copy of the current contents.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, Option<String>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replace_is_visible_through_every_clone() {
        let lookup = Lookup::from_entries(BTreeMap::from([(
            "Praha".to_string(),
            Some("CZ010".to_string()),
        )]));
        let held_by_form = lookup.clone();

        lookup.replace(BTreeMap::from([
            ("Novák, Jan".to_string(), Some("Novák, Jan".to_string())),
            ("Dvořák, Petr".to_string(), None),
        ]));

        assert_eq!(held_by_form.len(), 2);
        assert!(!held_by_form.contains("Praha"));
        assert_eq!(held_by_form.labels(), ["Dvořák, Petr", "Novák, Jan"]);
    }

    #[test]
    fn labels_without_code_resolve_to_themselves() {
        let lookup = Lookup::from_entries(BTreeMap::from([
            ("Středověk".to_string(), Some("HES-000123".to_string())),
            ("Neurčeno".to_string(), None),
        ]));

        assert_eq!(lookup.resolve("Středověk"), "HES-000123");
        assert_eq!(lookup.resolve("Neurčeno"), "Neurčeno");
        assert_eq!(lookup.resolve("Neznámý"), "Neznámý");
        assert!(lookup.code("Neurčeno").is_none());
    }
}
