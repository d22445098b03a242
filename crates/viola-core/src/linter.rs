//! Linter descriptors and the registry handed to the engine

use crate::config::Severity;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A pluggable checker unit, identified by its id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinterDescriptor {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Issue kinds this linter can report
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog: Option<IssueCatalog>,

    /// Specifier or module the linter was loaded from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Declared issue kinds of one linter
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IssueCatalog {
    pub kinds: Vec<IssueKind>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueKind {
    pub id: String,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl LinterDescriptor {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: None,
            catalog: None,
            source: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_catalog(mut self, catalog: IssueCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Number of issue kinds in the catalog
    pub fn catalog_size(&self) -> usize {
        self.catalog.as_ref().map_or(0, |c| c.kinds.len())
    }
}

impl IssueCatalog {
    pub fn new(kinds: Vec<IssueKind>) -> Self {
        Self { kinds }
    }

    pub fn get(&self, id: &str) -> Option<&IssueKind> {
        self.kinds.iter().find(|kind| kind.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}

impl IssueKind {
    pub fn new(id: impl Into<String>, severity: Severity) -> Self {
        Self {
            id: id.into(),
            severity,
            description: None,
        }
    }
}

/// Registered linters for one invocation
///
/// Owned by the caller and passed to the engine explicitly, so separate
/// runs in one process never see each other's linters.
#[derive(Debug, Clone, Default)]
pub struct LinterRegistry {
    linters: IndexMap<String, LinterDescriptor>,
}

impl LinterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a linter, keeping the first registration of an id
    ///
    /// Returns `false` when the id was already registered.
    pub fn register(&mut self, linter: LinterDescriptor) -> bool {
        if self.linters.contains_key(&linter.id) {
            tracing::warn!(
                "Linter '{}' already registered, keeping existing",
                linter.id
            );
            return false;
        }
        tracing::debug!("Registered linter '{}'", linter.id);
        self.linters.insert(linter.id.clone(), linter);
        true
    }

    pub fn get(&self, id: &str) -> Option<&LinterDescriptor> {
        self.linters.get(id)
    }

    /// All linters in registration order
    pub fn get_all(&self) -> impl Iterator<Item = &LinterDescriptor> {
        self.linters.values()
    }

    pub fn ids(&self) -> Vec<String> {
        self.linters.keys().cloned().collect()
    }

    /// Issue catalogs keyed by linter id, for linters that declare one
    pub fn catalogs(&self) -> IndexMap<String, IssueCatalog> {
        self.linters
            .values()
            .filter_map(|linter| {
                linter
                    .catalog
                    .as_ref()
                    .map(|catalog| (linter.id.clone(), catalog.clone()))
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.linters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.linters.is_empty()
    }
}

impl Serialize for LinterRegistry {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.linters.values())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn naming() -> LinterDescriptor {
        LinterDescriptor::new("naming")
            .with_description("Checks identifier naming")
            .with_catalog(IssueCatalog::new(vec![
                IssueKind::new("naming/long", Severity::Warn),
                IssueKind::new("naming/case", Severity::Error),
            ]))
    }

    #[test]
    fn test_register_keeps_order_and_rejects_duplicates() {
        let mut registry = LinterRegistry::new();
        assert!(registry.register(LinterDescriptor::new("similarity")));
        assert!(registry.register(naming()));
        assert!(!registry.register(LinterDescriptor::new("naming")));

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.ids(), vec!["similarity", "naming"]);
        // First registration wins
        assert_eq!(registry.get("naming").unwrap().catalog_size(), 2);
    }

    #[test]
    fn test_catalogs_only_for_linters_that_declare_one() {
        let mut registry = LinterRegistry::new();
        registry.register(LinterDescriptor::new("similarity"));
        registry.register(naming());

        let catalogs = registry.catalogs();
        assert_eq!(catalogs.len(), 1);
        assert_eq!(
            catalogs["naming"].get("naming/case").unwrap().severity,
            Severity::Error
        );
    }

    #[test]
    fn test_descriptor_deserializes_from_engine_json() {
        let linter: LinterDescriptor = serde_json::from_value(json!({
            "id": "similarity",
            "description": "Finds near-duplicate functions",
            "catalog": [{ "id": "similarity/duplicate", "severity": "warn" }]
        }))
        .unwrap();

        assert_eq!(linter.id, "similarity");
        assert_eq!(linter.catalog_size(), 1);
        assert!(linter.source.is_none());
    }

    #[test]
    fn test_registry_serializes_as_list() {
        let mut registry = LinterRegistry::new();
        registry.register(LinterDescriptor::new("a"));
        registry.register(LinterDescriptor::new("b").with_source("./plugins/b.ts"));

        let value = serde_json::to_value(&registry).unwrap();
        assert_eq!(value, json!([{ "id": "a" }, { "id": "b", "source": "./plugins/b.ts" }]));
    }
}
