//! Configuration merging logic
//!
//! Every `merge_with` keeps the values of `self` (the higher-precedence
//! source) and only fills in what `other` adds.

use super::viola_config::*;
use indexmap::IndexMap;
use serde_json::Value;

impl ViolaConfiguration {
    /// Merge a lower-precedence config into this one (current takes precedence)
    ///
    /// - Lists are unioned, current entries first, duplicates dropped
    /// - `linterConfig` is deep-merged per linter id
    /// - `severity` and `scopes` are keyed merges
    /// - `$schema`, `root` and `inherit` of `other` are file-specific and are
    ///   only taken when this config has none
    pub fn merge_with(&mut self, other: ViolaConfiguration) {
        if self.schema.is_none() {
            self.schema = other.schema;
        }
        if self.root.is_none() {
            self.root = other.root;
        }

        union_list(&mut self.include, other.include);
        union_list(&mut self.exclude, other.exclude);
        union_list(&mut self.extensions, other.extensions);
        union_list(&mut self.plugins, other.plugins);
        union_list(&mut self.inherit, other.inherit);
        union_list(&mut self.skip, other.skip);

        merge_options(&mut self.linter_config, other.linter_config);
        merge_severity(&mut self.severity, other.severity);

        if let Some(other_scopes) = other.scopes {
            let scopes = self.scopes.get_or_insert_with(IndexMap::new);
            for (pattern, scope) in other_scopes {
                match scopes.get_mut(&pattern) {
                    Some(existing) => existing.merge_with(scope),
                    None => {
                        scopes.insert(pattern, scope);
                    }
                }
            }
        }
    }
}

impl ScopeOverride {
    /// Merge a broader (or lower-precedence) override into this one
    pub fn merge_with(&mut self, other: ScopeOverride) {
        union_list(&mut self.skip, other.skip);
        merge_severity(&mut self.severity, other.severity);
        merge_options(&mut self.linter_config, other.linter_config);
    }
}

/// Append the entries of `source` that `target` doesn't already contain
pub(crate) fn union_list(target: &mut Option<Vec<String>>, source: Option<Vec<String>>) {
    let Some(source) = source else {
        return;
    };

    match target {
        Some(target) => {
            for entry in source {
                if !target.contains(&entry) {
                    target.push(entry);
                }
            }
        }
        None => {
            let mut deduped: Vec<String> = Vec::with_capacity(source.len());
            for entry in source {
                if !deduped.contains(&entry) {
                    deduped.push(entry);
                }
            }
            *target = Some(deduped);
        }
    }
}

/// Drop repeated entries, keeping the first occurrence
pub fn dedupe(list: Vec<String>) -> Vec<String> {
    let mut out = None;
    union_list(&mut out, Some(list));
    out.unwrap_or_default()
}

fn merge_severity(
    target: &mut Option<IndexMap<String, Severity>>,
    source: Option<IndexMap<String, Severity>>,
) {
    if let Some(source_map) = source {
        let target_map = target.get_or_insert_with(IndexMap::new);
        for (key, severity) in source_map {
            target_map.entry(key).or_insert(severity);
        }
    }
}

pub(crate) fn merge_options(
    target: &mut Option<IndexMap<String, Value>>,
    source: Option<IndexMap<String, Value>>,
) {
    if let Some(source_map) = source {
        let target_map = target.get_or_insert_with(IndexMap::new);
        for (linter, options) in source_map {
            match target_map.get_mut(&linter) {
                Some(existing) => merge_json(existing, options),
                None => {
                    target_map.insert(linter, options);
                }
            }
        }
    }
}

/// Deep merge of option bags; `target` wins on conflicting leaves
pub fn merge_json(target: &mut Value, source: Value) {
    // Scalars and arrays from the higher-precedence source are kept as-is
    if let (Value::Object(target), Value::Object(source)) = (target, source) {
        for (key, value) in source {
            match target.get_mut(&key) {
                Some(existing) => merge_json(existing, value),
                None => {
                    target.insert(key, value);
                }
            }
        }
    }
}
