//! Resolution results: the merged configuration and where it came from

use super::merge::merge_options;
use super::viola_config::{ScopeOverride, ViolaConfiguration};
use glob::{MatchOptions, Pattern};
use indexmap::IndexMap;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Scope key used for settings that apply to every file
pub const GLOBAL_SCOPE: &str = "**";

/// The merged configuration for one invocation
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedConfig {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub extensions: Vec<String>,
    pub plugins: Vec<String>,
    /// Preset names left for the engine to resolve
    pub inherit: Vec<String>,
    pub linter_config: IndexMap<String, serde_json::Value>,
    /// Glob -> override, evaluated per file by [`ResolvedConfig::scope_for`]
    pub scopes: IndexMap<String, ScopeOverride>,
}

/// Which kind of location supplied a configuration source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    ExplicitFlag,
    EnvironmentVariable,
    DeclarativeFile,
    ManifestField,
    ProgrammaticModule,
    Preset,
}

/// One consulted configuration location
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigSource {
    pub path: PathBuf,
    #[serde(rename = "type")]
    pub kind: SourceKind,
    /// Set when the file only contributes a scope override
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

/// Everything the resolver found for a project
#[derive(Debug, Clone, Default)]
pub struct LoadedConfig {
    pub config: ResolvedConfig,
    /// Consulted sources, lowest precedence first
    pub sources: Vec<ConfigSource>,
    /// Module-style configuration file, if one exists
    pub module: Option<PathBuf>,
}

impl ConfigSource {
    pub fn new(path: impl Into<PathBuf>, kind: SourceKind) -> Self {
        Self {
            path: path.into(),
            kind,
            scope: None,
        }
    }

    /// Mark this source as contributing only to `scope`
    pub fn scoped(self, scope: impl Into<String>) -> Self {
        Self {
            scope: Some(scope.into()),
            ..self
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SourceKind::ExplicitFlag => "explicit-flag",
            SourceKind::EnvironmentVariable => "environment-variable",
            SourceKind::DeclarativeFile => "declarative-file",
            SourceKind::ManifestField => "manifest-field",
            SourceKind::ProgrammaticModule => "programmatic-module",
            SourceKind::Preset => "preset",
        };
        f.write_str(name)
    }
}

impl ResolvedConfig {
    /// Build the resolved view from the merged project-level configuration
    /// plus the scopes contributed by subdirectory files.
    ///
    /// Project-level `skip`/`severity` become the global `**` scope.
    pub(crate) fn from_merged(
        merged: ViolaConfiguration,
        subdirectory_scopes: IndexMap<String, ScopeOverride>,
    ) -> Self {
        let mut scopes = IndexMap::new();

        let global = ScopeOverride {
            skip: merged.skip.clone(),
            severity: merged.severity.clone(),
            linter_config: None,
        };
        if !global.is_empty() {
            scopes.insert(GLOBAL_SCOPE.to_string(), global);
        }

        for (pattern, scope) in merged.scopes.unwrap_or_default() {
            insert_scope(&mut scopes, pattern, scope);
        }
        for (pattern, scope) in subdirectory_scopes {
            insert_scope(&mut scopes, pattern, scope);
        }

        Self {
            include: merged.include.unwrap_or_default(),
            exclude: merged.exclude.unwrap_or_default(),
            extensions: merged.extensions.unwrap_or_default(),
            plugins: merged.plugins.unwrap_or_default(),
            inherit: merged.inherit.unwrap_or_default(),
            linter_config: merged.linter_config.unwrap_or_default(),
            scopes,
        }
    }

    /// Effective override for a file, relative to the project root
    ///
    /// Matching scopes compose from broadest to most specific: the more
    /// specific one wins on overlapping keys, `skip` lists union.
    pub fn scope_for(&self, relative_path: &Path) -> ScopeOverride {
        let path = relative_path.to_string_lossy().replace('\\', "/");
        let options = MatchOptions {
            case_sensitive: true,
            require_literal_separator: true,
            require_literal_leading_dot: false,
        };

        let mut matching: Vec<(usize, usize, &ScopeOverride)> = self
            .scopes
            .iter()
            .enumerate()
            .filter_map(|(index, (pattern, scope))| match Pattern::new(pattern) {
                Ok(compiled) if compiled.matches_with(&path, options) => {
                    Some((specificity(pattern), index, scope))
                }
                Ok(_) => None,
                Err(e) => {
                    tracing::warn!("Ignoring invalid scope pattern '{}': {}", pattern, e);
                    None
                }
            })
            .collect();

        // Most specific first, later declarations win ties
        matching.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.cmp(&a.1)));

        let mut effective = ScopeOverride::default();
        for (_, _, scope) in matching {
            effective.merge_with(scope.clone());
        }
        effective
    }

    /// Merge a preset published by a plugin below everything resolved so far
    ///
    /// The preset's own `plugins` and `inherit` are not followed: discovery
    /// has already happened by the time plugin presets are known.
    pub fn merge_preset(&mut self, name: &str, preset: ViolaConfiguration) {
        if preset.plugins.is_some() || preset.inherit.is_some() {
            tracing::debug!("Preset '{}': plugins and inherit are ignored", name);
        }

        extend_unique(&mut self.include, preset.include);
        extend_unique(&mut self.exclude, preset.exclude);
        extend_unique(&mut self.extensions, preset.extensions);

        let mut options = Some(std::mem::take(&mut self.linter_config));
        merge_options(&mut options, preset.linter_config);
        self.linter_config = options.unwrap_or_default();

        let global = ScopeOverride {
            skip: preset.skip,
            severity: preset.severity,
            linter_config: None,
        };
        if !global.is_empty() {
            match self.scopes.get_mut(GLOBAL_SCOPE) {
                Some(existing) => existing.merge_with(global),
                None => {
                    self.scopes.insert(GLOBAL_SCOPE.to_string(), global);
                }
            }
        }

        for (pattern, scope) in preset.scopes.unwrap_or_default() {
            match self.scopes.get_mut(&pattern) {
                Some(existing) => existing.merge_with(scope),
                None => {
                    self.scopes.insert(pattern, scope);
                }
            }
        }

        self.inherit.retain(|entry| entry != name);
    }
}

fn extend_unique(target: &mut Vec<String>, source: Option<Vec<String>>) {
    for entry in source.unwrap_or_default() {
        if !target.contains(&entry) {
            target.push(entry);
        }
    }
}

fn insert_scope(scopes: &mut IndexMap<String, ScopeOverride>, pattern: String, scope: ScopeOverride) {
    match scopes.shift_remove(&pattern) {
        // The later (more specific) contribution wins for the same pattern
        Some(existing) => {
            let mut scope = scope;
            scope.merge_with(existing);
            scopes.insert(pattern, scope);
        }
        None => {
            scopes.insert(pattern, scope);
        }
    }
}

/// Number of leading literal path segments in a glob
///
/// Escaped metacharacters (`[*]`, `[?]`, `[[]`, `[]]`) count as literal.
fn specificity(pattern: &str) -> usize {
    pattern
        .split('/')
        .take_while(|segment| {
            let unescaped = ["[*]", "[?]", "[[]", "[]]"]
                .iter()
                .fold(segment.to_string(), |acc, escaped| acc.replace(escaped, ""));
            !unescaped.contains(['*', '?', '[', '{'])
        })
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Severity;

    fn resolved(json: &str) -> ResolvedConfig {
        let merged = ViolaConfiguration::from_jsonc(json).unwrap();
        ResolvedConfig::from_merged(merged, IndexMap::new())
    }

    #[test]
    fn test_empty_configuration_resolves_to_empty_fields() {
        let config = ResolvedConfig::from_merged(ViolaConfiguration::default(), IndexMap::new());
        assert!(config.include.is_empty());
        assert!(config.plugins.is_empty());
        assert!(config.scopes.is_empty());
    }

    #[test]
    fn test_project_level_skip_becomes_global_scope() {
        let config = resolved(r#"{ "skip": ["similarity"] }"#);
        assert!(config.scopes.contains_key(GLOBAL_SCOPE));
        assert!(config.scope_for(Path::new("src/deep/file.ts")).skips("similarity"));
    }

    #[test]
    fn test_nested_scopes_compose() {
        let config = resolved(
            r#"{
                "scopes": {
                    "packages/**": {
                        "skip": ["naming"],
                        "severity": { "similarity/duplicate": "warn", "naming/long": "error" }
                    },
                    "packages/legacy/**": {
                        "skip": ["similarity"],
                        "severity": { "similarity/duplicate": "off" }
                    }
                }
            }"#,
        );

        let scope = config.scope_for(Path::new("packages/legacy/src/old.ts"));
        assert!(scope.skips("naming"));
        assert!(scope.skips("similarity"));
        let severity = scope.severity.unwrap();
        assert_eq!(severity["similarity/duplicate"], Severity::Off);
        assert_eq!(severity["naming/long"], Severity::Error);

        let scope = config.scope_for(Path::new("packages/core/mod.ts"));
        assert!(!scope.skips("similarity"));
        assert_eq!(
            scope.severity.unwrap()["similarity/duplicate"],
            Severity::Warn
        );
    }

    #[test]
    fn test_non_matching_file_gets_empty_scope() {
        let config = resolved(r#"{ "scopes": { "tests/*.ts": { "skip": ["naming"] } } }"#);
        assert!(config.scope_for(Path::new("src/main.ts")).is_empty());
        // `*` does not cross directories
        assert!(config.scope_for(Path::new("tests/unit/a.ts")).is_empty());
        assert!(config.scope_for(Path::new("tests/a.ts")).skips("naming"));
    }

    #[test]
    fn test_subdirectory_scope_wins_over_same_pattern() {
        let merged = ViolaConfiguration::from_jsonc(
            r#"{ "scopes": { "lib/**": { "severity": { "naming/long": "error" } } } }"#,
        )
        .unwrap();
        let mut sub = IndexMap::new();
        sub.insert(
            "lib/**".to_string(),
            ScopeOverride {
                severity: Some(IndexMap::from([("naming/long".to_string(), Severity::Info)])),
                ..Default::default()
            },
        );

        let config = ResolvedConfig::from_merged(merged, sub);
        let scope = config.scope_for(Path::new("lib/a.ts"));
        assert_eq!(scope.severity.unwrap()["naming/long"], Severity::Info);
    }

    #[test]
    fn test_escaped_segments_count_as_literal() {
        assert_eq!(specificity("lib/**"), 1);
        assert_eq!(specificity("fixtures[[]1[]]/**"), 1);
        assert_eq!(specificity("fixtures[[]1[]]/deep/*.ts"), 2);
        assert_eq!(specificity("*/deep"), 0);
    }

    #[test]
    fn test_plugin_preset_sits_below_project_config() {
        let mut config = resolved(
            r#"{
                "inherit": ["pkg-a/strict", "@acme/elsewhere"],
                "skip": ["docs"],
                "severity": { "naming/long": "warn" },
                "linterConfig": { "naming": { "style": "camel" } }
            }"#,
        );
        let preset = ViolaConfiguration::from_jsonc(
            r#"{
                "include": ["lib"],
                "plugins": ["pkg-extra"],
                "skip": ["similarity"],
                "severity": { "naming/long": "error", "naming/case": "error" },
                "linterConfig": { "naming": { "style": "snake", "maxLength": 30 } },
                "scopes": { "tests/**": { "skip": ["naming"] } }
            }"#,
        )
        .unwrap();

        config.merge_preset("pkg-a/strict", preset);

        assert_eq!(config.include, vec!["lib"]);
        assert!(config.plugins.is_empty());
        assert_eq!(config.inherit, vec!["@acme/elsewhere"]);
        assert_eq!(config.linter_config["naming"]["style"], "camel");
        assert_eq!(config.linter_config["naming"]["maxLength"], 30);

        let global = &config.scopes[GLOBAL_SCOPE];
        assert!(global.skips("docs") && global.skips("similarity"));
        let severity = global.severity.as_ref().unwrap();
        assert_eq!(severity["naming/long"], Severity::Warn);
        assert_eq!(severity["naming/case"], Severity::Error);
        assert!(config.scope_for(Path::new("tests/a.ts")).skips("naming"));
    }

    #[test]
    fn test_source_kind_names() {
        assert_eq!(SourceKind::ManifestField.to_string(), "manifest-field");
        let json = serde_json::to_value(ConfigSource::new("/p/viola.json", SourceKind::ExplicitFlag))
            .unwrap();
        assert_eq!(json["type"], "explicit-flag");
    }
}
