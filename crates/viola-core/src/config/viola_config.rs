//! Configuration types for viola
//!
//! `ViolaConfiguration` is what a single declarative file (or the `viola`
//! field of a manifest) deserializes into. Every field is optional so that a
//! file only overrides what it actually sets.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One declarative configuration source
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ViolaConfiguration {
    /// JSON schema reference, ignored by the resolver
    #[serde(rename = "$schema", skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    /// Stop the upward directory walk at this file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<bool>,

    /// Directories or globs to lint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include: Option<Vec<String>>,

    /// Directories or globs to leave out
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclude: Option<Vec<String>>,

    /// File extensions handed to the engine
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Vec<String>>,

    /// Plugin specifiers: package identifiers or local paths
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plugins: Option<Vec<String>>,

    /// Presets merged in below this file
    #[serde(alias = "extends", skip_serializing_if = "Option::is_none")]
    pub inherit: Option<Vec<String>>,

    /// Linter id -> option bag
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linter_config: Option<IndexMap<String, serde_json::Value>>,

    /// Linters skipped for every file this configuration covers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip: Option<Vec<String>>,

    /// Severity overrides keyed by issue kind or linter id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<IndexMap<String, Severity>>,

    /// Glob pattern -> partial override
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scopes: Option<IndexMap<String, ScopeOverride>>,
}

/// Partial configuration applied to files matching a glob
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScopeOverride {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<IndexMap<String, Severity>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub linter_config: Option<IndexMap<String, serde_json::Value>>,
}

/// Issue severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Disable the issue kind
    Off,
    /// Informational message
    Info,
    /// Warning (doesn't fail the run)
    #[serde(alias = "warning")]
    Warn,
    /// Error (fails the run)
    Error,
}

impl ViolaConfiguration {
    /// Parse a JSON or JSONC document
    pub fn from_jsonc(content: &str) -> Result<Self, String> {
        json5::from_str(content).map_err(|e| e.to_string())
    }

    /// The part of this configuration that can live inside a scope
    pub fn scope_part(&self) -> ScopeOverride {
        ScopeOverride {
            skip: self.skip.clone(),
            severity: self.severity.clone(),
            linter_config: self.linter_config.clone(),
        }
    }
}

impl ScopeOverride {
    pub fn is_empty(&self) -> bool {
        self.skip.as_ref().is_none_or(|s| s.is_empty())
            && self.severity.as_ref().is_none_or(|s| s.is_empty())
            && self.linter_config.as_ref().is_none_or(|c| c.is_empty())
    }

    /// Whether `linter` is skipped by this override
    pub fn skips(&self, linter: &str) -> bool {
        self.skip
            .as_ref()
            .is_some_and(|skip| skip.iter().any(|id| id == linter))
    }
}
