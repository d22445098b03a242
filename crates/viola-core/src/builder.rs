//! Programmatic configuration produced by module-style config files
//!
//! A `viola.config.ts` builds one of these with already constructed linters,
//! rule predicates and grammars. Linters registered this way take priority
//! over plugin specifiers.

use crate::config::Severity;
use crate::linter::LinterDescriptor;
use crate::plugin::{PluginExport, flatten};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Result of evaluating a module-style configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BuilderConfig {
    #[serde(deserialize_with = "deserialize_linters")]
    pub linters: Vec<LinterDescriptor>,
    pub rules: Vec<RulePredicate>,
    pub grammars: GrammarRegistry,
}

/// A rule evaluated by the engine over reported issues
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RulePredicate {
    pub id: String,
    /// Issue kinds the rule applies to; empty means every kind
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub kinds: Vec<String>,
    /// Engine-side condition, passed through untouched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Language name -> grammar used to parse its files
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GrammarRegistry {
    grammars: IndexMap<String, Grammar>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Grammar {
    /// Module specifier of the parser
    pub module: String,
    #[serde(default)]
    pub extensions: Vec<String>,
}

impl BuilderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a constructed linter
    pub fn add(mut self, linter: LinterDescriptor) -> Self {
        self.linters.push(linter);
        self
    }

    /// Add every linter of a plugin export, whatever its shape
    pub fn use_plugin(mut self, export: PluginExport) -> Self {
        self.linters.extend(flatten(export));
        self
    }

    pub fn rule(mut self, rule: RulePredicate) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn grammar(mut self, language: impl Into<String>, grammar: Grammar) -> Self {
        self.grammars.insert(language, grammar);
        self
    }

    pub fn has_linters(&self) -> bool {
        !self.linters.is_empty()
    }

    /// Interpret a serialized module namespace
    ///
    /// The builder may be the module's default export or the namespace itself.
    pub fn from_module_value(value: Value) -> Result<Self, String> {
        let value = match value {
            Value::Object(mut map) if !map.contains_key("linters") && map.contains_key("default") => {
                map.remove("default").unwrap_or(Value::Null)
            }
            other => other,
        };
        serde_json::from_value(value).map_err(|e| format!("not a builder configuration: {e}"))
    }
}

impl RulePredicate {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kinds: Vec::new(),
            when: None,
            severity: None,
            message: None,
        }
    }

    pub fn for_kind(mut self, kind: impl Into<String>) -> Self {
        self.kinds.push(kind.into());
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }
}

impl GrammarRegistry {
    /// Register a grammar, replacing any earlier one for the language
    pub fn insert(&mut self, language: impl Into<String>, grammar: Grammar) {
        let language = language.into();
        if self.grammars.contains_key(&language) {
            tracing::debug!("Replacing grammar for '{}'", language);
        }
        self.grammars.insert(language, grammar);
    }

    pub fn get(&self, language: &str) -> Option<&Grammar> {
        self.grammars.get(language)
    }

    /// Grammar handling files with `extension`
    pub fn for_extension(&self, extension: &str) -> Option<(&str, &Grammar)> {
        let extension = extension.trim_start_matches('.');
        self.grammars
            .iter()
            .find(|(_, grammar)| {
                grammar
                    .extensions
                    .iter()
                    .any(|ext| ext.trim_start_matches('.') == extension)
            })
            .map(|(language, grammar)| (language.as_str(), grammar))
    }

    pub fn len(&self) -> usize {
        self.grammars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grammars.is_empty()
    }
}

fn deserialize_linters<'de, D>(deserializer: D) -> Result<Vec<LinterDescriptor>, D::Error>
where
    D: Deserializer<'de>,
{
    let exports = Vec::<PluginExport>::deserialize(deserializer)?;
    Ok(exports.into_iter().flat_map(flatten).collect())
}
