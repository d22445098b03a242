//! Plugin module shapes and discovery results
//!
//! A plugin module can expose its linters in several ways: a single linter,
//! an array, an object with a `linters` field, or a `default` export wrapping
//! any of those. [`PluginExport`] names each shape and [`flatten`] turns any
//! of them into a flat list of linters.

use crate::error::ViolaError;
use crate::linter::LinterDescriptor;
use crate::result::{Result, ResultExt};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// What a plugin module exports
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum PluginExport {
    /// A linter exported directly
    Linter(LinterDescriptor),
    /// An array of exports
    Many(Vec<PluginExport>),
    /// An object carrying a `linters` field
    Collection { linters: Vec<PluginExport> },
    /// A module whose linters sit under its default export
    Default { default: Box<PluginExport> },
    /// Anything else; contributes no linters
    Unrecognized(serde_json::Value),
}

/// Flatten any export shape into its linters, in declaration order
pub fn flatten(export: PluginExport) -> Vec<LinterDescriptor> {
    let mut linters = Vec::new();
    flatten_into(export, &mut linters);
    linters
}

fn flatten_into(export: PluginExport, out: &mut Vec<LinterDescriptor>) {
    match export {
        PluginExport::Linter(linter) => out.push(linter),
        PluginExport::Many(items) | PluginExport::Collection { linters: items } => {
            for item in items {
                flatten_into(item, out);
            }
        }
        PluginExport::Default { default } => flatten_into(*default, out),
        PluginExport::Unrecognized(value) => {
            tracing::debug!("Ignoring export that is not a linter: {}", value);
        }
    }
}

/// One plugin as reported by the engine's discovery step
#[derive(Debug, Clone, Deserialize)]
pub struct DiscoveredPlugin {
    pub specifier: String,
    #[serde(default)]
    pub exports: Option<PluginExport>,
    /// Import or evaluation failure
    #[serde(default)]
    pub error: Option<String>,
}

/// Raw discovery reply, before flattening
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DiscoveryReply {
    pub plugins: Vec<DiscoveredPlugin>,
    pub bundles: IndexMap<String, Vec<String>>,
    pub presets: IndexMap<String, serde_json::Value>,
}

/// A plugin that could not be loaded
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PluginFailure {
    pub specifier: String,
    pub message: String,
}

/// Linters, bundles and presets found for a set of specifiers
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    pub linters: Vec<LinterDescriptor>,
    /// Bundle name -> linter ids
    pub bundles: IndexMap<String, Vec<String>>,
    /// Preset name -> configuration published by a plugin
    pub presets: IndexMap<String, serde_json::Value>,
    pub failures: Vec<PluginFailure>,
}

impl DiscoveredPlugin {
    /// Linters of this plugin, or a plugin error if it yields none
    pub fn into_linters(self) -> Result<Vec<LinterDescriptor>> {
        if let Some(message) = self.error {
            return Err(ViolaError::plugin_error(self.specifier, message));
        }

        let linters = self.exports.map(flatten).unwrap_or_default();
        if linters.is_empty() {
            return Err(ViolaError::plugin_error(
                self.specifier,
                "module exports no linters",
            ));
        }

        let specifier = self.specifier;
        Ok(linters
            .into_iter()
            .map(|linter| match linter.source {
                Some(_) => linter,
                None => linter.with_source(specifier.clone()),
            })
            .collect())
    }
}

impl Discovery {
    /// Flatten every plugin of a reply, skipping the ones that failed
    pub fn from_reply(reply: DiscoveryReply) -> Result<Self> {
        let mut discovery = Discovery {
            bundles: reply.bundles,
            presets: reply.presets,
            ..Default::default()
        };

        for plugin in reply.plugins {
            let specifier = plugin.specifier.clone();
            let loaded = plugin.into_linters();
            if let Err(err) = &loaded {
                discovery.failures.push(PluginFailure {
                    specifier,
                    message: err.to_string(),
                });
            }
            if let Some(linters) = loaded.skip_failed_plugin()? {
                discovery.linters.extend(linters);
            }
        }

        Ok(discovery)
    }

    pub fn is_empty(&self) -> bool {
        self.linters.is_empty()
    }
}
