//! Configuration system for viola
//!
//! Configuration is layered. From highest to lowest precedence:
//! - an explicit path (`--config`)
//! - the `VIOLA_CONFIG` environment variable
//! - declarative files found from the project root upward, nearest first
//!   (`.violarc.json`, `.violarc.jsonc`, `viola.jsonc`, `viola.json`)
//! - the `viola` field of the nearest `deno.json`, `deno.jsonc` or `package.json`
//!
//! A file with `"root": true` ends the upward walk. Declarative files found
//! *below* the project root apply only to their own subtree and become scope
//! overrides.
//!
//! ## Presets
//!
//! `inherit` (or `extends`) pulls other configurations in just below the
//! declaring file:
//!
//! ```jsonc
//! {
//!   "inherit": ["./configs/base.json", "@acme/viola-preset"],
//!   "plugins": ["jsr:@hiisi/viola-default-lints"],
//!   "linterConfig": {
//!     "similar-functions": { "threshold": 0.85 }
//!   }
//! }
//! ```
//!
//! ## Scopes
//!
//! ```jsonc
//! {
//!   "scopes": {
//!     "tests/**": { "skip": ["naming"] },
//!     "packages/legacy/**": { "severity": { "similarity/duplicate": "off" } }
//!   }
//! }
//! ```
//!
//! Module-style configs (`viola.config.ts|js|mjs`) are only located here;
//! evaluating them is the job of [`crate::module`].

mod loader;
mod merge;
mod resolved;
mod viola_config;

pub use loader::{
    CONFIG_ENV_VAR, ConfigResolver, DECLARATIVE_FILES, MANIFEST_FILES, MODULE_FILES,
    NodeModulesPresets, PresetResolver, is_module_path, load_from_file,
};
pub use merge::{dedupe, merge_json};
pub use resolved::{ConfigSource, GLOBAL_SCOPE, LoadedConfig, ResolvedConfig, SourceKind};
pub use viola_config::{ScopeOverride, Severity, ViolaConfiguration};
