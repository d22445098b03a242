//! Configuration file discovery and loading

use super::resolved::{ConfigSource, LoadedConfig, ResolvedConfig, SourceKind};
use super::viola_config::{ScopeOverride, ViolaConfiguration};
use crate::error::ViolaError;
use crate::result::Result;
use indexmap::IndexMap;
use std::fs;
use std::path::{Path, PathBuf};
use glob::Pattern;
use walkdir::WalkDir;

/// Environment variable naming a configuration file
pub const CONFIG_ENV_VAR: &str = "VIOLA_CONFIG";

/// Declarative config file names, in per-directory priority order
pub const DECLARATIVE_FILES: &[&str] = &[".violarc.json", ".violarc.jsonc", "viola.jsonc", "viola.json"];

/// Project manifests that may embed a `viola` field
pub const MANIFEST_FILES: &[&str] = &["deno.json", "deno.jsonc", "package.json"];

/// Module-style (programmatic) config file names
pub const MODULE_FILES: &[&str] = &["viola.config.ts", "viola.config.js", "viola.config.mjs"];

const MODULE_EXTENSIONS: &[&str] = &["ts", "mts", "tsx", "js", "mjs"];

/// Directories never scanned for subdirectory configs
const SKIPPED_DIRECTORIES: &[&str] = &["node_modules", "target", "dist", "vendor", "coverage"];

/// Locates presets referenced by package identifier
pub trait PresetResolver: Send + Sync {
    /// Path of the preset's configuration file, if it can be found on disk
    fn resolve(&self, name: &str, from_dir: &Path) -> Option<PathBuf>;
}

/// Looks for `node_modules/<name>/viola.json[c]` from `from_dir` upward
#[derive(Debug, Default, Clone, Copy)]
pub struct NodeModulesPresets;

impl PresetResolver for NodeModulesPresets {
    fn resolve(&self, name: &str, from_dir: &Path) -> Option<PathBuf> {
        from_dir.ancestors().find_map(|dir| {
            let package_dir = dir.join("node_modules").join(name);
            ["viola.json", "viola.jsonc"]
                .iter()
                .map(|file| package_dir.join(file))
                .find(|candidate| candidate.is_file())
        })
    }
}

/// Where the environment override comes from
#[derive(Debug, Clone)]
enum EnvOverride {
    Process,
    Fixed(Option<PathBuf>),
}

/// Resolves the layered configuration of a project
pub struct ConfigResolver {
    env: EnvOverride,
    presets: Box<dyn PresetResolver>,
    scan_subdirectories: bool,
}

impl Default for ConfigResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigResolver {
    pub fn new() -> Self {
        Self {
            env: EnvOverride::Process,
            presets: Box::new(NodeModulesPresets),
            scan_subdirectories: true,
        }
    }

    /// Use a fixed environment override instead of reading the process env
    pub fn with_env_path(mut self, path: Option<PathBuf>) -> Self {
        self.env = EnvOverride::Fixed(path);
        self
    }

    pub fn with_preset_resolver(mut self, presets: impl PresetResolver + 'static) -> Self {
        self.presets = Box::new(presets);
        self
    }

    pub fn with_subdirectory_scan(mut self, enabled: bool) -> Self {
        self.scan_subdirectories = enabled;
        self
    }

    /// Resolve the configuration for `project_root`
    ///
    /// Precedence, highest first: explicit path, environment variable,
    /// declarative files from the project root upward (nearest wins), the
    /// `viola` field of the nearest manifest. Declarative files below the
    /// project root contribute scope overrides for their subtree.
    pub fn resolve(&self, project_root: &Path, explicit: Option<&Path>) -> Result<LoadedConfig> {
        let root = canonical_root(project_root)?;

        // Both lists run highest precedence first and are reversed at the end
        let mut layers: Vec<ViolaConfiguration> = Vec::new();
        let mut sources: Vec<ConfigSource> = Vec::new();
        let mut seen: Vec<PathBuf> = Vec::new();
        let mut module: Option<PathBuf> = None;

        if let Some(path) = explicit {
            let path = absolute(path)?;
            if !path.is_file() {
                return Err(ViolaError::config_error(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            self.add_top_level(&path, SourceKind::ExplicitFlag, &mut module, &mut layers, &mut sources, &mut seen)?;
        }

        if let Some(path) = self.env_path()? {
            let already_read = path
                .canonicalize()
                .is_ok_and(|canonical| seen.contains(&canonical));
            if already_read {
                tracing::debug!("{} names the --config file, reading it once", CONFIG_ENV_VAR);
            } else if path.is_file() {
                self.add_top_level(
                    &path,
                    SourceKind::EnvironmentVariable,
                    &mut module,
                    &mut layers,
                    &mut sources,
                    &mut seen,
                )?;
            } else {
                tracing::warn!(
                    "Ignoring {}: {} does not exist",
                    CONFIG_ENV_VAR,
                    path.display()
                );
            }
        }

        // Directory of the `root: true` file, if the walk stopped early
        let mut boundary: Option<&Path> = None;
        for dir in root.ancestors() {
            let Some(path) = find_declarative(dir) else {
                continue;
            };
            if seen.contains(&path) {
                continue;
            }
            let (config, layer_sources) = self.load_layer(&path, SourceKind::DeclarativeFile, &mut vec![])?;
            let stop = config.root == Some(true);
            seen.push(path);
            layers.push(config);
            sources.extend(layer_sources);
            if stop {
                tracing::debug!("Config has root: true, stopping search at {}", dir.display());
                boundary = Some(dir);
                break;
            }
        }

        if let Some((path, config)) = find_manifest_field(&root, boundary)? {
            tracing::debug!("Found viola field in manifest: {}", path.display());
            let base_dir = path.parent().unwrap_or(&root).to_path_buf();
            let (config, preset_sources) = self.expand_inherit(config, &base_dir, &mut vec![path.clone()])?;
            layers.push(config);
            sources.push(ConfigSource::new(path, SourceKind::ManifestField));
            sources.extend(preset_sources);
        }

        if module.is_none() {
            module = find_module(&root);
            if let Some(path) = &module {
                sources.insert(0, ConfigSource::new(path.clone(), SourceKind::ProgrammaticModule));
            }
        }

        let mut merged = ViolaConfiguration::default();
        for layer in layers {
            merged.merge_with(layer);
        }

        let mut scoped_sources = Vec::new();
        let subdirectory_scopes = if self.scan_subdirectories {
            self.scan_subdirectory_scopes(&root, &seen, &mut scoped_sources)?
        } else {
            IndexMap::new()
        };

        sources.reverse();
        sources.extend(scoped_sources);

        for source in &sources {
            tracing::debug!("Config source [{}]: {}", source.kind, source.path.display());
        }

        Ok(LoadedConfig {
            config: ResolvedConfig::from_merged(merged, subdirectory_scopes),
            sources,
            module,
        })
    }

    /// Find a module-style config without resolving anything else
    ///
    /// Used to decide up front whether the cross-origin bridge is needed.
    pub fn locate_module(&self, project_root: &Path, explicit: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            let path = absolute(path)?;
            if is_module_path(&path) && path.is_file() {
                return Ok(Some(path));
            }
        }
        if let Some(path) = self.env_path()?
            && is_module_path(&path)
            && path.is_file()
        {
            return Ok(Some(path));
        }
        Ok(find_module(&canonical_root(project_root)?))
    }

    /// Load a single file and expand its `inherit` presets
    ///
    /// Returns the merged configuration and its sources, highest first: the
    /// file itself, then each preset just below it.
    pub fn load_layer(
        &self,
        path: &Path,
        kind: SourceKind,
        chain: &mut Vec<PathBuf>,
    ) -> Result<(ViolaConfiguration, Vec<ConfigSource>)> {
        let canonical = path
            .canonicalize()
            .map_err(|e| ViolaError::io_error(path, e))?;
        if chain.contains(&canonical) {
            return Err(ViolaError::config_error(format!(
                "Circular inherit: {} is inherited by itself",
                canonical.display()
            )));
        }

        let config = load_from_file(&canonical)?;
        tracing::debug!("Loaded config from: {}", canonical.display());

        let base_dir = canonical
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        chain.push(canonical.clone());
        let expanded = self.expand_inherit(config, &base_dir, chain);
        chain.pop();
        let (config, preset_sources) = expanded?;

        let mut sources = vec![ConfigSource::new(canonical, kind)];
        sources.extend(preset_sources);
        Ok((config, sources))
    }

    /// Merge every resolvable preset of `config` underneath it
    ///
    /// Presets that cannot be found on disk stay in `inherit` for the engine.
    fn expand_inherit(
        &self,
        mut config: ViolaConfiguration,
        base_dir: &Path,
        chain: &mut Vec<PathBuf>,
    ) -> Result<(ViolaConfiguration, Vec<ConfigSource>)> {
        let declared = config.inherit.take().unwrap_or_default();
        let mut unresolved = Vec::new();
        let mut presets = Vec::new();
        let mut sources = Vec::new();

        for name in declared {
            match self.locate_preset(&name, base_dir)? {
                Some(preset_path) => {
                    let (preset, preset_sources) = self.load_layer(&preset_path, SourceKind::Preset, chain)?;
                    presets.push(preset);
                    sources.extend(preset_sources);
                }
                None => {
                    tracing::debug!("Preset '{}' left for the engine to resolve", name);
                    unresolved.push(name);
                }
            }
        }

        if !unresolved.is_empty() {
            config.inherit = Some(unresolved);
        }
        // Earlier presets take precedence over later ones
        for preset in presets {
            config.merge_with(preset);
        }

        Ok((config, sources))
    }

    fn locate_preset(&self, name: &str, base_dir: &Path) -> Result<Option<PathBuf>> {
        if is_path_like(name) {
            let path = base_dir.join(name);
            if !path.is_file() {
                return Err(ViolaError::config_error(format!(
                    "Inherited config not found: {}",
                    path.display()
                )));
            }
            return Ok(Some(path));
        }
        Ok(self.presets.resolve(name, base_dir))
    }

    fn add_top_level(
        &self,
        path: &Path,
        kind: SourceKind,
        module: &mut Option<PathBuf>,
        layers: &mut Vec<ViolaConfiguration>,
        sources: &mut Vec<ConfigSource>,
        seen: &mut Vec<PathBuf>,
    ) -> Result<()> {
        if is_module_path(path) {
            if module.is_none() {
                *module = Some(path.to_path_buf());
                sources.push(ConfigSource::new(path, SourceKind::ProgrammaticModule));
            }
            return Ok(());
        }

        let (config, layer_sources) = self.load_layer(path, kind, &mut vec![])?;
        if let Some(first) = layer_sources.first() {
            seen.push(first.path.clone());
        }
        layers.push(config);
        sources.extend(layer_sources);
        Ok(())
    }

    /// Turn declarative files below the project root into scope overrides
    fn scan_subdirectory_scopes(
        &self,
        root: &Path,
        seen: &[PathBuf],
        sources: &mut Vec<ConfigSource>,
    ) -> Result<IndexMap<String, ScopeOverride>> {
        let mut scopes = IndexMap::new();

        let walker = WalkDir::new(root)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !entry.file_type().is_dir() || !is_skipped_directory(entry.file_name()));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::debug!("Skipping unreadable entry during config scan: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_dir() {
                continue;
            }
            let Some(path) = find_declarative(entry.path()) else {
                continue;
            };
            if seen.contains(&path) {
                continue;
            }

            let relative = entry
                .path()
                .strip_prefix(root)
                .unwrap_or(entry.path())
                .to_string_lossy()
                .replace('\\', "/");
            // Directory names may contain glob metacharacters
            let relative = Pattern::escape(&relative);
            let (config, layer_sources) = self.load_layer(&path, SourceKind::DeclarativeFile, &mut vec![])?;
            let subtree = format!("{relative}/**");

            if config.include.is_some() || config.plugins.is_some() {
                tracing::debug!(
                    "{}: only skip, severity, linterConfig and scopes apply to a subdirectory",
                    path.display()
                );
            }

            let scope = config.scope_part();
            if !scope.is_empty() {
                insert_more_specific(&mut scopes, subtree.clone(), scope);
            }
            for (pattern, nested) in config.scopes.unwrap_or_default() {
                insert_more_specific(&mut scopes, format!("{relative}/{pattern}"), nested);
            }

            sources.extend(layer_sources.into_iter().map(|source| source.scoped(subtree.clone())));
        }

        Ok(scopes)
    }

    fn env_path(&self) -> Result<Option<PathBuf>> {
        let raw = match &self.env {
            EnvOverride::Process => std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from),
            EnvOverride::Fixed(path) => path.clone(),
        };
        match raw {
            Some(path) if !path.as_os_str().is_empty() => absolute(&path).map(Some),
            _ => Ok(None),
        }
    }
}

/// Load configuration from a specific file
///
/// Supports both JSON and JSONC (JSON with comments and trailing commas)
pub fn load_from_file(path: &Path) -> Result<ViolaConfiguration> {
    let content = fs::read_to_string(path).map_err(|e| ViolaError::io_error(path, e))?;
    ViolaConfiguration::from_jsonc(&content).map_err(|message| ViolaError::config_parse(path, message))
}

/// Whether a path names a module-style (programmatic) config
pub fn is_module_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| MODULE_EXTENSIONS.contains(&ext))
}

fn is_path_like(name: &str) -> bool {
    name.starts_with("./")
        || name.starts_with("../")
        || Path::new(name).is_absolute()
        || name.ends_with(".json")
        || name.ends_with(".jsonc")
}

fn is_skipped_directory(name: &std::ffi::OsStr) -> bool {
    let name = name.to_string_lossy();
    name.starts_with('.') || SKIPPED_DIRECTORIES.contains(&name.as_ref())
}

fn find_declarative(dir: &Path) -> Option<PathBuf> {
    DECLARATIVE_FILES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
}

fn find_module(root: &Path) -> Option<PathBuf> {
    MODULE_FILES
        .iter()
        .map(|name| root.join(name))
        .find(|path| path.is_file())
}

/// The `viola` field of the nearest manifest that has one
///
/// Directories above `boundary` are not searched.
fn find_manifest_field(root: &Path, boundary: Option<&Path>) -> Result<Option<(PathBuf, ViolaConfiguration)>> {
    for dir in root.ancestors() {
        for name in MANIFEST_FILES {
            let path = dir.join(name);
            if !path.is_file() {
                continue;
            }
            let content = fs::read_to_string(&path).map_err(|e| ViolaError::io_error(&path, e))?;
            let manifest: serde_json::Value =
                json5::from_str(&content).map_err(|e| ViolaError::config_parse(&path, e.to_string()))?;
            if let Some(field) = manifest.get("viola") {
                let config = serde_json::from_value(field.clone())
                    .map_err(|e| ViolaError::config_parse(&path, format!("invalid \"viola\" field: {e}")))?;
                return Ok(Some((path, config)));
            }
        }
        if boundary == Some(dir) {
            break;
        }
    }
    Ok(None)
}

fn insert_more_specific(scopes: &mut IndexMap<String, ScopeOverride>, pattern: String, scope: ScopeOverride) {
    match scopes.get_mut(&pattern) {
        Some(existing) => {
            let mut scope = scope;
            scope.merge_with(existing.clone());
            *existing = scope;
        }
        None => {
            scopes.insert(pattern, scope);
        }
    }
}

fn canonical_root(project_root: &Path) -> Result<PathBuf> {
    project_root.canonicalize().map_err(|e| {
        ViolaError::config_error(format!(
            "Invalid project root '{}': {e}",
            project_root.display()
        ))
    })
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().map_err(|e| ViolaError::io_error(".", e))?;
    Ok(cwd.join(path))
}
