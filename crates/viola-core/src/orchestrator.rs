//! Run orchestration: CLI overrides, linter registration, engine run, exit code

use crate::builder::BuilderConfig;
use crate::config::{ConfigResolver, ConfigSource, ResolvedConfig, ViolaConfiguration, dedupe};
use crate::engine::{Engine, RunOptions};
use crate::error::ViolaError;
use crate::linter::LinterRegistry;
use crate::module::{
    BridgeModuleLoader, LocalModuleLoader, ModuleOutcome, ModuleStrategy, Origin, read_preloaded,
};
use crate::plugin::PluginFailure;
use crate::result::Result;
use indexmap::IndexMap;
use std::io::Write;
use std::path::PathBuf;

/// Directories linted when neither the CLI nor the config says otherwise
pub const DEFAULT_INCLUDE: &[&str] = &["src", "packages", "app"];

/// Options of one CLI invocation
#[derive(Debug, Clone, Default)]
pub struct RunArgs {
    pub project: PathBuf,
    pub config: Option<PathBuf>,
    pub include: Option<Vec<String>>,
    /// Replaces the configured plugins entirely
    pub plugins: Option<Vec<String>>,
    pub only: Option<Vec<String>>,
    pub skip: Option<Vec<String>>,
    pub report_only: bool,
    pub verbose: bool,
    pub list: bool,
    pub parallel: bool,
    /// Module evaluated by the bridge in a parent process
    pub preloaded_module: Option<PathBuf>,
}

/// User-facing output of a run
pub trait Reporter {
    /// Configuration sources, printed under `--verbose`
    fn sources(&mut self, sources: &[ConfigSource]);
    fn plugin_failure(&mut self, failure: &PluginFailure);
    /// Output of `--list`
    fn linters(&mut self, registry: &LinterRegistry);
    fn no_linters_to_list(&mut self);
    fn results(&mut self, formatted: &str);
    fn error(&mut self, error: &ViolaError, verbose: bool);
}

/// Drives one invocation from resolved options to an exit code
pub struct Orchestrator<E: Engine> {
    engine: E,
    resolver: ConfigResolver,
    origin: Origin,
    local: Box<dyn ModuleStrategy>,
    bridge: Box<dyn ModuleStrategy>,
}

impl<E: Engine> Orchestrator<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            resolver: ConfigResolver::new(),
            origin: Origin::detect(),
            local: Box::new(LocalModuleLoader),
            bridge: Box::new(BridgeModuleLoader::new()),
        }
    }

    pub fn with_resolver(mut self, resolver: ConfigResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_origin(mut self, origin: Origin) -> Self {
        self.origin = origin;
        self
    }

    pub fn with_bridge(mut self, bridge: impl ModuleStrategy + 'static) -> Self {
        self.bridge = Box::new(bridge);
        self
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Run and map every outcome to an exit code; never returns an error
    pub async fn run(&self, args: &RunArgs, reporter: &mut dyn Reporter) -> u8 {
        match self.execute(args, reporter).await {
            Ok(code) => code,
            Err(ViolaError::NoPlugins) if args.list => {
                reporter.no_linters_to_list();
                0
            }
            Err(err) => {
                tracing::debug!("Run failed: {:?}", err);
                reporter.error(&err, args.verbose);
                1
            }
        }
    }

    async fn execute(&self, args: &RunArgs, reporter: &mut dyn Reporter) -> Result<u8> {
        let project_root = args.project.canonicalize().map_err(|e| {
            ViolaError::config_error(format!(
                "Invalid project directory '{}': {e}",
                args.project.display()
            ))
        })?;
        let explicit = args.config.as_deref();

        let builder = match &args.preloaded_module {
            Some(preloaded) => Some(read_preloaded(preloaded)?),
            None => match self.resolver.locate_module(&project_root, explicit)? {
                Some(module) => match self.module_strategy().load(&module, &self.engine).await? {
                    ModuleOutcome::Loaded(builder) => Some(builder),
                    ModuleOutcome::Delegated(code) => return Ok(code),
                },
                None => None,
            },
        };

        let loaded = self.resolver.resolve(&project_root, explicit)?;
        if args.verbose {
            reporter.sources(&loaded.sources);
        }
        let mut config = loaded.config;

        let specifiers = match &args.plugins {
            Some(plugins) => dedupe(plugins.clone()),
            None => config.plugins.clone(),
        };

        let mut registry = LinterRegistry::new();
        let BuilderConfig {
            linters,
            rules,
            grammars,
        } = builder.unwrap_or_default();

        let mut bundles = IndexMap::new();
        let plugins = if !linters.is_empty() {
            tracing::debug!("Registering {} linter(s) from the config module", linters.len());
            for linter in linters {
                registry.register(linter);
            }
            // Specifiers would register the same linters a second time
            Vec::new()
        } else if !specifiers.is_empty() {
            let discovery = self
                .engine
                .discover_plugins(&specifiers, args.verbose)
                .await?;
            for failure in &discovery.failures {
                reporter.plugin_failure(failure);
            }
            for linter in discovery.linters {
                registry.register(linter);
            }
            apply_plugin_presets(&mut config, &discovery.presets)?;
            bundles = discovery.bundles;
            specifiers
        } else {
            Vec::new()
        };

        if registry.is_empty() {
            return Err(ViolaError::NoPlugins);
        }

        if args.list {
            reporter.linters(&registry);
            return Ok(0);
        }

        let options = RunOptions {
            project_root,
            include: resolve_include(args.include.as_deref(), &config.include),
            exclude: config.exclude,
            extensions: config.extensions,
            plugins,
            inherit: config.inherit,
            linter_config: config.linter_config,
            scopes: config.scopes,
            only: args.only.clone(),
            skip: args.skip.clone(),
            parallel: args.parallel,
            verbose: args.verbose,
            bundles,
            catalogs: registry.catalogs(),
            rules,
            grammars,
        };

        let report = self.engine.run(&options, &registry).await?;
        reporter.results(&self.engine.format_results(&report));

        Ok(exit_code(report.has_errors, args.report_only))
    }

    fn module_strategy(&self) -> &dyn ModuleStrategy {
        if self.origin.is_remote() {
            self.bridge.as_ref()
        } else {
            self.local.as_ref()
        }
    }
}

/// Merge the `inherit` entries that discovered plugins publish as presets
///
/// Earlier entries take precedence; names no plugin publishes stay in
/// `inherit` for the engine.
fn apply_plugin_presets(
    config: &mut ResolvedConfig,
    presets: &IndexMap<String, serde_json::Value>,
) -> Result<()> {
    for name in config.inherit.clone() {
        let Some(value) = presets.get(&name) else {
            continue;
        };
        let preset: ViolaConfiguration = serde_json::from_value(value.clone()).map_err(|e| {
            ViolaError::config_error(format!("Preset '{name}' published by a plugin is invalid: {e}"))
        })?;
        tracing::debug!("Applying plugin preset '{}'", name);
        config.merge_preset(&name, preset);
    }
    Ok(())
}

/// CLI value, then the configured list, then [`DEFAULT_INCLUDE`]
pub fn resolve_include(cli: Option<&[String]>, configured: &[String]) -> Vec<String> {
    match cli {
        Some(include) if !include.is_empty() => include.to_vec(),
        _ if !configured.is_empty() => configured.to_vec(),
        _ => DEFAULT_INCLUDE.iter().map(|dir| dir.to_string()).collect(),
    }
}

pub fn exit_code(has_errors: bool, report_only: bool) -> u8 {
    if !has_errors || report_only { 0 } else { 1 }
}

/// Error message, remediation and, when verbose, the chain of causes
pub fn render_error(error: &ViolaError, verbose: bool) -> String {
    let mut out = format!("Error: {error}\n");
    if verbose {
        let mut source = std::error::Error::source(error);
        while let Some(cause) = source {
            out.push_str(&format!("  Caused by: {cause}\n"));
            source = cause.source();
        }
    }
    out.push('\n');
    out.push_str(&error.remediation());
    out.push('\n');
    out
}

/// Uncolored reporter over any writer
pub struct PlainReporter<W: Write> {
    out: W,
}

impl<W: Write> PlainReporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Reporter for PlainReporter<W> {
    fn sources(&mut self, sources: &[ConfigSource]) {
        for source in sources {
            let _ = writeln!(self.out, "config: {} ({})", source.path.display(), source.kind);
        }
    }

    fn plugin_failure(&mut self, failure: &PluginFailure) {
        let _ = writeln!(self.out, "warning: {}", failure.message);
    }

    fn linters(&mut self, registry: &LinterRegistry) {
        let _ = writeln!(self.out, "{} linter(s) registered:", registry.len());
        for linter in registry.get_all() {
            let _ = writeln!(
                self.out,
                "  {}  {} ({} issue kind(s))",
                linter.id,
                linter.description.as_deref().unwrap_or(""),
                linter.catalog_size()
            );
        }
    }

    fn no_linters_to_list(&mut self) {
        let _ = writeln!(self.out, "No plugins configured, so there are no linters to list.");
        let _ = writeln!(self.out, "{}", ViolaError::NoPlugins.remediation());
    }

    fn results(&mut self, formatted: &str) {
        let _ = write!(self.out, "{formatted}");
    }

    fn error(&mut self, error: &ViolaError, verbose: bool) {
        let _ = write!(self.out, "{}", render_error(error, verbose));
    }
}
