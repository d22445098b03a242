//! Viola Core
//!
//! Configuration resolution, plugin registration and engine orchestration
//! for the viola convention linter. The linting itself happens in an
//! external engine reached through [`Engine`].

pub mod builder;
pub mod config;
pub mod engine;
pub mod error;
pub mod linter;
pub mod module;
pub mod orchestrator;
pub mod plugin;
pub mod result;

// Re-export commonly used types
pub use builder::{BuilderConfig, Grammar, GrammarRegistry, RulePredicate};
pub use config::{
    ConfigResolver, ConfigSource, LoadedConfig, ResolvedConfig, ScopeOverride, Severity,
    SourceKind, ViolaConfiguration,
};
pub use engine::{CommandEngine, Engine, Issue, RunOptions, RunReport, format_report};
pub use error::{ErrorKind, ViolaError};
pub use linter::{IssueCatalog, IssueKind, LinterDescriptor, LinterRegistry};
pub use module::{
    BridgeModuleLoader, LocalModuleLoader, ModuleOutcome, ModuleStrategy, Origin,
    PRELOADED_MODULE_FLAG,
};
pub use orchestrator::{
    DEFAULT_INCLUDE, Orchestrator, PlainReporter, Reporter, RunArgs, render_error,
};
pub use plugin::{Discovery, PluginExport, PluginFailure};
pub use result::{Result, ResultExt};

/// Initialize the tracing subscriber for logging
///
/// `RUST_LOG` wins when set; otherwise only warnings are shown, or debug
/// output for viola's own crates under `--verbose`. Logs go to stderr so
/// they never mix with report output.
pub fn init_tracing(verbose: bool) {
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    let default_filter = if verbose {
        "viola_core=debug,viola=debug"
    } else {
        "warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_thread_ids(false),
        )
        .try_init();
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
