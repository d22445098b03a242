//! Terminal output
//!
//! Reports and `--list` go to stdout; errors, warnings and config sources
//! go to stderr.

use colored::*;
use viola_core::{ConfigSource, LinterRegistry, PluginFailure, Reporter, ViolaError};

#[derive(Debug, Default)]
pub struct TerminalReporter;

impl TerminalReporter {
    pub fn new() -> Self {
        Self
    }
}

impl Reporter for TerminalReporter {
    fn sources(&mut self, sources: &[ConfigSource]) {
        if sources.is_empty() {
            eprintln!("{} no configuration files found", "config:".dimmed());
            return;
        }
        for source in sources {
            let scope = source
                .scope
                .as_deref()
                .map(|scope| format!(" [scope {scope}]"))
                .unwrap_or_default();
            eprintln!(
                "{} {} {}{}",
                "config:".dimmed(),
                source.path.display(),
                format!("({})", source.kind).dimmed(),
                scope
            );
        }
    }

    fn plugin_failure(&mut self, failure: &PluginFailure) {
        eprintln!("{} {}", "warning:".yellow().bold(), failure.message);
    }

    fn linters(&mut self, registry: &LinterRegistry) {
        println!("{} ({})", "Registered linters".bold(), registry.len());
        for linter in registry.get_all() {
            let kinds = match linter.catalog_size() {
                0 => String::new(),
                1 => " 1 issue kind".dimmed().to_string(),
                n => format!(" {n} issue kinds").dimmed().to_string(),
            };
            match &linter.description {
                Some(description) => println!("  {}  {}{}", linter.id.cyan(), description, kinds),
                None => println!("  {}{}", linter.id.cyan(), kinds),
            }
        }
    }

    fn no_linters_to_list(&mut self) {
        println!("{}", "No plugins configured, so there are no linters to list.".yellow());
        println!();
        println!("{}", ViolaError::NoPlugins.remediation());
    }

    fn results(&mut self, formatted: &str) {
        print!("{formatted}");
    }

    fn error(&mut self, error: &ViolaError, verbose: bool) {
        eprintln!("{} {}", "Error:".red().bold(), error);
        if verbose {
            let mut source = std::error::Error::source(error);
            while let Some(cause) = source {
                eprintln!("  {} {}", "Caused by:".dimmed(), cause);
                source = cause.source();
            }
        }
        eprintln!();
        eprintln!("{}", error.remediation());
    }
}
