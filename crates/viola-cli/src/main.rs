//! Viola CLI
//!
//! Command-line front-end for the viola convention linter

mod output;

use anyhow::Context;
use clap::Parser;
use output::TerminalReporter;
use std::path::PathBuf;
use std::process::ExitCode;
use viola_core::{CommandEngine, Orchestrator, RunArgs, init_tracing};

#[derive(Parser, Debug)]
#[command(name = "viola")]
#[command(about = "Viola: convention linter for your codebase")]
#[command(version = viola_core::VERSION)]
#[command(
    after_help = "Configuration is read from --config, VIOLA_CONFIG, viola.json/.violarc.json files\n\
or the \"viola\" field of deno.json/package.json.\n\
\n\
Examples:\n  \
viola                                   # Lint src, packages and app\n  \
viola -i lib,tools                      # Lint other directories\n  \
viola --plugins jsr:@hiisi/viola-default-lints\n  \
viola --list                            # Show registered linters\n  \
viola -r                                # Report issues but always exit 0"
)]
struct Cli {
    /// Report issues without failing the run
    #[arg(short = 'r', long)]
    report_only: bool,

    /// Print config sources and debug output
    #[arg(short, long)]
    verbose: bool,

    /// List registered linters and exit
    #[arg(short, long)]
    list: bool,

    /// Let the engine run linters in parallel
    #[arg(long)]
    parallel: bool,

    /// Only run these linters (comma-separated)
    #[arg(long, value_delimiter = ',', value_name = "IDS")]
    only: Option<Vec<String>>,

    /// Skip these linters (comma-separated)
    #[arg(long, value_delimiter = ',', value_name = "IDS")]
    skip: Option<Vec<String>>,

    /// Paths to lint (comma-separated)
    #[arg(short, long, value_delimiter = ',', value_name = "PATHS")]
    include: Option<Vec<String>>,

    /// Project root
    #[arg(short, long, default_value = ".")]
    project: PathBuf,

    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Plugin specifiers, replacing the configured ones (comma-separated)
    #[arg(long, value_delimiter = ',', value_name = "SPECIFIERS")]
    plugins: Option<Vec<String>>,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Config module already evaluated by the bridge
    #[arg(long, hide = true)]
    preloaded_module: Option<PathBuf>,
}

impl From<Cli> for RunArgs {
    fn from(cli: Cli) -> Self {
        RunArgs {
            project: cli.project,
            config: cli.config,
            include: cli.include,
            plugins: cli.plugins,
            only: cli.only,
            skip: cli.skip,
            report_only: cli.report_only,
            verbose: cli.verbose,
            list: cli.list,
            parallel: cli.parallel,
            preloaded_module: cli.preloaded_module,
        }
    }
}

fn main() -> ExitCode {
    // Help and version exit here, before any configuration is read
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return if err.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    if cli.no_color || std::env::var_os("NO_COLOR").is_some() {
        colored::control::set_override(false);
    }

    init_tracing(cli.verbose);

    match run(cli) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<u8> {
    // Every step is awaited in sequence; one thread is enough
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to create Tokio runtime")?;

    let args = RunArgs::from(cli);
    let orchestrator = Orchestrator::new(CommandEngine::from_env());
    let mut reporter = TerminalReporter::new();

    tracing::debug!("Running viola {} in {}", viola_core::VERSION, args.project.display());
    Ok(runtime.block_on(orchestrator.run(&args, &mut reporter)))
}
