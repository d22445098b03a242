//! The linting engine seam
//!
//! Everything that actually inspects source files lives behind [`Engine`].
//! The CLI only resolves options, registers linters and maps the report to
//! an exit code.

pub mod command;

use crate::builder::{BuilderConfig, GrammarRegistry, RulePredicate};
use crate::config::{ScopeOverride, Severity};
use crate::linter::{IssueCatalog, LinterRegistry};
use crate::plugin::Discovery;
use crate::result::Result;
use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use std::path::{Path, PathBuf};

pub use command::{CommandEngine, ENGINE_ENV_VAR};

/// External linting engine
#[async_trait]
pub trait Engine: Send + Sync {
    /// Resolve and import plugin specifiers
    async fn discover_plugins(&self, specifiers: &[String], verbose: bool) -> Result<Discovery>;

    /// Evaluate a module-style configuration file
    async fn load_module(&self, path: &Path) -> Result<BuilderConfig>;

    /// Lint the project with the registered linters
    async fn run(&self, options: &RunOptions, registry: &LinterRegistry) -> Result<RunReport>;

    /// Human-readable rendering of a report
    fn format_results(&self, report: &RunReport) -> String {
        format_report(report)
    }
}

/// Fully resolved options for one engine run
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOptions {
    pub project_root: PathBuf,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub extensions: Vec<String>,
    /// Plugin specifiers; empty when linters were registered directly
    pub plugins: Vec<String>,
    /// Presets for the engine to resolve
    pub inherit: Vec<String>,
    pub linter_config: IndexMap<String, serde_json::Value>,
    pub scopes: IndexMap<String, ScopeOverride>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub only: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip: Option<Vec<String>>,
    pub parallel: bool,
    pub verbose: bool,
    /// Bundle name -> linter ids, as published by discovered plugins
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub bundles: IndexMap<String, Vec<String>>,
    /// Issue catalogs of directly registered linters
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub catalogs: IndexMap<String, IssueCatalog>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<RulePredicate>,
    #[serde(skip_serializing_if = "GrammarRegistry::is_empty")]
    pub grammars: GrammarRegistry,
}

/// Outcome of an engine run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RunReport {
    pub has_errors: bool,
    pub files_checked: usize,
    pub issues: Vec<Issue>,
}

/// A single reported problem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    pub linter: String,
    pub kind: String,
    pub severity: Severity,
    pub file: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
    pub message: String,
}

impl RunReport {
    pub fn count(&self, severity: Severity) -> usize {
        self.issues.iter().filter(|i| i.severity == severity).count()
    }
}

/// Default human-readable formatter, grouped by file
pub fn format_report(report: &RunReport) -> String {
    let mut out = String::new();

    if report.issues.is_empty() {
        let _ = writeln!(out, "No issues found in {} file(s).", report.files_checked);
        return out;
    }

    let mut by_file: IndexMap<&Path, Vec<&Issue>> = IndexMap::new();
    for issue in &report.issues {
        by_file.entry(issue.file.as_path()).or_default().push(issue);
    }

    for (file, issues) in by_file {
        let _ = writeln!(out, "{}", file.display());
        for issue in issues {
            let position = match (issue.line, issue.column) {
                (Some(line), Some(column)) => format!("{line}:{column}"),
                (Some(line), None) => line.to_string(),
                _ => "-".to_string(),
            };
            let _ = writeln!(
                out,
                "  {:<8} {:<6} {}  {} ({})",
                position,
                severity_label(issue.severity),
                issue.kind,
                issue.message,
                issue.linter
            );
        }
        out.push('\n');
    }

    let errors = report.count(Severity::Error);
    let warnings = report.count(Severity::Warn);
    let _ = writeln!(
        out,
        "{} problem(s) ({} error(s), {} warning(s)) in {} file(s) checked.",
        report.issues.len(),
        errors,
        warnings,
        report.files_checked
    );
    out
}

pub fn severity_label(severity: Severity) -> &'static str {
    match severity {
        Severity::Off => "off",
        Severity::Info => "info",
        Severity::Warn => "warn",
        Severity::Error => "error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn issue(file: &str, severity: Severity, line: Option<u32>) -> Issue {
        Issue {
            linter: "naming".to_string(),
            kind: "naming/long".to_string(),
            severity,
            file: PathBuf::from(file),
            line,
            column: line.map(|_| 5),
            message: "Identifier is too long".to_string(),
        }
    }

    #[test]
    fn test_format_empty_report() {
        let report = RunReport {
            files_checked: 12,
            ..Default::default()
        };
        assert_eq!(format_report(&report), "No issues found in 12 file(s).\n");
    }

    #[test]
    fn test_format_groups_by_file() {
        let report = RunReport {
            has_errors: true,
            files_checked: 3,
            issues: vec![
                issue("src/a.ts", Severity::Error, Some(3)),
                issue("src/b.ts", Severity::Warn, None),
                issue("src/a.ts", Severity::Warn, Some(10)),
            ],
        };

        let output = format_report(&report);
        let a = output.find("src/a.ts").unwrap();
        let b = output.find("src/b.ts").unwrap();
        assert!(a < b);
        assert_eq!(output.matches("src/a.ts").count(), 1);
        assert!(output.contains("3:5"));
        assert!(output.contains("10:5"));
        assert!(output.contains("3 problem(s) (1 error(s), 2 warning(s)) in 3 file(s) checked."));
    }

    #[test]
    fn test_report_parses_engine_reply() {
        let report: RunReport = serde_json::from_value(json!({
            "hasErrors": true,
            "issues": [{
                "linter": "similarity",
                "kind": "similarity/duplicate",
                "severity": "warning",
                "file": "src/x.ts",
                "line": 4,
                "message": "Function is 92% similar to src/y.ts:10"
            }]
        }))
        .unwrap();

        assert!(report.has_errors);
        assert_eq!(report.files_checked, 0);
        assert_eq!(report.issues[0].severity, Severity::Warn);
        assert_eq!(report.count(Severity::Warn), 1);
    }

    #[test]
    fn test_run_options_omit_empty_extras() {
        let options = RunOptions {
            project_root: PathBuf::from("/project"),
            include: vec!["src".to_string()],
            ..Default::default()
        };
        let value = serde_json::to_value(&options).unwrap();

        assert_eq!(value["include"], json!(["src"]));
        assert_eq!(value["parallel"], json!(false));
        assert!(value.get("only").is_none());
        assert!(value.get("catalogs").is_none());
        assert!(value.get("bundles").is_none());
        assert!(value.get("grammars").is_none());
    }
}
