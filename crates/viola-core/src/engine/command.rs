//! Engine backed by an external executable
//!
//! Each operation spawns the engine once, writes a JSON request to its
//! stdin and reads a JSON reply from its stdout. The engine's stderr is
//! passed through to the user.

use super::{Engine, RunOptions, RunReport};
use crate::builder::BuilderConfig;
use crate::error::ViolaError;
use crate::linter::LinterRegistry;
use crate::plugin::{Discovery, DiscoveryReply};
use crate::result::Result;
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Environment variable naming the engine executable
pub const ENGINE_ENV_VAR: &str = "VIOLA_ENGINE";

pub const DEFAULT_ENGINE: &str = "viola-engine";

#[derive(Serialize)]
#[serde(tag = "command", rename_all = "kebab-case")]
enum Request<'a> {
    DiscoverPlugins {
        specifiers: &'a [String],
        verbose: bool,
    },
    LoadModule {
        path: &'a Path,
    },
    Run {
        options: &'a RunOptions,
        linters: &'a LinterRegistry,
    },
}

#[derive(serde::Deserialize)]
struct ModuleReply {
    #[serde(default)]
    module: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<String>,
}

/// Talks to the engine executable over stdin/stdout
#[derive(Debug, Clone)]
pub struct CommandEngine {
    program: OsString,
    args: Vec<OsString>,
}

impl CommandEngine {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Engine named by `VIOLA_ENGINE`, or `viola-engine` on the `PATH`
    pub fn from_env() -> Self {
        let program = std::env::var_os(ENGINE_ENV_VAR)
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| OsString::from(DEFAULT_ENGINE));
        Self::new(program)
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    async fn call<T: DeserializeOwned>(&self, request: &Request<'_>) -> Result<T> {
        let program = self.program.to_string_lossy().into_owned();
        let payload = serde_json::to_vec(request)
            .map_err(|e| ViolaError::engine_error(format!("failed to encode request: {e}")))?;

        tracing::debug!("Invoking engine '{}'", program);
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ViolaError::engine_error(format!("failed to start '{program}': {e}")))?;

        if let Some(mut stdin) = child.stdin.take() {
            // The exit status below reports engines that stop reading early
            if let Err(e) = stdin.write_all(&payload).await {
                tracing::debug!("Engine closed stdin early: {}", e);
            }
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| ViolaError::engine_error(format!("failed to wait for '{program}': {e}")))?;

        if !output.status.success() {
            return Err(ViolaError::engine_error(format!(
                "'{program}' exited with {}",
                output.status
            )));
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|e| ViolaError::engine_error(format!("invalid reply from '{program}': {e}")))
    }
}

#[async_trait]
impl Engine for CommandEngine {
    async fn discover_plugins(&self, specifiers: &[String], verbose: bool) -> Result<Discovery> {
        let reply: DiscoveryReply = self
            .call(&Request::DiscoverPlugins {
                specifiers,
                verbose,
            })
            .await?;
        Discovery::from_reply(reply)
    }

    async fn load_module(&self, path: &Path) -> Result<BuilderConfig> {
        let reply: ModuleReply = self.call(&Request::LoadModule { path }).await?;
        if let Some(message) = reply.error {
            return Err(ViolaError::config_parse(path, message));
        }
        let module = reply.module.unwrap_or(serde_json::Value::Null);
        BuilderConfig::from_module_value(module).map_err(|message| ViolaError::config_parse(path, message))
    }

    async fn run(&self, options: &RunOptions, registry: &LinterRegistry) -> Result<RunReport> {
        self.call(&Request::Run {
            options,
            linters: registry,
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::linter::LinterDescriptor;
    use tempfile::TempDir;

    /// Engine that discards its request and prints `reply`
    fn replying(reply: &str) -> CommandEngine {
        CommandEngine::new("sh").with_args(["-c".to_string(), format!("cat >/dev/null; echo '{reply}'")])
    }

    #[tokio::test]
    async fn test_discover_plugins_flattens_reply() {
        let engine = replying(
            r#"{"plugins":[{"specifier":"pkg-a","exports":{"default":[{"id":"naming"},{"id":"similarity"}]}}]}"#,
        );

        let discovery = engine
            .discover_plugins(&["pkg-a".to_string()], false)
            .await
            .unwrap();
        assert_eq!(discovery.linters.len(), 2);
        assert!(discovery.failures.is_empty());
    }

    #[tokio::test]
    async fn test_run_sends_request_on_stdin() {
        let temp_dir = TempDir::new().unwrap();
        let captured = temp_dir.path().join("request.json");
        let script = format!(
            "cat > '{}'; echo '{{\"hasErrors\":true,\"filesChecked\":2}}'",
            captured.display()
        );
        let engine = CommandEngine::new("sh").with_args(["-c".to_string(), script]);

        let mut registry = LinterRegistry::new();
        registry.register(LinterDescriptor::new("naming"));
        let options = RunOptions {
            include: vec!["src".to_string()],
            ..Default::default()
        };

        let report = engine.run(&options, &registry).await.unwrap();
        assert!(report.has_errors);
        assert_eq!(report.files_checked, 2);

        let request: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&captured).unwrap()).unwrap();
        assert_eq!(request["command"], "run");
        assert_eq!(request["options"]["include"][0], "src");
        assert_eq!(request["linters"][0]["id"], "naming");
    }

    #[tokio::test]
    async fn test_load_module_error_reports_module_path() {
        let engine = replying(r#"{"error":"SyntaxError: Unexpected token"}"#);

        let err = engine
            .load_module(Path::new("/project/viola.config.ts"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
        assert!(err.to_string().contains("/project/viola.config.ts"));
        assert!(err.to_string().contains("Unexpected token"));
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_engine_error() {
        let engine = CommandEngine::new("sh").with_args(["-c", "cat >/dev/null; exit 2"]);
        let err = engine
            .run(&RunOptions::default(), &LinterRegistry::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Engine);
    }

    #[tokio::test]
    async fn test_garbage_reply_is_engine_error() {
        let engine = replying("not json");
        let err = engine
            .discover_plugins(&[], false)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("invalid reply"));
    }

    #[tokio::test]
    async fn test_missing_executable() {
        let engine = CommandEngine::new("viola-engine-that-does-not-exist");
        let err = engine
            .run(&RunOptions::default(), &LinterRegistry::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("failed to start"));
    }
}
