//! Loading module-style configuration (`viola.config.ts` and friends)
//!
//! When viola runs from a local install the engine evaluates the module
//! directly. When it was launched from a network URL the host runtime will
//! not let it import local files, so a small bridge script is written to a
//! temporary file, run with local-only permissions, and viola is started
//! again with the evaluated module passed in via `--preloaded-module`.

use crate::builder::BuilderConfig;
use crate::engine::Engine;
use crate::error::ViolaError;
use crate::result::Result;
use async_trait::async_trait;
use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use url::Url;

/// URL the launcher loaded the CLI from; unset means a local install
pub const MAIN_MODULE_ENV_VAR: &str = "VIOLA_MAIN_MODULE";

/// Host runtime used to run the bridge script
pub const RUNTIME_ENV_VAR: &str = "VIOLA_RUNTIME";

pub const DEFAULT_RUNTIME: &str = "deno";

/// Flag the bridge uses to hand the evaluated module back to viola
pub const PRELOADED_MODULE_FLAG: &str = "--preloaded-module";

/// Local-only permission set: no network access
const DENO_ARGS: &[&str] = &[
    "run",
    "--allow-read",
    "--allow-write",
    "--allow-env",
    "--allow-run",
];

/// Where the running CLI was loaded from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    Local,
    Remote(String),
}

impl Origin {
    pub fn detect() -> Self {
        Self::from_main_module(std::env::var(MAIN_MODULE_ENV_VAR).ok().as_deref())
    }

    pub fn from_main_module(main_module: Option<&str>) -> Self {
        match main_module {
            Some(url) if url.starts_with("http://") || url.starts_with("https://") => {
                Origin::Remote(url.to_string())
            }
            _ => Origin::Local,
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Origin::Remote(_))
    }
}

/// Result of a module load
#[derive(Debug, Clone, PartialEq)]
pub enum ModuleOutcome {
    /// The module was evaluated in this process
    Loaded(BuilderConfig),
    /// Another viola process did the whole run; this is its exit code
    Delegated(u8),
}

/// How a module-style configuration gets evaluated
#[async_trait]
pub trait ModuleStrategy: Send + Sync {
    async fn load(&self, module: &Path, engine: &dyn Engine) -> Result<ModuleOutcome>;
}

/// Let the engine import the module directly
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalModuleLoader;

#[async_trait]
impl ModuleStrategy for LocalModuleLoader {
    async fn load(&self, module: &Path, engine: &dyn Engine) -> Result<ModuleOutcome> {
        tracing::debug!("Loading config module {}", module.display());
        engine.load_module(module).await.map(ModuleOutcome::Loaded)
    }
}

/// Run the module through a temporary bridge script and re-invoke viola
#[derive(Debug, Clone)]
pub struct BridgeModuleLoader {
    runtime: OsString,
    runtime_args: Vec<OsString>,
    exe: Option<PathBuf>,
    forwarded_args: Option<Vec<OsString>>,
    script_dir: Option<PathBuf>,
}

impl Default for BridgeModuleLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl BridgeModuleLoader {
    /// Bridge through `VIOLA_RUNTIME` (default `deno`), re-running this executable
    pub fn new() -> Self {
        let runtime = std::env::var_os(RUNTIME_ENV_VAR)
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| OsString::from(DEFAULT_RUNTIME));
        Self {
            runtime,
            runtime_args: DENO_ARGS.iter().map(OsString::from).collect(),
            exe: None,
            forwarded_args: None,
            script_dir: None,
        }
    }

    /// Use another runtime; `args` come before the script path
    pub fn with_runtime<I, S>(mut self, runtime: impl Into<OsString>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.runtime = runtime.into();
        self.runtime_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Executable the bridge re-invokes (default: the current one)
    pub fn with_exe(mut self, exe: impl Into<PathBuf>) -> Self {
        self.exe = Some(exe.into());
        self
    }

    /// Arguments forwarded to the re-invoked CLI (default: our own)
    pub fn with_forwarded_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.forwarded_args = Some(args.into_iter().map(Into::into).collect());
        self
    }

    /// Directory for the temporary script (default: the system temp dir)
    pub fn with_script_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.script_dir = Some(dir.into());
        self
    }

    /// Source of the bridge script for `module`
    pub fn render_script(&self, module: &Path) -> Result<String> {
        let module_url = Url::from_file_path(module).map_err(|_| {
            ViolaError::bridge_error(format!("cannot build a file URL for {}", module.display()))
        })?;
        let exe = match &self.exe {
            Some(exe) => exe.clone(),
            None => std::env::current_exe()
                .map_err(|e| ViolaError::bridge_error(format!("cannot locate the viola executable: {e}")))?,
        };
        let args: Vec<String> = match &self.forwarded_args {
            Some(args) => args.iter().map(|a| a.to_string_lossy().into_owned()).collect(),
            None => std::env::args_os()
                .skip(1)
                .map(|a| a.to_string_lossy().into_owned())
                .collect(),
        };

        Ok(format!(
            r#"const mod = await import({module});
const out = await Deno.makeTempFile({{ prefix: "viola-module-", suffix: ".json" }});
try {{
  await Deno.writeTextFile(out, JSON.stringify(mod));
  const child = new Deno.Command({exe}, {{
    args: [...{args}, "{flag}", out],
    stdin: "inherit",
    stdout: "inherit",
    stderr: "inherit",
  }});
  const {{ code }} = await child.output();
  Deno.exitCode = code;
}} finally {{
  await Deno.remove(out).catch(() => {{}});
}}
"#,
            module = js_literal(module_url.as_str())?,
            exe = js_literal(&*exe.to_string_lossy())?,
            args = js_literal(&args)?,
            flag = PRELOADED_MODULE_FLAG,
        ))
    }

    fn write_script(&self, module: &Path) -> Result<tempfile::NamedTempFile> {
        let script = self.render_script(module)?;

        let mut builder = tempfile::Builder::new();
        builder.prefix("viola-bridge-").suffix(".mjs");
        let mut file = match &self.script_dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
        .map_err(|e| ViolaError::bridge_error(format!("cannot create bridge script: {e}")))?;

        file.write_all(script.as_bytes())
            .and_then(|_| file.flush())
            .map_err(|e| ViolaError::bridge_error(format!("cannot write bridge script: {e}")))?;
        Ok(file)
    }
}

#[async_trait]
impl ModuleStrategy for BridgeModuleLoader {
    async fn load(&self, module: &Path, _engine: &dyn Engine) -> Result<ModuleOutcome> {
        // Removed when dropped, whichever way this function returns
        let script = self.write_script(module)?;
        let runtime = self.runtime.to_string_lossy().into_owned();
        tracing::debug!(
            "Bridging {} through {} ({})",
            module.display(),
            runtime,
            script.path().display()
        );

        let status = tokio::process::Command::new(&self.runtime)
            .args(&self.runtime_args)
            .arg(script.path())
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|e| ViolaError::bridge_error(format!("failed to run '{runtime}': {e}")))?;

        let code = status
            .code()
            .and_then(|code| u8::try_from(code).ok())
            .unwrap_or(1);
        tracing::debug!("Bridge process exited with {}", code);
        Ok(ModuleOutcome::Delegated(code))
    }
}

/// Read the module serialized by the bridge
pub fn read_preloaded(path: &Path) -> Result<BuilderConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| ViolaError::io_error(path, e))?;
    let value: serde_json::Value =
        serde_json::from_str(&content).map_err(|e| ViolaError::config_parse(path, e.to_string()))?;
    BuilderConfig::from_module_value(value).map_err(|message| ViolaError::config_parse(path, message))
}

/// Render a value as a JavaScript literal
fn js_literal<T: serde::Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string(value)
        .map_err(|e| ViolaError::bridge_error(format!("cannot encode bridge script: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::BuilderConfig;
    use crate::engine::{RunOptions, RunReport};
    use crate::linter::LinterRegistry;
    use crate::plugin::Discovery;
    use serde_json::json;
    use serial_test::serial;
    use tempfile::TempDir;

    struct ModuleEngine;

    #[async_trait]
    impl Engine for ModuleEngine {
        async fn discover_plugins(&self, _: &[String], _: bool) -> Result<Discovery> {
            Ok(Discovery::default())
        }

        async fn load_module(&self, path: &Path) -> Result<BuilderConfig> {
            Ok(BuilderConfig::new().add(crate::linter::LinterDescriptor::new(
                path.file_name().unwrap().to_string_lossy(),
            )))
        }

        async fn run(&self, _: &RunOptions, _: &LinterRegistry) -> Result<RunReport> {
            Ok(RunReport::default())
        }
    }

    fn sh_bridge(dir: &Path, script: &str) -> BridgeModuleLoader {
        BridgeModuleLoader::new()
            .with_runtime("sh", ["-c", script, "bridge"])
            .with_exe("/usr/local/bin/viola")
            .with_forwarded_args(["--verbose"])
            .with_script_dir(dir)
    }

    fn entries(dir: &Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    #[test]
    fn test_origin_detection() {
        assert_eq!(Origin::from_main_module(None), Origin::Local);
        assert_eq!(
            Origin::from_main_module(Some("file:///home/me/viola/cli.ts")),
            Origin::Local
        );
        assert!(Origin::from_main_module(Some("https://jsr.io/@hiisi/viola/cli.ts")).is_remote());
        assert!(Origin::from_main_module(Some("http://localhost:8000/cli.ts")).is_remote());
    }

    #[test]
    #[serial]
    fn test_origin_from_environment() {
        unsafe {
            std::env::set_var(MAIN_MODULE_ENV_VAR, "https://jsr.io/@hiisi/viola/cli.ts");
        }
        let remote = Origin::detect();
        unsafe {
            std::env::remove_var(MAIN_MODULE_ENV_VAR);
        }

        assert!(remote.is_remote());
        assert_eq!(Origin::detect(), Origin::Local);
    }

    #[tokio::test]
    async fn test_local_loader_uses_engine() {
        let outcome = LocalModuleLoader
            .load(Path::new("/project/viola.config.ts"), &ModuleEngine)
            .await
            .unwrap();

        match outcome {
            ModuleOutcome::Loaded(builder) => assert_eq!(builder.linters[0].id, "viola.config.ts"),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_script_imports_module_and_reinvokes_cli() {
        let temp_dir = TempDir::new().unwrap();
        let module = temp_dir.path().join("my project/viola.config.ts");
        let loader = sh_bridge(temp_dir.path(), "true");

        let script = loader.render_script(&module).unwrap();

        assert!(script.contains("import(\"file:///"));
        assert!(script.contains("my%20project/viola.config.ts"));
        assert!(script.contains("\"/usr/local/bin/viola\""));
        assert!(script.contains("[\"--verbose\"]"));
        assert!(script.contains(PRELOADED_MODULE_FLAG));
    }

    #[tokio::test]
    async fn test_bridge_forwards_exit_code_and_removes_script() {
        let temp_dir = TempDir::new().unwrap();
        let module = temp_dir.path().join("viola.config.ts");
        std::fs::write(&module, "export default {}").unwrap();
        let script_dir = TempDir::new().unwrap();

        // Exits 3 only if the script exists while the child runs
        let loader = sh_bridge(script_dir.path(), "test -f \"$1\" && exit 3");
        let outcome = loader.load(&module, &ModuleEngine).await.unwrap();

        assert_eq!(outcome, ModuleOutcome::Delegated(3));
        assert_eq!(entries(script_dir.path()), 0);
    }

    #[tokio::test]
    async fn test_bridge_removes_script_when_child_fails() {
        let temp_dir = TempDir::new().unwrap();
        let module = temp_dir.path().join("viola.config.ts");
        let script_dir = TempDir::new().unwrap();

        let loader = sh_bridge(script_dir.path(), "exit 1");
        let outcome = loader.load(&module, &ModuleEngine).await.unwrap();

        assert_eq!(outcome, ModuleOutcome::Delegated(1));
        assert_eq!(entries(script_dir.path()), 0);
    }

    #[tokio::test]
    async fn test_bridge_removes_script_when_runtime_missing() {
        let temp_dir = TempDir::new().unwrap();
        let module = temp_dir.path().join("viola.config.ts");
        let script_dir = TempDir::new().unwrap();

        let loader = sh_bridge(script_dir.path(), "true")
            .with_runtime("viola-runtime-that-does-not-exist", Vec::<String>::new());
        let err = loader.load(&module, &ModuleEngine).await.unwrap_err();

        assert!(matches!(err, ViolaError::BridgeError { .. }));
        assert_eq!(entries(script_dir.path()), 0);
    }

    #[test]
    fn test_read_preloaded_module() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("module.json");
        std::fs::write(
            &path,
            json!({ "default": { "linters": [{ "id": "naming" }, { "id": "similarity" }] } })
                .to_string(),
        )
        .unwrap();

        let builder = read_preloaded(&path).unwrap();
        assert_eq!(builder.linters.len(), 2);

        std::fs::write(&path, "{").unwrap();
        let err = read_preloaded(&path).unwrap_err();
        assert!(err.to_string().contains("module.json"));
    }
}
