//! Error types and handling for viola CLI operations

use std::path::PathBuf;
use thiserror::Error;

/// Example configuration shown whenever the user has to fix their setup.
pub const EXAMPLE_CONFIG: &str = r#"{
  "plugins": ["jsr:@hiisi/viola-default-lints"],
  "include": ["src"]
}"#;

/// Main error type for viola operations
#[derive(Debug, Error)]
pub enum ViolaError {
    /// Configuration could not be located or is semantically invalid
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    /// A configuration file exists but could not be parsed
    #[error("Failed to parse config '{}': {message}", path.display())]
    ConfigParse { path: PathBuf, message: String },

    /// Neither plugin specifiers nor programmatic linters were found
    #[error("No plugins configured.")]
    NoPlugins,

    /// A plugin could not be loaded or yielded no linters
    #[error("Plugin error in '{specifier}': {message}")]
    PluginError { specifier: String, message: String },

    /// The external engine failed or replied with something unusable
    #[error("Engine error: {message}")]
    EngineError { message: String },

    /// The cross-origin bridge process could not be run
    #[error("Bridge error: {message}")]
    BridgeError { message: String },

    /// File system I/O errors
    #[error("IO error for path '{}': {source}", path.display())]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Error kind enumeration for categorizing errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    NoPlugins,
    Plugin,
    Engine,
    Bridge,
    Io,
}

impl ViolaError {
    /// Get the error kind for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            ViolaError::ConfigError { .. } | ViolaError::ConfigParse { .. } => ErrorKind::Config,
            ViolaError::NoPlugins => ErrorKind::NoPlugins,
            ViolaError::PluginError { .. } => ErrorKind::Plugin,
            ViolaError::EngineError { .. } => ErrorKind::Engine,
            ViolaError::BridgeError { .. } => ErrorKind::Bridge,
            ViolaError::IoError { .. } => ErrorKind::Io,
        }
    }

    /// Concrete next step for the user, printed under the error message
    pub fn remediation(&self) -> String {
        match self {
            ViolaError::NoPlugins => format!(
                "Add plugins to viola.json (or the \"viola\" field of deno.json):\n\n{EXAMPLE_CONFIG}\n\nor pass them on the command line: viola --plugins jsr:@hiisi/viola-default-lints"
            ),
            ViolaError::ConfigParse { path, .. } => format!(
                "Fix the syntax of {} (comments and trailing commas are allowed), for example:\n\n{EXAMPLE_CONFIG}",
                path.display()
            ),
            ViolaError::ConfigError { .. } => format!(
                "Check the --config path and VIOLA_CONFIG, or create viola.json in the project root:\n\n{EXAMPLE_CONFIG}"
            ),
            ViolaError::PluginError { specifier, .. } => format!(
                "Make sure '{specifier}' is installed and exports linters (directly, as an array, under `linters` or as the default export)."
            ),
            ViolaError::EngineError { .. } => {
                "Check that the viola engine is installed (set VIOLA_ENGINE to its executable) and rerun with --verbose for details.".to_string()
            }
            ViolaError::BridgeError { .. } => {
                "Make sure the host runtime is installed (set VIOLA_RUNTIME), or run viola from a local installation.".to_string()
            }
            ViolaError::IoError { path, .. } => {
                format!("Check that {} exists and is readable.", path.display())
            }
        }
    }

    /// Create a configuration error
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Create a parse error bound to the offending file
    pub fn config_parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ConfigParse {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a plugin error
    pub fn plugin_error(specifier: impl Into<String>, message: impl Into<String>) -> Self {
        Self::PluginError {
            specifier: specifier.into(),
            message: message.into(),
        }
    }

    /// Create an engine error
    pub fn engine_error(message: impl Into<String>) -> Self {
        Self::EngineError {
            message: message.into(),
        }
    }

    /// Create a bridge error
    pub fn bridge_error(message: impl Into<String>) -> Self {
        Self::BridgeError {
            message: message.into(),
        }
    }

    /// Create an IO error with path context
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::IoError {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_plugins_message_and_remediation() {
        let err = ViolaError::NoPlugins;
        assert!(err.to_string().contains("No plugins configured"));
        assert!(err.remediation().contains("\"plugins\""));
        assert_eq!(err.kind(), ErrorKind::NoPlugins);
    }

    #[test]
    fn test_parse_error_mentions_path() {
        let err = ViolaError::config_parse("/tmp/project/viola.json", "expected value at line 1");
        let message = err.to_string();
        assert!(message.contains("/tmp/project/viola.json"));
        assert!(message.contains("expected value at line 1"));
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn test_io_error_remediation_names_path() {
        let err = ViolaError::io_error(
            "/project/viola.json",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(err.to_string().contains("/project/viola.json"));
        assert!(err.remediation().contains("Check that /project/viola.json exists"));
    }
}
