//! Result type alias for viola operations

use crate::error::{ErrorKind, ViolaError};

/// Standard Result type for viola operations
pub type Result<T> = std::result::Result<T, ViolaError>;

/// Extension trait for Result to provide additional convenience methods
pub trait ResultExt<T> {
    /// Log a plugin failure and continue with None; other errors propagate
    fn skip_failed_plugin(self) -> Result<Option<T>>;
}

impl<T> ResultExt<T> for Result<T> {
    fn skip_failed_plugin(self) -> Result<Option<T>> {
        match self {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.kind() == ErrorKind::Plugin => {
                tracing::debug!("Skipping plugin: {}", err);
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plugin_failures_are_skipped() {
        let failed: Result<u8> = Err(ViolaError::plugin_error("pkg-a", "not found"));
        assert!(matches!(failed.skip_failed_plugin(), Ok(None)));
    }

    #[test]
    fn test_other_errors_propagate() {
        let failed: Result<u8> = Err(ViolaError::engine_error("crashed"));
        assert!(failed.skip_failed_plugin().is_err());

        let ok: Result<u8> = Ok(3);
        assert!(matches!(ok.skip_failed_plugin(), Ok(Some(3))));
    }
}
