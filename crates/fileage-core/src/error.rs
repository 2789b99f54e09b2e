//! Error types for the file-age exporter
//!
//! Every variant here is a startup-time fatal. Runtime anomalies (missing
//! files, clock skew, watch stream errors) never surface as errors.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Main error type for exporter construction
#[derive(Error, Debug)]
pub enum ExporterError {
    /// Invalid or missing configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// A configured path could not be made absolute
    #[error("Cannot resolve path {}: {source}", path.display())]
    PathResolution {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The filesystem notification backend could not be created
    #[error("Error creating fs notifier: {0}")]
    Watcher(#[from] notify::Error),

    /// The watched directory did not appear before the deadline
    #[error("Giving up adding directory {} after {timeout:?}: {source}", directory.display())]
    DirectoryTimeout {
        directory: PathBuf,
        timeout: Duration,
        #[source]
        source: notify::Error,
    },

    /// Metric creation or registration failed
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}

impl ExporterError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        ExporterError::Config(msg.into())
    }

    /// Check if this error stems from operator input rather than the environment
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            ExporterError::Config(_) | ExporterError::PathResolution { .. }
        )
    }
}

/// Result type alias for exporter operations
pub type Result<T> = std::result::Result<T, ExporterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ExporterError::config("--file-end must be set");
        assert_eq!(err.to_string(), "Configuration error: --file-end must be set");
    }

    #[test]
    fn test_directory_timeout_display() {
        let err = ExporterError::DirectoryTimeout {
            directory: PathBuf::from("/data/out"),
            timeout: Duration::from_secs(600),
            source: notify::Error::path_not_found(),
        };
        let msg = err.to_string();
        assert!(msg.starts_with("Giving up adding directory /data/out after 600s"));
    }

    #[test]
    fn test_is_config_error() {
        assert!(ExporterError::config("x").is_config_error());
        assert!(ExporterError::PathResolution {
            path: PathBuf::from("rel"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "cwd gone"),
        }
        .is_config_error());
        assert!(!ExporterError::Watcher(notify::Error::generic("boom")).is_config_error());
    }
}
