//! Error types for SitePress.
//!
//! Library crates use [`SitePressError`] via `thiserror`.
//! The CLI app wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all SitePress operations.
///
/// Per-file pipeline failures are not represented here — those are recorded
/// as [`crate::StageError`] values with an [`crate::ErrorKind`] and
/// aggregated into the run result. This enum covers the errors that
/// propagate as `Result::Err`: configuration problems, unreachable storage,
/// failed object transfers, and local I/O.
#[derive(Debug, thiserror::Error)]
pub enum SitePressError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Storage container unreachable (auth or network). Fatal for the run.
    #[error("storage access error: {0}")]
    Access(String),

    /// A single object transfer failed.
    #[error("upload error: {0}")]
    Upload(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, SitePressError>;

impl SitePressError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = SitePressError::config("missing storage endpoint");
        assert_eq!(err.to_string(), "config error: missing storage endpoint");

        let err = SitePressError::Access("list web: HTTP 403".into());
        assert_eq!(err.to_string(), "storage access error: list web: HTTP 403");

        let err = SitePressError::Upload("put index.html: HTTP 500".into());
        assert!(err.to_string().contains("index.html"));
    }
}
