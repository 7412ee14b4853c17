//! Error types for the vendoring engine.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, GovenError>;

/// Errors that can occur while vendoring or publishing a module
#[derive(Error, Debug)]
pub enum GovenError {
    /// A path given by the caller could not be canonicalized
    #[error("can't resolve path \"{path}\": {source}")]
    PathResolution { path: PathBuf, source: io::Error },

    /// Something the run depends on is missing
    #[error("{message}: \"{path}\"")]
    Precondition { path: PathBuf, message: String },

    /// Malformed go.mod
    #[error("failed to parse \"{path}\" at line {line}: {message}")]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    /// Read, write, copy or delete failure
    #[error("failed to {op} \"{path}\": {source}")]
    Io {
        op: &'static str,
        path: PathBuf,
        source: io::Error,
    },

    /// Directory traversal failure
    #[error("failed to walk \"{path}\": {source}")]
    Walk {
        path: PathBuf,
        source: walkdir::Error,
    },

    /// Invalid filename glob
    #[error("invalid filename pattern \"{pattern}\": {source}")]
    Pattern {
        pattern: String,
        source: glob::PatternError,
    },

    /// Rename plan would produce ambiguous or colliding rewrites
    #[error("ambiguous rename: {0}")]
    Rename(String),

    /// `go mod tidy` (or another reconciler) failed
    #[error("failed to run \"{command}\" in \"{path}\": {message}")]
    Reconcile {
        command: String,
        path: PathBuf,
        message: String,
    },

    /// A step of the release flow failed
    #[error("{step} failed: {message}")]
    Publish { step: &'static str, message: String },

    /// Malformed goven.toml
    #[error("failed to parse config \"{path}\": {source}")]
    Config {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// Option value rejected before any work started
    #[error("{0}")]
    InvalidArgument(String),
}

impl GovenError {
    pub fn io(op: &'static str, path: impl AsRef<Path>, source: io::Error) -> Self {
        Self::Io {
            op,
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn precondition(path: impl AsRef<Path>, message: impl Into<String>) -> Self {
        Self::Precondition {
            path: path.as_ref().to_path_buf(),
            message: message.into(),
        }
    }

    /// Adapter for `map_err` that tags an error with the release step it came from.
    pub fn publish<E: std::fmt::Display>(step: &'static str) -> impl FnOnce(E) -> Self {
        move |err| Self::Publish {
            step,
            message: err.to_string(),
        }
    }
}

impl From<walkdir::Error> for GovenError {
    fn from(err: walkdir::Error) -> Self {
        let path = err.path().map(Path::to_path_buf).unwrap_or_default();
        Self::Walk { path, source: err }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_names_operation_and_path() {
        let err = GovenError::io(
            "read file",
            "/tmp/missing/go.mod",
            io::Error::new(io::ErrorKind::NotFound, "not found"),
        );
        let msg = err.to_string();
        assert!(msg.contains("read file"));
        assert!(msg.contains("/tmp/missing/go.mod"));
    }

    #[test]
    fn test_parse_error_names_line() {
        let err = GovenError::Parse {
            path: PathBuf::from("go.mod"),
            line: 3,
            message: "unknown directive".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "failed to parse \"go.mod\" at line 3: unknown directive"
        );
    }
}
