//! Error types shared by the search engine, the walker and the content index.
//!
//! Errors fall into two groups. Setup errors (an invalid pattern, a bad
//! include glob, an unreadable root) abort a search before any file is
//! touched. Everything else is tied to a single file or directory entry and is
//! collected alongside the results instead of being returned as `Err`.
//!
//! ```rust,ignore
//! match search(&options) {
//!     Ok(output) if output.is_partial() => // some files were skipped,
//!     Ok(output) => // every candidate was scanned,
//!     Err(SearchError::InvalidPattern(msg)) => // nothing was searched,
//!     Err(e) => // other setup failure
//! }
//! ```
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for search operations
pub type SearchResult<T> = Result<T, SearchError>;

/// Errors that can occur during search operations
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Root directory is not accessible: {path}: {source}")]
    RootInaccessible { path: PathBuf, source: io::Error },
    #[error("IO error in {path}: {source}")]
    IoError { path: PathBuf, source: io::Error },
    #[error("Invalid UTF-8 in file {path}: {source}")]
    EncodingError {
        path: PathBuf,
        source: std::string::FromUtf8Error,
    },
    #[error("Walk error{}: {message}", .path.as_ref().map(|p| format!(" at {}", p.display())).unwrap_or_default())]
    WalkError {
        path: Option<PathBuf>,
        message: String,
    },
}

impl SearchError {
    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound(path.into())
    }

    pub fn permission_denied(path: impl Into<PathBuf>) -> Self {
        Self::PermissionDenied(path.into())
    }

    pub fn invalid_pattern(pattern: impl Into<String>) -> Self {
        Self::InvalidPattern(pattern.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn root_inaccessible(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::RootInaccessible {
            path: path.into(),
            source,
        }
    }

    pub fn encoding_error(path: impl Into<PathBuf>, source: std::string::FromUtf8Error) -> Self {
        Self::EncodingError {
            path: path.into(),
            source,
        }
    }

    /// Maps an I/O failure on `path` to the most specific variant.
    pub fn from_io(path: &Path, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::file_not_found(path),
            io::ErrorKind::PermissionDenied => Self::permission_denied(path),
            _ => Self::IoError {
                path: path.to_path_buf(),
                source: err,
            },
        }
    }

    /// Converts a directory walker error, keeping the innermost path the
    /// walker attached to it.
    pub fn from_walk(err: ignore::Error) -> Self {
        let mut path = None;
        let mut current = &err;
        loop {
            match current {
                ignore::Error::WithPath { path: p, err } => {
                    path.get_or_insert_with(|| p.clone());
                    current = err.as_ref();
                }
                ignore::Error::WithDepth { err, .. } | ignore::Error::WithLineNumber { err, .. } => {
                    current = err.as_ref();
                }
                _ => break,
            }
        }

        let denied = err
            .io_error()
            .is_some_and(|e| e.kind() == io::ErrorKind::PermissionDenied);
        match path {
            Some(p) if denied => Self::PermissionDenied(p),
            path => Self::WalkError {
                path,
                message: current.to_string(),
            },
        }
    }

    /// Setup errors abort the whole search; all other variants describe a
    /// single skipped file or directory entry.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::InvalidPattern(_) | Self::ConfigError(_) | Self::RootInaccessible { .. }
        )
    }

    /// The file or directory the error refers to, if any.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::FileNotFound(p) | Self::PermissionDenied(p) => Some(p),
            Self::RootInaccessible { path, .. }
            | Self::IoError { path, .. }
            | Self::EncodingError { path, .. } => Some(path),
            Self::WalkError { path, .. } => path.as_deref(),
            Self::InvalidPattern(_) | Self::ConfigError(_) => None,
        }
    }
}
