//! Error types for scanning operations.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that abort a scan.
///
/// Per-file problems never end up here; they are collected as
/// [`ScanWarning`]s and the walk continues.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Permission denied for the root path.
    #[error("Permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    /// Root path not found.
    #[error("Path not found: {path}")]
    NotFound { path: PathBuf },

    /// Root path is not a directory.
    #[error("Root path is not a directory: {path}")]
    NotADirectory { path: PathBuf },

    /// Generic I/O error on the root path.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid configuration.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// The scan was cancelled.
    #[error("Scan interrupted")]
    Interrupted,

    /// Other error.
    #[error("{message}")]
    Other { message: String },
}

impl ScanError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            std::io::ErrorKind::NotFound => Self::NotFound { path },
            _ => Self::Io { path, source },
        }
    }

    /// Whether this error means the scan root itself is unusable.
    pub fn is_invalid_root(&self) -> bool {
        matches!(
            self,
            Self::PermissionDenied { .. }
                | Self::NotFound { .. }
                | Self::NotADirectory { .. }
                | Self::Io { .. }
        )
    }
}

/// Kind of scan warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WarningKind {
    /// Permission was denied.
    PermissionDenied,
    /// Error reading a directory entry.
    ReadError,
    /// Error reading metadata.
    MetadataError,
    /// File could not be read for fingerprinting.
    Unreadable,
    /// File changed between the walk and fingerprinting.
    ChangedDuringScan,
}

/// Non-fatal warning encountered during scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanWarning {
    /// Path where the warning occurred.
    pub path: PathBuf,
    /// Human-readable message.
    pub message: String,
    /// Kind of warning.
    pub kind: WarningKind,
}

impl ScanWarning {
    /// Create a new scan warning.
    pub fn new(path: impl Into<PathBuf>, message: impl Into<String>, kind: WarningKind) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            kind,
        }
    }

    /// Create a warning for a file that could not be read.
    pub fn unreadable(path: impl Into<PathBuf>, error: &std::io::Error) -> Self {
        let path = path.into();
        let kind = if error.kind() == std::io::ErrorKind::PermissionDenied {
            WarningKind::PermissionDenied
        } else {
            WarningKind::Unreadable
        };
        Self {
            message: format!("Cannot read {}: {error}", path.display()),
            path,
            kind,
        }
    }

    /// Create a warning for a file that changed while it was being scanned.
    pub fn changed(path: impl Into<PathBuf>, before: u64, after: u64) -> Self {
        let path = path.into();
        Self {
            message: format!(
                "Changed during scan: {} ({before} -> {after} bytes)",
                path.display()
            ),
            path,
            kind: WarningKind::ChangedDuringScan,
        }
    }
}
