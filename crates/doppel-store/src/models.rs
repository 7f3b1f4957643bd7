//! Rows read back from the scan store.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

use doppel_core::Fingerprint;

/// Row id of a scan session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct SessionId(pub i64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One recorded scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanSession {
    pub id: SessionId,
    pub root: PathBuf,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub files_recorded: u64,
    pub duplicates_found: u64,
}

/// One fingerprinted file as recorded in a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub path: PathBuf,
    pub fingerprint: Fingerprint,
    pub size: u64,
    /// Modification time, seconds since the Unix epoch.
    pub modified: i64,
    pub is_duplicate: bool,
    /// The original, when this file is a duplicate.
    pub original: Option<PathBuf>,
}

/// Differences between two sessions, each list sorted by path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanDiff {
    /// In the newer session only.
    pub added: Vec<PathBuf>,
    /// In the older session only.
    pub removed: Vec<PathBuf>,
    /// In both, with a different fingerprint or size.
    pub changed: Vec<PathBuf>,
}

impl ScanDiff {
    /// Check if the sessions recorded the same files.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}
