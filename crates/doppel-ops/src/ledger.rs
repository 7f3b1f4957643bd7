//! Append-only recovery ledger.
//!
//! Every applied batch is written as one pretty-printed JSON file named
//! `recovery_<id>.json` under the recovery root. Files are never edited
//! after they are written, so they can be read and acted on by hand.

use std::cmp::Ordering;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::action::{ActionBatch, ActionKind, ActionRecord};
use crate::conflict::move_file;
use crate::restore::{RestoreReport, restore_batch};

/// Current on-disk format version.
pub const LEDGER_VERSION: u32 = 1;

const FILE_PREFIX: &str = "recovery_";
const FILE_SUFFIX: &str = ".json";

/// Errors from the recovery ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The recovery root cannot be created or written.
    #[error("Recovery store unavailable at {path}: {source}")]
    Unavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// I/O error on a ledger file.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A batch file exists but cannot be parsed.
    #[error("Recovery batch {id} is corrupt: {message}")]
    Corrupt { id: BatchId, message: String },

    /// No batch with this id.
    #[error("Recovery batch {id} not found")]
    NotFound { id: BatchId },
}

/// Timestamp-derived batch identifier, e.g. `20240501T093000.123456Z`.
///
/// Ids created in the same microsecond get a `-N` suffix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchId(String);

impl BatchId {
    /// Id for a point in time.
    pub fn from_time(time: DateTime<Utc>) -> Self {
        Self(time.format("%Y%m%dT%H%M%S%.6fZ").to_string())
    }

    /// Wrap an id string, e.g. one typed by an operator.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Parse a ledger file name back into its id.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let id = name.strip_prefix(FILE_PREFIX)?.strip_suffix(FILE_SUFFIX)?;
        if id.is_empty() {
            return None;
        }
        Some(Self(id.to_string()))
    }

    fn with_suffix(&self, n: u32) -> Self {
        Self(format!("{}-{}", self.0, n))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name this batch is stored under.
    pub fn file_name(&self) -> String {
        format!("{FILE_PREFIX}{}{FILE_SUFFIX}", self.0)
    }

    /// Timestamp part and collision counter, for ordering.
    fn sort_key(&self) -> (&str, u32) {
        match self.0.rsplit_once('-') {
            Some((base, n)) => match n.parse() {
                Ok(n) => (base, n),
                Err(_) => (self.0.as_str(), 0),
            },
            None => (self.0.as_str(), 0),
        }
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialOrd for BatchId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for BatchId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

/// One batch as persisted in the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryBatch {
    /// Format version.
    pub version: u32,
    /// Batch id, matching the file name.
    pub id: BatchId,
    /// When the batch was recorded.
    pub created_at: DateTime<Utc>,
    /// The action applied.
    pub action: ActionKind,
    /// Records in pair order.
    pub records: Vec<ActionRecord>,
}

impl RecoveryBatch {
    fn new(id: BatchId, batch: &ActionBatch) -> Self {
        Self {
            version: LEDGER_VERSION,
            id,
            created_at: Utc::now(),
            action: batch.action,
            records: batch.records.clone(),
        }
    }

    /// Records a restore would try to move back.
    pub fn restorable_count(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.is_ok() && r.action.is_restorable())
            .count()
    }
}

/// Short description of a stored batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub id: BatchId,
    pub created_at: DateTime<Utc>,
    pub action: ActionKind,
    pub total: usize,
    pub succeeded: usize,
    pub restorable: usize,
}

impl From<&RecoveryBatch> for BatchSummary {
    fn from(batch: &RecoveryBatch) -> Self {
        Self {
            id: batch.id.clone(),
            created_at: batch.created_at,
            action: batch.action,
            total: batch.records.len(),
            succeeded: batch.records.iter().filter(|r| r.is_ok()).count(),
            restorable: batch.restorable_count(),
        }
    }
}

/// Directory of recovery batches.
#[derive(Debug)]
pub struct RecoveryLedger {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl RecoveryLedger {
    /// Open a ledger rooted at `root`. The directory is created on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// The recovery root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the recovery root if needed.
    pub fn ensure_available(&self) -> Result<(), LedgerError> {
        fs::create_dir_all(&self.root).map_err(|source| LedgerError::Unavailable {
            path: self.root.clone(),
            source,
        })
    }

    fn path_for(&self, id: &BatchId) -> PathBuf {
        self.root.join(id.file_name())
    }

    /// Write `bytes` to a private temp file, then move it under the batch
    /// name without replacing an existing batch.
    fn publish(&self, id: &BatchId, bytes: &[u8]) -> io::Result<()> {
        let temp_path = self
            .root
            .join(format!(".{}.{}.tmp", id.file_name(), std::process::id()));
        if let Err(e) = write_durable(&temp_path, bytes) {
            if e.kind() != io::ErrorKind::AlreadyExists {
                let _ = fs::remove_file(&temp_path);
            }
            return Err(e);
        }
        move_file(&temp_path, &self.path_for(id)).inspect_err(|_| {
            let _ = fs::remove_file(&temp_path);
        })
    }

    /// Persist a batch durably and return its id.
    pub fn record(&self, batch: &ActionBatch) -> Result<BatchId, LedgerError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        self.ensure_available()?;

        let base = BatchId::from_time(Utc::now());
        let mut id = base.clone();
        let mut n = 1;
        loop {
            if !self.path_for(&id).exists() {
                let entry = RecoveryBatch::new(id.clone(), batch);
                let json =
                    serde_json::to_vec_pretty(&entry).map_err(|e| LedgerError::Io {
                        path: self.path_for(&id),
                        source: e.into(),
                    })?;
                match self.publish(&id, &json) {
                    Ok(()) => break,
                    Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                        debug!(id = %id, "batch id taken, trying next suffix");
                    }
                    Err(source) => {
                        return Err(LedgerError::Unavailable {
                            path: self.path_for(&id),
                            source,
                        });
                    }
                }
            }
            id = base.with_suffix(n);
            n += 1;
        }
        sync_dir(&self.root);

        info!(
            id = %id,
            action = %batch.action,
            records = batch.records.len(),
            "recovery batch recorded"
        );
        Ok(id)
    }

    /// All batch ids, newest first.
    pub fn list_batches(&self) -> Result<Vec<BatchId>, LedgerError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(LedgerError::Io {
                    path: self.root.clone(),
                    source,
                });
            }
        };

        let mut ids: Vec<BatchId> = entries
            .flatten()
            .filter_map(|entry| BatchId::from_file_name(&entry.file_name().to_string_lossy()))
            .collect();
        ids.sort_by(|a, b| b.cmp(a));
        Ok(ids)
    }

    /// Load one batch.
    pub fn load(&self, id: &BatchId) -> Result<RecoveryBatch, LedgerError> {
        if id.as_str().contains(['/', '\\']) {
            return Err(LedgerError::NotFound { id: id.clone() });
        }
        let path = self.path_for(id);
        let text = fs::read_to_string(&path).map_err(|source| match source.kind() {
            std::io::ErrorKind::NotFound => LedgerError::NotFound { id: id.clone() },
            std::io::ErrorKind::InvalidData => LedgerError::Corrupt {
                id: id.clone(),
                message: source.to_string(),
            },
            _ => LedgerError::Io {
                path: path.clone(),
                source,
            },
        })?;

        let batch: RecoveryBatch =
            serde_json::from_str(&text).map_err(|e| LedgerError::Corrupt {
                id: id.clone(),
                message: e.to_string(),
            })?;

        if batch.version > LEDGER_VERSION {
            return Err(LedgerError::Corrupt {
                id: id.clone(),
                message: format!("unsupported format version {}", batch.version),
            });
        }
        if &batch.id != id {
            return Err(LedgerError::Corrupt {
                id: id.clone(),
                message: format!("file claims to be batch {}", batch.id),
            });
        }
        Ok(batch)
    }

    /// Summaries of every batch, newest first.
    ///
    /// A corrupt batch yields an error in its own slot and does not hide
    /// the others.
    pub fn summaries(
        &self,
    ) -> Result<Vec<(BatchId, Result<BatchSummary, LedgerError>)>, LedgerError> {
        Ok(self
            .list_batches()?
            .into_iter()
            .map(|id| {
                let summary = self.load(&id).map(|batch| BatchSummary::from(&batch));
                (id, summary)
            })
            .collect())
    }

    /// Put back every restorable file of a batch.
    ///
    /// The batch file itself is left in place.
    pub fn restore(&self, id: &BatchId) -> Result<RestoreReport, LedgerError> {
        let batch = self.load(id).inspect_err(|e| {
            warn!(id = %id, error = %e, "cannot load recovery batch");
        })?;

        let report = restore_batch(&batch);
        info!(
            id = %id,
            restored = report.restored(),
            failed = report.failed(),
            "restore finished"
        );
        Ok(report)
    }
}

fn write_durable(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

#[cfg(unix)]
fn sync_dir(dir: &Path) {
    if let Ok(handle) = File::open(dir) {
        let _ = handle.sync_all();
    }
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) {}
