//! Engine error type.

use std::path::PathBuf;

use thiserror::Error;

use doppel_core::ScanError;
use doppel_ops::{ActionBatch, LedgerError};
use doppel_store::StoreError;

/// Errors returned by the engine entry points.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// Files were moved but the recovery ledger could not record it.
    ///
    /// The batch carries every source and destination so the caller can
    /// still put the files back.
    #[error("Action applied but not recorded ({} records): {source}", .batch.records.len())]
    Unrecorded {
        batch: Box<ActionBatch>,
        #[source]
        source: LedgerError,
    },

    /// The config file exists but cannot be read or parsed.
    #[error("Invalid config file {path}: {message}")]
    Config { path: PathBuf, message: String },

    /// An action was requested before any scan finished.
    #[error("No scan results; run a scan first")]
    NoScan,

    /// Scan history was requested with the scan store turned off.
    #[error("Scan history is disabled (no scan_store configured)")]
    StoreDisabled,

    /// A background task died.
    #[error("Background task failed: {0}")]
    Task(String),
}

impl EngineError {
    /// Check if this error came from a user cancelling a scan.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Scan(ScanError::Interrupted))
    }

    /// The applied but unrecorded batch, if this is [`EngineError::Unrecorded`].
    pub fn unrecorded_batch(&self) -> Option<&ActionBatch> {
        match self {
            Self::Unrecorded { batch, .. } => Some(batch.as_ref()),
            _ => None,
        }
    }
}
