//! Restoring a recorded batch.

use std::fs;
use std::io;
use std::path::PathBuf;

use serde::Serialize;
use tracing::warn;

use crate::action::{ActionKind, ActionRecord};
use crate::conflict::move_file;
use crate::ledger::{BatchId, RecoveryBatch};

/// What happened to one record during a restore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RestoreOutcome {
    /// The file is back at its source path.
    Restored,
    /// The file could not be put back.
    Failed { message: String },
    /// The record is a permanent delete, whether or not the delete succeeded.
    NonRestorable,
    /// The original move failed or was a preview; nothing moved.
    NothingToRestore,
}

/// Restore result for one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RestoreEntry {
    pub source: PathBuf,
    pub destination: Option<PathBuf>,
    #[serde(flatten)]
    pub outcome: RestoreOutcome,
}

/// Per-record results of restoring one batch, in record order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RestoreReport {
    pub batch_id: BatchId,
    pub action: ActionKind,
    pub entries: Vec<RestoreEntry>,
}

impl RestoreReport {
    fn count(&self, pred: impl Fn(&RestoreOutcome) -> bool) -> usize {
        self.entries.iter().filter(|e| pred(&e.outcome)).count()
    }

    /// Number of files put back.
    pub fn restored(&self) -> usize {
        self.count(|o| *o == RestoreOutcome::Restored)
    }

    /// Number of files that could not be put back.
    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, RestoreOutcome::Failed { .. }))
    }

    /// Number of permanently deleted entries.
    pub fn non_restorable(&self) -> usize {
        self.count(|o| *o == RestoreOutcome::NonRestorable)
    }

    /// Check if nothing failed.
    pub fn is_complete(&self) -> bool {
        self.failed() == 0
    }

    /// Get a human-readable summary of the restore.
    pub fn summary(&self) -> String {
        let mut parts = vec![format!("Restored {} files", self.restored())];
        if self.failed() > 0 {
            parts.push(format!("{} failed", self.failed()));
        }
        if self.non_restorable() > 0 {
            parts.push(format!("{} permanently deleted", self.non_restorable()));
        }
        format!("{} from batch {}", parts.join(", "), self.batch_id)
    }
}

/// Move every restorable file of a batch back to its source path.
///
/// Not atomic: each record is restored independently and reported.
pub fn restore_batch(batch: &RecoveryBatch) -> RestoreReport {
    let entries = batch
        .records
        .iter()
        .map(|record| {
            let outcome = restore_record(record);
            if let RestoreOutcome::Failed { message } = &outcome {
                warn!(path = %record.source.display(), error = %message, "restore failed");
            }
            RestoreEntry {
                source: record.source.clone(),
                destination: record.destination.clone(),
                outcome,
            }
        })
        .collect();

    RestoreReport {
        batch_id: batch.id.clone(),
        action: batch.action,
        entries,
    }
}

fn restore_record(record: &ActionRecord) -> RestoreOutcome {
    if record.action == ActionKind::PermanentDelete {
        return RestoreOutcome::NonRestorable;
    }
    if !record.is_ok() || !record.action.is_restorable() {
        return RestoreOutcome::NothingToRestore;
    }

    let failed = |message: String| RestoreOutcome::Failed { message };

    let Some(destination) = &record.destination else {
        return failed("No destination recorded".to_string());
    };
    if record.source.symlink_metadata().is_ok() {
        return failed(format!("{} already exists", record.source.display()));
    }
    if destination.symlink_metadata().is_err() {
        return failed(format!("{} is missing", destination.display()));
    }
    if let Some(parent) = record.source.parent() {
        if let Err(e) = fs::create_dir_all(parent) {
            return failed(format!("Failed to create {}: {}", parent.display(), e));
        }
    }

    match move_file(destination, &record.source) {
        Ok(()) => RestoreOutcome::Restored,
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            failed(format!("{} already exists", record.source.display()))
        }
        Err(e) => failed(format!("Failed to move back: {}", e)),
    }
}
