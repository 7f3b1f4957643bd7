//! Reversible duplicate actions for doppel.
//!
//! This crate applies an action (move to quarantine, move to trash,
//! permanent delete, or preview) to a list of duplicate pairs, and keeps an
//! append-only recovery ledger of every batch so moved files can be put
//! back later.
//!
//! Each file is handled independently: a failure is recorded on that file's
//! [`ActionRecord`] and the batch carries on.

mod action;
mod conflict;
mod executor;
mod ledger;
mod progress;
mod restore;

pub use action::{ActionBatch, ActionKind, ActionOutcome, ActionRecord};
pub use conflict::unique_destination;
pub use executor::{start_apply, ActionExecutor, ApplyEvent};
pub use ledger::{BatchId, BatchSummary, LedgerError, RecoveryBatch, RecoveryLedger, LEDGER_VERSION};
pub use progress::OperationProgress;
pub use restore::{restore_batch, RestoreEntry, RestoreOutcome, RestoreReport};

/// Default channel buffer size for operation progress updates.
pub const OPERATION_CHANNEL_SIZE: usize = 100;
