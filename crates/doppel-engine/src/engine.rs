//! The engine: one configuration, one current scan, one ledger.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use doppel_core::{FilterConfig, ScanReport};
use doppel_ops::{
    ActionBatch, ActionExecutor, ActionKind, BatchId, BatchSummary, LedgerError,
    OperationProgress, RecoveryLedger, RestoreReport,
};
use doppel_scan::{DuplicateScanner, ScanProgress};
use doppel_store::{ScanDiff, ScanSession, ScanStore, SessionId};

use crate::config::DoppelConfig;
use crate::error::EngineError;

/// Result of [`Engine::start_scan`].
#[derive(Debug, Clone)]
pub struct ScanSummary {
    /// The full report, also kept as the engine's current scan.
    pub report: Arc<ScanReport>,
    /// Scan store session, when history is enabled and the write succeeded.
    pub session: Option<SessionId>,
}

impl ScanSummary {
    /// One-line description for the operator.
    pub fn message(&self) -> String {
        let files = self.report.records.len();
        let mut message = match self.report.duplicate_count() {
            0 => format!("No duplicates found among {} files", files),
            1 => format!("Found 1 duplicate among {} files", files),
            n => format!("Found {} duplicates among {} files", n, files),
        };
        if self.report.has_warnings() {
            message.push_str(&format!(" ({} skipped)", self.report.warnings.len()));
        }
        message
    }
}

/// Result of [`Engine::apply_action`].
#[derive(Debug, Clone)]
pub struct ApplySummary {
    /// Every per-file record.
    pub batch: ActionBatch,
    /// Ledger id, for mutating actions that touched at least one file.
    pub batch_id: Option<BatchId>,
}

impl ApplySummary {
    /// One-line description for the operator.
    pub fn message(&self) -> String {
        match &self.batch_id {
            Some(id) => format!("{} (batch {})", self.batch.summary(), id),
            None => self.batch.summary(),
        }
    }
}

/// Entry points for front ends, schedulers and GUIs.
///
/// The engine is `Sync`; share it behind an [`Arc`] to drive it from
/// background tasks.
pub struct Engine {
    config: DoppelConfig,
    scanner: DuplicateScanner,
    executor: ActionExecutor,
    ledger: RecoveryLedger,
    store: Option<Mutex<ScanStore>>,
    current: Mutex<Option<Arc<ScanReport>>>,
    cancel: Mutex<CancellationToken>,
}

impl Engine {
    /// Build an engine, opening the scan store if one is configured.
    pub fn new(config: DoppelConfig) -> Result<Self, EngineError> {
        let store = match &config.scan_store {
            Some(path) => Some(Mutex::new(ScanStore::open(path)?)),
            None => None,
        };

        Ok(Self {
            scanner: DuplicateScanner::new(),
            executor: ActionExecutor::new(config.roots.clone()),
            ledger: RecoveryLedger::new(&config.roots.recovery),
            store,
            current: Mutex::new(None),
            cancel: Mutex::new(CancellationToken::new()),
            config,
        })
    }

    /// The configuration this engine was built with.
    pub fn config(&self) -> &DoppelConfig {
        &self.config
    }

    /// Subscribe to scan progress updates.
    pub fn subscribe(&self) -> broadcast::Receiver<ScanProgress> {
        self.scanner.subscribe()
    }

    pub(crate) fn executor(&self) -> &ActionExecutor {
        &self.executor
    }

    /// Scan `root` and make the result the current scan.
    ///
    /// `filter` falls back to the configured default. A failed scan store
    /// write is logged and does not fail the scan.
    pub fn start_scan(
        &self,
        root: impl AsRef<Path>,
        filter: Option<FilterConfig>,
    ) -> Result<ScanSummary, EngineError> {
        let filter = filter.unwrap_or_else(|| self.config.filter.clone());
        let scan_config = self.config.scan_config(root.as_ref(), filter);

        let token = CancellationToken::new();
        *lock(&self.cancel) = token.clone();

        let report = Arc::new(self.scanner.scan_with_cancel(&scan_config, &token)?);

        let session = self.store.as_ref().and_then(|store| {
            lock(store)
                .record_scan(&report.root, &report)
                .inspect_err(|e| warn!(error = %e, "failed to record scan"))
                .ok()
        });

        *lock(&self.current) = Some(Arc::clone(&report));
        Ok(ScanSummary { report, session })
    }

    /// Stop the scan in progress, if any.
    pub fn cancel_scan(&self) {
        lock(&self.cancel).cancel();
    }

    /// The most recent completed scan, until an action consumes it.
    pub fn current_report(&self) -> Option<Arc<ScanReport>> {
        lock(&self.current).clone()
    }

    /// Apply `action` to every pair of the current scan.
    ///
    /// Mutating actions are recorded to the recovery ledger before this
    /// returns, and clear the current scan. If files moved but the ledger
    /// write failed, the batch comes back inside [`EngineError::Unrecorded`].
    pub fn apply_action(&self, action: ActionKind) -> Result<ApplySummary, EngineError> {
        self.apply_action_with_progress(action, |_| {})
    }

    /// [`apply_action`](Self::apply_action) with a per-file progress callback.
    pub fn apply_action_with_progress(
        &self,
        action: ActionKind,
        on_progress: impl FnMut(&OperationProgress),
    ) -> Result<ApplySummary, EngineError> {
        let report = self.prepare_apply(action)?;
        let batch = self
            .executor
            .apply_with_progress(&report.pairs, action, on_progress);
        self.finish_apply(batch)
    }

    /// Check there is something to act on and somewhere to record it.
    pub(crate) fn prepare_apply(&self, action: ActionKind) -> Result<Arc<ScanReport>, EngineError> {
        let report = self.current_report().ok_or(EngineError::NoScan)?;
        if action.is_mutating() {
            self.ledger.ensure_available()?;
        }
        Ok(report)
    }

    pub(crate) fn finish_apply(&self, batch: ActionBatch) -> Result<ApplySummary, EngineError> {
        if !batch.action.is_mutating() {
            return Ok(ApplySummary {
                batch,
                batch_id: None,
            });
        }

        *lock(&self.current) = None;
        if batch.records.is_empty() {
            return Ok(ApplySummary {
                batch,
                batch_id: None,
            });
        }

        let batch_id = match self.ledger.record(&batch) {
            Ok(id) => id,
            Err(source) => {
                warn!(
                    error = %source,
                    action = %batch.action,
                    records = batch.records.len(),
                    "batch applied but not recorded"
                );
                for record in batch.records.iter().filter(|r| r.destination.is_some()) {
                    warn!(
                        source = %record.source.display(),
                        destination = ?record.destination,
                        "unrecorded move"
                    );
                }
                return Err(EngineError::Unrecorded {
                    batch: Box::new(batch),
                    source,
                });
            }
        };
        info!(id = %batch_id, summary = %batch.summary(), "batch applied");

        Ok(ApplySummary {
            batch,
            batch_id: Some(batch_id),
        })
    }

    /// Put back the files moved by one batch.
    pub fn restore(&self, id: &BatchId) -> Result<RestoreReport, EngineError> {
        Ok(self.ledger.restore(id)?)
    }

    /// Recorded batch ids, newest first.
    pub fn list_batches(&self) -> Result<Vec<BatchId>, EngineError> {
        Ok(self.ledger.list_batches()?)
    }

    /// Summaries of every recorded batch, newest first.
    pub fn batch_summaries(
        &self,
    ) -> Result<Vec<(BatchId, Result<BatchSummary, LedgerError>)>, EngineError> {
        Ok(self.ledger.summaries()?)
    }

    /// Recorded scan sessions, newest first.
    pub fn history(&self) -> Result<Vec<ScanSession>, EngineError> {
        let store = self.store.as_ref().ok_or(EngineError::StoreDisabled)?;
        Ok(lock(store).sessions()?)
    }

    /// Compare the newest session with the previous one of the same root.
    ///
    /// Returns `None` when there is no earlier scan of that root.
    pub fn diff_latest(&self) -> Result<Option<(ScanSession, ScanSession, ScanDiff)>, EngineError> {
        let store = self.store.as_ref().ok_or(EngineError::StoreDisabled)?;
        let store = lock(store);

        let sessions = store.sessions()?;
        let Some(newest) = sessions.first() else {
            return Ok(None);
        };
        let Some(previous) = sessions[1..].iter().find(|s| s.root == newest.root) else {
            return Ok(None);
        };

        let diff = store.diff(previous.id, newest.id)?;
        Ok(Some((previous.clone(), newest.clone(), diff)))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
