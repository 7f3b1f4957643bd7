//! Background scanning and applying.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::mpsc;
use tracing::debug;

use doppel_core::FilterConfig;
use doppel_ops::{start_apply, ActionKind, ApplyEvent, OperationProgress};
use doppel_scan::ScanProgress;

use crate::engine::{ApplySummary, Engine, ScanSummary};
use crate::error::EngineError;

/// Channel buffer size for engine events.
pub const ENGINE_CHANNEL_SIZE: usize = 100;

/// Updates sent from background tasks.
#[derive(Debug)]
pub enum EngineEvent {
    /// Scan progress update.
    Progress(ScanProgress),
    /// Scan finished; always the last event of a scan.
    ScanComplete(Result<ScanSummary, EngineError>),
    /// Per-file progress of an action.
    ApplyProgress(OperationProgress),
    /// Action finished; always the last event of an apply.
    ApplyComplete(Result<ApplySummary, EngineError>),
}

/// Start a background scan.
///
/// Returns a receiver that will receive scan progress updates and the final result.
pub fn spawn_scan(
    engine: Arc<Engine>,
    root: PathBuf,
    filter: Option<FilterConfig>,
) -> mpsc::Receiver<EngineEvent> {
    let (tx, rx) = mpsc::channel(ENGINE_CHANNEL_SIZE);

    tokio::spawn(async move {
        // Spawn task to forward progress updates
        let progress_task = tokio::spawn(forward_progress(engine.subscribe(), tx.clone()));

        // Run scan in blocking task (jwalk and rayon do the real work)
        let result = tokio::task::spawn_blocking(move || engine.start_scan(&root, filter))
            .await
            .unwrap_or_else(|e| Err(EngineError::Task(e.to_string())));

        // Cancel progress task and send final result
        progress_task.abort();
        let _ = tx.send(EngineEvent::ScanComplete(result)).await;
    });

    rx
}

/// Relay scan progress until the scanner or the receiver goes away.
///
/// Progress is a stream of snapshots, so updates dropped while this task
/// lagged behind are skipped rather than ending the stream.
async fn forward_progress(
    mut progress_rx: broadcast::Receiver<ScanProgress>,
    tx: mpsc::Sender<EngineEvent>,
) {
    loop {
        match progress_rx.recv().await {
            Ok(progress) => {
                if tx.send(EngineEvent::Progress(progress)).await.is_err() {
                    break;
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                debug!(skipped, "progress receiver lagged");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

/// Apply an action to the current scan in the background.
///
/// Returns a receiver that will receive per-file progress and the final result.
pub fn spawn_apply(engine: Arc<Engine>, action: ActionKind) -> mpsc::Receiver<EngineEvent> {
    let (tx, rx) = mpsc::channel(ENGINE_CHANNEL_SIZE);

    tokio::spawn(async move {
        let report = match engine.prepare_apply(action) {
            Ok(report) => report,
            Err(e) => {
                let _ = tx.send(EngineEvent::ApplyComplete(Err(e))).await;
                return;
            }
        };

        let mut events = start_apply(engine.executor().clone(), report.pairs.clone(), action);
        while let Some(event) = events.recv().await {
            match event {
                // Keep draining after the receiver is gone so the batch is still recorded.
                ApplyEvent::Progress(progress) => {
                    let _ = tx.send(EngineEvent::ApplyProgress(progress)).await;
                }
                ApplyEvent::Complete(batch) => {
                    let engine = Arc::clone(&engine);
                    let result = tokio::task::spawn_blocking(move || engine.finish_apply(batch))
                        .await
                        .unwrap_or_else(|e| Err(EngineError::Task(e.to_string())));
                    let _ = tx.send(EngineEvent::ApplyComplete(result)).await;
                    break;
                }
            }
        }
    });

    rx
}
