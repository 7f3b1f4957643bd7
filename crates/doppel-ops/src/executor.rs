//! Applies an action to a list of duplicate pairs.

use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use doppel_core::{ActionRoots, DuplicatePair};

use crate::OPERATION_CHANNEL_SIZE;
use crate::action::{ActionBatch, ActionKind, ActionRecord};
use crate::conflict::{move_file, unique_destination};
use crate::progress::OperationProgress;

/// Names tried when another writer keeps taking the chosen destination.
const MAX_CLAIM_ATTEMPTS: usize = 8;

/// Event sent through the channel while a batch runs in the background.
#[derive(Debug)]
pub enum ApplyEvent {
    /// Progress update, sent before each file and once at the end.
    Progress(OperationProgress),
    /// The batch finished.
    Complete(ActionBatch),
}

/// Applies actions to duplicates, relocating into the configured roots.
#[derive(Debug, Clone)]
pub struct ActionExecutor {
    roots: ActionRoots,
}

impl ActionExecutor {
    /// Create an executor writing under the given roots.
    pub fn new(roots: ActionRoots) -> Self {
        Self { roots }
    }

    /// The configured roots.
    pub fn roots(&self) -> &ActionRoots {
        &self.roots
    }

    /// Directory a relocating action moves files into.
    pub fn destination_root(&self, action: ActionKind) -> Option<&Path> {
        match action {
            ActionKind::Move => Some(&self.roots.quarantine),
            ActionKind::SoftDelete => Some(&self.roots.trash),
            ActionKind::PermanentDelete | ActionKind::Preview => None,
        }
    }

    /// Apply `action` to every pair, in order.
    pub fn apply(&self, pairs: &[DuplicatePair], action: ActionKind) -> ActionBatch {
        self.apply_with_progress(pairs, action, |_| {})
    }

    /// Apply `action` to every pair, reporting progress before each file.
    pub fn apply_with_progress(
        &self,
        pairs: &[DuplicatePair],
        action: ActionKind,
        mut on_progress: impl FnMut(&OperationProgress),
    ) -> ActionBatch {
        let mut batch = ActionBatch::new(action);
        let mut progress = OperationProgress::new(action, pairs.len());

        // Ensure destination exists and is a directory
        let root_error = self
            .destination_root(action)
            .and_then(|root| fs::create_dir_all(root).err().map(|e| (root, e)));
        if let Some((root, e)) = root_error {
            let message = format!("Failed to create destination {}: {}", root.display(), e);
            warn!(root = %root.display(), error = %e, "destination root unavailable");
            batch.records = pairs
                .iter()
                .map(|pair| ActionRecord::failed(pair, action, message.clone()))
                .collect();
            progress.files_completed = pairs.len();
            progress.files_failed = pairs.len();
            on_progress(&progress);
            return batch;
        }

        for pair in pairs {
            progress.set_current_file(Some(pair.duplicate.clone()));
            on_progress(&progress);

            let size = fs::symlink_metadata(&pair.duplicate)
                .map(|m| m.len())
                .unwrap_or(0);

            match self.apply_one(pair, action) {
                Ok(destination) => {
                    progress.complete_file(size);
                    batch.records.push(ActionRecord::ok(pair, action, destination));
                }
                Err(message) => {
                    warn!(
                        path = %pair.duplicate.display(),
                        action = %action,
                        error = %message,
                        "action failed"
                    );
                    progress.fail_file();
                    batch.records.push(ActionRecord::failed(pair, action, message));
                }
            }
        }

        progress.set_current_file(None);
        on_progress(&progress);

        info!(
            action = %action,
            succeeded = batch.succeeded(),
            failed = batch.failed(),
            "batch applied"
        );
        batch
    }

    /// Act on a single duplicate, returning where it went.
    fn apply_one(
        &self,
        pair: &DuplicatePair,
        action: ActionKind,
    ) -> Result<Option<PathBuf>, String> {
        let source = &pair.duplicate;

        match action {
            ActionKind::Preview => Ok(None),
            ActionKind::PermanentDelete => {
                ensure_regular_file(source)?;
                fs::remove_file(source).map_err(|e| format!("Failed to delete: {}", e))?;
                Ok(None)
            }
            ActionKind::Move | ActionKind::SoftDelete => {
                ensure_regular_file(source)?;
                let root = self
                    .destination_root(action)
                    .ok_or_else(|| format!("No destination for {action}"))?;
                let file_name = source
                    .file_name()
                    .ok_or_else(|| format!("{} has no file name", source.display()))?;
                claim_destination(source, root, file_name).map(Some)
            }
        }
    }
}

/// Move `source` into `root` under a free name.
///
/// A name taken between choosing it and moving into it is skipped and the
/// next free one tried.
fn claim_destination(source: &Path, root: &Path, file_name: &OsStr) -> Result<PathBuf, String> {
    for _ in 0..MAX_CLAIM_ATTEMPTS {
        let dest = unique_destination(root, file_name);
        match move_file(source, &dest) {
            Ok(()) => return Ok(dest),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                debug!(dest = %dest.display(), "destination taken, picking another name");
            }
            Err(e) => return Err(format!("Failed to move: {}", e)),
        }
    }
    Err(format!(
        "No free name for {} in {}",
        source.display(),
        root.display()
    ))
}

fn ensure_regular_file(path: &Path) -> Result<(), String> {
    match fs::symlink_metadata(path) {
        Ok(m) if m.is_file() => Ok(()),
        Ok(_) => Err(format!("{} is not a regular file", path.display())),
        Err(e) => Err(format!("Cannot access {}: {}", path.display(), e)),
    }
}

/// Run a batch on a blocking task.
///
/// Returns a receiver for progress updates, ending with
/// [`ApplyEvent::Complete`].
pub fn start_apply(
    executor: ActionExecutor,
    pairs: Vec<DuplicatePair>,
    action: ActionKind,
) -> mpsc::Receiver<ApplyEvent> {
    let (tx, rx) = mpsc::channel(OPERATION_CHANNEL_SIZE);

    tokio::spawn(async move {
        let progress_tx = tx.clone();
        let task_pairs = pairs.clone();
        let result = tokio::task::spawn_blocking(move || {
            executor.apply_with_progress(&task_pairs, action, |progress| {
                let _ = progress_tx.blocking_send(ApplyEvent::Progress(progress.clone()));
            })
        })
        .await;

        let batch = match result {
            Ok(batch) => batch,
            Err(e) => {
                let message = format!("Task failed: {}", e);
                let mut batch = ActionBatch::new(action);
                batch.records = pairs
                    .iter()
                    .map(|pair| ActionRecord::failed(pair, action, message.clone()))
                    .collect();
                batch
            }
        };

        let _ = tx.send(ApplyEvent::Complete(batch)).await;
    });

    rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    use crate::ActionOutcome;

    fn setup() -> (TempDir, ActionExecutor, Vec<DuplicatePair>) {
        let temp = TempDir::new().unwrap();
        let data = temp.path().join("data");
        fs::create_dir(&data).unwrap();
        fs::write(data.join("a.txt"), "X").unwrap();
        fs::write(data.join("b.txt"), "X").unwrap();

        let executor = ActionExecutor::new(ActionRoots::under(temp.path().join("doppel")));
        let pairs = vec![DuplicatePair::new(data.join("b.txt"), data.join("a.txt"))];
        (temp, executor, pairs)
    }

    #[test]
    fn test_preview_touches_nothing() {
        let (temp, executor, pairs) = setup();
        let batch = executor.apply(&pairs, ActionKind::Preview);

        assert!(batch.is_success());
        assert_eq!(batch.records[0].destination, None);
        assert!(pairs[0].duplicate.exists());
        assert!(!temp.path().join("doppel").exists());
    }

    #[test]
    fn test_move_into_quarantine() {
        let (_temp, executor, pairs) = setup();
        let batch = executor.apply(&pairs, ActionKind::Move);

        let dest = batch.records[0].destination.clone().unwrap();
        assert_eq!(dest, executor.roots().quarantine.join("b.txt"));
        assert!(dest.exists());
        assert!(!pairs[0].duplicate.exists());
        assert!(pairs[0].original.exists());
    }

    #[test]
    fn test_soft_delete_into_trash_with_rename() {
        let (_temp, executor, pairs) = setup();
        fs::create_dir_all(&executor.roots().trash).unwrap();
        fs::write(executor.roots().trash.join("b.txt"), "older").unwrap();

        let batch = executor.apply(&pairs, ActionKind::SoftDelete);

        assert_eq!(batch.records[0].action, ActionKind::SoftDelete);
        assert_eq!(
            batch.records[0].destination,
            Some(executor.roots().trash.join("b (1).txt"))
        );
        assert_eq!(
            fs::read_to_string(executor.roots().trash.join("b.txt")).unwrap(),
            "older"
        );
    }

    #[test]
    fn test_same_names_keep_both_copies() {
        let temp = TempDir::new().unwrap();
        let roots = ActionRoots::under(temp.path().join("doppel"));
        for (dir, content) in [("one", "first"), ("two", "second")] {
            fs::create_dir(temp.path().join(dir)).unwrap();
            fs::write(temp.path().join(dir).join("b.txt"), content).unwrap();
        }
        fs::create_dir_all(&roots.quarantine).unwrap();

        let first = claim_destination(
            &temp.path().join("one").join("b.txt"),
            &roots.quarantine,
            OsStr::new("b.txt"),
        )
        .unwrap();
        let second = claim_destination(
            &temp.path().join("two").join("b.txt"),
            &roots.quarantine,
            OsStr::new("b.txt"),
        )
        .unwrap();

        assert_eq!(first, roots.quarantine.join("b.txt"));
        assert_eq!(second, roots.quarantine.join("b (1).txt"));
        assert_eq!(fs::read_to_string(first).unwrap(), "first");
        assert_eq!(fs::read_to_string(second).unwrap(), "second");
    }

    #[test]
    fn test_permanent_delete() {
        let (_temp, executor, pairs) = setup();
        let batch = executor.apply(&pairs, ActionKind::PermanentDelete);

        assert!(batch.is_success());
        assert_eq!(batch.records[0].destination, None);
        assert!(!pairs[0].duplicate.exists());
    }

    #[test]
    fn test_unavailable_root_fails_every_record() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("blocker");
        fs::write(&blocker, "not a directory").unwrap();
        fs::write(temp.path().join("b.txt"), "X").unwrap();

        let roots = doppel_core::ActionRoots {
            quarantine: blocker.join("quarantine"),
            trash: blocker.join("trash"),
            recovery: blocker.join("recovery"),
        };
        let pairs = vec![
            DuplicatePair::new(temp.path().join("b.txt"), temp.path().join("a.txt")),
            DuplicatePair::new(temp.path().join("c.txt"), temp.path().join("a.txt")),
        ];
        let batch = ActionExecutor::new(roots).apply(&pairs, ActionKind::Move);

        assert_eq!(batch.records.len(), 2);
        assert!(batch.records.iter().all(|r| r.outcome == ActionOutcome::Failed));
        assert!(temp.path().join("b.txt").exists());
    }

    #[tokio::test]
    async fn test_start_apply_streams_progress() {
        let (_temp, executor, pairs) = setup();
        let mut rx = start_apply(executor, pairs, ActionKind::Move);

        let mut progress_events = 0;
        let mut batch = None;
        while let Some(event) = rx.recv().await {
            match event {
                ApplyEvent::Progress(_) => progress_events += 1,
                ApplyEvent::Complete(b) => batch = Some(b),
            }
        }

        assert_eq!(progress_events, 2);
        assert!(batch.unwrap().is_success());
    }
}
