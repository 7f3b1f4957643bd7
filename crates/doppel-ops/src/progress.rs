//! Progress reporting for action batches.

use std::path::PathBuf;

use crate::action::ActionKind;

/// Progress information for an ongoing batch.
#[derive(Debug, Clone)]
pub struct OperationProgress {
    /// The action being applied.
    pub action: ActionKind,
    /// Number of files processed, successfully or not.
    pub files_completed: usize,
    /// Total number of files to process.
    pub files_total: usize,
    /// Number of files that failed so far.
    pub files_failed: usize,
    /// Number of bytes processed so far.
    pub bytes_processed: u64,
    /// The file currently being processed.
    pub current_file: Option<PathBuf>,
}

impl OperationProgress {
    /// Create a new progress tracker for a batch.
    pub fn new(action: ActionKind, files_total: usize) -> Self {
        Self {
            action,
            files_completed: 0,
            files_total,
            files_failed: 0,
            bytes_processed: 0,
            current_file: None,
        }
    }

    /// Get the progress as a percentage (0.0 to 100.0).
    pub fn percentage(&self) -> f64 {
        if self.files_total > 0 {
            (self.files_completed as f64 / self.files_total as f64) * 100.0
        } else {
            0.0
        }
    }

    /// Update the current file being processed.
    pub fn set_current_file(&mut self, path: Option<PathBuf>) {
        self.current_file = path;
    }

    /// Increment the completed count and add bytes.
    pub fn complete_file(&mut self, bytes: u64) {
        self.files_completed += 1;
        self.bytes_processed += bytes;
    }

    /// Count a failed file.
    pub fn fail_file(&mut self) {
        self.files_completed += 1;
        self.files_failed += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentage() {
        let mut progress = OperationProgress::new(ActionKind::Move, 4);
        assert_eq!(progress.percentage(), 0.0);

        progress.complete_file(10);
        progress.fail_file();
        assert_eq!(progress.percentage(), 50.0);
        assert_eq!(progress.files_failed, 1);
        assert_eq!(progress.bytes_processed, 10);
    }

    #[test]
    fn test_empty_batch_percentage() {
        assert_eq!(OperationProgress::new(ActionKind::Preview, 0).percentage(), 0.0);
    }
}
