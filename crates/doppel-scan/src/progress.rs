//! Scan progress reporting.

use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Stage of a duplicate scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPhase {
    /// Walking the tree and filtering candidates.
    Walking,
    /// Computing fingerprints.
    Fingerprinting,
    /// Assigning originals and duplicates.
    Classifying,
}

/// Progress information during a scan.
#[derive(Debug, Clone)]
pub struct ScanProgress {
    /// Current stage.
    pub phase: ScanPhase,
    /// Regular files seen by the walk so far.
    pub files_seen: u64,
    /// Candidates that passed the filter.
    pub candidates: u64,
    /// Files fingerprinted so far.
    pub files_fingerprinted: u64,
    /// Duplicates found so far.
    pub duplicates_found: u64,
    /// Current path being processed.
    pub current_path: PathBuf,
    /// Number of warnings encountered.
    pub warnings_count: u64,
    /// Time elapsed since scan started.
    pub elapsed: Duration,
}

impl ScanProgress {
    /// Create initial progress state.
    pub fn new() -> Self {
        Self {
            phase: ScanPhase::Walking,
            files_seen: 0,
            candidates: 0,
            files_fingerprinted: 0,
            duplicates_found: 0,
            current_path: PathBuf::new(),
            warnings_count: 0,
            elapsed: Duration::ZERO,
        }
    }

    /// Fraction of candidates fingerprinted, in `0.0..=1.0`.
    pub fn fingerprint_ratio(&self) -> f64 {
        if self.candidates == 0 {
            0.0
        } else {
            self.files_fingerprinted as f64 / self.candidates as f64
        }
    }

    /// Calculate scan rate in files per second.
    pub fn files_per_second(&self) -> f64 {
        if self.elapsed.as_secs_f64() > 0.0 {
            self.files_seen as f64 / self.elapsed.as_secs_f64()
        } else {
            0.0
        }
    }
}

impl Default for ScanProgress {
    fn default() -> Self {
        Self::new()
    }
}

/// Progress tracker with timing, owned by the scanning thread.
#[derive(Debug)]
pub(crate) struct ProgressTracker {
    start_time: Instant,
    current: ScanProgress,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            current: ScanProgress::new(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn set_phase(&mut self, phase: ScanPhase) {
        self.current.phase = phase;
    }

    pub fn record_seen(&mut self, path: PathBuf) {
        self.current.files_seen += 1;
        self.current.current_path = path;
    }

    pub fn record_candidate(&mut self) {
        self.current.candidates += 1;
    }

    pub fn record_fingerprinted(&mut self, count: u64) {
        self.current.files_fingerprinted = count;
    }

    pub fn record_duplicate(&mut self) {
        self.current.duplicates_found += 1;
    }

    pub fn set_warnings(&mut self, count: usize) {
        self.current.warnings_count = count as u64;
    }

    pub fn snapshot(&self) -> ScanProgress {
        ScanProgress {
            elapsed: self.start_time.elapsed(),
            ..self.current.clone()
        }
    }
}
