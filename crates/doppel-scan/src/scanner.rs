//! Ordered walk, parallel fingerprinting, serial classification.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};

use jwalk::{Parallelism, WalkDir};
use rayon::prelude::*;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use doppel_core::{
    FileRecord, ScanConfig, ScanError, ScanReport, ScanStats, ScanWarning, WarningKind,
};

use crate::filter::Filter;
use crate::hasher::{FileHasher, Fingerprinted};
use crate::matcher::DuplicateClassifier;
use crate::progress::{ProgressTracker, ScanPhase, ScanProgress};

/// Files between progress broadcasts.
const PROGRESS_INTERVAL: u64 = 256;

/// A file that passed the filter, with the metadata seen during the walk.
#[derive(Debug)]
struct Candidate {
    path: PathBuf,
    size: u64,
    modified: SystemTime,
}

/// Duplicate scanner using jwalk for traversal and rayon for hashing.
pub struct DuplicateScanner {
    progress_tx: broadcast::Sender<ScanProgress>,
}

impl DuplicateScanner {
    /// Create a new scanner.
    pub fn new() -> Self {
        let (progress_tx, _) = broadcast::channel(100);
        Self { progress_tx }
    }

    /// Subscribe to scan progress updates.
    pub fn subscribe(&self) -> broadcast::Receiver<ScanProgress> {
        self.progress_tx.subscribe()
    }

    /// Scan the configured root for duplicates.
    pub fn scan(&self, config: &ScanConfig) -> Result<ScanReport, ScanError> {
        self.scan_with_cancel(config, &CancellationToken::new())
    }

    /// Scan the configured root, stopping early when `cancel` fires.
    ///
    /// A cancelled scan returns [`ScanError::Interrupted`] and no partial
    /// report.
    pub fn scan_with_cancel(
        &self,
        config: &ScanConfig,
        cancel: &CancellationToken,
    ) -> Result<ScanReport, ScanError> {
        let mut tracker = ProgressTracker::new();
        let root = config
            .root
            .canonicalize()
            .map_err(|e| ScanError::io(&config.root, e))?;

        if !root.is_dir() {
            return Err(ScanError::NotADirectory { path: root });
        }

        let filter = Filter::new(config)?;
        let hasher = FileHasher::new(config.match_policy.clone());
        let mut stats = ScanStats::new();
        let mut warnings = Vec::new();

        info!(root = %root.display(), "starting duplicate scan");

        let candidates = self.collect_candidates(
            config,
            &root,
            &filter,
            cancel,
            &mut tracker,
            &mut stats,
            &mut warnings,
        )?;

        tracker.set_phase(ScanPhase::Fingerprinting);
        tracker.set_warnings(warnings.len());
        let hashed = self.fingerprint_all(config, &hasher, &candidates, cancel, &tracker)?;
        if cancel.is_cancelled() {
            return Err(ScanError::Interrupted);
        }

        tracker.set_phase(ScanPhase::Classifying);
        let mut classifier = DuplicateClassifier::new(&config.match_policy);
        let mut records = Vec::with_capacity(candidates.len());

        for (candidate, result) in candidates.into_iter().zip(hashed) {
            let fingerprinted = match result {
                Ok(f) => f,
                Err(warning) => {
                    warn!(path = %warning.path.display(), "{}", warning.message);
                    warnings.push(warning);
                    continue;
                }
            };

            stats.record_fingerprinted(candidate.size);
            if fingerprinted.fell_back {
                stats.perceptual_fallbacks += 1;
            }

            let record = FileRecord::new(
                candidate.path,
                candidate.size,
                candidate.modified,
                fingerprinted.fingerprint,
                fingerprinted.is_image,
            );

            if let Some(pair) = classifier.classify(&record) {
                debug!(
                    duplicate = %pair.duplicate.display(),
                    original = %pair.original.display(),
                    "duplicate found"
                );
                stats.record_duplicate(&record.path, record.size);
                tracker.record_duplicate();
            }
            records.push(record);
        }

        tracker.record_fingerprinted(stats.files_fingerprinted);
        tracker.set_warnings(warnings.len());
        let _ = self.progress_tx.send(tracker.snapshot());

        let pairs = classifier.into_pairs();
        info!(
            root = %root.display(),
            files = stats.files_seen,
            duplicates = pairs.len(),
            warnings = warnings.len(),
            "duplicate scan complete"
        );

        Ok(ScanReport::new(
            root,
            config.clone(),
            records,
            pairs,
            stats,
            tracker.elapsed(),
            warnings,
        ))
    }

    /// Walk the tree in sorted order and collect filter-approved files.
    #[allow(clippy::too_many_arguments)]
    fn collect_candidates(
        &self,
        config: &ScanConfig,
        root: &Path,
        filter: &Filter,
        cancel: &CancellationToken,
        tracker: &mut ProgressTracker,
        stats: &mut ScanStats,
        warnings: &mut Vec<ScanWarning>,
    ) -> Result<Vec<Candidate>, ScanError> {
        let parallelism = match config.threads {
            0 => Parallelism::RayonDefaultPool {
                busy_timeout: Duration::from_millis(100),
            },
            n => Parallelism::RayonNewPool(n),
        };

        let excluded = resolve_exclusions(root, &config.exclude_paths);
        if !excluded.is_empty() {
            debug!(count = excluded.len(), "excluding owned paths from walk");
        }

        let walker = WalkDir::new(root)
            .parallelism(parallelism)
            .sort(true)
            .skip_hidden(!config.include_hidden)
            .follow_links(false)
            .process_read_dir(move |_depth, _dir, _state, children| {
                if excluded.is_empty() {
                    return;
                }
                children.retain(|child| {
                    child
                        .as_ref()
                        .map_or(true, |entry| !is_excluded(&entry.path(), &excluded))
                });
            });

        let mut candidates = Vec::new();

        for entry_result in walker {
            if cancel.is_cancelled() {
                return Err(ScanError::Interrupted);
            }

            let entry = match entry_result {
                Ok(e) => e,
                Err(err) => {
                    let path = err.path().map(Path::to_path_buf).unwrap_or_default();
                    let kind = match err.io_error().map(std::io::Error::kind) {
                        Some(std::io::ErrorKind::PermissionDenied) => WarningKind::PermissionDenied,
                        _ => WarningKind::ReadError,
                    };
                    warn!(path = %path.display(), error = %err, "skipping unreadable entry");
                    warnings.push(ScanWarning::new(path, err.to_string(), kind));
                    continue;
                }
            };

            let file_type = entry.file_type();
            if !file_type.is_file() {
                if file_type.is_symlink() {
                    debug!(path = %entry.path().display(), "skipping symlink");
                }
                continue;
            }

            let path = entry.path();
            if path
                .strip_prefix(root)
                .is_ok_and(|relative| filter.is_ignored(relative))
            {
                continue;
            }

            let metadata = match entry.metadata() {
                Ok(m) => m,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "cannot read metadata");
                    warnings.push(ScanWarning::new(
                        &path,
                        err.to_string(),
                        WarningKind::MetadataError,
                    ));
                    continue;
                }
            };

            stats.files_seen += 1;
            tracker.record_seen(path.clone());

            let size = metadata.len();
            let file_name = entry.file_name().to_string_lossy();
            if !filter.accepts(&file_name, size) {
                stats.files_filtered += 1;
                continue;
            }

            tracker.record_candidate();
            candidates.push(Candidate {
                path,
                size,
                modified: metadata.modified().unwrap_or(std::time::UNIX_EPOCH),
            });

            if stats.files_seen % PROGRESS_INTERVAL == 0 {
                tracker.set_warnings(warnings.len());
                let _ = self.progress_tx.send(tracker.snapshot());
            }
        }

        debug!(
            seen = stats.files_seen,
            filtered = stats.files_filtered,
            candidates = candidates.len(),
            "walk complete"
        );
        Ok(candidates)
    }

    /// Fingerprint every candidate in parallel, preserving walk order.
    fn fingerprint_all(
        &self,
        config: &ScanConfig,
        hasher: &FileHasher,
        candidates: &[Candidate],
        cancel: &CancellationToken,
        tracker: &ProgressTracker,
    ) -> Result<Vec<Result<Fingerprinted, ScanWarning>>, ScanError> {
        let done = AtomicU64::new(0);
        let base = tracker.snapshot();
        let started = tracker.elapsed();

        let hash_one = |candidate: &Candidate| -> Result<Fingerprinted, ScanWarning> {
            if cancel.is_cancelled() {
                return Err(ScanWarning::new(
                    &candidate.path,
                    "Scan interrupted",
                    WarningKind::Unreadable,
                ));
            }

            let result = fingerprint_checked(hasher, candidate);

            let count = done.fetch_add(1, Ordering::Relaxed) + 1;
            if count % PROGRESS_INTERVAL == 0 {
                let _ = self.progress_tx.send(ScanProgress {
                    files_fingerprinted: count,
                    current_path: candidate.path.clone(),
                    elapsed: started,
                    ..base.clone()
                });
            }
            result
        };

        if config.threads == 0 {
            return Ok(candidates.par_iter().map(hash_one).collect());
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.threads)
            .build()
            .map_err(|e| ScanError::Other {
                message: format!("Cannot start hashing pool: {e}"),
            })?;
        Ok(pool.install(|| candidates.par_iter().map(hash_one).collect()))
    }
}

impl Default for DuplicateScanner {
    fn default() -> Self {
        Self::new()
    }
}

/// Fingerprint a candidate and confirm it did not change size meanwhile.
fn fingerprint_checked(
    hasher: &FileHasher,
    candidate: &Candidate,
) -> Result<Fingerprinted, ScanWarning> {
    let fingerprinted = hasher
        .fingerprint(&candidate.path)
        .map_err(|e| ScanWarning::unreadable(&candidate.path, e.io_error()))?;

    let now = std::fs::metadata(&candidate.path)
        .map_err(|e| ScanWarning::unreadable(&candidate.path, &e))?
        .len();
    if now != candidate.size {
        return Err(ScanWarning::changed(&candidate.path, candidate.size, now));
    }

    Ok(fingerprinted)
}

/// Canonical forms of the excluded paths that can occur below `root`.
///
/// Paths that do not exist yet are resolved through their parent so a
/// directory created later in the session still matches. An exclusion
/// containing the root itself is dropped, or nothing would be walked.
fn resolve_exclusions(root: &Path, paths: &[PathBuf]) -> Vec<PathBuf> {
    paths
        .iter()
        .map(|path| canonical_or_lexical(path))
        .filter(|path| path.starts_with(root) && !root.starts_with(path))
        .collect()
}

fn canonical_or_lexical(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => canonical_or_lexical(parent).join(name),
        _ => path.to_path_buf(),
    }
}

fn is_excluded(path: &Path, excluded: &[PathBuf]) -> bool {
    excluded.iter().any(|prefix| path.starts_with(prefix))
}
