//! Scan report and statistics.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

use crate::config::ScanConfig;
use crate::error::ScanWarning;
use crate::record::{DuplicatePair, FileRecord, extension_of};

/// Summary statistics for one scan pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanStats {
    /// Regular files seen by the walk.
    pub files_seen: u64,
    /// Files skipped by the extension or size filter.
    pub files_filtered: u64,
    /// Files successfully fingerprinted.
    pub files_fingerprinted: u64,
    /// Bytes covered by fingerprinted files.
    pub bytes_fingerprinted: u64,
    /// Images that fell back to content hashing.
    pub perceptual_fallbacks: u64,
    /// Bytes that removing every duplicate would reclaim.
    pub reclaimable_bytes: u64,
    /// Duplicate count per lowercase extension (empty key = no extension).
    pub duplicates_by_extension: BTreeMap<String, usize>,
}

impl ScanStats {
    /// Create new empty stats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a fingerprinted file.
    pub fn record_fingerprinted(&mut self, size: u64) {
        self.files_fingerprinted += 1;
        self.bytes_fingerprinted += size;
    }

    /// Record a duplicate classification.
    pub fn record_duplicate(&mut self, path: &Path, size: u64) {
        self.reclaimable_bytes += size;
        *self
            .duplicates_by_extension
            .entry(extension_of(path))
            .or_default() += 1;
    }
}

/// Complete result of one scan pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    /// Canonical root path that was scanned.
    pub root: PathBuf,

    /// When this scan was performed.
    pub scanned_at: SystemTime,

    /// Duration of the scan.
    pub scan_duration: Duration,

    /// Scan configuration used.
    pub config: ScanConfig,

    /// Every fingerprinted file, in walk order.
    pub records: Vec<FileRecord>,

    /// Duplicate pairs, in walk order of the duplicate.
    pub pairs: Vec<DuplicatePair>,

    /// Summary statistics.
    pub stats: ScanStats,

    /// Warnings encountered during scan.
    pub warnings: Vec<ScanWarning>,
}

impl ScanReport {
    /// Create a new scan report.
    pub fn new(
        root: PathBuf,
        config: ScanConfig,
        records: Vec<FileRecord>,
        pairs: Vec<DuplicatePair>,
        stats: ScanStats,
        scan_duration: Duration,
        warnings: Vec<ScanWarning>,
    ) -> Self {
        Self {
            root,
            scanned_at: SystemTime::now(),
            scan_duration,
            config,
            records,
            pairs,
            stats,
            warnings,
        }
    }

    /// Check if any duplicates were found.
    pub fn has_duplicates(&self) -> bool {
        !self.pairs.is_empty()
    }

    /// Number of duplicate files found.
    pub fn duplicate_count(&self) -> usize {
        self.pairs.len()
    }

    /// Duplicate counts by extension, for charts and summaries.
    pub fn extension_stats(&self) -> &BTreeMap<String, usize> {
        &self.stats.duplicates_by_extension
    }

    /// Check if there were any warnings during scanning.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Find the original a path was classified as duplicating.
    pub fn original_of(&self, duplicate: &Path) -> Option<&Path> {
        self.pairs
            .iter()
            .find(|p| p.duplicate == duplicate)
            .map(|p| p.original.as_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_stats_default() {
        let stats = ScanStats::default();
        assert_eq!(stats.files_seen, 0);
        assert_eq!(stats.reclaimable_bytes, 0);
        assert!(stats.duplicates_by_extension.is_empty());
    }

    #[test]
    fn test_scan_stats_record_duplicate() {
        let mut stats = ScanStats::new();
        stats.record_duplicate(Path::new("/a/b.TXT"), 10);
        stats.record_duplicate(Path::new("/a/c.txt"), 5);
        stats.record_duplicate(Path::new("/a/README"), 1);

        assert_eq!(stats.reclaimable_bytes, 16);
        assert_eq!(stats.duplicates_by_extension.get("txt"), Some(&2));
        assert_eq!(stats.duplicates_by_extension.get(""), Some(&1));
    }
}
