//! Duplicate scanning engine for doppel.
//!
//! This crate walks a directory tree, filters and fingerprints every
//! eligible file, and classifies files into duplicate pairs.
//!
//! # Overview
//!
//! - **Ordered traversal** via jwalk with sorted directory entries
//! - **Parallel fingerprinting** via rayon (BLAKE3 for generic files,
//!   average hash for images)
//! - **Deterministic classification**: the first file in walk order with a
//!   given key is the original, no matter which hash finishes first
//! - **Cancellable**, with progress updates via broadcast channels
//!
//! # Example
//!
//! ```rust,no_run
//! use doppel_scan::{DuplicateScanner, ScanConfig};
//!
//! let config = ScanConfig::new("/path/to/scan");
//! let scanner = DuplicateScanner::new();
//! let report = scanner.scan(&config).unwrap();
//!
//! for pair in &report.pairs {
//!     println!("{} duplicates {}", pair.duplicate.display(), pair.original.display());
//! }
//! ```

mod filter;
mod hasher;
mod matcher;
pub mod perceptual;
mod progress;
mod scanner;

pub use filter::Filter;
pub use hasher::{FileHasher, Fingerprinted, FingerprintError, READ_CHUNK_SIZE};
pub use matcher::{DuplicateClassifier, ExactMatcher, Matcher, PerceptualMatcher};
pub use progress::{ScanPhase, ScanProgress};
pub use scanner::DuplicateScanner;

// Re-export core types for convenience
pub use doppel_core::{
    DuplicatePair, FileRecord, FilterConfig, Fingerprint, FingerprintKind, MatchPolicy,
    ScanConfig, ScanError, ScanReport, ScanStats, ScanWarning, WarningKind,
};
