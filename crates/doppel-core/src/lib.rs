//! Core types and configuration for doppel.
//!
//! This crate provides the data model shared by the scanner, the action
//! executor and the stores: file records, fingerprints, duplicate pairs,
//! scan reports and their configuration.

mod config;
mod error;
mod record;
mod report;

pub use config::{
    ActionRoots, DEFAULT_IMAGE_EXTENSIONS, FilterConfig, FilterConfigBuilder, MatchPolicy,
    ScanConfig, ScanConfigBuilder, normalize_extension,
};
pub use error::{ScanError, ScanWarning, WarningKind};
pub use record::{DuplicatePair, FileRecord, Fingerprint, FingerprintKind, extension_of};
pub use report::{ScanReport, ScanStats};
