//! Durable SQLite log of scan results for doppel.
//!
//! Each completed scan becomes one `scan_session` row plus one
//! `scanned_file` row per fingerprinted file, written in a single
//! transaction. Sessions can be listed, audited for duplicates, and diffed
//! against each other to see what changed between scans.

mod error;
mod models;
mod store;

pub use error::StoreError;
pub use models::{ScanDiff, ScanSession, SessionId, StoredFile};
pub use store::ScanStore;
