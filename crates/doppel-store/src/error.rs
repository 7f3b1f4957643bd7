//! Error types for the scan store.

use std::path::PathBuf;

use thiserror::Error;

use crate::models::SessionId;

/// Errors from the scan store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Cannot open scan store at {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Scan session {0} not found")]
    SessionNotFound(SessionId),

    #[error("Malformed row in scan store: {message}")]
    Malformed { message: String },
}
