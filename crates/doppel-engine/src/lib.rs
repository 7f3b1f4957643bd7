//! Entry points for driving doppel from a front end.
//!
//! An [`Engine`] owns one configuration, the current scan result, the
//! recovery ledger and (optionally) the scan store. Front ends call
//! [`Engine::start_scan`], [`Engine::apply_action`] and [`Engine::restore`],
//! and render the returned values themselves; nothing here prints.
//!
//! Schedulers and GUIs that must not block can use [`spawn_scan`] and
//! [`spawn_apply`], which run the work on tokio's blocking pool and stream
//! [`EngineEvent`]s back.

mod background;
mod config;
mod engine;
mod error;

pub use background::{spawn_apply, spawn_scan, EngineEvent, ENGINE_CHANNEL_SIZE};
pub use config::DoppelConfig;
pub use engine::{ApplySummary, Engine, ScanSummary};
pub use error::EngineError;

// Re-export the types front ends need
pub use doppel_core::{ActionRoots, FilterConfig, MatchPolicy, ScanReport};
pub use doppel_ops::{
    ActionKind, BatchId, BatchSummary, LedgerError, OperationProgress, RestoreOutcome,
    RestoreReport,
};
pub use doppel_scan::{ScanPhase, ScanProgress};
pub use doppel_store::{ScanDiff, ScanSession, SessionId};
