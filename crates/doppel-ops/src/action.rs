//! Action kinds and per-file action records.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use doppel_core::DuplicatePair;

/// What to do with each duplicate.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Relocate into the quarantine root.
    #[strum(to_string = "move")]
    Move,
    /// Relocate into the trash root.
    #[strum(to_string = "soft_delete", serialize = "soft-delete")]
    SoftDelete,
    /// Remove the file for good.
    #[strum(to_string = "permanent_delete", serialize = "permanent-delete")]
    PermanentDelete,
    /// Report what would happen without touching anything.
    #[strum(to_string = "preview")]
    Preview,
}

impl ActionKind {
    /// Whether this action changes the filesystem.
    pub fn is_mutating(self) -> bool {
        !matches!(self, Self::Preview)
    }

    /// Whether a successful record of this action can be restored.
    pub fn is_restorable(self) -> bool {
        matches!(self, Self::Move | Self::SoftDelete)
    }

    /// Past-tense verb for summaries.
    pub fn past_tense(self) -> &'static str {
        match self {
            Self::Move => "Moved",
            Self::SoftDelete => "Trashed",
            Self::PermanentDelete => "Deleted",
            Self::Preview => "Previewed",
        }
    }
}

/// Result of acting on one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionOutcome {
    Ok,
    Failed,
}

/// What happened to one duplicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRecord {
    /// The duplicate's path before the action.
    pub source: PathBuf,
    /// The original it duplicates.
    pub original: PathBuf,
    /// The action applied.
    pub action: ActionKind,
    /// Where the file went, for relocating actions that succeeded.
    pub destination: Option<PathBuf>,
    /// When the action ran.
    pub timestamp: DateTime<Utc>,
    /// Whether it worked.
    pub outcome: ActionOutcome,
    /// Why it failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ActionRecord {
    /// A successful record.
    pub fn ok(pair: &DuplicatePair, action: ActionKind, destination: Option<PathBuf>) -> Self {
        Self {
            source: pair.duplicate.clone(),
            original: pair.original.clone(),
            action,
            destination,
            timestamp: Utc::now(),
            outcome: ActionOutcome::Ok,
            error: None,
        }
    }

    /// A failed record.
    pub fn failed(pair: &DuplicatePair, action: ActionKind, message: impl Into<String>) -> Self {
        Self {
            source: pair.duplicate.clone(),
            original: pair.original.clone(),
            action,
            destination: None,
            timestamp: Utc::now(),
            outcome: ActionOutcome::Failed,
            error: Some(message.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.outcome == ActionOutcome::Ok
    }
}

/// The records produced by one executor invocation, in pair order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionBatch {
    /// The action applied to every pair.
    pub action: ActionKind,
    /// When the batch started.
    pub started_at: DateTime<Utc>,
    /// One record per pair.
    pub records: Vec<ActionRecord>,
}

impl ActionBatch {
    /// Start an empty batch.
    pub fn new(action: ActionKind) -> Self {
        Self {
            action,
            started_at: Utc::now(),
            records: Vec::new(),
        }
    }

    /// Number of records that succeeded.
    pub fn succeeded(&self) -> usize {
        self.records.iter().filter(|r| r.is_ok()).count()
    }

    /// Number of records that failed.
    pub fn failed(&self) -> usize {
        self.records.len() - self.succeeded()
    }

    /// Check if every record succeeded.
    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    /// Records that failed.
    pub fn failures(&self) -> impl Iterator<Item = &ActionRecord> {
        self.records.iter().filter(|r| !r.is_ok())
    }

    /// Get a human-readable summary of the batch.
    pub fn summary(&self) -> String {
        let verb = self.action.past_tense();
        if self.failed() == 0 {
            format!("{} {} duplicates", verb, self.succeeded())
        } else {
            format!(
                "{} {} duplicates, {} failed",
                verb,
                self.succeeded(),
                self.failed()
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_action_kind_strings() {
        assert_eq!(ActionKind::SoftDelete.to_string(), "soft_delete");
        assert_eq!(ActionKind::from_str("soft-delete").unwrap(), ActionKind::SoftDelete);
        assert_eq!(ActionKind::from_str("soft_delete").unwrap(), ActionKind::SoftDelete);
        assert_eq!(ActionKind::from_str("move").unwrap(), ActionKind::Move);
        assert!(ActionKind::from_str("shred").is_err());
    }

    #[test]
    fn test_action_kind_json() {
        let json = serde_json::to_string(&ActionKind::PermanentDelete).unwrap();
        assert_eq!(json, "\"permanent_delete\"");
    }

    #[test]
    fn test_batch_summary() {
        let pair = DuplicatePair::new("/b", "/a");
        let mut batch = ActionBatch::new(ActionKind::Move);
        batch.records.push(ActionRecord::ok(&pair, ActionKind::Move, None));
        assert_eq!(batch.summary(), "Moved 1 duplicates");

        batch
            .records
            .push(ActionRecord::failed(&pair, ActionKind::Move, "gone"));
        assert_eq!(batch.summary(), "Moved 1 duplicates, 1 failed");
        assert_eq!(batch.failures().count(), 1);
    }
}
