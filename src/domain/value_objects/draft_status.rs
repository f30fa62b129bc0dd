use serde::{Deserialize, Serialize};
use std::fmt;

/// Authoritative lifecycle status of a document draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftStatus {
    Draft,
    Saving,
    Ready,
    Finalizing,
    Finalized,
    FinalizeFailed,
}

impl DraftStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DraftStatus::Draft => "draft",
            DraftStatus::Saving => "saving",
            DraftStatus::Ready => "ready",
            DraftStatus::Finalizing => "finalizing",
            DraftStatus::Finalized => "finalized",
            DraftStatus::FinalizeFailed => "finalize_failed",
        }
    }

    pub fn parse(value: &str) -> Result<Self, String> {
        match value {
            "draft" => Ok(DraftStatus::Draft),
            "saving" => Ok(DraftStatus::Saving),
            "ready" => Ok(DraftStatus::Ready),
            "finalizing" => Ok(DraftStatus::Finalizing),
            "finalized" => Ok(DraftStatus::Finalized),
            "finalize_failed" => Ok(DraftStatus::FinalizeFailed),
            other => Err(format!("Unknown draft status: {other}")),
        }
    }

    /// Legal transition table. The store rejects everything else with an
    /// illegal-transition error.
    pub fn can_transition_to(&self, to: DraftStatus) -> bool {
        use DraftStatus::*;
        matches!(
            (self, to),
            (Draft, Saving)
                | (Ready, Saving)
                | (FinalizeFailed, Saving)
                | (Saving, Saving)
                | (Saving, Ready)
                | (Ready, Finalizing)
                | (Finalizing, Finalized)
                | (Finalizing, FinalizeFailed)
                | (FinalizeFailed, Finalizing)
        )
    }

    /// Field edits are accepted in every state that has not begun or
    /// completed finalization.
    pub fn accepts_edits(&self) -> bool {
        !matches!(self, DraftStatus::Finalizing | DraftStatus::Finalized)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, DraftStatus::Finalized)
    }
}

impl fmt::Display for DraftStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
