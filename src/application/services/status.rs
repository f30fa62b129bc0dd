use serde::{Deserialize, Serialize};
use std::fmt;

/// What the UI status indicator shows for one open document session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum SessionStatus {
    /// No unsaved edits.
    Idle,
    /// Edits buffered, debounce timer running.
    PendingSave,
    Saving,
    Saved,
    /// Save retries exhausted; buffered edits are kept and re-sent with the
    /// next edit or explicit save.
    SaveFailed { message: String },
    Finalizing,
    Finalized,
    FinalizeFailed { message: String },
    /// The server moved past this client; user resolution required.
    Conflict {
        local_version: i64,
        server_version: i64,
    },
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Idle => write!(f, "idle"),
            SessionStatus::PendingSave => write!(f, "pending"),
            SessionStatus::Saving => write!(f, "saving…"),
            SessionStatus::Saved => write!(f, "saved"),
            SessionStatus::SaveFailed { message } => write!(f, "save failed: {message}"),
            SessionStatus::Finalizing => write!(f, "finalizing…"),
            SessionStatus::Finalized => write!(f, "finalized"),
            SessionStatus::FinalizeFailed { message } => write!(f, "finalize failed: {message}"),
            SessionStatus::Conflict {
                local_version,
                server_version,
            } => write!(f, "conflict (local v{local_version}, server v{server_version})"),
        }
    }
}
