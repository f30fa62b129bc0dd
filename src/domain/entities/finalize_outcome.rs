use crate::domain::entities::{DocumentDraft, FieldIssue};
use serde::{Deserialize, Serialize};

/// Terminal result of a finalize request, surfaced to the caller.
#[derive(Debug, Clone)]
pub enum FinalizeOutcome {
    /// Upload and server confirmation both succeeded; the record is now
    /// immutable.
    Finalized(DocumentDraft),
    /// Blocking field issues; the server was never contacted.
    ValidationFailed(Vec<FieldIssue>),
    /// The server already holds a newer version. Terminal: requires explicit
    /// user resolution, never auto-retried.
    Conflict {
        local_version: i64,
        server_version: i64,
    },
    /// Upload or confirm failed after retries; fields are intact and the
    /// record stays pending sync.
    Failed { reason: String },
}

impl FinalizeOutcome {
    pub fn is_finalized(&self) -> bool {
        matches!(self, FinalizeOutcome::Finalized(_))
    }
}

/// Digest persisted into `conflict_data` when a conflict is surfaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictDigest {
    pub local_version: i64,
    pub server_version: i64,
    /// Server-reported status when known (reconciler path); confirm
    /// rejections only carry versions.
    pub server_status: Option<String>,
    pub observed_at: i64,
}
