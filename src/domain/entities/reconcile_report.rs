use crate::domain::value_objects::DocumentId;
use serde::{Deserialize, Serialize};

/// Per-document result of one reconcile pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum ReconcileOutcome {
    /// Local draft state was pushed and acknowledged.
    Pushed { document_id: DocumentId },
    /// A locally failed finalize was re-attempted and succeeded.
    FinalizeRecovered { document_id: DocumentId },
    /// Server is ahead; conflict recorded for user resolution, local state
    /// untouched.
    Conflict {
        document_id: DocumentId,
        local_version: i64,
        server_version: i64,
    },
    /// Server already matches local state; pending flag cleared.
    AlreadySynced { document_id: DocumentId },
    /// Transient failure; the record stays pending and is retried next run.
    Skipped {
        document_id: DocumentId,
        reason: String,
    },
}

impl ReconcileOutcome {
    pub fn document_id(&self) -> &DocumentId {
        match self {
            ReconcileOutcome::Pushed { document_id }
            | ReconcileOutcome::FinalizeRecovered { document_id }
            | ReconcileOutcome::Conflict { document_id, .. }
            | ReconcileOutcome::AlreadySynced { document_id }
            | ReconcileOutcome::Skipped { document_id, .. } => document_id,
        }
    }
}

/// Summary of one reconciler run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub examined: u32,
    pub pushed: u32,
    pub recovered: u32,
    pub conflicts: u32,
    pub already_synced: u32,
    pub skipped: u32,
    pub outcomes: Vec<ReconcileOutcome>,
}

impl ReconcileReport {
    pub fn record(&mut self, outcome: ReconcileOutcome) {
        self.examined += 1;
        match &outcome {
            ReconcileOutcome::Pushed { .. } => self.pushed += 1,
            ReconcileOutcome::FinalizeRecovered { .. } => self.recovered += 1,
            ReconcileOutcome::Conflict { .. } => self.conflicts += 1,
            ReconcileOutcome::AlreadySynced { .. } => self.already_synced += 1,
            ReconcileOutcome::Skipped { .. } => self.skipped += 1,
        }
        self.outcomes.push(outcome);
    }
}
