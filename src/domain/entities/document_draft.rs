use crate::domain::value_objects::{
    ArtifactRef, DealId, DocumentId, DraftStatus, FieldKey, FieldValue, TemplateId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The central entity: one record per document-in-progress. All mutations
/// go through the draft store; nothing else touches `status` or
/// `local_version`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentDraft {
    pub id: DocumentId,
    pub deal_id: DealId,
    pub template_id: TemplateId,
    pub field_values: BTreeMap<FieldKey, FieldValue>,
    pub status: DraftStatus,
    pub local_version: i64,
    pub server_version: Option<i64>,
    pub pending_sync: bool,
    pub artifact_ref: Option<ArtifactRef>,
    pub conflict_data: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_saved_at: Option<DateTime<Utc>>,
    pub last_finalized_at: Option<DateTime<Utc>>,
}

impl DocumentDraft {
    pub fn new(id: DocumentId, deal_id: DealId, template_id: TemplateId, now: DateTime<Utc>) -> Self {
        Self {
            id,
            deal_id,
            template_id,
            field_values: BTreeMap::new(),
            status: DraftStatus::Draft,
            local_version: 0,
            server_version: None,
            pending_sync: false,
            artifact_ref: None,
            conflict_data: None,
            created_at: now,
            updated_at: now,
            last_saved_at: None,
            last_finalized_at: None,
        }
    }

    pub fn is_editable(&self) -> bool {
        self.status.accepts_edits()
    }

    /// `pending_sync == false` implies local and server versions agree.
    pub fn is_synced(&self) -> bool {
        !self.pending_sync
    }

    pub fn is_finalized(&self) -> bool {
        self.status == DraftStatus::Finalized
    }

    /// True when the server has confirmed a version at or past ours.
    pub fn server_caught_up(&self) -> bool {
        self.server_version
            .map(|v| v >= self.local_version)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DocumentDraft {
        DocumentDraft::new(
            DocumentId::new("doc-1".to_string()).unwrap(),
            DealId::new("deal-1".to_string()).unwrap(),
            TemplateId::new("tpl-bill-of-sale".to_string()).unwrap(),
            Utc::now(),
        )
    }

    #[test]
    fn new_drafts_start_editable_at_version_zero() {
        let draft = sample();
        assert_eq!(draft.status, DraftStatus::Draft);
        assert_eq!(draft.local_version, 0);
        assert!(draft.is_editable());
        assert!(draft.is_synced());
        assert!(draft.artifact_ref.is_none());
    }

    #[test]
    fn server_caught_up_requires_acknowledged_version() {
        let mut draft = sample();
        draft.local_version = 3;
        assert!(!draft.server_caught_up());
        draft.server_version = Some(2);
        assert!(!draft.server_caught_up());
        draft.server_version = Some(3);
        assert!(draft.server_caught_up());
    }
}
