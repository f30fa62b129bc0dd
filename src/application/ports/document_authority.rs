use crate::domain::value_objects::{ArtifactRef, DocumentId, FieldKey, FieldValue};
use crate::shared::error::AppError;
use async_trait::async_trait;
use std::collections::BTreeMap;

/// The server's view of one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteDocumentHead {
    /// Latest version the server has accepted; `None` when the server has
    /// no record of the document yet.
    pub server_version: Option<i64>,
    pub status: String,
}

/// The authoritative document service. Confirm and push both fail with
/// `AppError::VersionConflict` when the server has already moved past the
/// version this client last observed; that conflict is terminal and is
/// surfaced, never silently retried.
#[async_trait]
pub trait DocumentAuthority: Send + Sync {
    async fn get_version(&self, id: &DocumentId) -> Result<RemoteDocumentHead, AppError>;

    /// Tells the server a finalized artifact is durably stored. Only called
    /// after the upload succeeded.
    async fn confirm_finalized(
        &self,
        id: &DocumentId,
        local_version: i64,
        artifact_ref: &ArtifactRef,
    ) -> Result<(), AppError>;

    /// Pushes still-editable local state during reconciliation.
    async fn push_draft(
        &self,
        id: &DocumentId,
        local_version: i64,
        field_values: &BTreeMap<FieldKey, FieldValue>,
    ) -> Result<(), AppError>;
}
