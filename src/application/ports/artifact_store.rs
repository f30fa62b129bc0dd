use crate::domain::value_objects::{ArtifactRef, DealId, DocumentId};
use crate::shared::error::AppError;
use async_trait::async_trait;
use bytes::Bytes;

/// Identity of one uploaded artifact. Uploads are idempotent per
/// `(document_id, local_version)`: retrying the same upload must return the
/// same ref and never create a duplicate billable artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactMetadata {
    pub document_id: DocumentId,
    pub deal_id: DealId,
    pub local_version: i64,
    pub content_type: String,
}

impl ArtifactMetadata {
    pub fn new(document_id: DocumentId, deal_id: DealId, local_version: i64) -> Self {
        Self {
            document_id,
            deal_id,
            local_version,
            content_type: "application/octet-stream".to_string(),
        }
    }
}

/// Durable upload target for finalized artifacts. An external collaborator;
/// the filesystem-backed implementation serves standalone installs.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn upload(&self, bytes: Bytes, metadata: ArtifactMetadata)
        -> Result<ArtifactRef, AppError>;
}
