use crate::domain::entities::{ConflictDigest, DocumentDraft};
use crate::domain::value_objects::{
    ArtifactRef, DealId, DocumentId, DraftStatus, FieldKey, FieldValue, TemplateId,
};
use crate::shared::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Durable local store of document drafts: the single source of truth. Only
/// the store mutates `status` and `local_version`; every other component
/// requests mutations through it.
///
/// All writes are atomic per record: a crash mid-write never leaves a row
/// half-updated.
#[async_trait]
pub trait DraftStore: Send + Sync {
    /// Creates a fresh draft with a generated id, status `draft`,
    /// `local_version = 0`.
    async fn create(&self, deal_id: DealId, template_id: TemplateId)
        -> Result<DocumentDraft, AppError>;

    async fn load(&self, id: &DocumentId) -> Result<DocumentDraft, AppError>;

    /// Merges field values last-writer-wins, increments `local_version`,
    /// sets `pending_sync` and stamps `last_saved_at`. Rejected with an
    /// illegal-transition error once finalization has begun or completed.
    async fn upsert_fields(
        &self,
        id: &DocumentId,
        fields: Vec<(FieldKey, FieldValue)>,
    ) -> Result<DocumentDraft, AppError>;

    /// Moves the record to `to` iff its current status is in `allowed_from`
    /// and the transition table permits it; fails with an
    /// illegal-transition error otherwise.
    async fn set_status(
        &self,
        id: &DocumentId,
        to: DraftStatus,
        allowed_from: &[DraftStatus],
    ) -> Result<DocumentDraft, AppError>;

    /// Records in divergence from the last confirmed server state.
    async fn list_pending_sync(&self) -> Result<Vec<DocumentDraft>, AppError>;

    /// Single transaction: status `finalized`, artifact ref set,
    /// `server_version` = acknowledged version, `pending_sync` cleared.
    async fn mark_finalized(
        &self,
        id: &DocumentId,
        artifact_ref: &ArtifactRef,
        acknowledged_version: i64,
    ) -> Result<DocumentDraft, AppError>;

    /// The server accepted our state at `server_version`; clears
    /// `pending_sync` when versions now agree.
    async fn acknowledge_sync(
        &self,
        id: &DocumentId,
        server_version: i64,
    ) -> Result<DocumentDraft, AppError>;

    /// Persists a surfaced conflict. The record stays pending sync.
    async fn record_conflict(
        &self,
        id: &DocumentId,
        digest: &ConflictDigest,
    ) -> Result<DocumentDraft, AppError>;

    /// Local GC: removes finalized, fully-synced records whose
    /// `last_finalized_at` is older than `cutoff`. Never touches records
    /// with `pending_sync` set.
    async fn purge_expired(&self, cutoff: DateTime<Utc>) -> Result<u64, AppError>;
}
