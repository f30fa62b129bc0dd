use crate::application::ports::{
    ArtifactMetadata, ArtifactStore, DocumentAuthority, DraftStore, RenderPipeline,
    TemplateProvider,
};
use crate::domain::entities::{ConflictDigest, DocumentDraft, FinalizeOutcome};
use crate::domain::value_objects::{DocumentId, DraftStatus};
use crate::shared::error::{AppError, Result};
use crate::shared::retry::RetryPolicy;
use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Drives the irreversible draft -> finalized transition: render, upload,
/// confirm, flip. The upload and the server confirm are strictly sequenced
/// so there is never an uploaded artifact the server was not told about,
/// nor a server record with no artifact behind it.
///
/// Callers hold the document's single-flight token and have flushed any
/// outstanding autosave before invoking `finalize`.
pub struct FinalizeService {
    store: Arc<dyn DraftStore>,
    templates: Arc<dyn TemplateProvider>,
    pipeline: Arc<dyn RenderPipeline>,
    artifacts: Arc<dyn ArtifactStore>,
    authority: Arc<dyn DocumentAuthority>,
    retry: RetryPolicy,
    network_timeout: Duration,
}

impl FinalizeService {
    pub fn new(
        store: Arc<dyn DraftStore>,
        templates: Arc<dyn TemplateProvider>,
        pipeline: Arc<dyn RenderPipeline>,
        artifacts: Arc<dyn ArtifactStore>,
        authority: Arc<dyn DocumentAuthority>,
        retry: RetryPolicy,
        network_timeout: Duration,
    ) -> Self {
        Self {
            store,
            templates,
            pipeline,
            artifacts,
            authority,
            retry,
            network_timeout,
        }
    }

    pub async fn finalize(&self, id: &DocumentId) -> Result<FinalizeOutcome> {
        let draft = self.store.load(id).await?;

        match draft.status {
            // Re-finalizing an already immutable record is a no-op.
            DraftStatus::Finalized => return Ok(FinalizeOutcome::Finalized(draft)),
            DraftStatus::Ready | DraftStatus::FinalizeFailed => {}
            other => {
                return Err(AppError::IllegalTransition {
                    document_id: id.to_string(),
                    from: other,
                    to: DraftStatus::Finalizing,
                })
            }
        }

        // Render and gate on blocking issues before the record is locked or
        // the server contacted. A rejected document stays where it was,
        // fully editable.
        let template = self.templates.get_template(&draft.template_id).await?;
        let output = self.pipeline.render(&template, &draft.field_values).await?;
        if output.has_blocking_issues() {
            tracing::info!(
                target: "docs::finalize",
                document_id = %id,
                issues = output.issues.len(),
                "finalize rejected by field validation"
            );
            return Ok(FinalizeOutcome::ValidationFailed(output.issues));
        }

        self.store
            .set_status(
                id,
                DraftStatus::Finalizing,
                &[DraftStatus::Ready, DraftStatus::FinalizeFailed],
            )
            .await?;

        match self.upload_and_confirm(&draft, output.artifact).await {
            Ok(finalized) => Ok(FinalizeOutcome::Finalized(finalized)),
            Err(AppError::VersionConflict {
                local_version,
                server_version,
                ..
            }) => {
                self.store
                    .set_status(id, DraftStatus::FinalizeFailed, &[DraftStatus::Finalizing])
                    .await?;
                self.store
                    .record_conflict(
                        id,
                        &ConflictDigest {
                            local_version,
                            server_version,
                            server_status: None,
                            observed_at: Utc::now().timestamp(),
                        },
                    )
                    .await?;
                tracing::warn!(
                    target: "docs::finalize",
                    document_id = %id,
                    local_version,
                    server_version,
                    "finalize confirm rejected: server moved past this client"
                );
                Ok(FinalizeOutcome::Conflict {
                    local_version,
                    server_version,
                })
            }
            Err(err) => {
                self.store
                    .set_status(id, DraftStatus::FinalizeFailed, &[DraftStatus::Finalizing])
                    .await?;
                tracing::error!(
                    target: "docs::finalize",
                    document_id = %id,
                    error = %err,
                    "finalize failed, fields kept intact"
                );
                Ok(FinalizeOutcome::Failed {
                    reason: err.to_string(),
                })
            }
        }
    }

    /// Upload, confirm, flip. No cancellation once the upload has begun.
    async fn upload_and_confirm(
        &self,
        draft: &DocumentDraft,
        artifact: bytes::Bytes,
    ) -> Result<DocumentDraft> {
        let metadata = ArtifactMetadata::new(
            draft.id.clone(),
            draft.deal_id.clone(),
            draft.local_version,
        );

        let artifact_ref = self
            .retry
            .run(|| {
                let bytes = artifact.clone();
                let metadata = metadata.clone();
                async move {
                    bounded(self.network_timeout, self.artifacts.upload(bytes, metadata)).await
                }
            })
            .await?;

        self.retry
            .run(|| {
                let artifact_ref = artifact_ref.clone();
                async move {
                    bounded(
                        self.network_timeout,
                        self.authority.confirm_finalized(
                            &draft.id,
                            draft.local_version,
                            &artifact_ref,
                        ),
                    )
                    .await
                }
            })
            .await?;

        let finalized = self
            .store
            .mark_finalized(&draft.id, &artifact_ref, draft.local_version)
            .await?;

        tracing::info!(
            target: "docs::finalize",
            document_id = %draft.id,
            artifact_ref = %artifact_ref,
            version = draft.local_version,
            "document finalized"
        );
        Ok(finalized)
    }
}

/// Bounds a network step; elapsing counts as a transient network failure so
/// the retry policy gets a chance before the finalize is failed.
async fn bounded<T, F>(limit: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(AppError::Network(format!(
            "operation timed out after {}s",
            limit.as_secs()
        ))),
    }
}
