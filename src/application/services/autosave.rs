use crate::application::ports::{DraftStore, RenderPipeline, TemplateProvider};
use crate::application::services::finalize::FinalizeService;
use crate::application::services::status::SessionStatus;
use crate::domain::entities::{DocumentDraft, FinalizeOutcome};
use crate::domain::value_objects::{DocumentId, DraftStatus, FieldKey, FieldValue};
use crate::shared::error::{AppError, Result};
use crate::shared::retry::RetryPolicy;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;

/// Commands accepted by one document's session actor.
pub(crate) enum SessionCommand {
    Edit {
        key: FieldKey,
        value: FieldValue,
    },
    SaveNow {
        ack: oneshot::Sender<Result<DocumentDraft>>,
    },
    Finalize {
        ack: oneshot::Sender<Result<FinalizeOutcome>>,
    },
    Shutdown,
}

/// Per-document autosave scheduler: a single task owning the
/// `idle -> pending -> saving` machine. Edits buffer in the mailbox, so a
/// save in flight never races a new edit; anything arriving mid-save is
/// picked up by the next loop turn and re-triggers the debounce.
pub(crate) struct DraftSession {
    document_id: DocumentId,
    store: Arc<dyn DraftStore>,
    templates: Arc<dyn TemplateProvider>,
    pipeline: Arc<dyn RenderPipeline>,
    finalizer: Arc<FinalizeService>,
    token: Arc<tokio::sync::Mutex<()>>,
    debounce: Duration,
    retry: RetryPolicy,
    status_tx: watch::Sender<SessionStatus>,
    rx: mpsc::UnboundedReceiver<SessionCommand>,
}

impl DraftSession {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        document_id: DocumentId,
        store: Arc<dyn DraftStore>,
        templates: Arc<dyn TemplateProvider>,
        pipeline: Arc<dyn RenderPipeline>,
        finalizer: Arc<FinalizeService>,
        token: Arc<tokio::sync::Mutex<()>>,
        debounce: Duration,
        retry: RetryPolicy,
        status_tx: watch::Sender<SessionStatus>,
        rx: mpsc::UnboundedReceiver<SessionCommand>,
    ) -> Self {
        Self {
            document_id,
            store,
            templates,
            pipeline,
            finalizer,
            token,
            debounce,
            retry,
            status_tx,
            rx,
        }
    }

    pub(crate) async fn run(mut self) {
        let mut pending: BTreeMap<FieldKey, FieldValue> = BTreeMap::new();
        let mut deadline: Option<Instant> = None;

        loop {
            let timer = async move {
                match deadline {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending::<()>().await,
                }
            };
            tokio::pin!(timer);

            tokio::select! {
                maybe_cmd = self.rx.recv() => match maybe_cmd {
                    Some(SessionCommand::Edit { key, value }) => {
                        pending.insert(key, value);
                        deadline = Some(Instant::now() + self.debounce);
                        self.set_status(SessionStatus::PendingSave);
                    }
                    Some(SessionCommand::SaveNow { ack }) => {
                        deadline = None;
                        let result = self.save(&mut pending).await;
                        let _ = ack.send(result);
                    }
                    Some(SessionCommand::Finalize { ack }) => {
                        deadline = None;
                        let result = self.finalize(&mut pending).await;
                        let _ = ack.send(result);
                    }
                    Some(SessionCommand::Shutdown) | None => {
                        if !pending.is_empty() {
                            let _ = self.save(&mut pending).await;
                        }
                        break;
                    }
                },
                _ = &mut timer => {
                    deadline = None;
                    let _ = self.save(&mut pending).await;
                }
            }
        }

        tracing::debug!(
            target: "docs::autosave",
            document_id = %self.document_id,
            "session closed"
        );
    }

    fn set_status(&self, status: SessionStatus) {
        let _ = self.status_tx.send(status);
    }

    async fn save(&self, pending: &mut BTreeMap<FieldKey, FieldValue>) -> Result<DocumentDraft> {
        let _flight = self.token.lock().await;
        self.save_locked(pending).await
    }

    /// One save cycle under the single-flight token: render for preview,
    /// persist the buffered fields, move the record back to ready. Buffered
    /// fields are restored on terminal failure so no edit is ever dropped.
    async fn save_locked(
        &self,
        pending: &mut BTreeMap<FieldKey, FieldValue>,
    ) -> Result<DocumentDraft> {
        if pending.is_empty() {
            return self.settle_without_edits().await;
        }

        let fields = std::mem::take(pending);
        self.set_status(SessionStatus::Saving);

        match self.persist(&fields).await {
            Ok(draft) => {
                self.set_status(SessionStatus::Saved);
                Ok(draft)
            }
            Err(err) => {
                // An illegal transition means the record became immutable and
                // these edits can never land; anything else keeps the buffered
                // values for the next trigger, without clobbering newer edits.
                if !matches!(err, AppError::IllegalTransition { .. }) {
                    for (key, value) in fields {
                        pending.entry(key).or_insert(value);
                    }
                    self.set_status(SessionStatus::SaveFailed {
                        message: err.to_string(),
                    });
                }
                tracing::error!(
                    target: "docs::autosave",
                    document_id = %self.document_id,
                    error = %err,
                    "autosave failed"
                );
                Err(err)
            }
        }
    }

    async fn persist(&self, fields: &BTreeMap<FieldKey, FieldValue>) -> Result<DocumentDraft> {
        let id = &self.document_id;

        let draft = self
            .retry
            .run(|| async move {
                self.store
                    .set_status(
                        id,
                        DraftStatus::Saving,
                        &[
                            DraftStatus::Draft,
                            DraftStatus::Ready,
                            DraftStatus::FinalizeFailed,
                            DraftStatus::Saving,
                        ],
                    )
                    .await
            })
            .await?;

        // Preview render over the merged view. Issues are advisory and
        // render failures never block persisting the raw values.
        let mut merged = draft.field_values.clone();
        merged.extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())));
        match self.templates.get_template(&draft.template_id).await {
            Ok(template) => match self.pipeline.render(&template, &merged).await {
                Ok(output) if !output.issues.is_empty() => {
                    tracing::debug!(
                        target: "docs::autosave",
                        document_id = %id,
                        issues = output.issues.len(),
                        "preview rendered with field issues"
                    );
                }
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(
                        target: "docs::autosave",
                        document_id = %id,
                        error = %err,
                        "preview render failed"
                    );
                }
            },
            Err(err) => {
                tracing::warn!(
                    target: "docs::autosave",
                    document_id = %id,
                    error = %err,
                    "template unavailable for preview"
                );
            }
        }

        let field_vec: Vec<(FieldKey, FieldValue)> =
            fields.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        self.retry
            .run(|| {
                let field_vec = field_vec.clone();
                async move { self.store.upsert_fields(id, field_vec).await }
            })
            .await?;

        self.retry
            .run(|| async move {
                self.store
                    .set_status(id, DraftStatus::Ready, &[DraftStatus::Saving])
                    .await
            })
            .await
    }

    /// A save request with nothing buffered: make sure the record is in
    /// `ready` without a phantom version bump.
    async fn settle_without_edits(&self) -> Result<DocumentDraft> {
        let draft = self.store.load(&self.document_id).await?;
        match draft.status {
            DraftStatus::Draft | DraftStatus::Saving | DraftStatus::FinalizeFailed => {
                self.store
                    .set_status(
                        &self.document_id,
                        DraftStatus::Saving,
                        &[
                            DraftStatus::Draft,
                            DraftStatus::Saving,
                            DraftStatus::FinalizeFailed,
                        ],
                    )
                    .await?;
                self.store
                    .set_status(&self.document_id, DraftStatus::Ready, &[DraftStatus::Saving])
                    .await
            }
            _ => Ok(draft),
        }
    }

    async fn finalize(
        &self,
        pending: &mut BTreeMap<FieldKey, FieldValue>,
    ) -> Result<FinalizeOutcome> {
        // Hold the token across flush + finalize so nothing interleaves.
        let _flight = self.token.lock().await;

        self.save_locked(pending).await?;
        self.set_status(SessionStatus::Finalizing);

        let outcome = self.finalizer.finalize(&self.document_id).await?;
        match &outcome {
            FinalizeOutcome::Finalized(_) => self.set_status(SessionStatus::Finalized),
            FinalizeOutcome::ValidationFailed(issues) => {
                tracing::info!(
                    target: "docs::autosave",
                    document_id = %self.document_id,
                    issues = issues.len(),
                    "finalize blocked by validation"
                );
                self.set_status(SessionStatus::Saved);
            }
            FinalizeOutcome::Conflict {
                local_version,
                server_version,
            } => self.set_status(SessionStatus::Conflict {
                local_version: *local_version,
                server_version: *server_version,
            }),
            FinalizeOutcome::Failed { reason } => self.set_status(SessionStatus::FinalizeFailed {
                message: reason.clone(),
            }),
        }
        Ok(outcome)
    }
}

/// Initial indicator state for a freshly opened draft.
pub(crate) fn initial_status(draft: &DocumentDraft) -> SessionStatus {
    match draft.status {
        DraftStatus::Finalized => SessionStatus::Finalized,
        DraftStatus::FinalizeFailed => SessionStatus::FinalizeFailed {
            message: "previous finalize attempt failed".to_string(),
        },
        _ => SessionStatus::Idle,
    }
}
