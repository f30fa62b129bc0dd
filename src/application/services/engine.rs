use crate::application::ports::{
    ArtifactStore, DocumentAuthority, DraftStore, RenderPipeline, TemplateProvider,
};
use crate::application::services::autosave::{initial_status, DraftSession, SessionCommand};
use crate::application::services::finalize::FinalizeService;
use crate::application::services::reconciler::SyncReconciler;
use crate::application::services::single_flight::SingleFlight;
use crate::application::services::status::SessionStatus;
use crate::domain::entities::{DocumentDraft, FinalizeOutcome, RenderOutput};
use crate::domain::value_objects::{
    DealId, DocumentId, DraftStatus, FieldKey, FieldValue, SessionMode, SyncPolicy, TemplateId,
};
use crate::shared::config::AppConfig;
use crate::shared::error::{AppError, Result};
use crate::shared::retry::RetryPolicy;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch, Mutex};

/// Handle to one open document session.
#[derive(Debug, Clone)]
pub struct DraftHandle {
    id: DocumentId,
}

impl DraftHandle {
    pub fn document_id(&self) -> &DocumentId {
        &self.id
    }
}

struct SessionEntry {
    tx: mpsc::UnboundedSender<SessionCommand>,
    status_rx: watch::Receiver<SessionStatus>,
    task: tokio::task::JoinHandle<()>,
}

/// The surface the surrounding application talks to: open a draft, edit
/// fields, watch the status indicator, finalize. One session actor per open
/// document; the actor owns the autosave machine and the finalize path.
pub struct DocumentEngine {
    store: Arc<dyn DraftStore>,
    templates: Arc<dyn TemplateProvider>,
    pipeline: Arc<dyn RenderPipeline>,
    authority: Arc<dyn DocumentAuthority>,
    finalize: Arc<FinalizeService>,
    locks: Arc<SingleFlight>,
    config: AppConfig,
    sessions: Mutex<HashMap<DocumentId, SessionEntry>>,
}

impl DocumentEngine {
    pub fn new(
        store: Arc<dyn DraftStore>,
        templates: Arc<dyn TemplateProvider>,
        pipeline: Arc<dyn RenderPipeline>,
        artifacts: Arc<dyn ArtifactStore>,
        authority: Arc<dyn DocumentAuthority>,
        config: AppConfig,
    ) -> Self {
        let retry = RetryPolicy::new(
            config.finalize.max_retry,
            Duration::from_millis(config.finalize.retry_base_ms),
            Duration::from_millis(config.finalize.retry_base_ms.saturating_mul(4)),
        );
        let finalize = Arc::new(FinalizeService::new(
            store.clone(),
            templates.clone(),
            pipeline.clone(),
            artifacts,
            authority.clone(),
            retry,
            Duration::from_secs(config.finalize.network_timeout),
        ));

        Self {
            store,
            templates,
            pipeline,
            authority,
            finalize,
            locks: Arc::new(SingleFlight::new()),
            config,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Creates a new draft record for a deal. Finalized documents are never
    /// edited in place; callers create a fresh draft instead.
    pub async fn create_draft(
        &self,
        deal_id: DealId,
        template_id: TemplateId,
    ) -> Result<DocumentDraft> {
        self.store.create(deal_id, template_id).await
    }

    /// Opens (or resumes) an editing session for an existing document.
    pub async fn open_draft(&self, id: &DocumentId) -> Result<DraftHandle> {
        let mut sessions = self.sessions.lock().await;
        if let Some(entry) = sessions.get(id) {
            if !entry.task.is_finished() {
                return Ok(DraftHandle { id: id.clone() });
            }
            sessions.remove(id);
        }

        let draft = self.store.load(id).await?;

        let (tx, rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(initial_status(&draft));
        let retry = RetryPolicy::new(
            self.config.autosave.max_retry,
            Duration::from_millis(self.config.autosave.retry_base_ms),
            Duration::from_millis(self.config.autosave.retry_base_ms.saturating_mul(4)),
        );
        let session = DraftSession::new(
            id.clone(),
            self.store.clone(),
            self.templates.clone(),
            self.pipeline.clone(),
            self.finalize.clone(),
            self.locks.token(id),
            self.config.debounce(),
            retry,
            status_tx,
            rx,
        );
        let task = tokio::spawn(session.run());

        sessions.insert(
            id.clone(),
            SessionEntry {
                tx,
                status_rx,
                task,
            },
        );
        Ok(DraftHandle { id: id.clone() })
    }

    /// Buffers one field edit; the autosave debounce decides when it hits
    /// the store. Rejected immediately once finalization has begun.
    pub async fn edit_field(
        &self,
        handle: &DraftHandle,
        key: FieldKey,
        value: FieldValue,
    ) -> Result<()> {
        let sessions = self.sessions.lock().await;
        let entry = self.entry(&sessions, handle)?;

        match &*entry.status_rx.borrow() {
            SessionStatus::Finalized => {
                return Err(AppError::IllegalTransition {
                    document_id: handle.id.to_string(),
                    from: DraftStatus::Finalized,
                    to: DraftStatus::Saving,
                })
            }
            SessionStatus::Finalizing => {
                return Err(AppError::IllegalTransition {
                    document_id: handle.id.to_string(),
                    from: DraftStatus::Finalizing,
                    to: DraftStatus::Saving,
                })
            }
            _ => {}
        }

        entry
            .tx
            .send(SessionCommand::Edit { key, value })
            .map_err(|_| AppError::Internal("Document session closed".to_string()))
    }

    /// Short-circuits the debounce; still single-flight.
    pub async fn save_now(&self, handle: &DraftHandle) -> Result<DocumentDraft> {
        let (ack_tx, ack_rx) = oneshot::channel();
        {
            let sessions = self.sessions.lock().await;
            let entry = self.entry(&sessions, handle)?;
            entry
                .tx
                .send(SessionCommand::SaveNow { ack: ack_tx })
                .map_err(|_| AppError::Internal("Document session closed".to_string()))?;
        }
        ack_rx
            .await
            .map_err(|_| AppError::Internal("Document session dropped save request".to_string()))?
    }

    /// Flushes pending edits, then runs the finalize state machine to a
    /// terminal outcome.
    pub async fn request_finalize(&self, handle: &DraftHandle) -> Result<FinalizeOutcome> {
        let (ack_tx, ack_rx) = oneshot::channel();
        {
            let sessions = self.sessions.lock().await;
            let entry = self.entry(&sessions, handle)?;
            entry
                .tx
                .send(SessionCommand::Finalize { ack: ack_tx })
                .map_err(|_| AppError::Internal("Document session closed".to_string()))?;
        }
        ack_rx.await.map_err(|_| {
            AppError::Internal("Document session dropped finalize request".to_string())
        })?
    }

    /// Status stream for UI indicators ("saving…", "saved", "finalizing…").
    pub async fn subscribe_status(&self, handle: &DraftHandle) -> Result<watch::Receiver<SessionStatus>> {
        let sessions = self.sessions.lock().await;
        let entry = self.entry(&sessions, handle)?;
        Ok(entry.status_rx.clone())
    }

    /// Renders the current persisted state for preview. Pure; does not
    /// touch the session actor.
    pub async fn render_preview(&self, handle: &DraftHandle) -> Result<RenderOutput> {
        let draft = self.store.load(&handle.id).await?;
        let template = self.templates.get_template(&draft.template_id).await?;
        self.pipeline.render(&template, &draft.field_values).await
    }

    pub async fn load_draft(&self, handle: &DraftHandle) -> Result<DocumentDraft> {
        self.store.load(&handle.id).await
    }

    /// Tears the session actor down, flushing buffered edits first.
    pub async fn close_draft(&self, handle: DraftHandle) -> Result<()> {
        let mut sessions = self.sessions.lock().await;
        if let Some(entry) = sessions.remove(&handle.id) {
            let _ = entry.tx.send(SessionCommand::Shutdown);
        }
        Ok(())
    }

    /// Sync policy for the given session mode, with the configured
    /// foreground/background cadences.
    pub fn policy_for(&self, mode: SessionMode) -> SyncPolicy {
        SyncPolicy::new(
            mode,
            self.config.sync.foreground_interval,
            self.config.sync.background_interval,
        )
    }

    /// Builds the reconciler for this store/authority pair under the given
    /// policy. The caller decides whether to `schedule()` it or drive
    /// `run_once` directly.
    pub fn reconciler(&self, policy: SyncPolicy) -> Arc<SyncReconciler> {
        Arc::new(SyncReconciler::new(
            self.store.clone(),
            self.authority.clone(),
            self.finalize.clone(),
            self.locks.clone(),
            policy,
            self.config.sync.batch_size as usize,
        ))
    }

    /// Local GC of finalized, fully-synced records past the retention
    /// window.
    pub async fn purge_expired(&self) -> Result<u64> {
        let cutoff = Utc::now() - self.config.retention_window();
        self.store.purge_expired(cutoff).await
    }

    fn entry<'a>(
        &self,
        sessions: &'a HashMap<DocumentId, SessionEntry>,
        handle: &DraftHandle,
    ) -> Result<&'a SessionEntry> {
        sessions.get(&handle.id).ok_or_else(|| {
            AppError::NotFound(format!("No open session for document {}", handle.id))
        })
    }
}
