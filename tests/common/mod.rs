#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use dealer_docs::application::ports::{
    ArtifactMetadata, ArtifactStore, DocumentAuthority, DraftStore, RemoteDocumentHead,
    TemplateProvider,
};
use dealer_docs::domain::entities::{ConflictDigest, DocumentDraft, DocumentTemplate, FieldSpec};
use dealer_docs::infrastructure::drafts::SqliteDraftStore;
use dealer_docs::infrastructure::render::TemplateRenderer;
use dealer_docs::{
    AppConfig, AppError, ArtifactRef, DealId, DocumentEngine, DocumentId, DraftStatus, FieldKey,
    FieldKind, FieldValue, TemplateId,
};
use sqlx::sqlite::SqlitePoolOptions;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

pub fn key(name: &str) -> FieldKey {
    FieldKey::new(name.to_string()).unwrap()
}

pub fn deal() -> DealId {
    DealId::new("deal-1001".to_string()).unwrap()
}

pub fn template_id() -> TemplateId {
    TemplateId::new("tpl-bill-of-sale".to_string()).unwrap()
}

pub fn bill_of_sale_template() -> DocumentTemplate {
    DocumentTemplate::new(
        template_id(),
        "Bill of Sale",
        vec![
            FieldSpec::new(key("buyer"), "Buyer name", FieldKind::Text, true),
            FieldSpec::new(key("price"), "Sale price", FieldKind::Number, true),
            FieldSpec::new(key("as_is"), "Sold as-is", FieldKind::Flag, false),
        ],
    )
    .with_jurisdiction("State of Ohio")
}

pub struct StaticTemplateProvider {
    template: DocumentTemplate,
}

impl StaticTemplateProvider {
    pub fn new(template: DocumentTemplate) -> Self {
        Self { template }
    }
}

#[async_trait]
impl TemplateProvider for StaticTemplateProvider {
    async fn get_template(&self, _id: &TemplateId) -> Result<DocumentTemplate, AppError> {
        Ok(self.template.clone())
    }
}

/// In-memory artifact store with the same idempotency contract as the
/// filesystem implementation, plus call counters for assertions.
#[derive(Default)]
pub struct MemoryArtifactStore {
    artifacts: Mutex<HashMap<String, Bytes>>,
    pub upload_calls: AtomicU32,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stored_count(&self) -> usize {
        self.artifacts.lock().unwrap().len()
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn upload(
        &self,
        bytes: Bytes,
        metadata: ArtifactMetadata,
    ) -> Result<ArtifactRef, AppError> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        let key = format!(
            "deals/{}/documents/{}_v{}.bin",
            metadata.deal_id, metadata.document_id, metadata.local_version
        );
        self.artifacts
            .lock()
            .unwrap()
            .entry(key.clone())
            .or_insert(bytes);
        ArtifactRef::new(key).map_err(AppError::ValidationError)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorityFailure {
    Network,
    Conflict { server_version: i64 },
}

#[derive(Default)]
struct AuthorityState {
    server_version: Option<i64>,
    status: String,
    finalized_artifact: Option<ArtifactRef>,
    confirm_failure: Option<AuthorityFailure>,
    push_failure: Option<AuthorityFailure>,
    get_unreachable: bool,
}

/// Scriptable stand-in for the authoritative document service.
#[derive(Default)]
pub struct MockAuthority {
    state: Mutex<AuthorityState>,
    pub get_calls: AtomicU32,
    pub confirm_calls: AtomicU32,
    pub push_calls: AtomicU32,
}

impl MockAuthority {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_server_version(&self, version: Option<i64>, status: &str) {
        let mut state = self.state.lock().unwrap();
        state.server_version = version;
        state.status = status.to_string();
    }

    pub fn fail_confirm(&self, failure: Option<AuthorityFailure>) {
        self.state.lock().unwrap().confirm_failure = failure;
    }

    pub fn fail_push(&self, failure: Option<AuthorityFailure>) {
        self.state.lock().unwrap().push_failure = failure;
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.state.lock().unwrap().get_unreachable = unreachable;
    }

    pub fn finalized_artifact(&self) -> Option<ArtifactRef> {
        self.state.lock().unwrap().finalized_artifact.clone()
    }

    fn apply_failure(
        failure: Option<AuthorityFailure>,
        id: &DocumentId,
        local_version: i64,
    ) -> Result<(), AppError> {
        match failure {
            None => Ok(()),
            Some(AuthorityFailure::Network) => {
                Err(AppError::Network("document service unreachable".to_string()))
            }
            Some(AuthorityFailure::Conflict { server_version }) => Err(AppError::VersionConflict {
                document_id: id.to_string(),
                local_version,
                server_version,
            }),
        }
    }
}

#[async_trait]
impl DocumentAuthority for MockAuthority {
    async fn get_version(&self, _id: &DocumentId) -> Result<RemoteDocumentHead, AppError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().unwrap();
        if state.get_unreachable {
            return Err(AppError::Network("document service unreachable".to_string()));
        }
        Ok(RemoteDocumentHead {
            server_version: state.server_version,
            status: state.status.clone(),
        })
    }

    async fn confirm_finalized(
        &self,
        id: &DocumentId,
        local_version: i64,
        artifact_ref: &ArtifactRef,
    ) -> Result<(), AppError> {
        self.confirm_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        Self::apply_failure(state.confirm_failure, id, local_version)?;
        state.server_version = Some(local_version);
        state.status = "finalized".to_string();
        state.finalized_artifact = Some(artifact_ref.clone());
        Ok(())
    }

    async fn push_draft(
        &self,
        id: &DocumentId,
        local_version: i64,
        _field_values: &std::collections::BTreeMap<FieldKey, FieldValue>,
    ) -> Result<(), AppError> {
        self.push_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        Self::apply_failure(state.push_failure, id, local_version)?;
        state.server_version = Some(local_version);
        state.status = "draft".to_string();
        Ok(())
    }
}

/// Delegating store that measures save concurrency, for the single-flight
/// invariant.
pub struct CountingStore {
    inner: Arc<dyn DraftStore>,
    in_flight: AtomicI32,
    pub max_in_flight: AtomicI32,
    pub upsert_calls: AtomicU32,
}

impl CountingStore {
    pub fn new(inner: Arc<dyn DraftStore>) -> Self {
        Self {
            inner,
            in_flight: AtomicI32::new(0),
            max_in_flight: AtomicI32::new(0),
            upsert_calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl DraftStore for CountingStore {
    async fn create(
        &self,
        deal_id: DealId,
        template_id: TemplateId,
    ) -> Result<DocumentDraft, AppError> {
        self.inner.create(deal_id, template_id).await
    }

    async fn load(&self, id: &DocumentId) -> Result<DocumentDraft, AppError> {
        self.inner.load(id).await
    }

    async fn upsert_fields(
        &self,
        id: &DocumentId,
        fields: Vec<(FieldKey, FieldValue)>,
    ) -> Result<DocumentDraft, AppError> {
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        // Widen the race window so overlap would be observable.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        let result = self.inner.upsert_fields(id, fields).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn set_status(
        &self,
        id: &DocumentId,
        to: DraftStatus,
        allowed_from: &[DraftStatus],
    ) -> Result<DocumentDraft, AppError> {
        self.inner.set_status(id, to, allowed_from).await
    }

    async fn list_pending_sync(&self) -> Result<Vec<DocumentDraft>, AppError> {
        self.inner.list_pending_sync().await
    }

    async fn mark_finalized(
        &self,
        id: &DocumentId,
        artifact_ref: &ArtifactRef,
        acknowledged_version: i64,
    ) -> Result<DocumentDraft, AppError> {
        self.inner
            .mark_finalized(id, artifact_ref, acknowledged_version)
            .await
    }

    async fn acknowledge_sync(
        &self,
        id: &DocumentId,
        server_version: i64,
    ) -> Result<DocumentDraft, AppError> {
        self.inner.acknowledge_sync(id, server_version).await
    }

    async fn record_conflict(
        &self,
        id: &DocumentId,
        digest: &ConflictDigest,
    ) -> Result<DocumentDraft, AppError> {
        self.inner.record_conflict(id, digest).await
    }

    async fn purge_expired(
        &self,
        cutoff: chrono::DateTime<chrono::Utc>,
    ) -> Result<u64, AppError> {
        self.inner.purge_expired(cutoff).await
    }
}

pub async fn sqlite_store() -> Arc<SqliteDraftStore> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("migrations");
    Arc::new(SqliteDraftStore::new(pool))
}

pub struct Harness {
    pub engine: DocumentEngine,
    pub store: Arc<dyn DraftStore>,
    pub authority: Arc<MockAuthority>,
    pub artifacts: Arc<MemoryArtifactStore>,
}

/// Test config: short debounce, zero retry backoff.
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.autosave.debounce_ms = 2000;
    config.autosave.retry_base_ms = 0;
    config.finalize.retry_base_ms = 0;
    config
}

pub async fn harness() -> Harness {
    harness_with_store(sqlite_store().await).await
}

pub async fn harness_with_store(store: Arc<dyn DraftStore>) -> Harness {
    let authority = Arc::new(MockAuthority::new());
    let artifacts = Arc::new(MemoryArtifactStore::new());
    let templates = Arc::new(StaticTemplateProvider::new(bill_of_sale_template()));

    let engine = DocumentEngine::new(
        store.clone(),
        templates,
        Arc::new(TemplateRenderer::new()),
        artifacts.clone(),
        authority.clone(),
        test_config(),
    );

    Harness {
        engine,
        store,
        authority,
        artifacts,
    }
}
