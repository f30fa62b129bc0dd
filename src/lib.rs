//! Local-first document draft lifecycle and synchronization engine for
//! dealership paperwork: edit fields offline, autosave without racing,
//! finalize into an immutable cloud-durable artifact, and reconcile with
//! the server's view when connectivity allows.

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod shared;

pub use application::ports::{
    ArtifactMetadata, ArtifactStore, DocumentAuthority, DraftStore, RemoteDocumentHead,
    RenderPipeline, TemplateProvider,
};
pub use application::services::{
    DocumentEngine, DraftHandle, SessionStatus, SyncReconciler,
};
pub use domain::entities::{
    DocumentDraft, DocumentTemplate, FieldIssue, FieldIssueKind, FieldSpec, FinalizeOutcome,
    ReconcileOutcome, ReconcileReport, RenderOutput,
};
pub use domain::value_objects::{
    ArtifactRef, DealId, DocumentId, DraftStatus, FieldKey, FieldKind, FieldValue, SessionMode,
    SyncPolicy, TemplateId,
};
pub use shared::{AppConfig, AppError, Result};

use tracing_subscriber::EnvFilter;

/// Installs the tracing subscriber. Safe to call more than once; only the
/// first call wins.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}
