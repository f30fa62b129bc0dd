pub mod artifact_store;
pub mod document_authority;
pub mod draft_store;
pub mod render_pipeline;
pub mod template_provider;

pub use artifact_store::{ArtifactMetadata, ArtifactStore};
pub use document_authority::{DocumentAuthority, RemoteDocumentHead};
pub use draft_store::DraftStore;
pub use render_pipeline::RenderPipeline;
pub use template_provider::TemplateProvider;
