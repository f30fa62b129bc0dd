pub mod artifact_ref;
pub mod deal_id;
pub mod document_id;
pub mod draft_status;
pub mod field;
pub mod sync_policy;
pub mod template_id;

pub use artifact_ref::ArtifactRef;
pub use deal_id::DealId;
pub use document_id::DocumentId;
pub use draft_status::DraftStatus;
pub use field::{FieldKey, FieldKind, FieldValue};
pub use sync_policy::{SessionMode, SyncPolicy};
pub use template_id::TemplateId;
