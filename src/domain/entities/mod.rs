pub mod document_draft;
pub mod finalize_outcome;
pub mod reconcile_report;
pub mod render_output;
pub mod template;

pub use document_draft::DocumentDraft;
pub use finalize_outcome::{ConflictDigest, FinalizeOutcome};
pub use reconcile_report::{ReconcileOutcome, ReconcileReport};
pub use render_output::{FieldIssue, FieldIssueKind, RenderOutput};
pub use template::{DocumentTemplate, FieldSpec};
