use crate::domain::entities::DocumentTemplate;
use crate::domain::value_objects::TemplateId;
use crate::shared::error::AppError;
use async_trait::async_trait;

/// Read-only source of templates and field schemas. An external
/// collaborator; standalone sessions rely on a previously-cached copy.
#[async_trait]
pub trait TemplateProvider: Send + Sync {
    async fn get_template(&self, id: &TemplateId) -> Result<DocumentTemplate, AppError>;
}
