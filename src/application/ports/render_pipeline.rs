use crate::domain::entities::{DocumentTemplate, RenderOutput};
use crate::domain::value_objects::{FieldKey, FieldValue};
use crate::shared::error::AppError;
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Pure preview/finalize renderer: (template, field values) -> artifact
/// bytes + advisory field issues. Safe to invoke concurrently for different
/// documents; the scheduler serializes calls per document.
#[async_trait]
pub trait RenderPipeline: Send + Sync {
    async fn render(
        &self,
        template: &DocumentTemplate,
        field_values: &BTreeMap<FieldKey, FieldValue>,
    ) -> Result<RenderOutput, AppError>;
}
