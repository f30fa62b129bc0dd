use crate::application::ports::RenderPipeline;
use crate::domain::entities::{DocumentTemplate, FieldIssue, RenderOutput};
use crate::domain::value_objects::{FieldKey, FieldValue};
use crate::shared::error::AppError;
use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderEngineError {
    #[error("Template {0} declares no fields")]
    EmptyTemplate(String),
    #[error("Artifact encoding failed: {0}")]
    Encode(String),
}

impl From<RenderEngineError> for AppError {
    fn from(err: RenderEngineError) -> Self {
        AppError::Render(err.to_string())
    }
}

/// Stable intermediate form of a rendered document. The byte encoding of
/// this struct is the preview/finalize artifact; encoding is deterministic,
/// so identical inputs yield byte-identical artifacts.
#[derive(Debug, Serialize)]
struct RenderedDocument<'a> {
    template_id: &'a str,
    title: &'a str,
    jurisdiction: Option<&'a str>,
    lines: Vec<RenderedLine<'a>>,
}

#[derive(Debug, Serialize)]
struct RenderedLine<'a> {
    label: &'a str,
    value: String,
}

/// Default render pipeline: lays the template out line by line and encodes
/// the result with bincode. Validation issues are advisory; the artifact is
/// produced either way so previews keep working on incomplete documents.
#[derive(Debug, Default, Clone)]
pub struct TemplateRenderer;

impl TemplateRenderer {
    pub fn new() -> Self {
        Self
    }

    fn validate(
        template: &DocumentTemplate,
        field_values: &BTreeMap<FieldKey, FieldValue>,
    ) -> Vec<FieldIssue> {
        let mut issues = Vec::new();
        for spec in &template.fields {
            match field_values.get(&spec.key) {
                None => {
                    if spec.required {
                        issues.push(FieldIssue::missing_required(spec.key.clone(), &spec.label));
                    }
                }
                Some(value) => {
                    if value.kind() != spec.kind {
                        issues.push(FieldIssue::type_mismatch(
                            spec.key.clone(),
                            spec.kind,
                            value.kind(),
                        ));
                    }
                }
            }
        }
        issues
    }
}

#[async_trait]
impl RenderPipeline for TemplateRenderer {
    async fn render(
        &self,
        template: &DocumentTemplate,
        field_values: &BTreeMap<FieldKey, FieldValue>,
    ) -> Result<RenderOutput, AppError> {
        if template.fields.is_empty() {
            return Err(RenderEngineError::EmptyTemplate(template.id.to_string()).into());
        }

        let issues = Self::validate(template, field_values);

        let lines = template
            .fields
            .iter()
            .map(|spec| RenderedLine {
                label: spec.label.as_str(),
                value: field_values
                    .get(&spec.key)
                    .map(FieldValue::render)
                    .unwrap_or_default(),
            })
            .collect();

        let document = RenderedDocument {
            template_id: template.id.as_str(),
            title: template.title.as_str(),
            jurisdiction: template.jurisdiction.as_deref(),
            lines,
        };

        let encoded = bincode::serde::encode_to_vec(&document, bincode::config::standard())
            .map_err(|err| RenderEngineError::Encode(err.to_string()))?;

        Ok(RenderOutput {
            artifact: Bytes::from(encoded),
            issues,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{FieldIssueKind, FieldSpec};
    use crate::domain::value_objects::{FieldKind, TemplateId};

    fn key(name: &str) -> FieldKey {
        FieldKey::new(name.to_string()).unwrap()
    }

    fn bill_of_sale() -> DocumentTemplate {
        DocumentTemplate::new(
            TemplateId::new("tpl-bill-of-sale".to_string()).unwrap(),
            "Bill of Sale",
            vec![
                FieldSpec::new(key("buyer"), "Buyer name", FieldKind::Text, true),
                FieldSpec::new(key("price"), "Sale price", FieldKind::Number, true),
                FieldSpec::new(key("as_is"), "Sold as-is", FieldKind::Flag, false),
            ],
        )
        .with_jurisdiction("State of Ohio")
    }

    fn complete_fields() -> BTreeMap<FieldKey, FieldValue> {
        let mut fields = BTreeMap::new();
        fields.insert(key("buyer"), FieldValue::Text("Dana Whitfield".into()));
        fields.insert(key("price"), FieldValue::Number(18500.0));
        fields.into_iter().collect()
    }

    #[tokio::test]
    async fn render_is_byte_identical_for_identical_inputs() {
        let renderer = TemplateRenderer::new();
        let template = bill_of_sale();
        let fields = complete_fields();

        let first = renderer.render(&template, &fields).await.unwrap();
        let second = renderer.render(&template, &fields).await.unwrap();
        assert_eq!(first.artifact, second.artifact);
        assert!(!first.artifact.is_empty());
    }

    #[tokio::test]
    async fn missing_required_field_is_advisory_not_fatal() {
        let renderer = TemplateRenderer::new();
        let template = bill_of_sale();
        let mut fields = complete_fields();
        fields.remove(&key("buyer"));

        let output = renderer.render(&template, &fields).await.unwrap();
        assert!(!output.artifact.is_empty());
        assert_eq!(output.issues.len(), 1);
        assert_eq!(output.issues[0].key, key("buyer"));
        assert_eq!(output.issues[0].issue, FieldIssueKind::MissingRequired);
    }

    #[tokio::test]
    async fn type_mismatch_is_reported_per_field() {
        let renderer = TemplateRenderer::new();
        let template = bill_of_sale();
        let mut fields = complete_fields();
        fields.insert(key("price"), FieldValue::Text("a lot".into()));

        let output = renderer.render(&template, &fields).await.unwrap();
        assert_eq!(output.issues.len(), 1);
        match &output.issues[0].issue {
            FieldIssueKind::TypeMismatch { expected, found } => {
                assert_eq!(*expected, FieldKind::Number);
                assert_eq!(*found, FieldKind::Text);
            }
            other => panic!("expected type mismatch, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn optional_fields_do_not_raise_issues() {
        let renderer = TemplateRenderer::new();
        let template = bill_of_sale();
        let fields = complete_fields();

        let output = renderer.render(&template, &fields).await.unwrap();
        assert!(output.issues.is_empty());
    }
}
