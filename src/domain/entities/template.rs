use crate::domain::value_objects::{FieldKey, FieldKind, TemplateId};
use serde::{Deserialize, Serialize};

/// One declared field of a document template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub key: FieldKey,
    pub label: String,
    pub kind: FieldKind,
    pub required: bool,
}

impl FieldSpec {
    pub fn new(key: FieldKey, label: impl Into<String>, kind: FieldKind, required: bool) -> Self {
        Self {
            key,
            label: label.into(),
            kind,
            required,
        }
    }
}

/// A document template as served by the template provider: the field schema
/// plus the renderer configuration. Cached locally so standalone sessions
/// keep working offline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentTemplate {
    pub id: TemplateId,
    pub title: String,
    /// Jurisdiction line printed on the rendered document. Opaque here.
    pub jurisdiction: Option<String>,
    pub fields: Vec<FieldSpec>,
}

impl DocumentTemplate {
    pub fn new(id: TemplateId, title: impl Into<String>, fields: Vec<FieldSpec>) -> Self {
        Self {
            id,
            title: title.into(),
            jurisdiction: None,
            fields,
        }
    }

    pub fn with_jurisdiction(mut self, jurisdiction: impl Into<String>) -> Self {
        self.jurisdiction = Some(jurisdiction.into());
        self
    }

    pub fn field(&self, key: &FieldKey) -> Option<&FieldSpec> {
        self.fields.iter().find(|spec| &spec.key == key)
    }
}
