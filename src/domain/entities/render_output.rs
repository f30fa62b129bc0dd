use crate::domain::value_objects::{FieldKey, FieldKind};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a field failed validation during rendering. Advisory: issues block
/// finalize but never block saving the raw value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum FieldIssueKind {
    MissingRequired,
    TypeMismatch { expected: FieldKind, found: FieldKind },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldIssue {
    pub key: FieldKey,
    pub issue: FieldIssueKind,
    pub message: String,
}

impl FieldIssue {
    pub fn missing_required(key: FieldKey, label: &str) -> Self {
        let message = format!("{label} is required");
        Self {
            key,
            issue: FieldIssueKind::MissingRequired,
            message,
        }
    }

    pub fn type_mismatch(key: FieldKey, expected: FieldKind, found: FieldKind) -> Self {
        let message = format!("expected {expected}, got {found}");
        Self {
            key,
            issue: FieldIssueKind::TypeMismatch { expected, found },
            message,
        }
    }
}

impl fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.key, self.message)
    }
}

/// Result of one render pass: the preview artifact plus any advisory field
/// issues. Identical inputs always produce byte-identical artifacts.
#[derive(Debug, Clone)]
pub struct RenderOutput {
    pub artifact: Bytes,
    pub issues: Vec<FieldIssue>,
}

impl RenderOutput {
    pub fn has_blocking_issues(&self) -> bool {
        !self.issues.is_empty()
    }
}
