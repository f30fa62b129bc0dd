use crate::domain::entities::DocumentDraft;
use crate::domain::value_objects::{
    ArtifactRef, DealId, DocumentId, DraftStatus, FieldKey, FieldValue, TemplateId,
};
use crate::shared::error::AppError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DraftRow {
    pub id: String,
    pub deal_id: String,
    pub template_id: String,
    pub field_values: String,
    pub status: String,
    pub local_version: i64,
    pub server_version: Option<i64>,
    pub pending_sync: bool,
    pub artifact_ref: Option<String>,
    pub conflict_data: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
    pub last_saved_at: Option<i64>,
    pub last_finalized_at: Option<i64>,
}

impl DraftRow {
    pub fn into_entity(self) -> Result<DocumentDraft, AppError> {
        let field_values: BTreeMap<FieldKey, FieldValue> = serde_json::from_str(&self.field_values)
            .map_err(|err| AppError::DeserializationError(err.to_string()))?;
        let conflict_data = self
            .conflict_data
            .map(|json| serde_json::from_str(&json))
            .transpose()
            .map_err(|err| AppError::DeserializationError(err.to_string()))?;

        Ok(DocumentDraft {
            id: DocumentId::new(self.id).map_err(AppError::ValidationError)?,
            deal_id: DealId::new(self.deal_id).map_err(AppError::ValidationError)?,
            template_id: TemplateId::new(self.template_id).map_err(AppError::ValidationError)?,
            field_values,
            status: DraftStatus::parse(&self.status).map_err(AppError::ValidationError)?,
            local_version: self.local_version,
            server_version: self.server_version,
            pending_sync: self.pending_sync,
            artifact_ref: self
                .artifact_ref
                .map(|value| ArtifactRef::new(value).map_err(AppError::ValidationError))
                .transpose()?,
            conflict_data,
            created_at: timestamp_to_datetime(self.created_at),
            updated_at: timestamp_to_datetime(self.updated_at),
            last_saved_at: self.last_saved_at.map(timestamp_to_datetime),
            last_finalized_at: self.last_finalized_at.map(timestamp_to_datetime),
        })
    }
}

pub fn timestamp_to_datetime(ts: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(ts, 0).unwrap_or_else(Utc::now)
}

pub fn serialize_fields(fields: &BTreeMap<FieldKey, FieldValue>) -> Result<String, AppError> {
    serde_json::to_string(fields).map_err(|err| AppError::SerializationError(err.to_string()))
}
