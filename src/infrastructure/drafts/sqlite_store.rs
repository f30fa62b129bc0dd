use crate::application::ports::DraftStore;
use crate::domain::entities::{ConflictDigest, DocumentDraft};
use crate::domain::value_objects::{
    ArtifactRef, DealId, DocumentId, DraftStatus, FieldKey, FieldValue, TemplateId,
};
use crate::infrastructure::drafts::rows::{serialize_fields, DraftRow};
use crate::shared::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Sqlite};
use std::collections::BTreeMap;

/// Sqlx-backed draft store. Per-record atomicity comes from sqlite
/// transactions for read-merge-write paths and guarded single-statement
/// updates everywhere else.
pub struct SqliteDraftStore {
    pool: Pool<Sqlite>,
}

impl SqliteDraftStore {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    async fn load_row(&self, id: &DocumentId) -> Result<DraftRow, AppError> {
        let row = sqlx::query_as::<_, DraftRow>(
            r#"
            SELECT * FROM document_drafts
            WHERE id = ?1
            "#,
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or_else(|| AppError::NotFound(format!("Document draft {id} not found")))
    }

    fn illegal(&self, id: &DocumentId, from: DraftStatus, to: DraftStatus) -> AppError {
        AppError::IllegalTransition {
            document_id: id.to_string(),
            from,
            to,
        }
    }
}

#[async_trait]
impl DraftStore for SqliteDraftStore {
    async fn create(
        &self,
        deal_id: DealId,
        template_id: TemplateId,
    ) -> Result<DocumentDraft, AppError> {
        let id = DocumentId::generate();
        let now = Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO document_drafts (
                id, deal_id, template_id, field_values, status,
                local_version, pending_sync, created_at, updated_at
            ) VALUES (?1, ?2, ?3, '{}', 'draft', 0, 0, ?4, ?4)
            "#,
        )
        .bind(id.as_str())
        .bind(deal_id.as_str())
        .bind(template_id.as_str())
        .bind(now)
        .execute(&self.pool)
        .await?;

        tracing::info!(target: "docs::store", document_id = %id, deal_id = %deal_id, "draft created");
        self.load(&id).await
    }

    async fn load(&self, id: &DocumentId) -> Result<DocumentDraft, AppError> {
        self.load_row(id).await?.into_entity()
    }

    async fn upsert_fields(
        &self,
        id: &DocumentId,
        fields: Vec<(FieldKey, FieldValue)>,
    ) -> Result<DocumentDraft, AppError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, DraftRow>(
            r#"
            SELECT * FROM document_drafts
            WHERE id = ?1
            "#,
        )
        .bind(id.as_str())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Document draft {id} not found")))?;

        let status = DraftStatus::parse(&row.status).map_err(AppError::ValidationError)?;
        if !status.accepts_edits() {
            return Err(self.illegal(id, status, DraftStatus::Saving));
        }

        let mut merged: BTreeMap<FieldKey, FieldValue> = serde_json::from_str(&row.field_values)
            .map_err(|err| AppError::DeserializationError(err.to_string()))?;
        for (key, value) in fields {
            merged.insert(key, value);
        }
        let serialized = serialize_fields(&merged)?;
        let now = Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            UPDATE document_drafts
            SET field_values = ?1,
                local_version = local_version + 1,
                pending_sync = 1,
                last_saved_at = ?2,
                updated_at = ?2
            WHERE id = ?3 AND local_version = ?4
            "#,
        )
        .bind(&serialized)
        .bind(now)
        .bind(id.as_str())
        .bind(row.local_version)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::Database(format!(
                "Concurrent modification of document draft {id}"
            )));
        }

        tx.commit().await?;
        self.load(id).await
    }

    async fn set_status(
        &self,
        id: &DocumentId,
        to: DraftStatus,
        allowed_from: &[DraftStatus],
    ) -> Result<DocumentDraft, AppError> {
        let legal_from: Vec<&DraftStatus> = allowed_from
            .iter()
            .filter(|from| from.can_transition_to(to))
            .collect();

        if legal_from.is_empty() {
            let current = self.load(id).await?;
            return Err(self.illegal(id, current.status, to));
        }

        let placeholders = legal_from
            .iter()
            .enumerate()
            .map(|(i, _)| format!("?{}", i + 4))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            r#"
            UPDATE document_drafts
            SET status = ?1, updated_at = ?2
            WHERE id = ?3 AND status IN ({placeholders})
            "#
        );

        let mut query = sqlx::query(&sql)
            .bind(to.as_str())
            .bind(Utc::now().timestamp())
            .bind(id.as_str());
        for from in &legal_from {
            query = query.bind(from.as_str());
        }

        let result = query.execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            let current = self.load(id).await?;
            return Err(self.illegal(id, current.status, to));
        }

        self.load(id).await
    }

    async fn list_pending_sync(&self) -> Result<Vec<DocumentDraft>, AppError> {
        let rows = sqlx::query_as::<_, DraftRow>(
            r#"
            SELECT * FROM document_drafts
            WHERE pending_sync = 1
            ORDER BY updated_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(DraftRow::into_entity).collect()
    }

    async fn mark_finalized(
        &self,
        id: &DocumentId,
        artifact_ref: &ArtifactRef,
        acknowledged_version: i64,
    ) -> Result<DocumentDraft, AppError> {
        let now = Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            UPDATE document_drafts
            SET status = 'finalized',
                artifact_ref = ?1,
                server_version = ?2,
                pending_sync = 0,
                conflict_data = NULL,
                last_finalized_at = ?3,
                updated_at = ?3
            WHERE id = ?4 AND status = 'finalizing'
            "#,
        )
        .bind(artifact_ref.as_str())
        .bind(acknowledged_version)
        .bind(now)
        .bind(id.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let current = self.load(id).await?;
            return Err(self.illegal(id, current.status, DraftStatus::Finalized));
        }

        tracing::info!(
            target: "docs::store",
            document_id = %id,
            artifact_ref = %artifact_ref,
            version = acknowledged_version,
            "draft finalized"
        );
        self.load(id).await
    }

    async fn acknowledge_sync(
        &self,
        id: &DocumentId,
        server_version: i64,
    ) -> Result<DocumentDraft, AppError> {
        let now = Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            UPDATE document_drafts
            SET server_version = ?1,
                pending_sync = CASE WHEN local_version = ?1 THEN 0 ELSE pending_sync END,
                conflict_data = CASE WHEN local_version = ?1 THEN NULL ELSE conflict_data END,
                updated_at = ?2
            WHERE id = ?3
            "#,
        )
        .bind(server_version)
        .bind(now)
        .bind(id.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Document draft {id} not found")));
        }

        self.load(id).await
    }

    async fn record_conflict(
        &self,
        id: &DocumentId,
        digest: &ConflictDigest,
    ) -> Result<DocumentDraft, AppError> {
        let json = serde_json::to_string(digest)
            .map_err(|err| AppError::SerializationError(err.to_string()))?;
        let now = Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            UPDATE document_drafts
            SET conflict_data = ?1, updated_at = ?2
            WHERE id = ?3
            "#,
        )
        .bind(&json)
        .bind(now)
        .bind(id.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Document draft {id} not found")));
        }

        tracing::warn!(
            target: "docs::store",
            document_id = %id,
            local_version = digest.local_version,
            server_version = digest.server_version,
            "sync conflict recorded"
        );
        self.load(id).await
    }

    async fn purge_expired(&self, cutoff: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            DELETE FROM document_drafts
            WHERE status = 'finalized'
              AND pending_sync = 0
              AND last_finalized_at IS NOT NULL
              AND last_finalized_at < ?1
            "#,
        )
        .bind(cutoff.timestamp())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
