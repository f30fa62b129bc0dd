use crate::application::ports::{ArtifactMetadata, ArtifactStore};
use crate::domain::value_objects::ArtifactRef;
use crate::shared::error::AppError;
use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use bytes::Bytes;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Durable artifact store for standalone installs: finalized documents land
/// under the local documents root, keyed per deal and document version.
/// Layout: `deals/{deal_id}/documents/{document_id}_v{local_version}.bin`.
///
/// Uploads are idempotent: re-uploading the same `(document_id,
/// local_version)` returns the existing ref without duplicating bytes.
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn relative_key(metadata: &ArtifactMetadata) -> String {
        format!(
            "deals/{}/documents/{}_v{}.bin",
            metadata.deal_id, metadata.document_id, metadata.local_version
        )
    }

    fn checksum(bytes: &[u8]) -> String {
        let digest = Sha256::digest(bytes);
        URL_SAFE_NO_PAD.encode(digest)
    }

    async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), AppError> {
        let parent = path
            .parent()
            .ok_or_else(|| AppError::Storage("Artifact path has no parent".to_string()))?;
        tokio::fs::create_dir_all(parent).await?;

        // Copy-then-swap so a crash mid-write never leaves a torn artifact.
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn upload(
        &self,
        bytes: Bytes,
        metadata: ArtifactMetadata,
    ) -> Result<ArtifactRef, AppError> {
        let key = Self::relative_key(&metadata);
        let path = self.root.join(&key);
        let checksum = Self::checksum(&bytes);

        match tokio::fs::read(&path).await {
            Ok(existing) => {
                if Self::checksum(&existing) == checksum {
                    tracing::debug!(
                        target: "docs::artifacts",
                        key = %key,
                        "artifact already stored, reusing ref"
                    );
                    return ArtifactRef::new(key).map_err(AppError::ValidationError);
                }
                // A torn previous write; replace it.
                tracing::warn!(
                    target: "docs::artifacts",
                    key = %key,
                    "stored artifact checksum mismatch, rewriting"
                );
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }

        Self::write_atomic(&path, &bytes).await?;

        tracing::info!(
            target: "docs::artifacts",
            key = %key,
            size = bytes.len(),
            checksum = %checksum,
            "artifact stored"
        );
        ArtifactRef::new(key).map_err(AppError::ValidationError)
    }
}
