//! Resilient persistence of event rulebook PDFs.
//!
//! The storage backend may reject uploads outright (CORS rules, quota), so
//! the pipeline walks an ordered fallback chain and stops at the first
//! representation that fits: storage URL, inline data URI, compressed data
//! URI, first chunk of the file, or a symbolic oversized marker.

use crate::constants::{
    CHUNK_SIZE_BYTES, INLINE_CEILING_BYTES, SAFE_CEILING_BYTES, UPLOAD_TIMEOUT_SECS,
};
use crate::error::{ArenaError, Result};
use crate::object_store::{ObjectStore, PutMetadata};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

const DATA_URI_PREFIX: &str = "data:application/pdf;base64,";

/// Which stage of the fallback chain produced the stored value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoredStage {
    DirectUpload,
    Inline,
    Compressed,
    Chunked,
    Marker,
}

#[derive(Debug, Clone)]
pub struct UploadOutcome {
    pub stage: StoredStage,
    /// The string persisted on the event record.
    pub stored_value: String,
    pub file_name: String,
}

/// Small structured record stored in place of a binary nothing else fit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OversizedMarker {
    #[serde(rename = "type")]
    pub kind: String,
    pub file_name: String,
    pub file_size: usize,
    pub upload_date: String,
    pub message: String,
}

impl OversizedMarker {
    pub const KIND: &'static str = "oversized_pdf";

    fn new(file_name: &str, file_size: usize) -> Self {
        Self {
            kind: Self::KIND.to_string(),
            file_name: file_name.to_string(),
            file_size,
            upload_date: Utc::now().to_rfc3339(),
            message: "Document too large to store inline. Object storage configuration is required."
                .to_string(),
        }
    }
}

/// The shape of a stored rulebook value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    StorageUrl,
    InlineData,
    OversizedMarker,
}

impl AttachmentKind {
    pub fn classify(stored: &str) -> Option<AttachmentKind> {
        if stored.starts_with("http") {
            return Some(AttachmentKind::StorageUrl);
        }
        if stored.starts_with("data:") {
            return Some(AttachmentKind::InlineData);
        }
        if stored.starts_with('{') {
            let parsed: std::result::Result<OversizedMarker, _> = serde_json::from_str(stored);
            if parsed.map(|m| m.kind == OversizedMarker::KIND).unwrap_or(false) {
                return Some(AttachmentKind::OversizedMarker);
            }
        }
        None
    }
}

/// Optional hook into a PDF-rendering facility able to re-encode the file
/// at lower fidelity. When absent the pipeline skips straight to chunking.
pub trait PdfCompressor: Send + Sync {
    fn compress(&self, bytes: &[u8]) -> Result<Vec<u8>>;
}

pub struct AttachmentPipeline {
    store: Arc<dyn ObjectStore>,
    compressor: Option<Box<dyn PdfCompressor>>,
    upload_timeout: Duration,
    inline_ceiling: usize,
    chunk_size: usize,
    safe_ceiling: usize,
}

impl AttachmentPipeline {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            compressor: None,
            upload_timeout: Duration::from_secs(UPLOAD_TIMEOUT_SECS),
            inline_ceiling: INLINE_CEILING_BYTES,
            chunk_size: CHUNK_SIZE_BYTES,
            safe_ceiling: SAFE_CEILING_BYTES,
        }
    }

    pub fn with_compressor(mut self, compressor: Box<dyn PdfCompressor>) -> Self {
        self.compressor = Some(compressor);
        self
    }

    pub fn with_upload_timeout(mut self, timeout: Duration) -> Self {
        self.upload_timeout = timeout;
        self
    }

    pub fn with_inline_ceiling(mut self, ceiling: usize) -> Self {
        self.inline_ceiling = ceiling;
        self
    }

    #[cfg(test)]
    pub fn with_ceilings(mut self, inline: usize, chunk: usize, safe: usize) -> Self {
        self.inline_ceiling = inline;
        self.chunk_size = chunk;
        self.safe_ceiling = safe;
        self
    }

    fn rulebook_path(event_id: Uuid, file_name: &str) -> String {
        format!("events/{}/rulebook/{}", event_id, file_name)
    }

    /// Persists a rulebook, walking the fallback chain until one stage fits.
    pub async fn store_rulebook(
        &self,
        event_id: Uuid,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<UploadOutcome> {
        let path = Self::rulebook_path(event_id, file_name);
        let metadata = PutMetadata {
            content_type: "application/pdf".to_string(),
            original_name: file_name.to_string(),
            uploaded_by: None,
        };

        // Stage 1: direct object-storage upload, bounded by a timeout so a
        // CORS preflight that never answers is treated as a policy rejection.
        match tokio::time::timeout(self.upload_timeout, self.store.put(&path, bytes, &metadata))
            .await
        {
            Ok(Ok(())) => {
                let url = self.store.download_url(&path).await?;
                info!("Rulebook uploaded to object storage at {}", path);
                return Ok(UploadOutcome {
                    stage: StoredStage::DirectUpload,
                    stored_value: url,
                    file_name: file_name.to_string(),
                });
            }
            Ok(Err(e)) if is_recoverable_upload_failure(&e) => {
                warn!("Object-storage upload rejected, falling back: {}", e);
            }
            Ok(Err(e)) => return Err(e),
            Err(_elapsed) => {
                warn!(
                    "Object-storage upload timed out after {:?}, treating as policy rejection",
                    self.upload_timeout
                );
            }
        }

        // Stage 2: inline data URI.
        let inline = encode_data_uri(bytes);
        if inline.len() <= self.inline_ceiling {
            info!("Rulebook stored inline ({} bytes encoded)", inline.len());
            return Ok(UploadOutcome {
                stage: StoredStage::Inline,
                stored_value: inline,
                file_name: file_name.to_string(),
            });
        }

        // Stage 3: compression, when a PDF facility is wired in.
        if let Some(compressor) = &self.compressor {
            match compressor.compress(bytes) {
                Ok(compressed) => {
                    let encoded = encode_data_uri(&compressed);
                    if encoded.len() <= self.inline_ceiling {
                        info!(
                            "Rulebook stored compressed ({} -> {} bytes)",
                            bytes.len(),
                            compressed.len()
                        );
                        return Ok(UploadOutcome {
                            stage: StoredStage::Compressed,
                            stored_value: encoded,
                            file_name: file_name.to_string(),
                        });
                    }
                }
                Err(e) => warn!("PDF compression failed, continuing to chunking: {}", e),
            }
        }

        // Stage 4: keep only the first fixed-size chunk, truncated further
        // if the encoding still exceeds the safety ceiling.
        let chunk = &bytes[..self.chunk_size.min(bytes.len())];
        let mut payload = BASE64.encode(chunk);
        if payload.len() > self.safe_ceiling {
            payload.truncate(self.safe_ceiling);
        }
        let chunked = format!("{}{}", DATA_URI_PREFIX, payload);
        if chunked.len() <= self.inline_ceiling {
            warn!(
                "Rulebook truncated to its first chunk ({} of {} bytes)",
                chunk.len(),
                bytes.len()
            );
            return Ok(UploadOutcome {
                stage: StoredStage::Chunked,
                stored_value: chunked,
                file_name: file_name.to_string(),
            });
        }

        // Stage 5: nothing fits; keep a symbolic reference so the document
        // is never silently dropped.
        let marker = OversizedMarker::new(file_name, bytes.len());
        warn!(
            "Rulebook '{}' ({} bytes) stored as oversized marker; storage configuration required",
            file_name,
            bytes.len()
        );
        Ok(UploadOutcome {
            stage: StoredStage::Marker,
            stored_value: serde_json::to_string(&marker)?,
            file_name: file_name.to_string(),
        })
    }

    /// Mirrors upload on deletion. Storage URLs get a best-effort object
    /// delete where "not found" and CORS rejections count as success, so a
    /// stale reference can never block deleting the event. Inline and
    /// marker values need no remote call; the caller clears the field.
    pub async fn delete_rulebook(&self, event_id: Uuid, stored_value: &str) -> Result<()> {
        match AttachmentKind::classify(stored_value) {
            Some(AttachmentKind::StorageUrl) => {
                let path = extract_object_path(stored_value, event_id);
                match self.store.delete(&path).await {
                    Ok(()) => info!("Deleted rulebook object at {}", path),
                    Err(ArenaError::NotFound(_)) => {
                        info!("Rulebook object already gone at {}", path)
                    }
                    Err(ArenaError::CorsPolicy(e)) => {
                        warn!("CORS rejection deleting rulebook, continuing: {}", e)
                    }
                    Err(e) => warn!("Failed to delete rulebook object, continuing: {}", e),
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

fn is_recoverable_upload_failure(error: &ArenaError) -> bool {
    matches!(
        error,
        ArenaError::CorsPolicy(_) | ArenaError::OversizedPayload { .. }
    )
}

fn encode_data_uri(bytes: &[u8]) -> String {
    format!("{}{}", DATA_URI_PREFIX, BASE64.encode(bytes))
}

/// Recovers the object path from a stored download URL, dropping any query
/// string the storage service appended.
fn extract_object_path(url: &str, event_id: Uuid) -> String {
    let file_name = url
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .split('?')
        .next()
        .unwrap_or_default();
    AttachmentPipeline::rulebook_path(event_id, file_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object_store::{FailureMode, InMemoryObjectStore};

    fn pipeline_with(mode: FailureMode) -> (Arc<InMemoryObjectStore>, AttachmentPipeline) {
        let store = Arc::new(InMemoryObjectStore::with_failure(mode));
        let pipeline = AttachmentPipeline::new(store.clone())
            .with_upload_timeout(Duration::from_millis(50));
        (store, pipeline)
    }

    #[tokio::test]
    async fn direct_upload_stores_url() {
        let (store, pipeline) = pipeline_with(FailureMode::None);
        let event_id = Uuid::new_v4();

        let outcome = pipeline
            .store_rulebook(event_id, "rules.pdf", b"%PDF-1.4 small")
            .await
            .unwrap();

        assert_eq!(outcome.stage, StoredStage::DirectUpload);
        assert!(outcome.stored_value.starts_with("https://"));
        assert!(store.contains(&format!("events/{}/rulebook/rules.pdf", event_id)));
        assert_eq!(
            AttachmentKind::classify(&outcome.stored_value),
            Some(AttachmentKind::StorageUrl)
        );
    }

    #[tokio::test]
    async fn cors_rejection_falls_back_to_inline() {
        let (_, pipeline) = pipeline_with(FailureMode::CorsRejected);
        let outcome = pipeline
            .store_rulebook(Uuid::new_v4(), "rules.pdf", b"%PDF-1.4 small")
            .await
            .unwrap();

        assert_eq!(outcome.stage, StoredStage::Inline);
        assert!(outcome.stored_value.starts_with(DATA_URI_PREFIX));
        assert_eq!(
            AttachmentKind::classify(&outcome.stored_value),
            Some(AttachmentKind::InlineData)
        );
    }

    #[tokio::test]
    async fn quota_rejection_also_enters_the_fallback_chain() {
        let (_, pipeline) = pipeline_with(FailureMode::QuotaExceeded);
        let outcome = pipeline
            .store_rulebook(Uuid::new_v4(), "rules.pdf", b"%PDF-1.4 small")
            .await
            .unwrap();
        assert_eq!(outcome.stage, StoredStage::Inline);
    }

    #[tokio::test]
    async fn permission_failure_is_terminal() {
        let (_, pipeline) = pipeline_with(FailureMode::Unauthorized);
        let err = pipeline
            .store_rulebook(Uuid::new_v4(), "rules.pdf", b"%PDF-1.4")
            .await
            .unwrap_err();
        assert!(matches!(err, ArenaError::PermissionDenied(_)));
    }

    #[tokio::test]
    async fn two_megabyte_pdf_under_timeout_ends_chunked() {
        let (_, pipeline) = pipeline_with(FailureMode::Hang);
        let big = vec![0x25u8; 2 * 1024 * 1024];

        let outcome = pipeline
            .store_rulebook(Uuid::new_v4(), "rules.pdf", &big)
            .await
            .unwrap();

        // The document reference is never silently dropped.
        assert!(matches!(
            outcome.stage,
            StoredStage::Chunked | StoredStage::Marker
        ));
        assert_eq!(outcome.stage, StoredStage::Chunked);
        assert!(outcome.stored_value.len() <= INLINE_CEILING_BYTES);
        assert!(outcome.stored_value.starts_with(DATA_URI_PREFIX));
    }

    #[tokio::test]
    async fn nothing_fits_stores_oversized_marker() {
        let store = Arc::new(InMemoryObjectStore::with_failure(FailureMode::CorsRejected));
        // Ceilings squeezed so that even a truncated chunk cannot fit.
        let pipeline = AttachmentPipeline::new(store)
            .with_upload_timeout(Duration::from_millis(50))
            .with_ceilings(16, 8, 8);
        let big = vec![0x25u8; 4096];

        let outcome = pipeline
            .store_rulebook(Uuid::new_v4(), "rules.pdf", &big)
            .await
            .unwrap();

        assert_eq!(outcome.stage, StoredStage::Marker);
        let marker: OversizedMarker = serde_json::from_str(&outcome.stored_value).unwrap();
        assert_eq!(marker.kind, OversizedMarker::KIND);
        assert_eq!(marker.file_size, 4096);
        assert_eq!(
            AttachmentKind::classify(&outcome.stored_value),
            Some(AttachmentKind::OversizedMarker)
        );
    }

    #[tokio::test]
    async fn compressor_is_used_before_chunking() {
        struct HalvingCompressor;
        impl PdfCompressor for HalvingCompressor {
            fn compress(&self, bytes: &[u8]) -> Result<Vec<u8>> {
                Ok(bytes[..bytes.len() / 4].to_vec())
            }
        }

        let store = Arc::new(InMemoryObjectStore::with_failure(FailureMode::CorsRejected));
        let pipeline = AttachmentPipeline::new(store)
            .with_upload_timeout(Duration::from_millis(50))
            .with_compressor(Box::new(HalvingCompressor));
        let big = vec![0x25u8; 2 * 1024 * 1024];

        let outcome = pipeline
            .store_rulebook(Uuid::new_v4(), "rules.pdf", &big)
            .await
            .unwrap();
        assert_eq!(outcome.stage, StoredStage::Compressed);
    }

    #[tokio::test]
    async fn deleting_url_attachment_issues_object_delete() {
        let (store, pipeline) = pipeline_with(FailureMode::None);
        let event_id = Uuid::new_v4();
        let outcome = pipeline
            .store_rulebook(event_id, "rules.pdf", b"%PDF-1.4")
            .await
            .unwrap();

        pipeline
            .delete_rulebook(event_id, &outcome.stored_value)
            .await
            .unwrap();
        let path = format!("events/{}/rulebook/rules.pdf", event_id);
        assert!(store.was_deleted(&path));
        assert!(!store.contains(&path));
    }

    #[tokio::test]
    async fn deleting_missing_object_is_a_no_op_success() {
        let (_, pipeline) = pipeline_with(FailureMode::None);
        let url = "https://storage.local/events/x/rulebook/gone.pdf?token=abc";
        pipeline.delete_rulebook(Uuid::new_v4(), url).await.unwrap();
    }

    #[tokio::test]
    async fn deleting_inline_and_marker_values_needs_no_remote_call() {
        let (store, pipeline) = pipeline_with(FailureMode::None);
        pipeline
            .delete_rulebook(Uuid::new_v4(), "data:application/pdf;base64,JVBERg==")
            .await
            .unwrap();
        let marker = serde_json::to_string(&OversizedMarker::new("big.pdf", 123)).unwrap();
        pipeline.delete_rulebook(Uuid::new_v4(), &marker).await.unwrap();
        assert_eq!(store.object_count(), 0);
    }

    #[test]
    fn classification_of_stored_values() {
        assert_eq!(
            AttachmentKind::classify("https://storage.local/x"),
            Some(AttachmentKind::StorageUrl)
        );
        assert_eq!(
            AttachmentKind::classify("data:application/pdf;base64,AAAA"),
            Some(AttachmentKind::InlineData)
        );
        assert_eq!(AttachmentKind::classify("{\"type\":\"other\"}"), None);
        assert_eq!(AttachmentKind::classify("plain text"), None);
    }
}
