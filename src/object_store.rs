use crate::error::{ArenaError, Result};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

/// Metadata attached to an uploaded object.
#[derive(Debug, Clone)]
pub struct PutMetadata {
    pub content_type: String,
    pub original_name: String,
    pub uploaded_by: Option<String>,
}

/// Contract over the object-storage service holding event attachments.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, path: &str, bytes: &[u8], metadata: &PutMetadata) -> Result<()>;
    async fn download_url(&self, path: &str) -> Result<String>;
    async fn delete(&self, path: &str) -> Result<()>;
}

/// Message patterns the browser stack surfaces for cross-origin rejections.
pub fn looks_like_cors(message: &str) -> bool {
    message.contains("CORS")
        || message.contains("cors")
        || message.contains("ERR_FAILED")
        || message.contains("Access to XMLHttpRequest")
}

/// HTTP-backed object store.
///
/// Config via env:
/// - ARENA_STORAGE_URL (e.g. https://storage.example.com)
/// - ARENA_STORAGE_KEY (service key)
/// - ARENA_STORAGE_BUCKET (bucket name)
pub struct HttpObjectStore {
    client: reqwest::Client,
    base_url: String,
    bucket: String,
    api_key: String,
}

impl HttpObjectStore {
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var("ARENA_STORAGE_URL")?;
        let api_key = std::env::var("ARENA_STORAGE_KEY")?;
        let bucket = std::env::var("ARENA_STORAGE_BUCKET")?;
        Ok(Self::new(base_url, bucket, api_key))
    }

    pub fn new(base_url: String, bucket: String, api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            bucket,
            api_key,
        }
    }

    fn object_endpoint(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/{}/{}",
            self.base_url.trim_end_matches('/'),
            self.bucket,
            path
        )
    }

    fn classify_status(status: reqwest::StatusCode, body: String) -> ArenaError {
        match status.as_u16() {
            401 => ArenaError::Unauthenticated(body),
            403 => ArenaError::PermissionDenied(body),
            404 => ArenaError::NotFound(body),
            413 => ArenaError::OversizedPayload { size: 0 },
            _ if looks_like_cors(&body) => ArenaError::CorsPolicy(body),
            _ => ArenaError::NetworkUnavailable(format!("{} - {}", status, body)),
        }
    }
}

/// Hex sha256 of the payload, sent along so the service can verify it.
pub fn content_checksum(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn put(&self, path: &str, bytes: &[u8], metadata: &PutMetadata) -> Result<()> {
        let endpoint = self.object_endpoint(path);
        let mut request = self
            .client
            .put(&endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("apikey", self.api_key.clone())
            .header(reqwest::header::CONTENT_TYPE, metadata.content_type.clone())
            .header("x-original-name", metadata.original_name.clone())
            .header("x-content-sha256", content_checksum(bytes))
            .query(&[("upsert", "true")]);
        if let Some(uploader) = &metadata.uploaded_by {
            request = request.header("x-uploaded-by", uploader.clone());
        }
        let response = request.body(bytes.to_vec()).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::classify_status(status, body));
        }

        debug!("Uploaded {} bytes to {}", bytes.len(), path);
        Ok(())
    }

    async fn download_url(&self, path: &str) -> Result<String> {
        Ok(format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url.trim_end_matches('/'),
            self.bucket,
            path
        ))
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let endpoint = self.object_endpoint(path);
        let response = self
            .client
            .delete(&endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("apikey", self.api_key.clone())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::classify_status(status, body));
        }

        debug!("Deleted object at {}", path);
        Ok(())
    }
}

/// Failure the in-memory store simulates on the next `put`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureMode {
    None,
    /// The request never completes; only an upload timeout ends it.
    Hang,
    CorsRejected,
    QuotaExceeded,
    Unauthorized,
}

/// In-memory object store with scriptable failure modes for tests and the
/// CLI default when no endpoint is configured.
pub struct InMemoryObjectStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    deleted: Mutex<HashSet<String>>,
    failure: Mutex<FailureMode>,
}

impl Default for InMemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self {
            objects: Mutex::new(HashMap::new()),
            deleted: Mutex::new(HashSet::new()),
            failure: Mutex::new(FailureMode::None),
        }
    }

    pub fn with_failure(mode: FailureMode) -> Self {
        let store = Self::new();
        *store.failure.lock().unwrap() = mode;
        store
    }

    pub fn set_failure(&self, mode: FailureMode) {
        *self.failure.lock().unwrap() = mode;
    }

    pub fn contains(&self, path: &str) -> bool {
        self.objects.lock().unwrap().contains_key(path)
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn was_deleted(&self, path: &str) -> bool {
        self.deleted.lock().unwrap().contains(path)
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn put(&self, path: &str, bytes: &[u8], _metadata: &PutMetadata) -> Result<()> {
        let mode = *self.failure.lock().unwrap();
        match mode {
            FailureMode::None => {
                self.objects
                    .lock()
                    .unwrap()
                    .insert(path.to_string(), bytes.to_vec());
                Ok(())
            }
            FailureMode::Hang => {
                // Outlives any sane upload timeout; the caller cancels us.
                tokio::time::sleep(Duration::from_secs(86_400)).await;
                Ok(())
            }
            FailureMode::CorsRejected => Err(ArenaError::CorsPolicy(
                "Access to XMLHttpRequest has been blocked by CORS policy".to_string(),
            )),
            FailureMode::QuotaExceeded => Err(ArenaError::OversizedPayload { size: bytes.len() }),
            FailureMode::Unauthorized => Err(ArenaError::PermissionDenied(
                "storage rules rejected the upload".to_string(),
            )),
        }
    }

    async fn download_url(&self, path: &str) -> Result<String> {
        Ok(format!("https://storage.local/{}", path))
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let removed = self.objects.lock().unwrap().remove(path);
        self.deleted.lock().unwrap().insert(path.to_string());
        if removed.is_none() {
            return Err(ArenaError::NotFound(format!("object {}", path)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata() -> PutMetadata {
        PutMetadata {
            content_type: "application/pdf".into(),
            original_name: "rules.pdf".into(),
            uploaded_by: None,
        }
    }

    #[tokio::test]
    async fn put_then_delete_round_trip() {
        let store = InMemoryObjectStore::new();
        store.put("events/x/rules.pdf", b"%PDF-1.4", &metadata()).await.unwrap();
        assert!(store.contains("events/x/rules.pdf"));

        store.delete("events/x/rules.pdf").await.unwrap();
        assert!(!store.contains("events/x/rules.pdf"));
        assert!(store.was_deleted("events/x/rules.pdf"));
    }

    #[tokio::test]
    async fn delete_of_missing_object_is_not_found() {
        let store = InMemoryObjectStore::new();
        let err = store.delete("events/x/missing.pdf").await.unwrap_err();
        assert!(matches!(err, ArenaError::NotFound(_)));
    }

    #[tokio::test]
    async fn scripted_cors_failure_surfaces_as_cors_policy() {
        let store = InMemoryObjectStore::with_failure(FailureMode::CorsRejected);
        let err = store.put("p", b"x", &metadata()).await.unwrap_err();
        assert!(matches!(err, ArenaError::CorsPolicy(_)));
    }

    #[test]
    fn cors_message_patterns() {
        assert!(looks_like_cors("blocked by CORS policy"));
        assert!(looks_like_cors("net::ERR_FAILED"));
        assert!(!looks_like_cors("503 service unavailable"));
    }

    #[test]
    fn checksum_is_stable_hex_sha256() {
        let checksum = content_checksum(b"hello");
        assert_eq!(checksum.len(), 64);
        assert_eq!(checksum, content_checksum(b"hello"));
        assert_ne!(checksum, content_checksum(b"hello!"));
    }
}
