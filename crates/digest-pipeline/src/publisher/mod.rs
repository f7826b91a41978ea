//! Uploading copy and sharing it through a presigned link

pub mod s3;
pub mod sigv4;

pub use s3::S3Store;

use crate::error::{DigestError, Result};
use crate::outcome::StepOutcome;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Object storage used by the publisher
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `body` as UTF-8 text under `key`
    async fn put_text(&self, key: &str, body: &str) -> Result<()>;

    /// Time-limited GET link for `key`; no network access
    fn presigned_get(&self, key: &str, ttl: Duration) -> Result<String>;
}

/// Uploads generated copy and returns a shareable link
pub struct Publisher {
    store: Arc<dyn ObjectStore>,
    ttl: Duration,
}

impl Publisher {
    pub fn new(store: Arc<dyn ObjectStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Upload `text` under `key` and presign it.
    ///
    /// No link is produced unless the upload succeeded.
    pub async fn publish(&self, key: &str, text: &str) -> StepOutcome<String> {
        if let Err(e) = self.store.put_text(key, text).await {
            warn!(key = %key, error = %e, "Upload failed");
            return StepOutcome::Failed(as_upload_error(e));
        }

        match self.store.presigned_get(key, self.ttl) {
            Ok(url) => StepOutcome::Complete(url),
            Err(e) => {
                warn!(key = %key, error = %e, "Presigning failed");
                StepOutcome::Failed(as_upload_error(e))
            }
        }
    }
}

fn as_upload_error(err: DigestError) -> DigestError {
    match err {
        DigestError::Upload(_) => err,
        other => DigestError::Upload(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_uploads_then_presigns() {
        let mut store = MockObjectStore::new();
        store
            .expect_put_text()
            .withf(|key, body| key == "xhs/xxxx_2025-12-01.txt" && body == "文案")
            .times(1)
            .returning(|_, _| Ok(()));
        store
            .expect_presigned_get()
            .withf(|key, ttl| key == "xhs/xxxx_2025-12-01.txt" && ttl.as_secs() == 604_800)
            .returning(|_, _| Ok("https://r2.example/link".to_string()));

        let publisher = Publisher::new(Arc::new(store), Duration::from_secs(604_800));
        let outcome = publisher.publish("xhs/xxxx_2025-12-01.txt", "文案").await;

        assert_eq!(outcome.into_result().unwrap(), "https://r2.example/link");
    }

    #[tokio::test]
    async fn test_failed_upload_yields_no_link() {
        let mut store = MockObjectStore::new();
        store
            .expect_put_text()
            .returning(|_, _| Err(DigestError::Upload("HTTP 403".into())));
        store.expect_presigned_get().never();

        let publisher = Publisher::new(Arc::new(store), Duration::from_secs(60));
        let outcome = publisher.publish("k", "v").await;

        assert!(outcome.is_failed());
        assert!(!outcome.into_result().unwrap_err().is_fatal());
    }

    #[tokio::test]
    async fn test_transport_error_becomes_upload_error() {
        let mut store = MockObjectStore::new();
        store
            .expect_put_text()
            .returning(|_, _| Err(DigestError::Io(std::io::Error::other("reset"))));

        let publisher = Publisher::new(Arc::new(store), Duration::from_secs(60));
        let err = publisher.publish("k", "v").await.into_result().unwrap_err();
        assert!(matches!(err, DigestError::Upload(_)));
    }
}
