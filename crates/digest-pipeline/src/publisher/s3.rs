//! Path-style S3 client for a single bucket

use super::ObjectStore;
use super::sigv4::{self, CanonicalRequest, Credentials};
use crate::error::{DigestError, Result};
use crate::runtime::{DEFAULT_REGION, StorageConfig};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// S3-compatible bucket (Cloudflare R2, MinIO, AWS S3)
#[derive(Debug)]
pub struct S3Store {
    client: Client,
    credentials: Credentials,
    endpoint: Url,
    bucket: String,
}

impl S3Store {
    /// Build a store from runtime storage settings.
    ///
    /// Fails with a configuration error when a field is missing or the
    /// endpoint is not a URL.
    pub fn new(config: &StorageConfig, timeout: Duration) -> Result<Self> {
        let missing = config.missing_fields();
        if !missing.is_empty() {
            return Err(DigestError::Config(format!(
                "storage config incomplete, missing: {}",
                missing.join(", ")
            )));
        }

        let endpoint = Url::parse(&config.endpoint_url).map_err(|e| {
            DigestError::Config(format!("invalid endpoint_url '{}': {e}", config.endpoint_url))
        })?;
        if endpoint.host_str().is_none() {
            return Err(DigestError::Config(format!(
                "endpoint_url '{}' has no host",
                config.endpoint_url
            )));
        }

        let region = match config.region.trim() {
            "" => DEFAULT_REGION,
            region => region,
        };
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            credentials: Credentials::new(&config.access_key, &config.secret_key, region),
            endpoint,
            bucket: config.bucket.clone(),
        })
    }

    /// `host[:port]`, port only when not the scheme default
    fn host(&self) -> String {
        let host = self.endpoint.host_str().unwrap_or_default();
        match self.endpoint.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        }
    }

    /// Encoded path of an object, `/{bucket}/{key}` under any endpoint prefix
    fn object_path(&self, key: &str) -> String {
        format!(
            "{}/{}/{}",
            self.endpoint.path().trim_end_matches('/'),
            sigv4::uri_encode(&self.bucket, true),
            sigv4::uri_encode(key.trim_start_matches('/'), false)
        )
    }

    fn origin(&self) -> String {
        format!("{}://{}", self.endpoint.scheme(), self.host())
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn put_text(&self, key: &str, body: &str) -> Result<()> {
        let now = Utc::now();
        let path = self.object_path(key);
        let payload_hash = sigv4::sha256_hex(body.as_bytes());
        let amz_date = sigv4::amz_date(now);

        let request = CanonicalRequest {
            method: "PUT",
            path: &path,
            query: Vec::new(),
            headers: vec![
                ("host".to_string(), self.host()),
                ("content-type".to_string(), TEXT_CONTENT_TYPE.to_string()),
                ("x-amz-content-sha256".to_string(), payload_hash.clone()),
                ("x-amz-date".to_string(), amz_date.clone()),
            ],
            payload_hash: &payload_hash,
        };
        let authorization = sigv4::authorization(&self.credentials, &request, now)?;

        debug!(bucket = %self.bucket, key = %key, "Uploading object");
        let response = self
            .client
            .put(format!("{}{path}", self.origin()))
            .header("content-type", TEXT_CONTENT_TYPE)
            .header("x-amz-content-sha256", &payload_hash)
            .header("x-amz-date", &amz_date)
            .header("authorization", authorization)
            .body(body.to_string())
            .send()
            .await
            .map_err(|e| DigestError::Upload(format!("PUT {key} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(DigestError::Upload(format!(
                "PUT {key} returned HTTP {status}: {}",
                detail.trim()
            )));
        }

        info!(bucket = %self.bucket, key = %key, bytes = body.len(), "Uploaded object");
        Ok(())
    }

    fn presigned_get(&self, key: &str, ttl: Duration) -> Result<String> {
        let path = self.object_path(key);
        let query = sigv4::presign_query(
            &self.credentials,
            "GET",
            &self.host(),
            &path,
            ttl,
            Utc::now(),
        )?;
        Ok(format!("{}{path}?{query}", self.origin()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(endpoint: &str) -> StorageConfig {
        StorageConfig {
            bucket: "digests".into(),
            endpoint_url: endpoint.into(),
            access_key: "AKIDEXAMPLE".into(),
            secret_key: "secret".into(),
            region: "auto".into(),
        }
    }

    #[test]
    fn test_incomplete_config_rejected() {
        let mut storage = config("https://acct.r2.cloudflarestorage.com");
        storage.secret_key.clear();
        let err = S3Store::new(&storage, Duration::from_secs(10)).unwrap_err();
        assert!(err.to_string().contains("secret_key"));
    }

    #[test]
    fn test_invalid_endpoint_rejected() {
        assert!(S3Store::new(&config("not a url"), Duration::from_secs(10)).is_err());
    }

    #[test]
    fn test_host_keeps_custom_port() {
        let store = S3Store::new(&config("http://localhost:9000"), Duration::from_secs(10)).unwrap();
        assert_eq!(store.host(), "localhost:9000");

        let store = S3Store::new(&config("https://acct.r2.cloudflarestorage.com/"), Duration::from_secs(10)).unwrap();
        assert_eq!(store.host(), "acct.r2.cloudflarestorage.com");
    }

    #[test]
    fn test_path_style_object_path() {
        let store = S3Store::new(&config("https://acct.r2.cloudflarestorage.com"), Duration::from_secs(10)).unwrap();
        assert_eq!(store.object_path("xhs/xxxx_2025-12-01.txt"), "/digests/xhs/xxxx_2025-12-01.txt");
    }

    #[test]
    fn test_presigned_url_shape() {
        let store = S3Store::new(&config("https://acct.r2.cloudflarestorage.com"), Duration::from_secs(10)).unwrap();
        let url = store
            .presigned_get("xhs/xxxx_2025-12-01.txt", Duration::from_secs(604_800))
            .unwrap();

        assert!(url.starts_with("https://acct.r2.cloudflarestorage.com/digests/xhs/xxxx_2025-12-01.txt?"));
        assert!(url.contains("X-Amz-Expires=604800"));
        assert!(url.contains("X-Amz-SignedHeaders=host"));
        assert!(url.contains("%2Fauto%2Fs3%2Faws4_request"));

        let signature = url.rsplit("X-Amz-Signature=").next().unwrap();
        assert_eq!(signature.len(), 64);
    }
}
