//! RSS feed client

use super::{BROWSER_USER_AGENT, blocked_reason};
use crate::config::FeedSource;
use crate::error::{DigestError, Result};
use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use std::time::Duration;
use tracing::debug;

const FEED_ACCEPT: &str = "application/rss+xml,application/xml;q=0.9,*/*;q=0.8";

/// Source of raw feed documents
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NewsSource: Send + Sync {
    /// Fetch the XML body of one feed
    async fn fetch_feed(&self, feed: &FeedSource) -> Result<String>;
}

/// HTTP feed reader
///
/// Sends browser-like headers; a WAF challenge or an empty body is reported
/// as a fetch error so the caller can skip the feed.
pub struct RssClient {
    client: Client,
}

impl RssClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(FEED_ACCEPT));

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(BROWSER_USER_AGENT)
            .default_headers(headers)
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl NewsSource for RssClient {
    async fn fetch_feed(&self, feed: &FeedSource) -> Result<String> {
        let response = self
            .client
            .get(&feed.url)
            .send()
            .await
            .map_err(|e| DigestError::fetch(&feed.name, format!("request failed: {e}")))?;

        if let Some(reason) = blocked_reason(response.status(), response.headers()) {
            return Err(DigestError::fetch(&feed.name, reason));
        }

        let status = response.status();
        if !status.is_success() {
            return Err(DigestError::fetch(&feed.name, format!("HTTP {status}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| DigestError::fetch(&feed.name, format!("failed to read body: {e}")))?;

        if body.trim().is_empty() {
            return Err(DigestError::fetch(&feed.name, "empty response body"));
        }

        debug!(feed = %feed.name, bytes = body.len(), "Fetched feed");
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        assert!(RssClient::new(Duration::from_secs(10)).is_ok());
    }

    #[tokio::test]
    #[ignore] // Requires network access
    async fn test_live_feed() {
        let client = RssClient::new(Duration::from_secs(10)).unwrap();
        let feed = FeedSource::new("Coindesk", "https://www.coindesk.com/arc/outboundfeeds/rss/");
        let body = client.fetch_feed(&feed).await.unwrap();
        assert!(body.contains("<rss"));
    }
}
