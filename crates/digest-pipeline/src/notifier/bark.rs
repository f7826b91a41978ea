//! Bark (https://github.com/Finb/Bark) push client

use super::{Notification, Notifier};
use crate::error::{DigestError, Result};
use crate::runtime::BarkConfig;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

#[derive(Debug, Serialize)]
struct PushRequest<'a> {
    device_key: &'a str,
    title: &'a str,
    body: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct PushResponse {
    code: i64,
    #[serde(default)]
    message: String,
}

/// Sends notifications through a Bark server
pub struct BarkNotifier {
    client: Client,
    server: String,
    key: String,
}

impl BarkNotifier {
    /// Fails when the device key is blank
    pub fn new(config: &BarkConfig, timeout: Duration) -> Result<Self> {
        if config.key.trim().is_empty() {
            return Err(DigestError::Config("bark key is empty".to_string()));
        }

        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            server: config.server.trim_end_matches('/').to_string(),
            key: config.key.clone(),
        })
    }

    fn push_url(&self) -> String {
        format!("{}/push", self.server)
    }
}

#[async_trait]
impl Notifier for BarkNotifier {
    async fn push(&self, notification: &Notification) -> Result<()> {
        let request = PushRequest {
            device_key: &self.key,
            title: &notification.title,
            body: &notification.body,
            url: notification.url.as_deref(),
        };

        let response = self
            .client
            .post(self.push_url())
            .json(&request)
            .send()
            .await
            .map_err(|e| DigestError::Notify(format!("request failed: {e}")))?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(DigestError::Notify(format!("HTTP {status}: {}", text.trim())));
        }

        // Older servers answer with an empty body
        if let Ok(parsed) = serde_json::from_str::<PushResponse>(&text) {
            if parsed.code != 200 {
                return Err(DigestError::Notify(format!(
                    "server rejected push (code {}): {}",
                    parsed.code, parsed.message
                )));
            }
        }

        info!(title = %notification.title, "Notification sent");
        Ok(())
    }
}
