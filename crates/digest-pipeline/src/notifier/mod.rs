//! Push notifications

pub mod bark;

pub use bark::BarkNotifier;

use crate::error::Result;
use async_trait::async_trait;

/// A push message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub body: String,
    /// Link opened when the notification is tapped
    pub url: Option<String>,
}

impl Notification {
    /// Digest message: the copy, a blank line, one image link per line and
    /// the presigned link when there is one
    pub fn digest(
        title: impl Into<String>,
        copy: &str,
        image_urls: &[String],
        link: Option<&str>,
    ) -> Self {
        let mut body = format!("{copy}\n");
        for url in image_urls {
            body.push('\n');
            body.push_str(url);
        }
        if let Some(link) = link {
            body.push('\n');
            body.push_str(link);
        }

        Self {
            title: title.into(),
            body,
            url: link.map(ToString::to_string),
        }
    }
}

/// Delivers notifications
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn push(&self, notification: &Notification) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn images() -> Vec<String> {
        (1..=3)
            .map(|n| format!("https://logs.example/2025-12-01-{n}.png"))
            .collect()
    }

    #[test]
    fn test_digest_body_with_link() {
        let n = Notification::digest("XHS摘要 2025-12-01", "今天小赚", &images(), Some("https://r2.example/x"));
        assert_eq!(
            n.body,
            "今天小赚\n\nhttps://logs.example/2025-12-01-1.png\nhttps://logs.example/2025-12-01-2.png\nhttps://logs.example/2025-12-01-3.png\nhttps://r2.example/x"
        );
        assert_eq!(n.url.as_deref(), Some("https://r2.example/x"));
    }

    #[test]
    fn test_digest_body_without_link() {
        let n = Notification::digest("t", "今天小赚", &images(), None);
        assert!(n.body.ends_with("2025-12-01-3.png"));
        assert!(n.url.is_none());
    }
}
