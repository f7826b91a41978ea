//! Keyword-filtered headlines from RSS feeds

use crate::api::NewsSource;
use crate::config::FeedSource;
use crate::error::{DigestError, Result};
use crate::outcome::StepOutcome;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Placeholder used when no headline matched within `hours`
fn no_news(hours: u32) -> String {
    format!("No matching headlines in the last {hours}h.")
}

/// One headline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsItem {
    /// Feed label
    pub source: String,
    pub title: String,
    pub link: String,
    /// Publication time, when the feed gave a parseable one
    pub published: Option<DateTime<Utc>>,
}

impl NewsItem {
    /// Whether the title mentions any keyword (case-insensitive)
    pub fn matches_any(&self, keywords: &[String]) -> bool {
        let title = self.title.to_lowercase();
        keywords.iter().any(|k| title.contains(&k.to_lowercase()))
    }

    /// `1. [Coindesk] 2025-12-01 01:30Z - Title (https://...)`
    pub fn format_line(&self, index: usize) -> String {
        let published = self.published.map_or_else(
            || "unknown time".to_string(),
            |p| p.format("%Y-%m-%d %H:%MZ").to_string(),
        );
        format!(
            "{index}. [{}] {published} - {} ({})",
            self.source, self.title, self.link
        )
    }
}

/// Parse an RSS document into items, in document order
pub fn parse_feed(source: &str, xml: &str) -> Result<Vec<NewsItem>> {
    let channel = rss::Channel::read_from(xml.as_bytes())
        .map_err(|e| DigestError::fetch(source, format!("invalid RSS: {e}")))?;

    let items = channel
        .items()
        .iter()
        .map(|item| NewsItem {
            source: source.to_string(),
            title: item.title().unwrap_or_default().trim().to_string(),
            link: item.link().unwrap_or_default().trim().to_string(),
            published: item.pub_date().and_then(parse_pub_date),
        })
        .collect();

    Ok(items)
}

fn parse_pub_date(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(raw.trim())
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

/// Render the news section of the prompt
pub fn format_news(items: &[NewsItem], hours: u32) -> String {
    if items.is_empty() {
        return no_news(hours);
    }

    items
        .iter()
        .enumerate()
        .map(|(i, item)| item.format_line(i + 1))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Reads feeds in order and keeps matching headlines
pub struct NewsFetcher {
    source: Arc<dyn NewsSource>,
    feeds: Vec<FeedSource>,
    keywords: Vec<String>,
    max_items: usize,
}

impl NewsFetcher {
    pub fn new(
        source: Arc<dyn NewsSource>,
        feeds: Vec<FeedSource>,
        keywords: Vec<String>,
        max_items: usize,
    ) -> Self {
        Self {
            source,
            feeds,
            keywords,
            max_items,
        }
    }

    /// Collect up to `max_items` headlines published after `cutoff`.
    ///
    /// Items without a parseable date are kept. A feed that fails to load or
    /// parse only adds a warning.
    pub async fn fetch(&self, cutoff: DateTime<Utc>) -> StepOutcome<Vec<NewsItem>> {
        let mut collected = Vec::new();
        let mut warnings = Vec::new();

        for feed in &self.feeds {
            if collected.len() >= self.max_items {
                break;
            }

            let items = match self.source.fetch_feed(feed).await {
                Ok(body) => parse_feed(&feed.name, &body),
                Err(e) => Err(e),
            };

            let items = match items {
                Ok(items) => items,
                Err(e) => {
                    warn!(feed = %feed.name, error = %e, "Skipping feed");
                    warnings.push(e.to_string());
                    continue;
                }
            };

            let total = items.len();
            let before = collected.len();
            collected.extend(
                items
                    .into_iter()
                    .filter(|item| item.published.is_none_or(|p| p >= cutoff))
                    .filter(|item| item.matches_any(&self.keywords)),
            );
            debug!(feed = %feed.name, total, kept = collected.len() - before, "Filtered feed");
        }

        collected.truncate(self.max_items);
        info!(count = collected.len(), "Collected headlines");
        StepOutcome::from_parts(collected, warnings)
    }
}
