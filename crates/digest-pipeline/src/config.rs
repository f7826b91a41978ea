//! Configuration for digest runs
//!
//! [`DigestConfig`] holds the non-secret tunables. Secrets (storage and
//! notification credentials) live in [`crate::runtime::RuntimeConfig`].

use crate::date::RunDate;
use crate::error::{DigestError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Binance spot REST base URL
pub const BINANCE_API_BASE: &str = "https://api.binance.com";

/// Daily snapshot published by the trading bot, `{date}` is `YYYYMMDD`
pub const SNAPSHOT_URL_TEMPLATE: &str =
    "https://logs.gleaftex.com/runs/fa888/martingale/reports/report_{date}.txt";

/// Chart images published next to the snapshot, `{date_dash}` is `YYYY-MM-DD`
pub const IMAGE_URL_TEMPLATE: &str =
    "https://logs.gleaftex.com/runs/fa888/martingale/reports/{date_dash}-{n}.png";

/// Object storage key for the generated copy
pub const OBJECT_KEY_TEMPLATE: &str = "xhs/xxxx_{date_dash}.txt";

/// Presigned link lifetime (7 days)
pub const PRESIGN_TTL: Duration = Duration::from_secs(7 * 24 * 3600);

/// Longest accepted lookback window (one year)
pub const MAX_LOOKBACK_HOURS: u32 = 24 * 365;

/// Number of chart images attached to a notification
pub const IMAGE_COUNT: usize = 3;

/// A named RSS feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedSource {
    /// Label shown next to each headline
    pub name: String,
    /// Feed URL
    pub url: String,
}

impl FeedSource {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

fn default_feeds() -> Vec<FeedSource> {
    vec![
        FeedSource::new("Coindesk", "https://www.coindesk.com/arc/outboundfeeds/rss/"),
        FeedSource::new("BinanceFeed", "https://www.binance.com/en/feed/rss"),
    ]
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

/// Configuration for a digest run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigestConfig {
    /// Trading pairs to summarize
    pub symbols: Vec<String>,

    /// Market and news lookback window
    pub lookback_hours: u32,

    /// Kline interval (Binance notation, e.g. `1h`)
    pub interval: String,

    /// Market data REST base URL
    pub market_api_base: String,

    /// RSS feeds, read in this order
    pub feeds: Vec<FeedSource>,

    /// Lowercase keywords a headline must contain one of
    pub keywords: Vec<String>,

    /// Maximum number of headlines handed to the prompt
    pub max_news_items: usize,

    /// Snapshot URL template (`{date}` = `YYYYMMDD`)
    pub snapshot_url_template: String,

    /// Image URL template (`{date_dash}`, `{n}`)
    pub image_url_template: String,

    /// Object key template (`{date_dash}`)
    pub object_key_template: String,

    /// Presigned link lifetime
    pub presign_ttl: Duration,

    /// Timeout for market, news, snapshot, storage and notification requests
    pub request_timeout: Duration,

    /// Timeout for a completion request
    pub completion_timeout: Duration,

    /// Fixed model id; `None` picks free models from the catalogue
    pub model: Option<String>,

    /// Sampling temperature
    pub temperature: f32,

    /// Completion token limit
    pub max_tokens: usize,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            symbols: strings(&["BTCUSDT", "ETHUSDT", "BNBUSDT"]),
            lookback_hours: 24,
            interval: "1h".to_string(),
            market_api_base: BINANCE_API_BASE.to_string(),
            feeds: default_feeds(),
            keywords: strings(&["btc", "bitcoin", "eth", "ethereum", "bnb", "binance"]),
            max_news_items: 10,
            snapshot_url_template: SNAPSHOT_URL_TEMPLATE.to_string(),
            image_url_template: IMAGE_URL_TEMPLATE.to_string(),
            object_key_template: OBJECT_KEY_TEMPLATE.to_string(),
            presign_ttl: PRESIGN_TTL,
            request_timeout: Duration::from_secs(10),
            completion_timeout: Duration::from_secs(30),
            model: None,
            temperature: 0.7,
            max_tokens: 600,
        }
    }
}

impl DigestConfig {
    /// Create a new configuration builder
    pub fn builder() -> DigestConfigBuilder {
        DigestConfigBuilder::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.symbols.is_empty() {
            return Err(DigestError::Config("at least one symbol is required".to_string()));
        }

        if self.lookback_hours == 0 {
            return Err(DigestError::Config(
                "lookback_hours must be greater than 0".to_string(),
            ));
        }

        if self.lookback_hours > MAX_LOOKBACK_HOURS {
            return Err(DigestError::Config(format!(
                "lookback_hours must be at most {MAX_LOOKBACK_HOURS}"
            )));
        }

        if self.max_news_items == 0 {
            return Err(DigestError::Config(
                "max_news_items must be greater than 0".to_string(),
            ));
        }

        if !self.snapshot_url_template.contains("{date}") {
            return Err(DigestError::Config(
                "snapshot_url_template must contain {date}".to_string(),
            ));
        }

        Ok(())
    }

    /// Snapshot URL for a date
    pub fn snapshot_url(&self, date: &RunDate) -> String {
        self.snapshot_url_template.replace("{date}", &date.compact())
    }

    /// The chart image links for a date, numbered from 1
    pub fn image_urls(&self, date: &RunDate) -> Vec<String> {
        let dashed = date.dashed();
        (1..=IMAGE_COUNT)
            .map(|n| {
                self.image_url_template
                    .replace("{date_dash}", &dashed)
                    .replace("{n}", &n.to_string())
            })
            .collect()
    }

    /// Object storage key for a date
    pub fn object_key(&self, date: &RunDate) -> String {
        self.object_key_template.replace("{date_dash}", &date.dashed())
    }

    /// Notification title for a date
    pub fn notification_title(&self, date: &RunDate) -> String {
        format!("XHS摘要 {}", date.dashed())
    }
}

/// Builder for DigestConfig
#[derive(Debug, Default)]
pub struct DigestConfigBuilder {
    symbols: Option<Vec<String>>,
    lookback_hours: Option<u32>,
    interval: Option<String>,
    market_api_base: Option<String>,
    feeds: Option<Vec<FeedSource>>,
    keywords: Option<Vec<String>>,
    max_news_items: Option<usize>,
    request_timeout: Option<Duration>,
    completion_timeout: Option<Duration>,
    model: Option<String>,
    temperature: Option<f32>,
    max_tokens: Option<usize>,
}

impl DigestConfigBuilder {
    /// Set the symbols to summarize
    pub fn symbols<I, S>(mut self, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.symbols = Some(
            symbols
                .into_iter()
                .map(|s| s.into().trim().to_uppercase())
                .collect(),
        );
        self
    }

    /// Set the lookback window in hours
    pub fn lookback_hours(mut self, hours: u32) -> Self {
        self.lookback_hours = Some(hours);
        self
    }

    /// Set the kline interval
    pub fn interval(mut self, interval: impl Into<String>) -> Self {
        self.interval = Some(interval.into());
        self
    }

    /// Override the market data base URL
    pub fn market_api_base(mut self, base: impl Into<String>) -> Self {
        self.market_api_base = Some(base.into());
        self
    }

    /// Replace the feed list
    pub fn feeds(mut self, feeds: Vec<FeedSource>) -> Self {
        self.feeds = Some(feeds);
        self
    }

    /// Replace the keyword list
    pub fn keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = Some(
            keywords
                .into_iter()
                .map(|k| k.into().to_lowercase())
                .collect(),
        );
        self
    }

    /// Set the headline cap
    pub fn max_news_items(mut self, max: usize) -> Self {
        self.max_news_items = Some(max);
        self
    }

    /// Set the timeout for data and delivery requests
    pub fn request_timeout(mut self, duration: Duration) -> Self {
        self.request_timeout = Some(duration);
        self
    }

    /// Set the completion timeout
    pub fn completion_timeout(mut self, duration: Duration) -> Self {
        self.completion_timeout = Some(duration);
        self
    }

    /// Pin a model instead of using the free catalogue
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the sampling temperature
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the completion token limit
    pub fn max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<DigestConfig> {
        let defaults = DigestConfig::default();

        let config = DigestConfig {
            symbols: self.symbols.unwrap_or(defaults.symbols),
            lookback_hours: self.lookback_hours.unwrap_or(defaults.lookback_hours),
            interval: self.interval.unwrap_or(defaults.interval),
            market_api_base: self.market_api_base.unwrap_or(defaults.market_api_base),
            feeds: self.feeds.unwrap_or(defaults.feeds),
            keywords: self.keywords.unwrap_or(defaults.keywords),
            max_news_items: self.max_news_items.unwrap_or(defaults.max_news_items),
            request_timeout: self.request_timeout.unwrap_or(defaults.request_timeout),
            completion_timeout: self.completion_timeout.unwrap_or(defaults.completion_timeout),
            model: self.model.or(defaults.model),
            temperature: self.temperature.unwrap_or(defaults.temperature),
            max_tokens: self.max_tokens.unwrap_or(defaults.max_tokens),
            ..defaults
        };

        config.validate()?;
        Ok(config)
    }
}
