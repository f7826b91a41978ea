//! Binance spot kline client

use super::{BROWSER_USER_AGENT, blocked_reason};
use crate::error::{DigestError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// Most rows `/api/v3/klines` returns for one request
pub const KLINE_LIMIT: usize = 1000;

/// One OHLCV candle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Kline {
    pub open_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    /// Base asset volume
    pub volume: f64,
    pub close_time: i64,
    /// Quote asset volume
    pub quote_volume: f64,
}

impl Kline {
    /// Parse one row of the `/api/v3/klines` array.
    ///
    /// Prices and volumes arrive as decimal strings, timestamps as numbers.
    pub fn from_row(row: &[Value]) -> Result<Self> {
        if row.len() < 8 {
            return Err(DigestError::fetch(
                "binance",
                format!("kline row has {} fields, expected at least 8", row.len()),
            ));
        }

        Ok(Self {
            open_time: int_field(&row[0])?,
            open: float_field(&row[1])?,
            high: float_field(&row[2])?,
            low: float_field(&row[3])?,
            close: float_field(&row[4])?,
            volume: float_field(&row[5])?,
            close_time: int_field(&row[6])?,
            quote_volume: float_field(&row[7])?,
        })
    }
}

fn float_field(value: &Value) -> Result<f64> {
    match value {
        Value::String(s) => s
            .parse::<f64>()
            .map_err(|e| DigestError::fetch("binance", format!("bad decimal '{s}': {e}"))),
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| DigestError::fetch("binance", format!("bad number {n}"))),
        other => Err(DigestError::fetch("binance", format!("unexpected value {other}"))),
    }
}

fn int_field(value: &Value) -> Result<i64> {
    value
        .as_i64()
        .ok_or_else(|| DigestError::fetch("binance", format!("bad timestamp {value}")))
}

/// Source of klines for one symbol
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait KlineSource: Send + Sync {
    /// Fetch klines in `[start, end]`; an empty answer is an error
    async fn fetch_klines(
        &self,
        symbol: &str,
        interval: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Kline>>;
}

/// Binance REST client
pub struct BinanceClient {
    client: Client,
    base_url: String,
}

impl BinanceClient {
    /// Create a client against `base_url` (e.g. `https://api.binance.com`)
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(BROWSER_USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl KlineSource for BinanceClient {
    async fn fetch_klines(
        &self,
        symbol: &str,
        interval: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Kline>> {
        let symbol = symbol.to_uppercase();
        let response = self
            .client
            .get(format!("{}/api/v3/klines", self.base_url))
            .query(&kline_query(&symbol, interval, start, end))
            .send()
            .await
            .map_err(|e| DigestError::fetch(&symbol, format!("request failed: {e}")))?;

        if let Some(reason) = blocked_reason(response.status(), response.headers()) {
            return Err(DigestError::fetch(&symbol, reason));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DigestError::fetch(&symbol, format!("HTTP {status}: {body}")));
        }

        let rows: Vec<Vec<Value>> = response
            .json()
            .await
            .map_err(|e| DigestError::fetch(&symbol, format!("failed to parse klines: {e}")))?;

        parse_rows(&symbol, &rows)
    }
}

fn kline_query(
    symbol: &str,
    interval: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> [(&'static str, String); 5] {
    [
        ("symbol", symbol.to_string()),
        ("interval", interval.to_string()),
        ("startTime", start.timestamp_millis().to_string()),
        ("endTime", end.timestamp_millis().to_string()),
        ("limit", KLINE_LIMIT.to_string()),
    ]
}

/// Parse the response rows; a full page means the window was cut short
fn parse_rows(symbol: &str, rows: &[Vec<Value>]) -> Result<Vec<Kline>> {
    if rows.is_empty() {
        return Err(DigestError::fetch(symbol, "no kline data returned"));
    }

    if rows.len() >= KLINE_LIMIT {
        warn!(
            symbol = %symbol,
            limit = KLINE_LIMIT,
            "Kline window truncated, use a wider interval or fewer hours"
        );
    }

    debug!(symbol = %symbol, count = rows.len(), "Fetched klines");
    rows.iter().map(|row| Kline::from_row(row)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use serde_json::json;

    #[test]
    fn test_parse_row() {
        let row = json!([
            1_499_040_000_000_i64,
            "0.01634790",
            "0.80000000",
            "0.01575800",
            "0.01577100",
            "148976.11427815",
            1_499_644_799_999_i64,
            "2434.19055334",
            308,
            "1756.87402397",
            "28.46694368",
            "0"
        ]);

        let kline = Kline::from_row(row.as_array().unwrap()).unwrap();
        assert_eq!(kline.open_time, 1_499_040_000_000);
        assert!((kline.open - 0.016_347_9).abs() < 1e-12);
        assert!((kline.high - 0.8).abs() < 1e-12);
        assert!((kline.quote_volume - 2434.190_553_34).abs() < 1e-9);
    }

    #[test]
    fn test_short_row_is_rejected() {
        let row = json!([1, "1", "2"]);
        assert!(Kline::from_row(row.as_array().unwrap()).is_err());
    }

    #[test]
    fn test_bad_decimal_is_rejected() {
        let row = json!([1, "x", "1", "1", "1", "1", 2, "1"]);
        assert!(matches!(
            Kline::from_row(row.as_array().unwrap()),
            Err(DigestError::Fetch { .. })
        ));
    }

    #[test]
    fn test_query_requests_full_page() {
        let end = Utc::now();
        let query = kline_query("BTCUSDT", "1m", end - ChronoDuration::hours(24), end);

        assert_eq!(query[0], ("symbol", "BTCUSDT".to_string()));
        assert_eq!(query[4], ("limit", "1000".to_string()));
        assert_eq!(query[3].1, end.timestamp_millis().to_string());
    }

    #[test]
    fn test_full_page_is_still_parsed() {
        let row = json!([1, "1.0", "2.0", "0.5", "1.5", "10", 2, "15"]);
        let rows = vec![row.as_array().unwrap().clone(); KLINE_LIMIT];

        let klines = parse_rows("BTCUSDT", &rows).unwrap();
        assert_eq!(klines.len(), KLINE_LIMIT);
    }

    #[test]
    fn test_empty_page_is_rejected() {
        assert!(matches!(
            parse_rows("BTCUSDT", &[]),
            Err(DigestError::Fetch { .. })
        ));
    }

    #[test]
    fn test_client_trims_base_url() {
        let client = BinanceClient::new("https://api.binance.com/", Duration::from_secs(10)).unwrap();
        assert_eq!(client.base_url, "https://api.binance.com");
    }

    #[tokio::test]
    #[ignore] // Requires network access
    async fn test_live_klines() {
        let client = BinanceClient::new(crate::config::BINANCE_API_BASE, Duration::from_secs(10)).unwrap();
        let end = Utc::now();
        let klines = client
            .fetch_klines("BTCUSDT", "1h", end - ChronoDuration::hours(24), end)
            .await
            .unwrap();
        assert!(!klines.is_empty());
    }
}
