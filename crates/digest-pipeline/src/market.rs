//! Market summaries built from klines

use crate::api::{Kline, KlineSource};
use crate::error::{DigestError, Result};
use crate::outcome::StepOutcome;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

/// Per-asset statistics over the lookback window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSummary {
    pub symbol: String,
    /// Open of the first kline
    pub start_price: f64,
    /// Close of the last kline
    pub end_price: f64,
    pub high: f64,
    pub low: f64,
    pub base_volume: f64,
    pub quote_volume: f64,
}

impl MarketSummary {
    /// Reduce klines to a summary; fails on an empty slice
    pub fn from_klines(symbol: impl Into<String>, klines: &[Kline]) -> Result<Self> {
        let symbol = symbol.into();
        let (Some(first), Some(last)) = (klines.first(), klines.last()) else {
            return Err(DigestError::fetch(symbol, "no klines to summarize"));
        };

        let high = klines.iter().map(|k| k.high).fold(f64::MIN, f64::max);
        let low = klines.iter().map(|k| k.low).fold(f64::MAX, f64::min);

        Ok(Self {
            symbol,
            start_price: first.open,
            end_price: last.close,
            high,
            low,
            base_volume: klines.iter().map(|k| k.volume).sum(),
            quote_volume: klines.iter().map(|k| k.quote_volume).sum(),
        })
    }

    /// Absolute price change over the window
    pub fn change(&self) -> f64 {
        self.end_price - self.start_price
    }

    /// Percentage change, `0` when the start price is zero
    pub fn change_pct(&self) -> f64 {
        if self.start_price == 0.0 {
            0.0
        } else {
            self.change() / self.start_price * 100.0
        }
    }

    /// One prompt line, e.g.
    /// `BTCUSDT: +120.50 (+0.13%) start=... end=... high=... low=... volume=... (... quote)`
    pub fn format_line(&self) -> String {
        let sign = if self.change() >= 0.0 { '+' } else { '-' };
        format!(
            "{}: {sign}{:.2} ({sign}{:.2}%) start={:.2} end={:.2} high={:.2} low={:.2} volume={:.4} ({:.2} quote)",
            self.symbol,
            self.change().abs(),
            self.change_pct().abs(),
            self.start_price,
            self.end_price,
            self.high,
            self.low,
            self.base_volume,
            self.quote_volume,
        )
    }
}

impl fmt::Display for MarketSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format_line())
    }
}

/// Observation window shared by market and news steps
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub hours: u32,
    pub interval: String,
}

impl MarketWindow {
    /// Window of `hours` ending at `end`; the start clamps to the earliest
    /// representable instant
    pub fn ending_at(end: DateTime<Utc>, hours: u32, interval: impl Into<String>) -> Self {
        Self {
            start: end
                .checked_sub_signed(Duration::hours(i64::from(hours)))
                .unwrap_or(DateTime::<Utc>::MIN_UTC),
            end,
            hours,
            interval: interval.into(),
        }
    }

    /// `Window: 2025-12-01 02:00Z -> 2025-12-02 02:00Z (interval 1h)`
    pub fn header(&self) -> String {
        format!(
            "Window: {} -> {} (interval {})",
            self.start.format("%Y-%m-%d %H:%MZ"),
            self.end.format("%Y-%m-%d %H:%MZ"),
            self.interval
        )
    }
}

/// Summaries plus the window they cover
#[derive(Debug, Clone)]
pub struct MarketReport {
    pub window: MarketWindow,
    pub summaries: Vec<MarketSummary>,
}

impl MarketReport {
    pub fn new(window: MarketWindow, summaries: Vec<MarketSummary>) -> Self {
        Self { window, summaries }
    }

    pub fn is_empty(&self) -> bool {
        self.summaries.is_empty()
    }

    /// Market section of the prompt
    pub fn format_block(&self) -> String {
        if self.summaries.is_empty() {
            return "Market move: unavailable".to_string();
        }

        let mut block = format!("Market move (last {}h):", self.window.hours);
        for summary in &self.summaries {
            block.push_str("\n- ");
            block.push_str(&summary.format_line());
        }
        block
    }
}

/// Fetches and summarizes each configured symbol
pub struct MarketSummarizer {
    source: Arc<dyn KlineSource>,
    symbols: Vec<String>,
}

impl MarketSummarizer {
    pub fn new(source: Arc<dyn KlineSource>, symbols: Vec<String>) -> Self {
        Self { source, symbols }
    }

    /// Summarize every symbol in order.
    ///
    /// A symbol whose fetch fails is left out and reported as a warning, so
    /// this step never fails outright; an empty report is valid.
    pub async fn summarize(&self, window: &MarketWindow) -> StepOutcome<MarketReport> {
        let mut summaries = Vec::with_capacity(self.symbols.len());
        let mut warnings = Vec::new();

        for symbol in &self.symbols {
            let result = self
                .source
                .fetch_klines(symbol, &window.interval, window.start, window.end)
                .await
                .and_then(|klines| MarketSummary::from_klines(symbol.as_str(), &klines));

            match result {
                Ok(summary) => {
                    info!(symbol = %symbol, change_pct = summary.change_pct(), "Summarized market");
                    summaries.push(summary);
                }
                Err(e) => {
                    warn!(symbol = %symbol, error = %e, "Skipping symbol");
                    warnings.push(format!("{symbol}: {e}"));
                }
            }
        }

        StepOutcome::from_parts(MarketReport::new(window.clone(), summaries), warnings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::binance::MockKlineSource;
    use chrono::TimeZone;

    fn kline(open: f64, high: f64, low: f64, close: f64, volume: f64) -> Kline {
        Kline {
            open_time: 0,
            open,
            high,
            low,
            close,
            volume,
            close_time: 0,
            quote_volume: volume * close,
        }
    }

    fn window() -> MarketWindow {
        let end = Utc.with_ymd_and_hms(2025, 12, 1, 2, 0, 0).unwrap();
        MarketWindow::ending_at(end, 24, "1h")
    }

    #[test]
    fn test_from_klines() {
        let klines = vec![
            kline(100.0, 110.0, 95.0, 105.0, 1.0),
            kline(105.0, 120.0, 101.0, 118.0, 2.0),
            kline(118.0, 119.0, 90.0, 110.0, 3.0),
        ];
        let summary = MarketSummary::from_klines("BTCUSDT", &klines).unwrap();

        assert!((summary.start_price - 100.0).abs() < f64::EPSILON);
        assert!((summary.end_price - 110.0).abs() < f64::EPSILON);
        assert!((summary.high - 120.0).abs() < f64::EPSILON);
        assert!((summary.low - 90.0).abs() < f64::EPSILON);
        assert!((summary.base_volume - 6.0).abs() < f64::EPSILON);
        assert!((summary.change_pct() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_klines() {
        assert!(MarketSummary::from_klines("BTCUSDT", &[]).is_err());
    }

    #[test]
    fn test_zero_start_price() {
        let summary = MarketSummary::from_klines("NEWUSDT", &[kline(0.0, 1.0, 0.0, 1.0, 1.0)]).unwrap();
        assert!(summary.change_pct().abs() < f64::EPSILON);
    }

    #[test]
    fn test_format_line() {
        let summary = MarketSummary {
            symbol: "ETHUSDT".to_string(),
            start_price: 3200.0,
            end_price: 3104.0,
            high: 3250.5,
            low: 3050.25,
            base_volume: 1234.567_89,
            quote_volume: 3_900_000.0,
        };
        assert_eq!(
            summary.format_line(),
            "ETHUSDT: -96.00 (-3.00%) start=3200.00 end=3104.00 high=3250.50 low=3050.25 volume=1234.5679 (3900000.00 quote)"
        );
    }

    #[test]
    fn test_window_header() {
        assert_eq!(
            window().header(),
            "Window: 2025-11-30 02:00Z -> 2025-12-01 02:00Z (interval 1h)"
        );
    }

    #[test]
    fn test_oversized_window_clamps_start() {
        let end = Utc.with_ymd_and_hms(2025, 12, 1, 2, 0, 0).unwrap();
        let window = MarketWindow::ending_at(end, u32::MAX, "1h");
        assert_eq!(window.start, DateTime::<Utc>::MIN_UTC);
        assert_eq!(window.end, end);
    }

    #[test]
    fn test_empty_report_block() {
        let report = MarketReport::new(window(), vec![]);
        assert_eq!(report.format_block(), "Market move: unavailable");
    }

    #[tokio::test]
    async fn test_blocked_symbol_is_skipped() {
        let mut source = MockKlineSource::new();
        source
            .expect_fetch_klines()
            .returning(|symbol, _, _, _| {
                if symbol == "ETHUSDT" {
                    Err(DigestError::fetch(symbol, "access denied (HTTP 403)"))
                } else {
                    Ok(vec![kline(10.0, 12.0, 9.0, 11.0, 5.0)])
                }
            })
            .times(3);

        let summarizer = MarketSummarizer::new(
            Arc::new(source),
            vec!["BTCUSDT".into(), "ETHUSDT".into(), "BNBUSDT".into()],
        );
        let outcome = summarizer.summarize(&window()).await;

        assert!(!outcome.is_complete());
        assert_eq!(outcome.warnings().len(), 1);
        assert!(outcome.warnings()[0].starts_with("ETHUSDT"));

        let report = outcome.into_result().unwrap();
        let symbols: Vec<_> = report.summaries.iter().map(|s| s.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["BTCUSDT", "BNBUSDT"]);
    }

    #[tokio::test]
    async fn test_all_symbols_failing_is_still_valid() {
        let mut source = MockKlineSource::new();
        source
            .expect_fetch_klines()
            .returning(|symbol, _, _, _| Err(DigestError::fetch(symbol, "HTTP 451")));

        let summarizer = MarketSummarizer::new(Arc::new(source), vec!["BTCUSDT".into()]);
        let outcome = summarizer.summarize(&window()).await;

        let report = outcome.into_result().unwrap();
        assert!(report.is_empty());
        assert_eq!(report.format_block(), "Market move: unavailable");
    }
}
