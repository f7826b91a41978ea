//! HTTP clients for the data sources
//!
//! Each source sits behind a small trait so the pipeline can be exercised
//! without network access.

pub mod binance;
pub mod rss;

pub use binance::{BinanceClient, Kline, KlineSource};
pub use rss::{NewsSource, RssClient};

/// Browser-like agent; some feeds reject library defaults
pub(crate) const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Header set by AWS WAF when it answers with a challenge instead of content
pub(crate) const WAF_ACTION_HEADER: &str = "x-amzn-waf-action";

/// Describe a response that an intermediary blocked or filtered.
///
/// Returns `None` for responses that should be read normally.
pub(crate) fn blocked_reason(
    status: reqwest::StatusCode,
    headers: &reqwest::header::HeaderMap,
) -> Option<String> {
    if let Some(action) = headers.get(WAF_ACTION_HEADER) {
        let action = action.to_str().unwrap_or("unknown");
        return Some(format!("blocked by WAF ({action})"));
    }

    match status.as_u16() {
        403 => Some("access denied (HTTP 403)".to_string()),
        451 => Some("unavailable for legal reasons (HTTP 451)".to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;
    use reqwest::header::{HeaderMap, HeaderValue};

    #[test]
    fn test_blocked_by_status() {
        let headers = HeaderMap::new();
        assert!(blocked_reason(StatusCode::FORBIDDEN, &headers).is_some());
        assert!(blocked_reason(StatusCode::UNAVAILABLE_FOR_LEGAL_REASONS, &headers).is_some());
        assert!(blocked_reason(StatusCode::OK, &headers).is_none());
        assert!(blocked_reason(StatusCode::INTERNAL_SERVER_ERROR, &headers).is_none());
    }

    #[test]
    fn test_blocked_by_waf_header() {
        let mut headers = HeaderMap::new();
        headers.insert(WAF_ACTION_HEADER, HeaderValue::from_static("challenge"));
        let reason = blocked_reason(StatusCode::ACCEPTED, &headers).unwrap();
        assert!(reason.contains("challenge"));
    }
}
