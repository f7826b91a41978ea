//! Run date handling
//!
//! A run is keyed by one calendar date. The snapshot URL uses the compact
//! `YYYYMMDD` form; image links, the object key and the notification title
//! use `YYYY-MM-DD`.

use crate::error::{DigestError, Result};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Calendar date a run reports on
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RunDate(NaiveDate);

impl RunDate {
    /// Current UTC date
    pub fn today_utc() -> Self {
        Self(Utc::now().date_naive())
    }

    /// Parse `YYYYMMDD`; `YYYY-MM-DD` is accepted as well
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        let (format, expected_len) = if trimmed.contains('-') {
            ("%Y-%m-%d", 10)
        } else {
            ("%Y%m%d", 8)
        };

        // chrono accepts unpadded fields; the fixed width keeps keys stable
        if trimmed.len() != expected_len {
            return Err(DigestError::InvalidDate(input.to_string()));
        }

        NaiveDate::parse_from_str(trimmed, format)
            .map(Self)
            .map_err(|_| DigestError::InvalidDate(input.to_string()))
    }

    /// `YYYYMMDD`
    pub fn compact(&self) -> String {
        self.0.format("%Y%m%d").to_string()
    }

    /// `YYYY-MM-DD`
    pub fn dashed(&self) -> String {
        self.0.format("%Y-%m-%d").to_string()
    }
}

impl fmt::Display for RunDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.dashed())
    }
}

impl FromStr for RunDate {
    type Err = DigestError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_compact() {
        let date = RunDate::parse("20251201").unwrap();
        assert_eq!(date.compact(), "20251201");
        assert_eq!(date.dashed(), "2025-12-01");
        assert_eq!(date.to_string(), "2025-12-01");
    }

    #[test]
    fn test_parse_dashed() {
        let date: RunDate = "2025-12-01".parse().unwrap();
        assert_eq!(date.compact(), "20251201");
    }

    #[test]
    fn test_rejects_garbage() {
        for input in ["", "2025121", "202512011", "20251301", "20250230", "2025/12/01", "abcdefgh"] {
            assert!(
                matches!(RunDate::parse(input), Err(DigestError::InvalidDate(_))),
                "{input} should be rejected"
            );
        }
    }

    #[test]
    fn test_leap_day() {
        assert!(RunDate::parse("20240229").is_ok());
        assert!(RunDate::parse("20250229").is_err());
    }
}
