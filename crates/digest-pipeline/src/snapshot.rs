//! Daily snapshot retrieval

use crate::api::BROWSER_USER_AGENT;
use crate::error::{DigestError, Result};
use crate::outcome::StepOutcome;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{info, warn};

/// Text used in the prompt when no snapshot could be read
pub const MISSING_SNAPSHOT: &str = "（今日持仓快照暂不可用）";

/// Where a snapshot lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotLocation {
    Url(String),
    File(std::path::PathBuf),
}

impl SnapshotLocation {
    /// Classify a location string: `http(s)://` is remote, anything else a path
    pub fn parse(location: &str) -> Self {
        let trimmed = location.trim();
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            Self::Url(trimmed.to_string())
        } else {
            Self::File(trimmed.into())
        }
    }
}

impl std::fmt::Display for SnapshotLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Url(url) => f.write_str(url),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Reads raw snapshot text
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn read(&self, location: &SnapshotLocation) -> Result<String>;
}

/// Reads snapshots over HTTP or from the local filesystem
pub struct HttpSnapshotReader {
    client: Client,
}

impl HttpSnapshotReader {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(BROWSER_USER_AGENT)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl SnapshotSource for HttpSnapshotReader {
    async fn read(&self, location: &SnapshotLocation) -> Result<String> {
        match location {
            SnapshotLocation::Url(url) => {
                let response = self
                    .client
                    .get(url)
                    .send()
                    .await
                    .map_err(|e| DigestError::fetch("snapshot", format!("{url}: {e}")))?;

                let status = response.status();
                if !status.is_success() {
                    return Err(DigestError::fetch("snapshot", format!("{url}: HTTP {status}")));
                }

                response
                    .text()
                    .await
                    .map_err(|e| DigestError::fetch("snapshot", format!("{url}: {e}")))
            }
            SnapshotLocation::File(path) => tokio::fs::read_to_string(path)
                .await
                .map_err(|e| DigestError::fetch("snapshot", format!("{}: {e}", path.display()))),
        }
    }
}

/// Resolves and reads the snapshot for a run
pub struct SnapshotReader {
    source: std::sync::Arc<dyn SnapshotSource>,
}

impl SnapshotReader {
    pub fn new(source: std::sync::Arc<dyn SnapshotSource>) -> Self {
        Self { source }
    }

    /// Read the snapshot at `location`.
    ///
    /// Yields `None` for a failed read or a blank document; the failure is
    /// carried as a warning.
    pub async fn read(&self, location: &SnapshotLocation) -> StepOutcome<Option<String>> {
        match self.source.read(location).await {
            Ok(text) => {
                let text = text.trim();
                if text.is_empty() {
                    warn!(location = %location, "Snapshot is empty");
                    StepOutcome::Degraded {
                        value: None,
                        warnings: vec![format!("snapshot {location} is empty")],
                    }
                } else {
                    info!(location = %location, bytes = text.len(), "Read snapshot");
                    StepOutcome::Complete(Some(text.to_string()))
                }
            }
            Err(e) => {
                warn!(location = %location, error = %e, "Snapshot unavailable");
                StepOutcome::Degraded {
                    value: None,
                    warnings: vec![e.to_string()],
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Arc;

    #[test]
    fn test_location_parse() {
        assert_eq!(
            SnapshotLocation::parse("https://logs.example/report.txt"),
            SnapshotLocation::Url("https://logs.example/report.txt".into())
        );
        assert_eq!(
            SnapshotLocation::parse("reports/today.txt"),
            SnapshotLocation::File("reports/today.txt".into())
        );
    }

    #[tokio::test]
    async fn test_read_local_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "\n  总资产 1011 USDT  \n").unwrap();

        let reader = SnapshotReader::new(Arc::new(HttpSnapshotReader::new(Duration::from_secs(1)).unwrap()));
        let location = SnapshotLocation::File(file.path().to_path_buf());
        let outcome = reader.read(&location).await;

        assert!(outcome.is_complete());
        assert_eq!(outcome.into_result().unwrap().as_deref(), Some("总资产 1011 USDT"));
    }

    #[tokio::test]
    async fn test_missing_file_is_degraded() {
        let dir = tempfile::tempdir().unwrap();
        let reader = SnapshotReader::new(Arc::new(HttpSnapshotReader::new(Duration::from_secs(1)).unwrap()));
        let outcome = reader
            .read(&SnapshotLocation::File(dir.path().join("missing.txt")))
            .await;

        assert!(!outcome.is_failed());
        assert_eq!(outcome.warnings().len(), 1);
        assert_eq!(outcome.into_result().unwrap(), None);
    }

    #[tokio::test]
    async fn test_blank_snapshot_is_absent() {
        let mut source = MockSnapshotSource::new();
        source.expect_read().returning(|_| Ok("   \n".to_string()));

        let reader = SnapshotReader::new(Arc::new(source));
        let outcome = reader
            .read(&SnapshotLocation::Url("https://logs.example/r.txt".into()))
            .await;
        assert_eq!(outcome.into_result().unwrap(), None);
    }
}
