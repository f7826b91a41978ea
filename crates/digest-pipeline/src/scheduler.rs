//! Daily loop mode
//!
//! Runs the pipeline immediately, then once a day at a fixed UTC hour. An
//! optional marker file remembers the last delivered date so restarts do
//! not deliver the same day twice.

use crate::date::RunDate;
use crate::error::{DigestError, Result};
use crate::pipeline::{Pipeline, RunOptions, RunReport};
use chrono::{DateTime, Duration, NaiveTime, Utc};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Default delivery hour (UTC)
pub const DEFAULT_HOUR: u32 = 2;

/// First `hour:00 UTC` strictly after `now`
pub fn next_run_after(now: DateTime<Utc>, hour: u32) -> DateTime<Utc> {
    let at = NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or_default();
    let today = now.date_naive().and_time(at).and_utc();
    if today > now {
        today
    } else {
        today + Duration::days(1)
    }
}

/// Last delivered date, one `YYYYMMDD` line
#[derive(Debug, Clone)]
pub struct MarkerFile {
    path: PathBuf,
}

impl MarkerFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `None` when the file does not exist yet or holds no valid date; the
    /// next successful run overwrites an unreadable marker
    pub fn read(&self) -> Result<Option<RunDate>> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) if text.trim().is_empty() => Ok(None),
            Ok(text) => match RunDate::parse(text.trim()) {
                Ok(date) => Ok(Some(date)),
                Err(e) => {
                    warn!(marker = %self.path.display(), error = %e, "Ignoring corrupt marker");
                    Ok(None)
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn write(&self, date: &RunDate) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, format!("{}\n", date.compact()))?;
        Ok(())
    }
}

/// Repeats a pipeline daily
pub struct Scheduler {
    pipeline: Pipeline,
    hour: u32,
    marker: Option<MarkerFile>,
    upload: bool,
    notify: bool,
}

impl Scheduler {
    /// Schedule at `hour` UTC (0-23)
    pub fn new(pipeline: Pipeline, hour: u32) -> Result<Self> {
        if hour > 23 {
            return Err(DigestError::Config(format!(
                "schedule hour must be 0-23, got {hour}"
            )));
        }

        Ok(Self {
            pipeline,
            hour,
            marker: None,
            upload: true,
            notify: true,
        })
    }

    pub fn with_marker(mut self, marker: Option<MarkerFile>) -> Self {
        self.marker = marker;
        self
    }

    /// Turn upload or notification off for every run
    pub fn with_delivery(mut self, upload: bool, notify: bool) -> Self {
        self.upload = upload;
        self.notify = notify;
        self
    }

    /// Run for `date` unless the marker says it was already delivered.
    ///
    /// The marker is updated only after a successful run.
    pub async fn run_once(&self, date: RunDate) -> Result<Option<RunReport>> {
        if let Some(marker) = &self.marker {
            match marker.read() {
                Ok(Some(last)) if last == date => {
                    info!(date = %date, marker = %marker.path().display(), "Already delivered, skipping");
                    return Ok(None);
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, marker = %marker.path().display(), "Cannot read marker, running anyway");
                }
            }
        }

        let options = RunOptions::new(date)
            .upload(self.upload)
            .notify(self.notify);
        let report = self.pipeline.run(&options).await?;

        if let Some(marker) = &self.marker {
            if let Err(e) = marker.write(&date) {
                warn!(error = %e, marker = %marker.path().display(), "Failed to update marker");
            }
        }

        Ok(Some(report))
    }

    /// Run now, then daily, until Ctrl-C.
    ///
    /// A failed run is logged and the loop continues.
    pub async fn run_forever<F>(&self, mut on_report: F) -> Result<()>
    where
        F: FnMut(&RunReport),
    {
        loop {
            let date = RunDate::today_utc();
            match self.run_once(date).await {
                Ok(Some(report)) => on_report(&report),
                Ok(None) => {}
                Err(e) => error!(date = %date, error = %e, "Scheduled run failed"),
            }

            let now = Utc::now();
            let next = next_run_after(now, self.hour);
            let wait = (next - now).to_std().unwrap_or_default();
            info!(next = %next.format("%Y-%m-%d %H:%MZ"), "Sleeping until next run");

            tokio::select! {
                () = tokio::time::sleep(wait) => {}
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted, stopping scheduler");
                    return Ok(());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::binance::MockKlineSource;
    use crate::api::rss::MockNewsSource;
    use crate::config::DigestConfig;
    use crate::generator::{CopyGenerator, MockProvider, completion};
    use crate::snapshot::MockSnapshotSource;
    use chrono::TimeZone;
    use digest_llm::StopReason;
    use std::sync::Arc;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 12, 1, h, m, 0).unwrap()
    }

    #[test]
    fn test_next_run_later_today() {
        assert_eq!(next_run_after(at(1, 30), 2), at(2, 0));
    }

    #[test]
    fn test_next_run_tomorrow() {
        let next = next_run_after(at(2, 0), 2);
        assert_eq!(next, Utc.with_ymd_and_hms(2025, 12, 2, 2, 0, 0).unwrap());

        let next = next_run_after(at(23, 59), 0);
        assert_eq!(next, Utc.with_ymd_and_hms(2025, 12, 2, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_marker_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let marker = MarkerFile::new(dir.path().join("state").join("last_run"));

        assert_eq!(marker.read().unwrap(), None);
        let date = RunDate::parse("20251201").unwrap();
        marker.write(&date).unwrap();
        assert_eq!(marker.read().unwrap(), Some(date));
    }

    #[test]
    fn test_corrupt_marker_reads_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("last_run");
        std::fs::write(&path, "yesterday").unwrap();
        assert_eq!(MarkerFile::new(path).read().unwrap(), None);
    }

    #[test]
    fn test_unreadable_marker_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be read as a file
        assert!(MarkerFile::new(dir.path()).read().is_err());
    }

    fn pipeline(completions: usize) -> Pipeline {
        let mut klines = MockKlineSource::new();
        klines
            .expect_fetch_klines()
            .returning(|symbol, _, _, _| Err(DigestError::fetch(symbol, "HTTP 451")));
        let mut news = MockNewsSource::new();
        news.expect_fetch_feed()
            .returning(|feed| Err(DigestError::fetch(&feed.name, "empty response body")));
        let mut snapshot = MockSnapshotSource::new();
        snapshot
            .expect_read()
            .returning(|_| Ok("快照".to_string()));
        let mut provider = MockProvider::new();
        provider.expect_name().return_const("mock".to_string());
        provider
            .expect_complete()
            .times(completions)
            .returning(|req| Ok(completion("文案", &req.model, StopReason::EndTurn)));

        Pipeline::builder(DigestConfig::default())
            .kline_source(Arc::new(klines))
            .news_source(Arc::new(news))
            .snapshot_source(Arc::new(snapshot))
            .generator(CopyGenerator::new(Arc::new(provider)).with_model(Some("m".into())))
            .build()
            .unwrap()
    }

    #[test]
    fn test_invalid_hour() {
        assert!(Scheduler::new(pipeline(0), 24).is_err());
    }

    #[tokio::test]
    async fn test_marker_prevents_second_delivery() {
        let dir = tempfile::tempdir().unwrap();
        let marker = MarkerFile::new(dir.path().join("last_run"));
        let date = RunDate::parse("20251201").unwrap();

        let scheduler = Scheduler::new(pipeline(1), 2)
            .unwrap()
            .with_marker(Some(marker.clone()))
            .with_delivery(false, false);

        let first = scheduler.run_once(date).await.unwrap();
        assert_eq!(first.unwrap().copy.unwrap().text, "文案");
        assert_eq!(marker.read().unwrap(), Some(date));

        let second = scheduler.run_once(date).await.unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn test_corrupt_marker_still_delivers_and_is_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("last_run");
        std::fs::write(&path, "20251301\n").unwrap();
        let marker = MarkerFile::new(&path);
        let date = RunDate::parse("20251201").unwrap();

        let scheduler = Scheduler::new(pipeline(1), 2)
            .unwrap()
            .with_marker(Some(marker.clone()))
            .with_delivery(false, false);

        let report = scheduler.run_once(date).await.unwrap();
        assert!(report.is_some());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "20251201\n");
        assert_eq!(marker.read().unwrap(), Some(date));
    }

    #[tokio::test]
    async fn test_unreadable_marker_still_delivers() {
        let dir = tempfile::tempdir().unwrap();
        let scheduler = Scheduler::new(pipeline(1), 2)
            .unwrap()
            .with_marker(Some(MarkerFile::new(dir.path())))
            .with_delivery(false, false);

        let report = scheduler
            .run_once(RunDate::parse("20251201").unwrap())
            .await
            .unwrap();
        assert!(report.is_some());
    }
}
