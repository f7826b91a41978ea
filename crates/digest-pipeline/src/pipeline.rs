//! Run orchestration
//!
//! A run walks market → news → snapshot → prompt → generation → upload →
//! notification. Only a generation failure (or a missing API key) ends the
//! run with an error; every other step degrades into a warning on the
//! [`RunReport`].

use crate::api::{BinanceClient, KlineSource, NewsSource, RssClient};
use crate::config::DigestConfig;
use crate::date::RunDate;
use crate::error::{DigestError, Result};
use crate::generator::{CopyGenerator, GeneratedCopy};
use crate::market::{MarketReport, MarketSummarizer, MarketWindow};
use crate::news::NewsFetcher;
use crate::notifier::{BarkNotifier, Notification, Notifier};
use crate::prompts::{Prompt, build_prompt};
use crate::publisher::{ObjectStore, Publisher, S3Store};
use crate::runtime::RuntimeConfig;
use crate::snapshot::{HttpSnapshotReader, SnapshotLocation, SnapshotReader, SnapshotSource};
use chrono::{DateTime, Utc};
use digest_llm::providers::{OpenRouterConfig, OpenRouterProvider};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// A delivery stage that is either wired up or explains why not
enum Stage<T> {
    Ready(T),
    Unavailable(String),
}

/// Per-run switches
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub date: RunDate,
    /// Explicit snapshot URL or local path; defaults to the dated template
    pub snapshot: Option<String>,
    /// Stop after building the prompt
    pub dry_run: bool,
    pub upload: bool,
    pub notify: bool,
}

impl RunOptions {
    /// Full run for `date`
    pub fn new(date: RunDate) -> Self {
        Self {
            date,
            snapshot: None,
            dry_run: false,
            upload: true,
            notify: true,
        }
    }

    pub fn with_snapshot(mut self, snapshot: Option<String>) -> Self {
        self.snapshot = snapshot;
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn upload(mut self, upload: bool) -> Self {
        self.upload = upload;
        self
    }

    pub fn notify(mut self, notify: bool) -> Self {
        self.notify = notify;
        self
    }
}

/// What a run produced
#[derive(Debug, Clone)]
pub struct RunReport {
    pub date: RunDate,
    pub prompt: Prompt,
    /// `None` on dry runs
    pub copy: Option<GeneratedCopy>,
    /// Key of the uploaded object
    pub object_key: Option<String>,
    /// Presigned link to the uploaded object
    pub upload_url: Option<String>,
    pub notified: bool,
    /// Non-fatal problems, in step order
    pub warnings: Vec<String>,
}

/// Sequences the digest steps
pub struct Pipeline {
    config: DigestConfig,
    market: MarketSummarizer,
    news: NewsFetcher,
    snapshot: SnapshotReader,
    generator: Stage<CopyGenerator>,
    publisher: Stage<Publisher>,
    notifier: Stage<Arc<dyn Notifier>>,
}

impl Pipeline {
    pub fn builder(config: DigestConfig) -> PipelineBuilder {
        PipelineBuilder::new(config)
    }

    /// Wire the production clients.
    ///
    /// `runtime` is the state file read for this process; without it upload
    /// and notification are unavailable. Without `api_key` only dry runs
    /// succeed.
    pub fn connect(
        config: DigestConfig,
        runtime: Option<&RuntimeConfig>,
        api_key: Option<String>,
    ) -> Result<Self> {
        let timeout = config.request_timeout;
        let mut builder = Self::builder(config.clone());

        if let Some(api_key) = api_key.filter(|key| !key.trim().is_empty()) {
            let provider = Arc::new(
                OpenRouterProvider::with_config(
                    OpenRouterConfig::new(api_key)
                        .with_timeout(config.completion_timeout.as_secs())
                        .with_attribution("https://github.com/Crescent-Moon-AI/xhs-digest", "xhs-digest"),
                )
                .map_err(|e| DigestError::Config(format!("cannot create LLM client: {e}")))?,
            );

            builder = builder.generator(
                CopyGenerator::new(provider.clone())
                    .with_catalog(provider)
                    .with_model(config.model.clone())
                    .with_temperature(config.temperature)
                    .with_max_tokens(config.max_tokens),
            );
        }

        builder = match runtime.and_then(RuntimeConfig::storage) {
            Some(storage) => match S3Store::new(storage, timeout) {
                Ok(store) => builder.object_store(Arc::new(store)),
                Err(e) => builder.object_store_unavailable(e.to_string()),
            },
            None => builder.object_store_unavailable("no storage configured in state file"),
        };

        builder = match runtime.and_then(RuntimeConfig::bark) {
            Some(bark) => match BarkNotifier::new(bark, timeout) {
                Ok(notifier) => builder.notifier(Arc::new(notifier)),
                Err(e) => builder.notifier_unavailable(e.to_string()),
            },
            None => builder.notifier_unavailable("no bark key configured in state file"),
        };

        builder.build()
    }

    pub fn config(&self) -> &DigestConfig {
        &self.config
    }

    /// Run with a window ending now
    pub async fn run(&self, options: &RunOptions) -> Result<RunReport> {
        self.run_at(options, Utc::now()).await
    }

    /// Run with a window ending at `now`
    #[instrument(skip_all, fields(date = %options.date, dry_run = options.dry_run))]
    pub async fn run_at(&self, options: &RunOptions, now: DateTime<Utc>) -> Result<RunReport> {
        let mut warnings = Vec::new();
        let window = MarketWindow::ending_at(now, self.config.lookback_hours, &self.config.interval);

        let (market, step_warnings) = self.market.summarize(&window).await.into_parts();
        warnings.extend(step_warnings);
        let market = market.unwrap_or_else(|| MarketReport::new(window.clone(), Vec::new()));

        let (news, step_warnings) = self.news.fetch(window.start).await.into_parts();
        warnings.extend(step_warnings);
        let news = news.unwrap_or_default();

        let location = options.snapshot.as_deref().map_or_else(
            || SnapshotLocation::Url(self.config.snapshot_url(&options.date)),
            SnapshotLocation::parse,
        );
        let (snapshot, step_warnings) = self.snapshot.read(&location).await.into_parts();
        warnings.extend(step_warnings);
        let snapshot = snapshot.flatten();

        let prompt = build_prompt(&market, &news, snapshot.as_deref())?;

        let mut report = RunReport {
            date: options.date,
            prompt,
            copy: None,
            object_key: None,
            upload_url: None,
            notified: false,
            warnings,
        };

        if options.dry_run {
            info!("Dry run, stopping before generation");
            return Ok(report);
        }

        let copy = match &self.generator {
            Stage::Ready(generator) => generator.generate(&report.prompt).await?,
            Stage::Unavailable(reason) => return Err(DigestError::Config(reason.clone())),
        };

        if options.upload {
            self.upload(&options.date, &copy, &mut report).await;
        }

        if options.notify {
            self.notify(&options.date, &copy, &mut report).await;
        }

        report.copy = Some(copy);
        info!(warnings = report.warnings.len(), notified = report.notified, "Run finished");
        Ok(report)
    }

    async fn upload(&self, date: &RunDate, copy: &GeneratedCopy, report: &mut RunReport) {
        let publisher = match &self.publisher {
            Stage::Ready(publisher) => publisher,
            Stage::Unavailable(reason) => {
                warn!(reason = %reason, "Skipping upload");
                report.warnings.push(format!("upload skipped: {reason}"));
                return;
            }
        };

        let key = self.config.object_key(date);
        let (url, step_warnings) = publisher.publish(&key, &copy.text).await.into_parts();
        report.warnings.extend(step_warnings);
        if url.is_some() {
            report.object_key = Some(key);
        }
        report.upload_url = url;
    }

    async fn notify(&self, date: &RunDate, copy: &GeneratedCopy, report: &mut RunReport) {
        let notifier = match &self.notifier {
            Stage::Ready(notifier) => notifier,
            Stage::Unavailable(reason) => {
                warn!(reason = %reason, "Skipping notification");
                report.warnings.push(format!("notification skipped: {reason}"));
                return;
            }
        };

        let notification = Notification::digest(
            self.config.notification_title(date),
            &copy.text,
            &self.config.image_urls(date),
            report.upload_url.as_deref(),
        );

        match notifier.push(&notification).await {
            Ok(()) => report.notified = true,
            Err(e) => {
                warn!(error = %e, "Notification failed");
                report.warnings.push(e.to_string());
            }
        }
    }
}

/// Builder for [`Pipeline`]
///
/// Data sources default to the HTTP clients. Generation, storage and
/// notification stay unavailable unless supplied.
pub struct PipelineBuilder {
    config: DigestConfig,
    klines: Option<Arc<dyn KlineSource>>,
    news: Option<Arc<dyn NewsSource>>,
    snapshot: Option<Arc<dyn SnapshotSource>>,
    generator: Stage<CopyGenerator>,
    store: Stage<Arc<dyn ObjectStore>>,
    notifier: Stage<Arc<dyn Notifier>>,
}

impl PipelineBuilder {
    fn new(config: DigestConfig) -> Self {
        Self {
            config,
            klines: None,
            news: None,
            snapshot: None,
            generator: Stage::Unavailable("OPENROUTER_API_KEY is not set".to_string()),
            store: Stage::Unavailable("object storage not configured".to_string()),
            notifier: Stage::Unavailable("notifier not configured".to_string()),
        }
    }

    pub fn kline_source(mut self, source: Arc<dyn KlineSource>) -> Self {
        self.klines = Some(source);
        self
    }

    pub fn news_source(mut self, source: Arc<dyn NewsSource>) -> Self {
        self.news = Some(source);
        self
    }

    pub fn snapshot_source(mut self, source: Arc<dyn SnapshotSource>) -> Self {
        self.snapshot = Some(source);
        self
    }

    pub fn generator(mut self, generator: CopyGenerator) -> Self {
        self.generator = Stage::Ready(generator);
        self
    }

    pub fn object_store(mut self, store: Arc<dyn ObjectStore>) -> Self {
        self.store = Stage::Ready(store);
        self
    }

    /// Record why uploads cannot happen
    pub fn object_store_unavailable(mut self, reason: impl Into<String>) -> Self {
        self.store = Stage::Unavailable(reason.into());
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Stage::Ready(notifier);
        self
    }

    /// Record why notifications cannot happen
    pub fn notifier_unavailable(mut self, reason: impl Into<String>) -> Self {
        self.notifier = Stage::Unavailable(reason.into());
        self
    }

    pub fn build(self) -> Result<Pipeline> {
        self.config.validate()?;
        let timeout = self.config.request_timeout;

        let klines = match self.klines {
            Some(source) => source,
            None => Arc::new(BinanceClient::new(&self.config.market_api_base, timeout)?),
        };
        let news = match self.news {
            Some(source) => source,
            None => Arc::new(RssClient::new(timeout)?),
        };
        let snapshot = match self.snapshot {
            Some(source) => source,
            None => Arc::new(HttpSnapshotReader::new(timeout)?),
        };

        let publisher = match self.store {
            Stage::Ready(store) => Stage::Ready(Publisher::new(store, self.config.presign_ttl)),
            Stage::Unavailable(reason) => Stage::Unavailable(reason),
        };

        Ok(Pipeline {
            market: MarketSummarizer::new(klines, self.config.symbols.clone()),
            news: NewsFetcher::new(
                news,
                self.config.feeds.clone(),
                self.config.keywords.clone(),
                self.config.max_news_items,
            ),
            snapshot: SnapshotReader::new(snapshot),
            generator: self.generator,
            publisher,
            notifier: self.notifier,
            config: self.config,
        })
    }
}
