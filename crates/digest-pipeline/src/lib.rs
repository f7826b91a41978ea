//! Daily market digest pipeline
//!
//! This crate turns raw market and news inputs into a delivered
//! notification. One run:
//!
//! 1. summarizes recent klines for a few assets ([`market`])
//! 2. collects keyword-matching headlines from RSS feeds ([`news`])
//! 3. reads the published daily snapshot ([`snapshot`])
//! 4. renders a single prompt ([`prompts`])
//! 5. asks an LLM for short Xiaohongshu-style copy ([`generator`])
//! 6. uploads the copy and presigns a link ([`publisher`])
//! 7. pushes a Bark notification ([`notifier`])
//!
//! [`pipeline::Pipeline`] sequences the steps and decides which failures are
//! fatal; [`scheduler::Scheduler`] repeats the run once a day.
//!
//! # Example
//!
//! ```rust,ignore
//! use digest_pipeline::{DigestConfig, Pipeline, RunDate, RunOptions, RuntimeConfig};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let config = DigestConfig::default();
//!     let runtime = RuntimeConfig::materialize("state.yaml")?;
//!     let api_key = std::env::var("OPENROUTER_API_KEY").ok();
//!
//!     let pipeline = Pipeline::connect(config, runtime.as_ref(), api_key)?;
//!     let report = pipeline.run(&RunOptions::new(RunDate::today_utc())).await?;
//!     println!("{}", report.copy.map(|c| c.text).unwrap_or_default());
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod date;
pub mod error;
pub mod generator;
pub mod market;
pub mod news;
pub mod notifier;
pub mod outcome;
pub mod pipeline;
pub mod prompts;
pub mod publisher;
pub mod runtime;
pub mod scheduler;
pub mod snapshot;

// Re-export main types for convenience
pub use config::{DigestConfig, FeedSource};
pub use date::RunDate;
pub use error::{DigestError, Result};
pub use generator::{CopyGenerator, GeneratedCopy};
pub use market::{MarketReport, MarketSummary, MarketWindow};
pub use news::NewsItem;
pub use outcome::StepOutcome;
pub use pipeline::{Pipeline, RunOptions, RunReport};
pub use prompts::Prompt;
pub use runtime::{BarkConfig, RuntimeConfig, StorageConfig};
pub use scheduler::Scheduler;
