//! Subcommand implementations

use crate::{DataArgs, GlobalArgs, RunArgs, ScheduleArgs};
use anyhow::{Context, bail};
use digest_pipeline::scheduler::MarkerFile;
use digest_pipeline::{DigestConfig, Pipeline, RunDate, RunOptions, RunReport, RuntimeConfig, Scheduler};
use std::time::Duration;
use tracing::info;

fn digest_config(data: &DataArgs) -> anyhow::Result<DigestConfig> {
    let mut builder = DigestConfig::builder();

    if !data.symbols.is_empty() {
        builder = builder.symbols(data.symbols.iter().map(String::as_str));
    }
    if let Some(hours) = data.hours {
        builder = builder.lookback_hours(hours);
    }
    if let Some(interval) = &data.interval {
        builder = builder.interval(interval);
    }
    if let Some(model) = &data.model {
        builder = builder.model(model);
    }
    if let Some(base) = &data.market_api_base {
        builder = builder.market_api_base(base);
    }
    if let Some(secs) = data.timeout {
        builder = builder.request_timeout(Duration::from_secs(secs));
    }
    if let Some(secs) = data.completion_timeout {
        builder = builder.completion_timeout(Duration::from_secs(secs));
    }

    Ok(builder.build()?)
}

fn connect(global: &GlobalArgs, data: &DataArgs) -> anyhow::Result<Pipeline> {
    let config = digest_config(data)?;
    let runtime = RuntimeConfig::materialize(&global.state_file)
        .with_context(|| format!("loading {}", global.state_file.display()))?;

    Ok(Pipeline::connect(config, runtime.as_ref(), global.api_key.clone())?)
}

fn print_report(report: &RunReport) {
    match &report.copy {
        Some(copy) => println!("{}", copy.text),
        None => println!("{}", report.prompt),
    }
}

/// Single run, the default action
pub async fn run(global: &GlobalArgs, args: RunArgs) -> anyhow::Result<()> {
    if !args.dry_run && global.api_key.is_none() {
        bail!("OPENROUTER_API_KEY is not set (pass --api-key or use --dry-run)");
    }

    let pipeline = connect(global, &args.data)?;
    let options = RunOptions::new(args.date.unwrap_or_else(RunDate::today_utc))
        .with_snapshot(args.snapshot)
        .dry_run(args.dry_run)
        .upload(!args.delivery.no_upload)
        .notify(!args.delivery.no_notify);

    let report = pipeline.run(&options).await?;
    print_report(&report);

    if let Some(copy) = &report.copy {
        info!(
            model = %copy.model,
            uploaded = report.upload_url.is_some(),
            notified = report.notified,
            warnings = report.warnings.len(),
            "Digest delivered"
        );
    }
    Ok(())
}

/// Long-running daily loop
pub async fn schedule(global: &GlobalArgs, args: ScheduleArgs) -> anyhow::Result<()> {
    if global.api_key.is_none() {
        bail!("OPENROUTER_API_KEY is not set (pass --api-key)");
    }

    let pipeline = connect(global, &args.data)?;
    let scheduler = Scheduler::new(pipeline, args.hour)?
        .with_marker(args.marker_file.map(MarkerFile::new))
        .with_delivery(!args.delivery.no_upload, !args.delivery.no_notify);

    info!(hour = args.hour, "Starting scheduler");
    scheduler.run_forever(print_report).await?;
    Ok(())
}

/// Materialize the state file and exit
pub fn render_state(global: &GlobalArgs) -> anyhow::Result<()> {
    let Some(runtime) = RuntimeConfig::from_env() else {
        bail!("none of R2_BUCKET, R2_ENDPOINT, R2_ACCESS_KEY, R2_SECRET_KEY or BARK_KEY is set");
    };

    runtime
        .write(&global.state_file)
        .with_context(|| format!("writing {}", global.state_file.display()))?;
    println!("{}", global.state_file.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_config_from_flags() {
        let data = DataArgs {
            symbols: vec!["solusdt".into()],
            hours: Some(6),
            interval: Some("15m".into()),
            model: None,
            market_api_base: Some("https://data-api.binance.vision".into()),
            timeout: Some(3),
            completion_timeout: Some(120),
        };
        let config = digest_config(&data).unwrap();

        assert_eq!(config.symbols, vec!["SOLUSDT"]);
        assert_eq!(config.lookback_hours, 6);
        assert_eq!(config.interval, "15m");
        assert_eq!(config.market_api_base, "https://data-api.binance.vision");
        assert_eq!(config.request_timeout, Duration::from_secs(3));
        assert_eq!(config.completion_timeout, Duration::from_secs(120));
    }

    #[test]
    fn test_oversized_hours_is_a_config_error() {
        let data = DataArgs {
            hours: Some(4_000_000_000),
            ..DataArgs::default()
        };
        let err = digest_config(&data).unwrap_err();
        assert!(err.to_string().contains("lookback_hours"));
    }
}
