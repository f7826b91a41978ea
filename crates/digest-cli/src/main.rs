//! Command-line interface for the daily Xiaohongshu market digest

mod commands;

use clap::{Args, Parser, Subcommand};
use digest_pipeline::RunDate;
use digest_utils::LogFormat;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "xhs-digest", version)]
#[command(about = "Market + news digest written as Xiaohongshu copy", long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    /// Options for a single run (the default action)
    #[command(flatten)]
    run: RunArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run now, then every day at a fixed UTC hour
    Schedule(ScheduleArgs),
    /// Write the state file from R2_* / BARK_* variables and exit
    RenderState,
}

#[derive(Args, Debug, Clone)]
struct GlobalArgs {
    /// YAML file holding storage and notification credentials
    #[arg(long, global = true, default_value = "state.yaml")]
    state_file: PathBuf,

    /// OpenRouter API key
    #[arg(long, global = true, env = "OPENROUTER_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Log output format (pretty or json)
    #[arg(long, global = true, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,
}

#[derive(Args, Debug, Clone, Default)]
struct DataArgs {
    /// Trading pairs to summarize, comma separated
    #[arg(long, value_delimiter = ',')]
    symbols: Vec<String>,

    /// Lookback window in hours
    #[arg(long)]
    hours: Option<u32>,

    /// Kline interval, e.g. 1h or 15m
    #[arg(long)]
    interval: Option<String>,

    /// Use this model instead of the free-model catalogue
    #[arg(long)]
    model: Option<String>,

    /// Binance-compatible REST base URL
    #[arg(long, env = "BINANCE_API_BASE")]
    market_api_base: Option<String>,

    /// Timeout in seconds for market, news, snapshot and delivery requests
    #[arg(long)]
    timeout: Option<u64>,

    /// Timeout in seconds for the completion request
    #[arg(long)]
    completion_timeout: Option<u64>,
}

#[derive(Args, Debug, Clone, Default)]
struct DeliveryArgs {
    /// Do not upload the copy to object storage
    #[arg(long)]
    no_upload: bool,

    /// Do not send the push notification
    #[arg(long)]
    no_notify: bool,
}

#[derive(Args, Debug, Clone, Default)]
struct RunArgs {
    /// Report date (UTC) as YYYYMMDD, default today
    #[arg(long, value_parser = parse_date)]
    date: Option<RunDate>,

    /// Snapshot URL or local path instead of the dated report
    #[arg(long)]
    snapshot: Option<String>,

    /// Print the prompt and stop before calling the model
    #[arg(long)]
    dry_run: bool,

    #[command(flatten)]
    delivery: DeliveryArgs,

    #[command(flatten)]
    data: DataArgs,
}

#[derive(Args, Debug, Clone)]
struct ScheduleArgs {
    /// UTC hour (0-23) of the daily run
    #[arg(long, default_value_t = digest_pipeline::scheduler::DEFAULT_HOUR)]
    hour: u32,

    /// File recording the last delivered date
    #[arg(long)]
    marker_file: Option<PathBuf>,

    #[command(flatten)]
    delivery: DeliveryArgs,

    #[command(flatten)]
    data: DataArgs,
}

fn parse_date(raw: &str) -> Result<RunDate, String> {
    RunDate::parse(raw).map_err(|e| e.to_string())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // A missing .env is normal
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    digest_utils::init_tracing(cli.global.log_format);

    match cli.command {
        None => commands::run(&cli.global, cli.run).await,
        Some(Commands::Schedule(args)) => commands::schedule(&cli.global, args).await,
        Some(Commands::RenderState) => commands::render_state(&cli.global),
    }
}
