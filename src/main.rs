mod config;
mod engine;
mod error;
mod indicator;
mod model;
mod render;
mod source;

use std::io::Write;
use std::path::Path;
use std::time::Instant;

use clap::Parser;
use derive_more::{Display, Error};
use error_stack::{Report, ResultExt};
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::{AppConfig, SourceConfig};
use engine::Engine;
use error::ConfigError;
use render::OutputFormat;
use source::file::FileSource;
use source::http::HttpSource;
use source::{BarRequest, BarSource};

#[derive(Debug, Display, Error)]
pub enum AppError {
    #[display("configuration error")]
    Config,
    #[display("bar source error")]
    Source,
    #[display("indicator engine error")]
    Engine,
    #[display("output error")]
    Render,
}

#[derive(Parser)]
#[command(
    name = "bar-indicators",
    about = "Technical indicators over one ticker's price history"
)]
struct Cli {
    /// Ticker of the stock to look up
    #[arg(short = 't', long, default_value = "AAPL")]
    ticker: String,

    /// Period type of the history: day, month, year, ytd
    #[arg(long = "pt", default_value = "month")]
    period_type: String,

    /// Number of period types to return
    #[arg(short = 'p', long, default_value_t = 3)]
    period: u32,

    /// Bar frequency type. Valid per period type: day: minute / month: daily, weekly /
    /// year: daily, weekly, monthly / ytd: daily, weekly
    #[arg(long = "ft", default_value = "daily")]
    frequency_type: String,

    /// Number of frequency units per bar
    #[arg(short = 'f', long, default_value_t = 1)]
    frequency: u32,

    /// Path to an optional TOML configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Output format override: text, json
    #[arg(long)]
    format: Option<String>,
}

#[tokio::main]
async fn main() {
    let started = Instant::now();
    if let Err(report) = run(started).await {
        eprintln!("{report:?}");
        std::process::exit(1);
    }
}

async fn run(started: Instant) -> Result<(), Report<AppError>> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => config::load(Path::new(path)).change_context(AppError::Config)?,
        None => AppConfig::default(),
    };

    init_tracing(&config);

    let format = match cli.format.as_deref() {
        Some(s) => OutputFormat::from_str(s).ok_or_else(|| {
            Report::new(AppError::Config).attach(format!("unknown output format \"{s}\""))
        })?,
        None => config.general.output,
    };

    let request = BarRequest::parse(
        &cli.ticker,
        &cli.period_type,
        cli.period,
        &cli.frequency_type,
        cli.frequency,
    )
    .change_context(AppError::Source)?;

    let source = build_source(&config.source).change_context(AppError::Config)?;

    info!(
        source = source.name(),
        ticker = %request.ticker,
        period_type = %request.period_type,
        period = request.period,
        frequency_type = %request.frequency_type,
        frequency = request.frequency,
        "fetching bars"
    );

    let bars = source
        .fetch_bars(&request)
        .await
        .change_context(AppError::Source)?;

    let engine = Engine::new(config.indicators);
    let records = engine
        .compute(bars)
        .await
        .change_context(AppError::Engine)?;

    info!(records = records.len(), "indicators computed");

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    render::render(&records, format, &mut out).change_context(AppError::Render)?;
    writeln!(out, "{:?}", started.elapsed()).change_context(AppError::Render)?;

    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::new(&config.general.log_level);
    // stdout carries the records, so logs go to stderr
    match config.general.log_format.as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

fn build_source(config: &SourceConfig) -> Result<Box<dyn BarSource>, Report<ConfigError>> {
    match config.kind.as_str() {
        "http" => {
            let api_key = resolve_api_key(
                config.api_key.as_deref(),
                std::env::var("TDA_API_KEY").ok(),
            );
            if api_key.is_empty() {
                tracing::warn!("no API key configured; the provider may reject requests");
            }
            Ok(Box::new(HttpSource::new(
                &config.base_url,
                &api_key,
                config.requests_per_second,
            )))
        }
        "file" => match &config.path {
            Some(path) => Ok(Box::new(FileSource::new(path))),
            None => Err(Report::new(ConfigError::Validation {
                field: "source.path is required for kind \"file\"".into(),
            })),
        },
        other => Err(Report::new(ConfigError::Validation {
            field: format!("source.kind \"{other}\" is not valid"),
        })),
    }
}

/// A blank configured key counts as unset.
fn resolve_api_key(configured: Option<&str>, from_env: Option<String>) -> String {
    configured
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(str::to_owned)
        .or(from_env)
        .unwrap_or_default()
}
