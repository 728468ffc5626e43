use anyhow::Context;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use clap::Parser;
use signal_cataloger::services::normalize_asset;
use signal_cataloger::sources::{CandleSource, FileCandleSource, HttpCandleSource};
use signal_cataloger::types::Timeframe;
use signal_cataloger::{report, CatalogError, CatalogParams, Cataloger, Config, FilterPeriods};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Catalog candle history by time of day and schedule future CALL/PUT signals.
#[derive(Parser, Debug)]
#[command(name = "signal-cataloger", version, about)]
struct Cli {
    /// Candle timeframe in minutes (1, 2, 5, 15, 30 or 60)
    #[arg(long, default_value = "5", value_parser = parse_timeframe)]
    timeframe: Timeframe,

    /// Martingale levels to chain (0-3)
    #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=3))]
    martingale: u8,

    /// Starting confidence threshold (50-100)
    #[arg(long, default_value_t = 70.0, value_parser = parse_percentage)]
    percentage: f64,

    /// Days of history to analyze (1-50)
    #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u32).range(1..=50))]
    days: u32,

    /// Trend-count filter period (0 disables)
    #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=100))]
    rsi: u8,

    /// ADX filter period (0 disables)
    #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=100))]
    adx: u8,

    /// CCI filter period (0 disables)
    #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=100))]
    cci: u8,

    /// MACD filter period (0 disables)
    #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=100))]
    macd: u8,

    /// Comma-separated assets, e.g. "AUDCAD,EURUSD,EURUSD_otc"
    #[arg(long)]
    assets: String,

    /// Base URL of the HTTP candle bridge (overrides CANDLE_SOURCE_URL)
    #[arg(long)]
    source_url: Option<String>,

    /// Directory of <ASSET>.json candle dumps (overrides CANDLE_DIR)
    #[arg(long)]
    candle_dir: Option<PathBuf>,

    /// Reference time as RFC 3339 (defaults to now)
    #[arg(long)]
    now: Option<String>,

    /// Seed for duplicate thinning (overrides THINNING_SEED)
    #[arg(long)]
    seed: Option<u64>,

    /// Chance of keeping a duplicate HH:MM, 0-1 (overrides DUPLICATE_RETAIN_PROBABILITY)
    #[arg(long, value_parser = parse_probability)]
    retain_probability: Option<f64>,

    /// Print the scheduled signals as JSON instead of the text report
    #[arg(long, default_value_t = false)]
    json: bool,
}

fn parse_timeframe(s: &str) -> Result<Timeframe, String> {
    s.parse().map_err(|e: CatalogError| e.to_string())
}

fn parse_percentage(s: &str) -> Result<f64, String> {
    let value: f64 = s.parse().map_err(|_| format!("not a number: {}", s))?;
    if (50.0..=100.0).contains(&value) {
        Ok(value)
    } else {
        Err("percentage must be between 50 and 100".to_string())
    }
}

fn parse_probability(s: &str) -> Result<f64, String> {
    let value: f64 = s.parse().map_err(|_| format!("not a number: {}", s))?;
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err("probability must be between 0 and 1".to_string())
    }
}

fn parse_assets(raw: &str) -> Result<Vec<String>, CatalogError> {
    let assets: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(normalize_asset)
        .collect();
    if assets.is_empty() {
        return Err(CatalogError::InvalidArgument(
            "at least one asset is required".to_string(),
        ));
    }
    Ok(assets)
}

fn reference_time(now: Option<&str>, tz: Tz) -> anyhow::Result<DateTime<Tz>> {
    match now {
        Some(raw) => Ok(DateTime::parse_from_rfc3339(raw)
            .with_context(|| format!("invalid --now value {:?}", raw))?
            .with_timezone(&tz)),
        None => Ok(Utc::now().with_timezone(&tz)),
    }
}

fn candle_source(config: &Config) -> Result<Box<dyn CandleSource>, CatalogError> {
    if let Some(ref url) = config.candle_source_url {
        info!("Using candle bridge at {}", url);
        return Ok(Box::new(HttpCandleSource::new(
            url.clone(),
            config.candle_source_token.clone(),
            Duration::from_secs(config.http_timeout_secs),
        )));
    }
    if let Some(ref dir) = config.candle_dir {
        info!("Using candle dumps in {}", dir.display());
        return Ok(Box::new(FileCandleSource::new(dir.clone())));
    }
    Err(CatalogError::Config(
        "no candle source: set --source-url/CANDLE_SOURCE_URL or --candle-dir/CANDLE_DIR"
            .to_string(),
    ))
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::from_env()?;
    if cli.source_url.is_some() {
        config.candle_source_url = cli.source_url;
    }
    if cli.candle_dir.is_some() {
        config.candle_dir = cli.candle_dir;
    }
    if cli.seed.is_some() {
        config.thinning_seed = cli.seed;
    }
    if let Some(probability) = cli.retain_probability {
        config.duplicate_retain_probability = probability;
    }

    let params = CatalogParams {
        timeframe: cli.timeframe,
        martingale: cli.martingale,
        percentage: cli.percentage,
        days: cli.days,
        filters: FilterPeriods {
            trend: usize::from(cli.rsi),
            adx: usize::from(cli.adx),
            cci: usize::from(cli.cci),
            macd: usize::from(cli.macd),
        },
    };
    params.validate()?;
    if params.filters.any_enabled() {
        info!("Veto filters: {:?}", params.filters);
    }

    let assets = parse_assets(&cli.assets)?;
    let reference = reference_time(cli.now.as_deref(), config.timezone)?;
    info!(
        "Scheduling signals up to {}h after {} ({})",
        config.base_window_hours.max(1),
        reference.format("%Y-%m-%d %H:%M"),
        config.timezone
    );

    let source = candle_source(&config)?;
    let cataloger = Cataloger::new(source, config, params);
    let run = cataloger
        .run(&assets, reference)
        .await
        .context("cataloging failed")?;

    if !run.had_candidates {
        info!("No asset produced a directional bucket");
    }
    info!(
        "{} signals in a {}h window",
        run.signals.len(),
        run.window_hours
    );
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&run.signals)?);
    } else {
        print!("{}", report::render(&run.signals));
    }
    Ok(())
}

/// 2 when the candle feed failed, 1 for anything else.
fn exit_status(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<CatalogError>() {
        Some(e) if e.is_source_failure() => 2,
        _ => 1,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Logs go to stderr; stdout carries the report
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "signal_cataloger=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(exit_status(&e))
        }
    }
}
