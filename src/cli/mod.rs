//! Demand forecast CLI Module
//!
//! Command-line interface for training, range forecasting and model inspection.

use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use polars::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::ForecastConfig;
use crate::export::{ModelFormat, ModelStore};
use crate::forecast::{ForecastEngine, ForecastResult};
use crate::timeseries::{parse_datetime_str, FeatureDeriver, LagPolicy};
use crate::training::XGBoostRegressor;
use crate::utils::DataLoader;

// ─── Styling helpers ───────────────────────────────────────────────────────────

const SPARK_LEVELS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn kv(key: &str, val: &str) {
    println!("  {:<18} {}", muted(key), val.white());
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

/// One block character per value, scaled between the series min and max
pub fn sparkline(values: &[f64]) -> String {
    let finite = values.iter().copied().filter(|v| v.is_finite());
    let min = finite.clone().fold(f64::INFINITY, f64::min);
    let max = finite.fold(f64::NEG_INFINITY, f64::max);
    let span = max - min;

    values
        .iter()
        .map(|v| {
            if !v.is_finite() {
                ' '
            } else if span <= 0.0 {
                SPARK_LEVELS[SPARK_LEVELS.len() / 2]
            } else {
                let level = ((v - min) / span * (SPARK_LEVELS.len() - 1) as f64).round() as usize;
                SPARK_LEVELS[level.min(SPARK_LEVELS.len() - 1)]
            }
        })
        .collect()
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "demand-forecast")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Hourly electricity demand forecaster")]
#[command(long_about = None)]
pub struct Cli {
    /// JSON config file; environment variables and flags override it
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Demand dataset (CSV with date, hour, hourly_demand)
    #[arg(short, long, global = true)]
    pub data: Option<PathBuf>,

    /// Model artifact path
    #[arg(short, long, global = true)]
    pub model: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum FormatArg {
    Json,
    Binary,
}

impl From<FormatArg> for ModelFormat {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::Json => ModelFormat::Json,
            FormatArg::Binary => ModelFormat::Binary,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate across time-series folds and save the last fold's model
    Train {
        /// Number of folds
        #[arg(long)]
        splits: Option<usize>,

        /// Test window per fold, in hours
        #[arg(long)]
        test_size: Option<usize>,

        /// Hours left out between train and test windows
        #[arg(long)]
        gap: Option<usize>,

        /// Keep rows with missing lag values (needed below three years of history)
        #[arg(long)]
        pass_through: bool,

        /// Maximum boosting rounds
        #[arg(long)]
        n_estimators: Option<usize>,

        /// Artifact encoding
        #[arg(long, value_enum)]
        format: Option<FormatArg>,
    },

    /// Predict every hour of a range, e.g. "2026-11-20 00:00" to "2026-11-21 23:00"
    Forecast {
        /// First hour to predict
        start: String,

        /// Last hour to predict (inclusive)
        end: String,

        /// Also write the predictions as CSV
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show dataset and model information
    Info,

    /// Start the web server
    Serve {
        /// Server port
        #[arg(short, long)]
        port: Option<u16>,

        /// Server host
        #[arg(long)]
        host: Option<String>,
    },
}

/// Resolve config file, environment and the global flags
pub fn resolve_config(cli: &Cli) -> anyhow::Result<ForecastConfig> {
    let mut config = ForecastConfig::load(cli.config.as_deref())?;
    if let Some(data) = &cli.data {
        config.dataset_path = data.clone();
    }
    if let Some(model) = &cli.model {
        config.model_path = model.clone();
    }
    Ok(config)
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_train(
    mut config: ForecastConfig,
    splits: Option<usize>,
    test_size: Option<usize>,
    gap: Option<usize>,
    pass_through: bool,
    n_estimators: Option<usize>,
    format: Option<FormatArg>,
) -> anyhow::Result<()> {
    if let Some(n) = splits {
        config.split.n_splits = n;
    }
    if let Some(size) = test_size {
        config.split.test_size_hours = size;
    }
    if let Some(gap) = gap {
        config.split.gap_hours = gap;
    }
    if pass_through {
        config.split.lag_policy = LagPolicy::PassThrough;
    }
    if let Some(n) = n_estimators {
        config.regressor.n_estimators = n;
    }
    if let Some(format) = format {
        config.model_format = format.into();
    }
    config.validate()?;

    section("Train");

    step_run("Loading data");
    let start = Instant::now();
    let records = DataLoader::new(config.schema.clone()).load_records(&config.dataset_path)?;
    let mut engine = ForecastEngine::from_records(
        &records,
        config.duplicate_policy,
        XGBoostRegressor::new(config.regressor.clone()),
    )?
    .with_deriver(FeatureDeriver::new(config.lag_offsets_days));
    step_done(&format!("{} hours in {:?}", engine.series().len(), start.elapsed()));

    step_run(&format!(
        "Validating {} folds of {}h (gap {}h)",
        config.split.n_splits, config.split.test_size_hours, config.split.gap_hours
    ));
    let start = Instant::now();
    let scores = engine.train(&config.split)?.to_vec();
    step_done(&format!("{:?}", start.elapsed()));

    println!();
    println!("  {:<10} {:>14}", muted("Fold"), muted("RMSE"));
    println!("  {}", dim(&"─".repeat(26)));
    for (i, score) in scores.iter().enumerate() {
        println!("  {:<10} {:>14.3}", i + 1, score);
    }
    println!("  {}", dim(&"─".repeat(26)));
    let mean = scores.iter().sum::<f64>() / scores.len().max(1) as f64;
    println!("  {:<10} {}", muted("Mean"), format!("{:>14.3}", mean).white().bold());

    if let Some(model) = engine.model() {
        step_run(&format!("Saving → {}", config.model_path.display()));
        ModelStore::new(config.model_format).save_to_path(model, &config.model_path)?;
        step_done(&format!("{:?}", config.model_format));
    }

    println!();
    Ok(())
}

pub fn cmd_forecast(config: ForecastConfig, start: &str, end: &str, output: Option<&Path>) -> anyhow::Result<()> {
    let start = parse_datetime_str(start)?;
    let end = parse_datetime_str(end)?;

    section("Forecast");

    step_run("Preparing model");
    let timer = Instant::now();
    let engine = ForecastEngine::bootstrap(&config)?;
    step_done(&format!("{:?}", timer.elapsed()));

    let result = engine.predict_range(start, end)?;
    print_forecast(&result);

    if let Some(path) = output {
        step_run(&format!("Saving → {}", path.display()));
        write_forecast_csv(&result, path)?;
        step_done(&format!("{} rows", result.len()));
    }

    println!();
    Ok(())
}

fn print_forecast(result: &ForecastResult) {
    println!();
    println!(
        "  {:<20} {:>6} {:>6} {:>5} {:>14}",
        muted("Timestamp"),
        muted("Month"),
        muted("Year"),
        muted("Hour"),
        muted("Demand")
    );
    println!("  {}", dim(&"─".repeat(56)));
    for row in result.iter() {
        println!(
            "  {:<20} {:>6} {:>6} {:>5} {:>14.2}",
            row.timestamp.format("%Y-%m-%d %H:%M").to_string(),
            row.month,
            row.year,
            row.hour,
            row.predicted_demand
        );
    }
    println!("  {}", dim(&"─".repeat(56)));

    let values = result.values();
    if !values.is_empty() {
        println!();
        for chunk in values.chunks(48) {
            println!("  {}", sparkline(chunk).cyan());
        }
    }
}

/// Write forecast rows as CSV
pub fn write_forecast_csv(result: &ForecastResult, path: &Path) -> anyhow::Result<()> {
    let timestamps: Vec<String> = result.iter().map(|r| r.timestamp.format("%Y-%m-%d %H:%M:%S").to_string()).collect();
    let months: Vec<i64> = result.iter().map(|r| r.month as i64).collect();
    let years: Vec<i64> = result.iter().map(|r| r.year as i64).collect();
    let hours: Vec<i64> = result.iter().map(|r| r.hour as i64).collect();

    let mut df = df! {
        "timestamp" => timestamps,
        "month" => months,
        "year" => years,
        "hour" => hours,
        "predicted_demand" => result.values(),
    }?;

    let mut file = std::fs::File::create(path)?;
    CsvWriter::new(&mut file).finish(&mut df)?;
    Ok(())
}

pub fn cmd_info(config: ForecastConfig) -> anyhow::Result<()> {
    section("Dataset");
    kv("Path", &config.dataset_path.display().to_string());
    match DataLoader::new(config.schema.clone()).load_records(&config.dataset_path) {
        Ok(records) => {
            let engine = ForecastEngine::from_records(&records, config.duplicate_policy, XGBoostRegressor::default())?;
            let series = engine.series();
            kv("Rows", &records.len().to_string());
            kv("Hours", &series.len().to_string());
            if let (Some(first), Some(last)) = (series.first(), series.last()) {
                kv("First", &first.to_string());
                kv("Last", &last.to_string());
            }
        }
        Err(e) => println!("  {}", format!("unavailable: {}", e).yellow()),
    }

    section("Model");
    kv("Path", &config.model_path.display().to_string());
    let store = ModelStore::new(config.model_format);
    if !store.exists(&config.model_path) {
        println!("  {}", "not trained yet (run `train`)".yellow());
        println!();
        return Ok(());
    }

    let bytes = std::fs::read(&config.model_path)?;
    let metadata = store.metadata(&bytes)?;
    kv("Regressor", &metadata.regressor);
    kv("Trained at", &metadata.trained_at);
    kv("Features", &metadata.feature_names.join(", "));
    kv("Lag offsets (days)", &format!("{:?}", metadata.lag_offsets_days));
    let scores: Vec<String> = metadata.fold_scores.iter().map(|s| format!("{:.3}", s)).collect();
    kv("Fold RMSE", &scores.join("  "));
    kv("Written by", &metadata.writer_version);
    println!();
    Ok(())
}

pub async fn cmd_serve(mut config: ForecastConfig, host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    section("Serve");
    kv("Address", &format!("{}:{}", config.server.host, config.server.port));
    kv("Dataset", &config.dataset_path.display().to_string());
    kv("Model", &config.model_path.display().to_string());
    println!();

    crate::server::run_server(config).await
}
