use std::fs::File;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use serde::Deserialize;

use pivot_signal::backtest::{Backtester, TrendlineBacktester};
use pivot_signal::config::{AnalysisConfig, TrendlineConfig};
use pivot_signal::data::{Interval, load_series};
use pivot_signal::output::print_trendline_backtest;
use pivot_signal::report::trendline_table;

#[derive(Debug, Parser)]
struct Args {
    /// config-file path
    #[arg(long)]
    config: PathBuf,

    /// Write the trade table to this CSV path
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Deserialize)]
struct Config {
    /// Path to the CSV file (Date,Open,High,Low,Close,Volume)
    input: PathBuf,

    /// 1d, 1wk or 1mo
    #[serde(default = "default_interval")]
    interval: String,

    #[serde(default)]
    trendline: TrendlineConfig,
}

fn default_interval() -> String {
    "1d".into()
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let config_path = args
        .config
        .into_os_string()
        .into_string()
        .map_err(|_| anyhow!("config path is not valid UTF-8"))?;
    let config: Config = config::Config::builder()
        .add_source(config::File::with_name(&config_path))
        .build()?
        .try_deserialize()?;

    let interval: Interval = config.interval.parse().map_err(|e: String| anyhow!(e))?;
    let series = load_series(&config.input, interval)
        .with_context(|| format!("failed to load bars from {:?}", config.input))?;
    println!("Loaded {} {} bars.", series.len(), interval);
    println!("Levels:            {:?}", config.trendline.levels);

    AnalysisConfig {
        trendline: config.trendline.clone(),
        ..AnalysisConfig::default()
    }
    .validate()?;

    let result = TrendlineBacktester::new(config.trendline).run_backtest(&series)?;
    print_trendline_backtest(&result);

    if let Some(path) = args.output {
        let file = File::create(&path).with_context(|| format!("failed to create {:?}", path))?;
        trendline_table(&result).write_csv(file)?;
        println!("Trade table written to {:?}", path);
    }

    Ok(())
}
