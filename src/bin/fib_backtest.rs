use std::fs::File;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use serde::Deserialize;

use pivot_signal::backtest::fibonacci::NdjsonLogger;
use pivot_signal::backtest::{Backtester, FibonacciBacktester};
use pivot_signal::config::AnalysisConfig;
use pivot_signal::data::{Interval, load_series};
use pivot_signal::output::print_fibonacci_backtest;
use pivot_signal::report::{BacktestContext, fibonacci_backtest_table};

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

    /// Ticker shown in the exported table
    symbol: Option<String>,

    /// 1d, 1wk or 1mo
    #[serde(default = "default_interval")]
    interval: String,

    /// Append every closed trade as a JSON line to this file
    trade_log: Option<PathBuf>,

    #[serde(default)]
    analysis: AnalysisConfig,
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

    let cfg = config.analysis;
    cfg.validate()?;
    let ctx_pivots = cfg.fibonacci.pivot_count;
    let ctx_merge = cfg.fibonacci.merge_fraction;

    let backtester = FibonacciBacktester::new(cfg, interval);
    let result = match config.trade_log {
        Some(path) => backtester
            .with_logger(NdjsonLogger::new(path))
            .run_backtest(&series)?,
        None => backtester.run_backtest(&series)?,
    };

    print_fibonacci_backtest(&result);

    if let Some(path) = args.output {
        let symbol = config.symbol.unwrap_or_default();
        let ctx = BacktestContext {
            symbol: &symbol,
            interval,
            pivot_count: ctx_pivots,
            merge_fraction: ctx_merge,
        };
        let file = File::create(&path).with_context(|| format!("failed to create {:?}", path))?;
        fibonacci_backtest_table(&result, &series, &ctx).write_csv(file)?;
        println!("Trade table written to {:?}", path);
    }

    Ok(())
}
