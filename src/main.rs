use std::fs::File;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use log::info;

use pivot_signal::config::AnalysisConfig;
use pivot_signal::data::{Interval, load_series};
use pivot_signal::fibonacci::analyze_extensions;
use pivot_signal::output::{print_extension_analysis, print_trendline_analysis};
use pivot_signal::report::extension_table;
use pivot_signal::signal::analyze_trendline;

#[derive(Debug, Parser)]
struct Args {
    /// Path to the CSV file (Date,Open,High,Low,Close,Volume)
    #[arg(long)]
    input: PathBuf,

    /// Bar interval: 1d, 1wk or 1mo
    #[arg(long, default_value = "1d")]
    interval: Interval,

    /// Optional config file overriding the analysis defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Analysis date (YYYY-MM-DD), defaults to the last bar
    #[arg(long)]
    anchor: Option<NaiveDate>,

    /// Trendline pivot-window level
    #[arg(long, default_value_t = 2)]
    level: usize,

    /// Number of recent downfalls to project from
    #[arg(long)]
    pivots: Option<usize>,

    /// Zone merge threshold as a fraction (e.g. 0.01)
    #[arg(long)]
    merge: Option<f64>,

    /// Write the extension table to this CSV path
    #[arg(long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let cfg = AnalysisConfig::load_or_default(args.config)?;
    let series = load_series(&args.input, args.interval)?;
    info!("loaded {} {} bars from {:?}", series.len(), args.interval, args.input);

    let anchor = args
        .anchor
        .map(|d| d.and_time(chrono::NaiveTime::MIN).and_utc())
        .unwrap_or(series.last().ts);
    let pivot_count = args.pivots.unwrap_or(cfg.fibonacci.pivot_count);
    let merge_fraction = args.merge.unwrap_or(cfg.fibonacci.merge_fraction);

    let extensions = analyze_extensions(&series, &cfg, anchor, pivot_count, merge_fraction);
    print_extension_analysis(&extensions);
    println!();

    let trendline = analyze_trendline(&series, args.level, &cfg.trendline);
    print_trendline_analysis(&trendline);

    if let Some(path) = args.output {
        let symbol = args
            .input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let file = File::create(&path).with_context(|| format!("failed to create {:?}", path))?;
        extension_table(&extensions, &series, &symbol, args.interval).write_csv(file)?;
    }

    Ok(())
}
