use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::warn;

use pivot_signal::dashboard::summarize_all;
use pivot_signal::data::{Interval, Series, load_series};
use pivot_signal::output::print_dashboard;

#[derive(Debug, Parser)]
struct Args {
    /// Directory of daily CSV files, one per symbol (file stem = symbol)
    #[arg(long)]
    dir: PathBuf,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut paths: Vec<PathBuf> = fs::read_dir(&args.dir)
        .with_context(|| format!("failed to read directory {:?}", args.dir))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "csv"))
        .collect();
    paths.sort();

    let mut series: Vec<(String, Series)> = Vec::with_capacity(paths.len());
    for path in paths {
        let symbol = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        match load_series(&path, Interval::Daily) {
            Ok(s) => series.push((symbol, s)),
            Err(err) => warn!("skipping {symbol}: {err:#}"),
        }
    }

    if series.is_empty() {
        println!("No usable CSV files in {:?}.", args.dir);
        return Ok(());
    }

    print_dashboard(&summarize_all(&series));
    Ok(())
}
