use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::backtest::{FibonacciBacktestResult, TrendlineBacktestResult};
use crate::data::{Interval, Series};
use crate::fibonacci::{ExtensionAnalysis, Framing};
use crate::zigzag::Pivot;

const DATE_FORMAT: &str = "%d %b %Y";

/// Tabular export: a header and rows of already formatted cells.
/// Rows shorter than the header are blank-padded on write.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    fn new(header: &[&str]) -> Self {
        Self {
            header: header.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    fn push(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    /// A row with only the given `(column, value)` cells set.
    fn push_sparse(&mut self, cells: &[(usize, String)]) {
        let mut row = vec![String::new(); self.header.len()];
        for (col, value) in cells {
            row[*col] = value.clone();
        }
        self.rows.push(row);
    }

    fn push_blank(&mut self) {
        self.push_sparse(&[]);
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(&self.header)?;
        for row in &self.rows {
            let padded = (0..self.header.len()).map(|i| row.get(i).map(String::as_str).unwrap_or(""));
            wtr.write_record(padded)?;
        }
        wtr.flush()?;
        Ok(())
    }
}

fn date(ts: DateTime<Utc>) -> String {
    ts.format(DATE_FORMAT).to_string()
}

fn price(p: f64) -> String {
    format!("{p:.4}$")
}

pub fn pivot_table(pivots: &[Pivot]) -> Table {
    let mut table = Table::new(&["Date", "Sign", "Close"]);
    for p in pivots {
        table.push(vec![
            date(p.ts),
            p.sign.value().to_string(),
            format!("{:.4}", p.price),
        ]);
    }
    table
}

pub fn extension_table(
    analysis: &ExtensionAnalysis,
    series: &Series,
    symbol: &str,
    interval: Interval,
) -> Table {
    let mut table = Table::new(&[
        "ExtID",
        "Level",
        "Type",
        "Width",
        "Behavior",
        "Description",
        " ",
    ]);

    for zone in &analysis.zones {
        let kind = match zone.framing {
            Framing::Resistance => "Resistance",
            Framing::Support => "Support",
        };
        table.push(vec![
            zone.id.to_string(),
            price(zone.price()),
            kind.to_string(),
            zone.group
                .width_pct()
                .map(|w| format!("{w:.2}%"))
                .unwrap_or_default(),
            zone.behavior.marker().to_string(),
            zone.group.describe(),
            String::new(),
        ]);
    }

    table.push_blank();
    table.push_sparse(&[
        (0, "Ticker:".into()),
        (1, symbol.to_string()),
        (2, "Current Date:".into()),
        (3, date(analysis.anchor)),
        (4, "Current Price:".into()),
        (5, price(analysis.current_price)),
    ]);
    table.push_sparse(&[
        (1, format!("From: {}", date(series.first().ts))),
        (2, format!("To: {}", date(series.last().ts))),
        (3, format!("By: {interval}")),
        (4, format!("Merge: {:.1}%", analysis.merge_fraction * 100.0)),
        (5, format!("Recent Pivots: {}", analysis.pivot_count)),
    ]);
    table.push_blank();
    table
}

pub struct BacktestContext<'a> {
    pub symbol: &'a str,
    pub interval: Interval,
    pub pivot_count: usize,
    pub merge_fraction: f64,
}

pub fn fibonacci_backtest_table(
    result: &FibonacciBacktestResult,
    series: &Series,
    ctx: &BacktestContext<'_>,
) -> Table {
    let mut table = Table::new(&[
        "TransID",
        "Position",
        "EnterDate",
        "EnterPrice",
        "ExitDate",
        "ExitPrice",
        "Offset",
        "Profit",
        "CumProfit",
        "X",
        " ",
    ]);

    for t in &result.trades {
        table.push(vec![
            t.id.to_string(),
            t.side.label().to_string(),
            date(t.entry_time),
            price(t.entry_price),
            date(t.exit_time),
            price(t.exit_price),
            format!("{:.2}%", t.offset * 100.0),
            format!("{:.4}%", t.profit * 100.0),
            format!("{:.4}%", t.cum_profit * 100.0),
            if t.correct { "T" } else { "F" }.to_string(),
            " ".to_string(),
        ]);
    }

    table.push_blank();
    table.push_sparse(&[
        (0, "Ticker:".into()),
        (1, ctx.symbol.to_string()),
        (2, format!("From: {}", date(series.first().ts))),
        (3, format!("To: {}", date(series.last().ts))),
        (4, format!("By: {}", ctx.interval)),
        (5, format!("Recent Pivots: {}", ctx.pivot_count)),
        (6, format!("Merge: {:.1}%", ctx.merge_fraction * 100.0)),
    ]);
    table.push_sparse(&[
        (2, "Success Rate:".into()),
        (3, format!("{:.1}%", result.success_rate * 100.0)),
        (4, "Cumulative Profit:".into()),
        (5, format!("{:.1}%", result.cum_profit * 100.0)),
    ]);
    table.push_blank();
    table
}

fn round4(v: f64) -> String {
    format!("{:.4}", (v * 10_000.0).round() / 10_000.0)
}

/// Win/loss outcome is not exported, only the signed return.
pub fn trendline_table(result: &TrendlineBacktestResult) -> Table {
    let mut table = Table::new(&[
        "Enter Date",
        "Enter Price",
        "Exit Date",
        "Exit Price",
        "Signal",
        "Level",
        "Return",
    ]);
    for t in &result.trades {
        table.push(vec![
            t.entry_time.format("%Y-%m-%d").to_string(),
            round4(t.entry_price),
            t.exit_time.format("%Y-%m-%d").to_string(),
            round4(t.exit_price),
            t.side.label().to_string(),
            t.level.to_string(),
            t.return_pct.map(round4).unwrap_or_default(),
        ]);
    }
    table
}
