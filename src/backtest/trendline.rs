use std::collections::HashSet;

use chrono::{DateTime, Utc};
use log::{debug, info};
use rayon::prelude::*;
use serde::Serialize;

use crate::backtest::{Backtester, PositionSide, compounded_return_pct, rate};
use crate::config::TrendlineConfig;
use crate::data::{Bar, Series};
use crate::error::BacktestError;
use crate::indicators::{BreakoutSignal, PivotKind, classify_pivots, detect_breakout, stop_fraction};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Outcome {
    Win,
    Loss,
}

impl Outcome {
    pub fn value(self) -> i8 {
        match self {
            Self::Win => 1,
            Self::Loss => -1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendlineTrade {
    pub entry_time: DateTime<Utc>,
    pub entry_price: f64,
    pub exit_time: DateTime<Utc>,
    pub exit_price: f64,
    pub outcome: Outcome,
    pub side: PositionSide,
    pub level: usize,
    /// Signed percentage return, absent when the entry price is unusable.
    pub return_pct: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct TrendlineBacktestResult {
    pub trades: Vec<TrendlineTrade>,
    /// Profitable trades over all trades, in percent.
    pub success_rate_pct: f64,
    pub overall_return_pct: f64,
    pub stop_fraction: Option<f64>,
}

/// Pivot kinds and breakout signals of one level over the whole series.
#[derive(Debug, Clone)]
pub struct LevelScan {
    pub level: usize,
    pub window: usize,
    pub backcandles: usize,
    pub kinds: Vec<PivotKind>,
    pub signals: Vec<BreakoutSignal>,
}

pub fn scan_level(bars: &[Bar], level: usize, cfg: &TrendlineConfig) -> LevelScan {
    let window = cfg.window(level);
    let backcandles = cfg.backcandles(level);
    let kinds = classify_pivots(bars, window);

    let mut signals = vec![BreakoutSignal::None; bars.len()];
    for i in (backcandles + window)..bars.len() {
        signals[i] = detect_breakout(bars, &kinds, &signals, i, backcandles, window, cfg);
    }

    LevelScan {
        level,
        window,
        backcandles,
        kinds,
        signals,
    }
}

/// One trade per breakout bar, exiting at the next pivot bar or the last bar.
pub fn level_trades(bars: &[Bar], scan: &LevelScan) -> Vec<TrendlineTrade> {
    let Some(last) = bars.len().checked_sub(1) else {
        return Vec::new();
    };

    scan.signals
        .iter()
        .enumerate()
        .filter_map(|(i, signal)| {
            let side = match signal {
                BreakoutSignal::BreakAbove => PositionSide::Long,
                BreakoutSignal::BreakBelow => PositionSide::Short,
                BreakoutSignal::None => return None,
            };
            let exit = (i + 1..bars.len())
                .find(|&j| scan.kinds[j].is_pivot())
                .unwrap_or(last);
            Some(make_trade(&bars[i], &bars[exit], side, scan.level))
        })
        .collect()
}

fn make_trade(entry: &Bar, exit: &Bar, side: PositionSide, level: usize) -> TrendlineTrade {
    let won = match side {
        PositionSide::Long => exit.close >= entry.close,
        PositionSide::Short => exit.close <= entry.close,
    };
    let outcome = if won { Outcome::Win } else { Outcome::Loss };
    let return_pct = (entry.close != 0.0).then(|| {
        f64::from(outcome.value()) * (entry.close - exit.close).abs() / entry.close * 100.0
    });

    TrendlineTrade {
        entry_time: entry.ts,
        entry_price: entry.close,
        exit_time: exit.ts,
        exit_price: exit.close,
        outcome,
        side,
        level,
        return_pct,
    }
}

/// Stable sort by entry time, then keep the first trade of every
/// (entry, exit) pair, so the lowest level tested wins ties.
pub fn merge_trades(mut trades: Vec<TrendlineTrade>) -> Vec<TrendlineTrade> {
    trades.sort_by_key(|t| t.entry_time);
    let mut seen = HashSet::new();
    trades.retain(|t| seen.insert((t.entry_time, t.exit_time)));
    trades
}

pub struct TrendlineBacktester {
    cfg: TrendlineConfig,
}

impl TrendlineBacktester {
    pub fn new(cfg: TrendlineConfig) -> Self {
        Self { cfg }
    }
}

impl Backtester for TrendlineBacktester {
    type Output = TrendlineBacktestResult;

    fn run_backtest(&self, series: &Series) -> Result<Self::Output, BacktestError> {
        let bars = series.bars();
        let stop = stop_fraction(bars, self.cfg.atr_period, self.cfg.atr_multiplier);

        // Levels run in parallel, results come back in level order.
        let per_level: Vec<Vec<TrendlineTrade>> = self
            .cfg
            .levels
            .par_iter()
            .map(|&level| {
                let scan = scan_level(bars, level, &self.cfg);
                let trades = level_trades(bars, &scan);
                debug!("level {level}: {} breakout trades", trades.len());
                trades
            })
            .collect();

        let trades = merge_trades(per_level.into_iter().flatten().collect());
        let wins = trades.iter().filter(|t| t.outcome == Outcome::Win).count();
        let success_rate_pct = rate(wins, trades.len()) * 100.0;
        let overall_return_pct = compounded_return_pct(trades.iter().filter_map(|t| t.return_pct));

        info!(
            "trendline backtest: {} trades, success rate {:.1}%, overall return {:.2}%",
            trades.len(),
            success_rate_pct,
            overall_return_pct
        );

        Ok(TrendlineBacktestResult {
            trades,
            success_rate_pct,
            overall_return_pct,
            stop_fraction: stop,
        })
    }
}
