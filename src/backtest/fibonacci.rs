use std::collections::VecDeque;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::Serialize;

use crate::backtest::{Backtester, PositionSide, rate};
use crate::config::AnalysisConfig;
use crate::data::{Interval, Series};
use crate::error::BacktestError;
use crate::fibonacci::extension_snapshot;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OpenPosition {
    pub side: PositionSide,
    pub entry_time: DateTime<Utc>,
    pub entry_price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FibonacciTrade {
    pub id: usize,
    pub side: PositionSide,
    pub entry_time: DateTime<Utc>,
    pub entry_price: f64,
    pub exit_time: DateTime<Utc>,
    pub exit_price: f64,
    /// (exit - entry) / entry
    pub offset: f64,
    /// Offset signed by the position side.
    pub profit: f64,
    pub cum_profit: f64,
    /// Price moved in the direction of the position.
    pub correct: bool,
}

#[derive(Debug, Clone)]
pub struct FibonacciBacktestResult {
    pub trades: Vec<FibonacciTrade>,
    /// Fraction of trades whose realized direction matched the side, 0..=1.
    pub success_rate: f64,
    /// Running sum of per-trade profit fractions.
    pub cum_profit: f64,
    /// Position still open at the end of the series, never force-closed.
    pub open_position: Option<OpenPosition>,
    /// Signal bars whose candle body contained an extension zone.
    pub level_touches: usize,
}

fn close_position(
    id: usize,
    pos: OpenPosition,
    exit_price: f64,
    exit_time: DateTime<Utc>,
    cum_profit: f64,
) -> FibonacciTrade {
    let offset = (exit_price - pos.entry_price) / pos.entry_price;
    let profit = pos.side.sign() * offset;
    let realized = if offset > 0.0 {
        Some(PositionSide::Long)
    } else if offset < 0.0 {
        Some(PositionSide::Short)
    } else {
        None
    };

    FibonacciTrade {
        id,
        side: pos.side,
        entry_time: pos.entry_time,
        entry_price: pos.entry_price,
        exit_time,
        exit_price,
        offset,
        profit,
        cum_profit: cum_profit + profit,
        correct: realized == Some(pos.side),
    }
}

/// The queue's common direction when it is full and unanimous.
fn unanimous(signs: &VecDeque<i8>, len: usize) -> Option<PositionSide> {
    if signs.len() < len {
        return None;
    }
    let first = *signs.front()?;
    if signs.iter().all(|&s| s == first) {
        PositionSide::from_direction(first)
    } else {
        None
    }
}

pub struct FibonacciBacktester<L> {
    cfg: AnalysisConfig,
    interval: Interval,
    pivot_count: usize,
    merge_fraction: f64,
    logger: L,
}

impl FibonacciBacktester<NoopLogger> {
    pub fn new(cfg: AnalysisConfig, interval: Interval) -> Self {
        let pivot_count = cfg.fibonacci.pivot_count;
        let merge_fraction = cfg.fibonacci.merge_fraction;
        Self {
            cfg,
            interval,
            pivot_count,
            merge_fraction,
            logger: NoopLogger,
        }
    }
}

impl<L: TradeLogger> FibonacciBacktester<L> {
    pub fn with_logger<M: TradeLogger>(self, logger: M) -> FibonacciBacktester<M> {
        FibonacciBacktester {
            cfg: self.cfg,
            interval: self.interval,
            pivot_count: self.pivot_count,
            merge_fraction: self.merge_fraction,
            logger,
        }
    }

    pub fn pivot_count(mut self, pivot_count: usize) -> Self {
        self.pivot_count = pivot_count;
        self
    }

    pub fn merge_fraction(mut self, merge_fraction: f64) -> Self {
        self.merge_fraction = merge_fraction;
        self
    }
}

impl<L: TradeLogger> Backtester for FibonacciBacktester<L> {
    type Output = FibonacciBacktestResult;

    /// Walk the bars in order. A full, unanimous queue of candle directions
    /// opens a position when flat and closes an opposite position; while a
    /// position is younger than the minimum holding duration no signal is
    /// evaluated. Extension zones are computed on every signal bar and
    /// counted when touched, but they do not gate the decision.
    fn run_backtest(&self, series: &Series) -> Result<Self::Output, BacktestError> {
        let queue_len = self.cfg.fibonacci.sign_queue_len(self.interval);
        let min_hold = self.cfg.fibonacci.min_hold_days;

        let mut signs: VecDeque<i8> = VecDeque::with_capacity(queue_len + 1);
        let mut open: Option<OpenPosition> = None;
        let mut trades: Vec<FibonacciTrade> = Vec::new();
        let mut cum_profit = 0.0;
        let mut level_touches = 0;

        for (i, bar) in series.bars().iter().enumerate() {
            signs.push_back(bar.direction());
            if signs.len() > queue_len {
                signs.pop_front();
            }

            if let Some(pos) = &open {
                if (bar.ts - pos.entry_time).num_days() < min_hold {
                    continue;
                }
            }

            let Some(side) = unanimous(&signs, queue_len) else {
                continue;
            };
            if open.as_ref().is_some_and(|p| p.side == side) {
                continue;
            }

            let snapshot =
                extension_snapshot(series, &self.cfg, i, self.pivot_count, self.merge_fraction);
            let (body_low, body_high) = (bar.open.min(bar.close), bar.open.max(bar.close));
            if snapshot
                .groups
                .iter()
                .any(|g| (body_low..=body_high).contains(&g.price()))
            {
                level_touches += 1;
                debug!("{}: {} signal touches an extension zone", bar.ts, side.label());
            }

            match open.take() {
                None => {
                    debug!("{}: open {} at {:.4}", bar.ts, side.label(), bar.close);
                    open = Some(OpenPosition {
                        side,
                        entry_time: bar.ts,
                        entry_price: bar.close,
                    });
                }
                Some(pos) => {
                    let trade = close_position(trades.len() + 1, pos, bar.close, bar.ts, cum_profit);
                    debug!(
                        "{}: close {} from {:.4} at {:.4} ({:+.4}%)",
                        bar.ts,
                        pos.side.label(),
                        pos.entry_price,
                        bar.close,
                        trade.profit * 100.0
                    );
                    self.logger
                        .log(&trade)
                        .map_err(BacktestError::TradeLog)?;
                    cum_profit = trade.cum_profit;
                    trades.push(trade);
                }
            }
        }

        let matches = trades.iter().filter(|t| t.correct).count();
        let success_rate = rate(matches, trades.len());
        info!(
            "fibonacci backtest: {} trades, success rate {:.1}%, cumulative profit {:.2}%",
            trades.len(),
            success_rate * 100.0,
            cum_profit * 100.0
        );

        Ok(FibonacciBacktestResult {
            trades,
            success_rate,
            cum_profit,
            open_position: open,
            level_touches,
        })
    }
}

pub trait TradeLogger: Sync {
    fn log(&self, trade: &FibonacciTrade) -> Result<(), String>;
}

/// Appends one JSON object per closed trade.
pub struct NdjsonLogger {
    pub path: PathBuf,
}

impl NdjsonLogger {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl TradeLogger for NdjsonLogger {
    fn log(&self, trade: &FibonacciTrade) -> Result<(), String> {
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|err| err.to_string())?;
        let line = serde_json::to_string(trade).map_err(|err| err.to_string())?;
        writeln!(f, "{line}").map_err(|err| err.to_string())?;
        Ok(())
    }
}

pub struct NoopLogger;

impl TradeLogger for NoopLogger {
    fn log(&self, _trade: &FibonacciTrade) -> Result<(), String> {
        Ok(())
    }
}
