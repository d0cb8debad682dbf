use chrono::{DateTime, Duration, Utc};
use log::debug;
use serde::Serialize;

use crate::config::ZigZagConfig;
use crate::data::{Bar, Series};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PivotSign {
    High,
    Low,
}

impl PivotSign {
    pub fn value(self) -> i8 {
        match self {
            Self::High => 1,
            Self::Low => -1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Pivot {
    pub ts: DateTime<Utc>,
    pub sign: PivotSign,
    pub price: f64,
}

/// Find alternating close-price pivots by scanning backward from
/// `anchor - padding` in fixed windows, then refine them with merge passes.
///
/// Windows are inclusive on both ends and a window whose max and min fall on
/// the same bar (one observation, or a flat window) yields nothing. The
/// first pivot is whichever extremum the earliest window produced; callers
/// must not assume the output starts on a low.
pub fn detect_pivots(series: &Series, cfg: &ZigZagConfig, anchor: DateTime<Utc>) -> Vec<Pivot> {
    if cfg.window_days <= 0 {
        return Vec::new();
    }

    let bars = series.bars();
    let init = series.first().ts;
    let window = Duration::days(cfg.window_days);

    let mut win_end = anchor - Duration::days(cfg.padding_days);
    let mut win_start = win_end - window;

    // Newest first while scanning.
    let mut pivots: Vec<Pivot> = Vec::new();

    while win_start >= init {
        let range = series.range_inclusive(win_start, win_end);
        if range.len() > 1 {
            let offset = range.start;
            let (max_idx, min_idx) = extreme_close_indices(&bars[range]);
            let (max_idx, min_idx) = (offset + max_idx, offset + min_idx);

            if max_idx != min_idx {
                let high = Pivot {
                    ts: bars[max_idx].ts,
                    sign: PivotSign::High,
                    price: bars[max_idx].close,
                };
                let low = Pivot {
                    ts: bars[min_idx].ts,
                    sign: PivotSign::Low,
                    price: bars[min_idx].close,
                };
                push_window_pivots(&mut pivots, high, low, max_idx < min_idx);
            }
        }

        win_end -= window;
        win_start -= window;
    }

    pivots.reverse();
    refine_pivots(pivots, cfg)
}

/// First index of the max close and first index of the min close.
fn extreme_close_indices(bars: &[Bar]) -> (usize, usize) {
    let mut max_idx = 0;
    let mut min_idx = 0;
    for (i, bar) in bars.iter().enumerate() {
        if bar.close > bars[max_idx].close {
            max_idx = i;
        }
        if bar.close < bars[min_idx].close {
            min_idx = i;
        }
    }
    (max_idx, min_idx)
}

/// `pivots` is newest first, so the later extremum of the window goes in first.
/// A window extremum that does not extend the previous (later) pivot of the
/// same sign replaces it instead of creating a spurious swing.
fn push_window_pivots(pivots: &mut Vec<Pivot>, high: Pivot, low: Pivot, high_first: bool) {
    let last = pivots.last().map(|p| (p.sign, p.price));

    if high_first {
        match last {
            None | Some((PivotSign::High, _)) => {
                pivots.push(low);
                pivots.push(high);
            }
            Some((PivotSign::Low, price)) if price < low.price => {
                pivots.push(high);
            }
            Some((PivotSign::Low, _)) => {
                if let Some(slot) = pivots.last_mut() {
                    *slot = low;
                }
                pivots.push(high);
            }
        }
    } else {
        match last {
            None | Some((PivotSign::Low, _)) => {
                pivots.push(high);
                pivots.push(low);
            }
            Some((PivotSign::High, price)) if price > high.price => {
                pivots.push(low);
            }
            Some((PivotSign::High, _)) => {
                if let Some(slot) = pivots.last_mut() {
                    *slot = high;
                }
                pivots.push(low);
            }
        }
    }
}

/// Run up to `merge_passes` merge passes, keeping the last result that still
/// has at least four pivots.
pub fn refine_pivots(mut pivots: Vec<Pivot>, cfg: &ZigZagConfig) -> Vec<Pivot> {
    for pass in 0..cfg.merge_passes {
        let merged = merge_pivots(&pivots, cfg);
        if merged.len() < 4 {
            debug!("zigzag merge pass {pass} left {} pivots, stopping", merged.len());
            break;
        }
        pivots = merged;
    }
    pivots
}

/// One merge pass: a run of four pivots whose outer pair brackets the inner
/// pair, whose inner swing is small relative to the outer swing and which
/// spans less than the duration limit loses its two inner pivots.
pub fn merge_pivots(pivots: &[Pivot], cfg: &ZigZagConfig) -> Vec<Pivot> {
    if pivots.len() < 3 {
        return pivots.to_vec();
    }

    let limit = Duration::days(cfg.merge_duration_days);
    let mut res = Vec::with_capacity(pivots.len());
    let mut i = 0;

    while i + 3 < pivots.len() {
        res.push(pivots[i]);

        let group = &pivots[i..i + 4];
        if group[3].ts - group[0].ts < limit && is_collapsible(group, cfg.merge_value_ratio) {
            i += 3;
        } else {
            i += 1;
        }
    }
    res.extend_from_slice(&pivots[i..]);
    res
}

fn is_collapsible(group: &[Pivot], ratio: f64) -> bool {
    let (a, b, c, d) = (group[0].price, group[1].price, group[2].price, group[3].price);
    let outer_min = a.min(d);
    let outer_max = a.max(d);
    let inner_min = b.min(c);
    let inner_max = b.max(c);

    outer_min < inner_min
        && outer_max > inner_max
        && ratio * (outer_max - outer_min) > inner_max - inner_min
}
