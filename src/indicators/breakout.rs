use serde::Serialize;

use crate::config::TrendlineConfig;
use crate::data::Bar;
use crate::indicators::channel::{Channels, fit_channels};
use crate::indicators::pivot::PivotKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum BreakoutSignal {
    #[default]
    None,
    /// Close broke below a rising low-pivot channel.
    BreakBelow,
    /// Close broke above a falling high-pivot channel.
    BreakAbove,
}

impl BreakoutSignal {
    pub fn is_signal(self) -> bool {
        self != Self::None
    }
}

/// Breakout signal at bar `index`, given pivot kinds and the signals already
/// computed for earlier bars of the same scale.
///
/// Returns `None` right after any signal (one-bar cool-down) and when fewer
/// than `backcandles + window` bars precede `index`.
pub fn detect_breakout(
    bars: &[Bar],
    kinds: &[PivotKind],
    signals: &[BreakoutSignal],
    index: usize,
    backcandles: usize,
    window: usize,
    cfg: &TrendlineConfig,
) -> BreakoutSignal {
    if index < 2 || index >= bars.len() {
        return BreakoutSignal::None;
    }
    if signals.get(index - 1).is_some_and(|s| s.is_signal()) {
        return BreakoutSignal::None;
    }
    if index < backcandles + window {
        return BreakoutSignal::None;
    }

    let channels = fit_channels(bars, kinds, index, backcandles, window, cfg);
    evaluate_breakout(bars, index, &channels)
}

/// Apply the breakout rules to bar `index` against fitted channels.
///
/// Break-below: the bar two back reached above the low channel, volume
/// expanded against that bar, the previous and current candles are bearish,
/// the low channel rises, and both closes sit under the channel.
/// Break-above mirrors it on a falling high channel with bullish candles.
pub fn evaluate_breakout(bars: &[Bar], index: usize, channels: &Channels) -> BreakoutSignal {
    if index < 2 || index >= bars.len() {
        return BreakoutSignal::None;
    }

    let third_idx = index - 2;
    let prev_idx = index - 1;
    let (third, prev, curr) = (&bars[third_idx], &bars[prev_idx], &bars[index]);
    let volume_up = curr.volume > third.volume;

    if let Some(low) = channels.low {
        if third.high > low.at(third_idx)
            && volume_up
            && prev.is_bearish()
            && curr.is_bearish()
            && low.slope > 0.0
            && prev.close < low.at(prev_idx)
            && curr.close < low.at(index)
        {
            return BreakoutSignal::BreakBelow;
        }
    }

    if let Some(high) = channels.high {
        if third.low < high.at(third_idx)
            && volume_up
            && prev.is_bullish()
            && curr.is_bullish()
            && high.slope < 0.0
            && prev.close > high.at(prev_idx)
            && curr.close > high.at(index)
        {
            return BreakoutSignal::BreakAbove;
        }
    }

    BreakoutSignal::None
}
