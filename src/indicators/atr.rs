use crate::data::Bar;

/// True range of `bar` given the previous close.
pub fn true_range(bar: &Bar, prev_close: f64) -> f64 {
    (bar.high - bar.low)
        .max((bar.high - prev_close).abs())
        .max((bar.low - prev_close).abs())
}

/// Wilder's Average True Range at the last bar:
/// seed with the mean of the first `period` true ranges, then
/// ATR_i = (ATR_{i-1} * (period - 1) + TR_i) / period.
pub fn atr(bars: &[Bar], period: usize) -> Option<f64> {
    if period == 0 || bars.len() < period + 1 {
        return None;
    }

    let trs: Vec<f64> = bars
        .windows(2)
        .map(|w| true_range(&w[1], w[0].close))
        .collect();

    let seed = trs[..period].iter().sum::<f64>() / period as f64;
    let n = period as f64;
    let value = trs[period..]
        .iter()
        .fold(seed, |prev, &tr| (prev * (n - 1.0) + tr) / n);

    Some(value)
}

/// ATR scaled by `multiplier` as a fraction of the last close
/// (e.g. 0.04 = 4% stop distance).
pub fn stop_fraction(bars: &[Bar], period: usize, multiplier: f64) -> Option<f64> {
    let atr_val = atr(bars, period)?;
    let last_close = bars.last()?.close;
    if last_close <= 0.0 {
        return None;
    }
    Some(atr_val * multiplier / last_close)
}
