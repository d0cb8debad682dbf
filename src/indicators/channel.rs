use serde::Serialize;

use crate::config::TrendlineConfig;
use crate::data::Bar;
use crate::indicators::pivot::PivotKind;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
}

/// Ordinary least squares of `ys` on `xs`.
/// `None` with fewer than two points or when every x is the same.
/// A perfectly flat `ys` has an undefined correlation and reports R² = 0.
pub fn linear_regression(xs: &[f64], ys: &[f64]) -> Option<LinearFit> {
    let n = xs.len().min(ys.len());
    if n < 2 {
        return None;
    }

    let mean_x = xs[..n].iter().sum::<f64>() / n as f64;
    let mean_y = ys[..n].iter().sum::<f64>() / n as f64;

    let (mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0);
    for (x, y) in xs[..n].iter().zip(&ys[..n]) {
        let (dx, dy) = (x - mean_x, y - mean_y);
        sxx += dx * dx;
        syy += dy * dy;
        sxy += dx * dy;
    }
    if sxx == 0.0 {
        return None;
    }

    let slope = sxy / sxx;
    let r_squared = if syy == 0.0 {
        0.0
    } else {
        (sxy * sxy / (sxx * syy)).clamp(0.0, 1.0)
    };

    Some(LinearFit {
        slope,
        intercept: mean_y - slope * mean_x,
        r_squared,
    })
}

/// A regression line through recent pivot lows or highs, in bar-index space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Channel {
    /// Look-back span the pivots were collected from.
    pub span: usize,
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
    pub points: usize,
    /// Pivot window scale the channel was fitted at.
    pub window: usize,
}

impl Channel {
    /// Projected price at bar `index`.
    pub fn at(&self, index: usize) -> f64 {
        self.slope * index as f64 + self.intercept
    }

    /// Fit quality weighted by the number of pivots used.
    pub fn score(&self) -> f64 {
        self.r_squared * self.points as f64
    }
}

/// Best low-pivot and high-pivot channels for one evaluation point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Channels {
    pub low: Option<Channel>,
    pub high: Option<Channel>,
}

fn consider(best: &mut Option<Channel>, candidate: Channel, min_r_squared: f64) {
    if candidate.r_squared <= min_r_squared {
        return;
    }
    let beats = best.is_none_or(|b| candidate.score() > b.score());
    if beats {
        *best = Some(candidate);
    }
}

fn fit_points(
    bars: &[Bar],
    kinds: &[PivotKind],
    range: std::ops::Range<usize>,
    want: PivotKind,
    max_points: usize,
) -> (Vec<f64>, Vec<f64>) {
    let idx: Vec<usize> = range
        .filter(|&i| kinds.get(i) == Some(&want))
        .collect();
    let recent = &idx[idx.len().saturating_sub(max_points)..];

    let xs = recent.iter().map(|&i| i as f64).collect();
    let ys = recent
        .iter()
        .map(|&i| match want {
            PivotKind::High => bars[i].high,
            _ => bars[i].low,
        })
        .collect();
    (xs, ys)
}

/// Sweep look-back spans from `backcandles/2` up to `1.5 * backcandles` in
/// steps of `window`, fitting lines through the last few low pivots and high
/// pivots strictly before `index - window`. Each side keeps the fit with the
/// highest R²-times-points score among fits whose R² clears the floor.
/// Bars classified `Both` take part in neither side.
pub fn fit_channels(
    bars: &[Bar],
    kinds: &[PivotKind],
    index: usize,
    backcandles: usize,
    window: usize,
    cfg: &TrendlineConfig,
) -> Channels {
    let mut channels = Channels::default();
    let half = backcandles / 2;

    for span in (backcandles - half..backcandles + half).step_by(window.max(1)) {
        let end = index.saturating_sub(window);
        let start = index.saturating_sub(span + window);

        for want in [PivotKind::Low, PivotKind::High] {
            let (xs, ys) = fit_points(bars, kinds, start..end, want, cfg.max_fit_points);
            let Some(fit) = linear_regression(&xs, &ys) else {
                continue;
            };
            let candidate = Channel {
                span,
                slope: fit.slope,
                intercept: fit.intercept,
                r_squared: fit.r_squared,
                points: xs.len(),
                window,
            };
            let best = match want {
                PivotKind::High => &mut channels.high,
                _ => &mut channels.low,
            };
            consider(best, candidate, cfg.min_r_squared);
        }
    }

    channels
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::test_support::daily_bars;

    fn approx_eq(a: f64, b: f64, eps: f64) {
        assert!(
            (a - b).abs() <= eps,
            "expected {b}, got {a} (diff = {})",
            (a - b).abs()
        );
    }

    #[test]
    fn test_linear_regression_exact_line() {
        let fit = linear_regression(&[1.0, 2.0, 3.0], &[3.0, 5.0, 7.0]).unwrap();
        approx_eq(fit.slope, 2.0, 1e-12);
        approx_eq(fit.intercept, 1.0, 1e-12);
        approx_eq(fit.r_squared, 1.0, 1e-12);
    }

    #[test]
    fn test_linear_regression_degenerate_inputs() {
        assert!(linear_regression(&[1.0], &[1.0]).is_none());
        assert!(linear_regression(&[2.0, 2.0], &[1.0, 5.0]).is_none());
        let flat = linear_regression(&[1.0, 2.0], &[5.0, 5.0]).unwrap();
        assert_eq!(flat.r_squared, 0.0);
    }

    #[test]
    fn test_linear_regression_noisy_r_squared_below_one() {
        let fit = linear_regression(&[0.0, 1.0, 2.0, 3.0], &[0.0, 2.0, 1.0, 3.0]).unwrap();
        assert!(fit.r_squared > 0.0 && fit.r_squared < 1.0);
    }

    #[test]
    fn test_fit_channels_two_collinear_lows_is_perfect_fit() {
        let bars = daily_bars(&[(100.0, 110.0, 90.0, 100.0, 1.0); 40]);
        let mut kinds = vec![PivotKind::None; 40];
        kinds[10] = PivotKind::Low;
        kinds[20] = PivotKind::Low;
        let mut bars = bars;
        bars[10].low = 80.0;
        bars[20].low = 85.0;

        let cfg = TrendlineConfig::default();
        let channels = fit_channels(&bars, &kinds, 35, 20, 5, &cfg);

        let low = channels.low.expect("low channel");
        approx_eq(low.r_squared, 1.0, 1e-12);
        approx_eq(low.slope, 0.5, 1e-12);
        approx_eq(low.at(30), 90.0, 1e-9);
        assert_eq!(low.points, 2);
        assert_eq!(low.window, 5);
        assert!(channels.high.is_none());
    }

    #[test]
    fn test_fit_channels_ignores_pivots_inside_the_window_gap() {
        let mut bars = daily_bars(&[(100.0, 110.0, 90.0, 100.0, 1.0); 40]);
        let mut kinds = vec![PivotKind::None; 40];
        // Index 32 is within `window` of 35 and must not be used.
        for (i, low) in [(10, 80.0), (32, 70.0)] {
            kinds[i] = PivotKind::Low;
            bars[i].low = low;
        }

        let channels = fit_channels(&bars, &kinds, 35, 20, 5, &TrendlineConfig::default());

        assert!(channels.low.is_none());
    }

    #[test]
    fn test_fit_channels_uses_only_the_last_four_pivots() {
        let mut bars = daily_bars(&[(100.0, 110.0, 90.0, 100.0, 1.0); 60]);
        let mut kinds = vec![PivotKind::None; 60];
        // An outlier far back, then four collinear highs.
        for (i, high) in [(5, 300.0), (20, 120.0), (25, 118.0), (30, 116.0), (35, 114.0)] {
            kinds[i] = PivotKind::High;
            bars[i].high = high;
        }

        let channels = fit_channels(&bars, &kinds, 45, 30, 5, &TrendlineConfig::default());

        let high = channels.high.expect("high channel");
        assert_eq!(high.points, 4);
        approx_eq(high.slope, -0.4, 1e-12);
        approx_eq(high.r_squared, 1.0, 1e-12);
    }

    #[test]
    fn test_fit_channels_skips_both_kind_pivots() {
        let mut bars = daily_bars(&[(100.0, 110.0, 90.0, 100.0, 1.0); 40]);
        let mut kinds = vec![PivotKind::None; 40];
        kinds[10] = PivotKind::Both;
        kinds[20] = PivotKind::Both;
        bars[10].low = 80.0;
        bars[20].low = 85.0;

        let channels = fit_channels(&bars, &kinds, 35, 20, 5, &TrendlineConfig::default());

        assert_eq!(channels, Channels::default());
    }
}
