use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::backtest::trendline::scan_level;
use crate::config::TrendlineConfig;
use crate::data::Series;
use crate::indicators::{BreakoutSignal, Channel, PivotKind, fit_channels, stop_fraction};

/// A breakout bar and the channel it broke through.
#[derive(Debug, Clone, Serialize)]
pub struct BreakoutEvent {
    pub index: usize,
    pub ts: DateTime<Utc>,
    pub signal: BreakoutSignal,
    pub close: f64,
    pub channel: Option<Channel>,
}

pub struct TrendlineAnalysis {
    pub level: usize,
    pub window: usize,
    pub backcandles: usize,
    /// Pivot classification of every bar.
    pub kinds: Vec<PivotKind>,
    pub breakouts: Vec<BreakoutEvent>,
    pub stop_fraction: Option<f64>,
}

impl TrendlineAnalysis {
    pub fn pivot_count(&self, kind: PivotKind) -> usize {
        self.kinds.iter().filter(|&&k| k == kind).count()
    }
}

/// Pivots and breakouts of a single level, with the channel behind each
/// breakout: the low channel for a break below, the high one for a break above.
pub fn analyze_trendline(series: &Series, level: usize, cfg: &TrendlineConfig) -> TrendlineAnalysis {
    let bars = series.bars();
    let scan = scan_level(bars, level, cfg);

    let breakouts = scan
        .signals
        .iter()
        .enumerate()
        .filter(|(_, s)| s.is_signal())
        .map(|(index, &signal)| {
            let channels = fit_channels(bars, &scan.kinds, index, scan.backcandles, scan.window, cfg);
            let channel = match signal {
                BreakoutSignal::BreakBelow => channels.low,
                BreakoutSignal::BreakAbove => channels.high,
                BreakoutSignal::None => None,
            };
            BreakoutEvent {
                index,
                ts: bars[index].ts,
                signal,
                close: bars[index].close,
                channel,
            }
        })
        .collect();

    TrendlineAnalysis {
        level,
        window: scan.window,
        backcandles: scan.backcandles,
        kinds: scan.kinds,
        breakouts,
        stop_fraction: stop_fraction(bars, cfg.atr_period, cfg.atr_multiplier),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backtest::trendline::test_support::planted_break_below;
    use crate::data::test_support::series_from_closes;

    #[test]
    fn test_analyze_trendline_reports_every_bar() {
        let closes: Vec<f64> = (0..300)
            .map(|i| 100.0 + 10.0 * ((i as f64) / 6.0).sin())
            .collect();
        let series = series_from_closes(&closes);
        let cfg = TrendlineConfig::default();

        let analysis = analyze_trendline(&series, 2, &cfg);

        assert_eq!(analysis.kinds.len(), series.len());
        assert_eq!(analysis.window, 6);
        assert_eq!(analysis.backcandles, 60);
        assert!(analysis.pivot_count(PivotKind::High) > 0);
        assert!(analysis.pivot_count(PivotKind::Low) > 0);
        assert!(analysis.stop_fraction.is_some_and(|s| s > 0.0));
    }

    #[test]
    fn test_analyze_trendline_attaches_broken_channel() {
        let (series, cfg) = planted_break_below();

        let analysis = analyze_trendline(&series, 1, &cfg);

        assert_eq!(analysis.breakouts.len(), 1);
        let event = &analysis.breakouts[0];
        assert_eq!(event.index, 24);
        assert_eq!(event.ts, series.bars()[24].ts);
        assert_eq!(event.signal, BreakoutSignal::BreakBelow);
        assert_eq!(event.close, 102.0);

        // Low pivots 12 and 18 lie on 95 + i.
        let channel = event.channel.expect("low channel");
        assert_eq!(channel.points, 2);
        assert!((channel.slope - 1.0).abs() < 1e-9);
        assert!((channel.intercept - 95.0).abs() < 1e-9);
        assert!((channel.r_squared - 1.0).abs() < 1e-9);
        assert!(channel.at(24) > event.close);
    }

    #[test]
    fn test_analyze_trendline_short_series_has_no_breakouts() {
        let series = series_from_closes(&[100.0, 101.0, 99.0, 102.0]);
        let analysis = analyze_trendline(&series, 2, &TrendlineConfig::default());
        assert!(analysis.breakouts.is_empty());
        assert!(analysis.kinds.iter().all(|k| !k.is_pivot()));
        assert!(analysis.stop_fraction.is_none());
    }
}
