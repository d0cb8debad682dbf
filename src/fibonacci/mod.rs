pub mod behavior;
pub mod extension;

pub use behavior::{Behavior, Framing, classify_behavior};
pub use extension::{
    DownfallPair, ExtensionGroup, ExtensionLevel, cluster, project_levels, select_downfalls,
};

use chrono::{DateTime, Utc};
use log::debug;

use crate::config::AnalysisConfig;
use crate::data::Series;
use crate::zigzag::{Pivot, detect_pivots};

/// Pivots, downfalls and clustered extension groups as seen at one bar.
#[derive(Debug, Clone)]
pub struct ExtensionSnapshot {
    pub pivots: Vec<Pivot>,
    pub downfalls: Vec<DownfallPair>,
    pub groups: Vec<ExtensionGroup>,
}

/// Run pivots -> downfalls -> levels -> groups with data up to bar `index`.
/// Levels above `ceiling_factor` times that bar's close are suppressed.
pub fn extension_snapshot(
    series: &Series,
    cfg: &AnalysisConfig,
    index: usize,
    pivot_count: usize,
    merge_fraction: f64,
) -> ExtensionSnapshot {
    let bar = series.bars()[index];
    let pivots = detect_pivots(series, &cfg.zigzag, bar.ts);
    let downfalls = select_downfalls(&pivots, pivot_count, cfg.fibonacci.min_downfall);
    let levels = project_levels(
        &downfalls,
        &cfg.fibonacci.ratios,
        bar.close * cfg.fibonacci.ceiling_factor,
    );
    let groups = cluster(&levels, merge_fraction);

    ExtensionSnapshot {
        pivots,
        downfalls,
        groups,
    }
}

#[derive(Debug, Clone)]
pub struct ExtensionZone {
    pub id: usize,
    pub group: ExtensionGroup,
    pub framing: Framing,
    pub behavior: Behavior,
}

impl ExtensionZone {
    pub fn price(&self) -> f64 {
        self.group.price()
    }
}

#[derive(Debug, Clone)]
pub struct ExtensionAnalysis {
    pub anchor: DateTime<Utc>,
    pub current_price: f64,
    pub pivot_count: usize,
    pub merge_fraction: f64,
    pub pivots: Vec<Pivot>,
    pub downfalls: Vec<DownfallPair>,
    pub zones: Vec<ExtensionZone>,
}

/// Full extension analysis at `anchor` (the first bar at or after it, or the
/// last bar when `anchor` is past the end).
pub fn analyze_extensions(
    series: &Series,
    cfg: &AnalysisConfig,
    anchor: DateTime<Utc>,
    pivot_count: usize,
    merge_fraction: f64,
) -> ExtensionAnalysis {
    let index = series
        .position_at_or_after(anchor)
        .unwrap_or(series.len() - 1);
    let bar = series.bars()[index];

    let snapshot = extension_snapshot(series, cfg, index, pivot_count, merge_fraction);
    debug!(
        "extension analysis at {}: {} pivots, {} downfalls, {} groups",
        bar.ts,
        snapshot.pivots.len(),
        snapshot.downfalls.len(),
        snapshot.groups.len()
    );

    let zones = snapshot
        .groups
        .into_iter()
        .enumerate()
        .map(|(i, group)| {
            let price = group.price();
            ExtensionZone {
                id: i + 1,
                framing: Framing::for_level(price, bar.close),
                behavior: classify_behavior(series, price, bar.ts, merge_fraction, &cfg.fibonacci),
                group,
            }
        })
        .collect();

    ExtensionAnalysis {
        anchor: bar.ts,
        current_price: bar.close,
        pivot_count,
        merge_fraction,
        pivots: snapshot.pivots,
        downfalls: snapshot.downfalls,
        zones,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ZigZagConfig;
    use crate::data::test_support::series_from_closes;

    fn analysis_cfg() -> AnalysisConfig {
        AnalysisConfig {
            zigzag: ZigZagConfig {
                window_days: 10,
                padding_days: 0,
                ..ZigZagConfig::default()
            },
            ..AnalysisConfig::default()
        }
    }

    fn swings() -> Vec<f64> {
        // 150 -> 100 drop, recovery to 140, drop to 110, recovery to 130.
        let mut closes = Vec::new();
        closes.extend((0..10).map(|i| 150.0 - 5.0 * i as f64));
        closes.extend((0..10).map(|i| 100.0 + 4.0 * i as f64));
        closes.extend((0..10).map(|i| 140.0 - 3.0 * i as f64));
        closes.extend((0..10).map(|i| 110.0 + 2.0 * i as f64));
        closes
    }

    #[test]
    fn test_snapshot_levels_stay_under_ceiling() {
        let series = series_from_closes(&swings());
        let cfg = analysis_cfg();
        let index = series.len() - 1;

        let snapshot = extension_snapshot(&series, &cfg, index, 5, 0.01);

        let ceiling = series.bars()[index].close * cfg.fibonacci.ceiling_factor;
        assert!(!snapshot.downfalls.is_empty());
        assert!(!snapshot.groups.is_empty());
        for group in &snapshot.groups {
            assert!(group.levels.iter().all(|l| l.price <= ceiling));
        }
        let prices: Vec<f64> = snapshot.groups.iter().map(|g| g.price()).collect();
        assert!(prices.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_analyze_extensions_numbers_zones_and_frames_them() {
        let series = series_from_closes(&swings());
        let cfg = analysis_cfg();

        let analysis = analyze_extensions(&series, &cfg, series.last().ts, 5, 0.01);

        assert_eq!(analysis.current_price, series.last().close);
        for (i, zone) in analysis.zones.iter().enumerate() {
            assert_eq!(zone.id, i + 1);
            let expected = Framing::for_level(zone.price(), analysis.current_price);
            assert_eq!(zone.framing, expected);
        }
    }

    #[test]
    fn test_analyze_extensions_without_pivots_is_empty() {
        let series = series_from_closes(&[100.0, 101.0, 102.0]);
        let analysis = analyze_extensions(&series, &analysis_cfg(), series.last().ts, 5, 0.01);
        assert!(analysis.pivots.is_empty());
        assert!(analysis.zones.is_empty());
    }
}
