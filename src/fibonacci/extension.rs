use serde::Serialize;

use crate::zigzag::{Pivot, PivotSign};

/// A high pivot followed by a sufficiently lower low pivot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DownfallPair {
    pub high: Pivot,
    pub low: Pivot,
}

impl DownfallPair {
    pub fn range(&self) -> f64 {
        self.high.price - self.low.price
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ExtensionLevel {
    pub pair_index: usize,
    pub high: Pivot,
    pub low: Pivot,
    pub ratio_index: usize,
    pub ratio: f64,
    pub price: f64,
}

impl ExtensionLevel {
    /// e.g. `61.8% of 100.0000-150.0000`
    pub fn describe(&self) -> String {
        format!(
            "{:.1}% of {:.4}-{:.4}",
            self.ratio * 100.0,
            self.low.price,
            self.high.price
        )
    }
}

/// Nearby extension levels treated as one support/resistance zone.
/// Levels are sorted by price.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtensionGroup {
    pub levels: Vec<ExtensionLevel>,
}

impl ExtensionGroup {
    /// Midpoint of the lowest and highest member level.
    pub fn price(&self) -> f64 {
        match (self.levels.first(), self.levels.last()) {
            (Some(first), Some(last)) => (first.price + last.price) / 2.0,
            _ => 0.0,
        }
    }

    /// Relative spread of the group in percent, `None` for a single level.
    pub fn width_pct(&self) -> Option<f64> {
        if self.levels.len() < 2 {
            return None;
        }
        let first = self.levels[0].price;
        let last = self.levels[self.levels.len() - 1].price;
        Some(100.0 * (last - first) / first)
    }

    pub fn describe(&self) -> String {
        self.levels
            .iter()
            .map(ExtensionLevel::describe)
            .collect::<Vec<_>>()
            .join(" & ")
    }
}

/// Walk the pivots backward collecting high->low swings that drop at least
/// `min_drop` of the high price. Returns at most `count` pairs, oldest first.
pub fn select_downfalls(pivots: &[Pivot], count: usize, min_drop: f64) -> Vec<DownfallPair> {
    let mut res = Vec::new();
    if count == 0 {
        return res;
    }

    for i in (1..pivots.len()).rev() {
        let (prev, row) = (pivots[i - 1], pivots[i]);
        if row.sign != PivotSign::Low || prev.sign != PivotSign::High {
            continue;
        }
        if prev.price - row.price < prev.price * min_drop {
            continue;
        }

        res.push(DownfallPair {
            high: prev,
            low: row,
        });
        if res.len() == count {
            break;
        }
    }

    res.reverse();
    res
}

fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

/// Project `low + ratio * (high - low)` for each pair and ascending ratio,
/// stopping a pair's projection at the first level above `ceiling`.
pub fn project_levels(pairs: &[DownfallPair], ratios: &[f64], ceiling: f64) -> Vec<ExtensionLevel> {
    let mut levels = Vec::new();

    for (pair_index, pair) in pairs.iter().enumerate() {
        for (ratio_index, &ratio) in ratios.iter().enumerate() {
            let price = round4(pair.low.price + pair.range() * ratio);
            if price > ceiling {
                break;
            }
            levels.push(ExtensionLevel {
                pair_index,
                high: pair.high,
                low: pair.low,
                ratio_index,
                ratio,
                price,
            });
        }
    }

    levels
}

/// Sort levels by price and sweep once, chaining each level into the open
/// group while it sits within `merge_fraction` of its own price above the
/// last absorbed level.
pub fn cluster(levels: &[ExtensionLevel], merge_fraction: f64) -> Vec<ExtensionGroup> {
    let mut sorted = levels.to_vec();
    sorted.sort_by(|a, b| a.price.total_cmp(&b.price));

    let mut groups: Vec<ExtensionGroup> = Vec::new();
    let mut reference = f64::NAN;

    for level in sorted {
        let joins = !groups.is_empty() && level.price - reference <= merge_fraction * level.price;
        if joins {
            if let Some(group) = groups.last_mut() {
                group.levels.push(level);
            }
        } else {
            groups.push(ExtensionGroup {
                levels: vec![level],
            });
        }
        reference = level.price;
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn pivot(day: i64, sign: PivotSign, price: f64) -> Pivot {
        Pivot {
            ts: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::days(day),
            sign,
            price,
        }
    }

    fn level(price: f64) -> ExtensionLevel {
        ExtensionLevel {
            pair_index: 0,
            high: pivot(0, PivotSign::High, 200.0),
            low: pivot(1, PivotSign::Low, 100.0),
            ratio_index: 0,
            ratio: 0.0,
            price,
        }
    }

    #[test]
    fn test_select_downfalls_single_v_dip_returns_that_pair() {
        let pivots = vec![
            pivot(0, PivotSign::High, 150.0),
            pivot(10, PivotSign::Low, 100.0),
            pivot(20, PivotSign::High, 148.0),
        ];

        let pairs = select_downfalls(&pivots, 5, 0.05);

        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].high, pivots[0]);
        assert_eq!(pairs[0].low, pivots[1]);
    }

    #[test]
    fn test_select_downfalls_skips_shallow_drops() {
        let pivots = vec![
            pivot(0, PivotSign::High, 100.0),
            pivot(10, PivotSign::Low, 97.0),
        ];
        assert!(select_downfalls(&pivots, 5, 0.05).is_empty());
    }

    #[test]
    fn test_select_downfalls_keeps_most_recent_and_returns_oldest_first() {
        let pivots = vec![
            pivot(0, PivotSign::High, 200.0),
            pivot(10, PivotSign::Low, 150.0),
            pivot(20, PivotSign::High, 190.0),
            pivot(30, PivotSign::Low, 140.0),
            pivot(40, PivotSign::High, 180.0),
            pivot(50, PivotSign::Low, 120.0),
        ];

        let pairs = select_downfalls(&pivots, 2, 0.05);

        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].low.price, 140.0);
        assert_eq!(pairs[1].low.price, 120.0);
    }

    #[test]
    fn test_select_downfalls_zero_count_is_empty() {
        let pivots = vec![
            pivot(0, PivotSign::High, 150.0),
            pivot(10, PivotSign::Low, 100.0),
        ];
        assert!(select_downfalls(&pivots, 0, 0.05).is_empty());
    }

    #[test]
    fn test_project_levels_are_monotone_and_capped() {
        let pair = DownfallPair {
            high: pivot(0, PivotSign::High, 150.0),
            low: pivot(10, PivotSign::Low, 100.0),
        };
        let ratios = [0.236, 0.5, 1.0, 1.618, 2.618];

        let levels = project_levels(&[pair], &ratios, 200.0);

        // 2.618 would project to 230.9 and is suppressed.
        assert_eq!(levels.len(), 4);
        assert!(levels.windows(2).all(|w| w[0].price <= w[1].price));
        assert!(levels.windows(2).all(|w| w[0].ratio_index < w[1].ratio_index));
        assert!(levels.iter().all(|l| l.price <= 200.0));
        assert_eq!(levels[0].price, 111.8);
        assert_eq!(levels[3].price, 180.9);
    }

    #[test]
    fn test_project_levels_empty_pairs_gives_empty_levels() {
        assert!(project_levels(&[], &[0.5, 1.0], 1_000.0).is_empty());
    }

    #[test]
    fn test_cluster_chains_instead_of_recentring() {
        // 100 -> 100.9 -> 101.8 chain at 1% even though 101.8 is 1.8% above 100.
        let levels = vec![level(101.8), level(100.0), level(100.9), level(110.0)];

        let groups = cluster(&levels, 0.01);

        assert_eq!(groups.len(), 2);
        let prices: Vec<f64> = groups[0].levels.iter().map(|l| l.price).collect();
        assert_eq!(prices, vec![100.0, 100.9, 101.8]);
        assert_eq!(groups[1].levels.len(), 1);
        assert!((groups[0].price() - 100.9).abs() < 1e-9);
        assert!((groups[0].width_pct().unwrap() - 1.8).abs() < 1e-9);
        assert_eq!(groups[1].width_pct(), None);
    }

    #[test]
    fn test_cluster_is_idempotent() {
        let levels = vec![
            level(100.0),
            level(100.5),
            level(104.0),
            level(104.9),
            level(120.0),
        ];
        let groups = cluster(&levels, 0.01);

        let flattened: Vec<ExtensionLevel> =
            groups.iter().flat_map(|g| g.levels.clone()).collect();
        assert_eq!(cluster(&flattened, 0.01), groups);
    }

    #[test]
    fn test_group_describe_joins_member_levels() {
        let mut a = level(111.8);
        a.ratio = 0.236;
        let mut b = level(112.0);
        b.ratio = 0.24;
        let group = ExtensionGroup { levels: vec![a, b] };
        assert_eq!(
            group.describe(),
            "23.6% of 100.0000-200.0000 & 24.0% of 100.0000-200.0000"
        );
    }
}
