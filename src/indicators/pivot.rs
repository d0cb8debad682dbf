use serde::Serialize;

use crate::data::Bar;

/// Local-extremum classification of a bar at a given window scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum PivotKind {
    #[default]
    None,
    High,
    Low,
    Both,
}

impl PivotKind {
    pub fn is_pivot(self) -> bool {
        self != Self::None
    }
}

/// A bar is a high pivot when no bar within `±window` has a strictly greater
/// high, and a low pivot when none has a strictly lower low. Bars closer than
/// `window` to either end of the series are never pivots.
pub fn classify_pivot(bars: &[Bar], index: usize, window: usize) -> PivotKind {
    if index < window || index + window >= bars.len() {
        return PivotKind::None;
    }

    let candle = &bars[index];
    let neighbours = &bars[index - window..=index + window];
    let is_high = neighbours.iter().all(|b| b.high <= candle.high);
    let is_low = neighbours.iter().all(|b| b.low >= candle.low);

    match (is_high, is_low) {
        (true, true) => PivotKind::Both,
        (true, false) => PivotKind::High,
        (false, true) => PivotKind::Low,
        (false, false) => PivotKind::None,
    }
}

/// Classify every bar of the series at `window` scale.
pub fn classify_pivots(bars: &[Bar], window: usize) -> Vec<PivotKind> {
    (0..bars.len())
        .map(|i| classify_pivot(bars, i, window))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::test_support::daily_bars;

    fn bars_from_high_low(rows: &[(f64, f64)]) -> Vec<Bar> {
        let ohlcv: Vec<_> = rows
            .iter()
            .map(|&(h, l)| ((h + l) / 2.0, h, l, (h + l) / 2.0, 1.0))
            .collect();
        daily_bars(&ohlcv)
    }

    #[test]
    fn test_classify_pivot_finds_high_and_low() {
        let bars = bars_from_high_low(&[
            (100.0, 90.0),
            (105.0, 95.0),
            (110.0, 100.0),
            (120.0, 105.0),
            (115.0, 100.0),
            (110.0, 95.0),
            (105.0, 85.0),
            (110.0, 90.0),
            (115.0, 95.0),
        ]);

        assert_eq!(classify_pivot(&bars, 3, 2), PivotKind::High);
        assert_eq!(classify_pivot(&bars, 6, 2), PivotKind::Low);
        assert_eq!(classify_pivot(&bars, 4, 2), PivotKind::None);
    }

    #[test]
    fn test_classify_pivot_boundary_bars_are_never_pivots() {
        let bars = bars_from_high_low(&[(200.0, 1.0), (100.0, 90.0), (100.0, 90.0), (300.0, 1.0)]);
        assert_eq!(classify_pivot(&bars, 0, 1), PivotKind::None);
        assert_eq!(classify_pivot(&bars, 3, 1), PivotKind::None);
        assert_eq!(classify_pivot(&bars, 10, 1), PivotKind::None);
    }

    #[test]
    fn test_classify_pivot_ties_count_and_flat_is_both() {
        let bars = bars_from_high_low(&[(100.0, 90.0); 5]);
        assert_eq!(classify_pivot(&bars, 2, 2), PivotKind::Both);
    }

    #[test]
    fn test_classify_pivots_covers_every_bar() {
        let bars = bars_from_high_low(&[(100.0, 90.0); 7]);
        let kinds = classify_pivots(&bars, 2);
        assert_eq!(kinds.len(), 7);
        assert_eq!(&kinds[..2], &[PivotKind::None, PivotKind::None]);
        assert!(kinds[2..5].iter().all(|k| *k == PivotKind::Both));
        assert!(!kinds[6].is_pivot());
    }
}
