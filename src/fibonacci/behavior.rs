use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::config::FibonacciConfig;
use crate::data::{Bar, Series};

/// Whether a zone sits above (resistance) or below (support) the anchor close.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Framing {
    Resistance,
    Support,
}

impl Framing {
    pub fn for_level(level: f64, current_price: f64) -> Self {
        if level >= current_price {
            Self::Resistance
        } else {
            Self::Support
        }
    }

    pub fn short_label(self) -> &'static str {
        match self {
            Self::Resistance => "Res",
            Self::Support => "Sup",
        }
    }
}

/// How price reacted after first crossing an extension zone.
///
/// `Break` means price went through the zone (up through resistance, down
/// through support); `Reject` means the zone held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Behavior {
    Break(Framing),
    SemiBreak(Framing),
    Reject(Framing),
    SemiReject(Framing),
    Vibration,
    Unknown,
}

impl Behavior {
    /// Resolve a settled move direction into a behavior for `framing`.
    fn settle(framing: Framing, upward: bool, semi: bool) -> Self {
        let broke = matches!(
            (framing, upward),
            (Framing::Resistance, true) | (Framing::Support, false)
        );
        match (broke, semi) {
            (true, false) => Self::Break(framing),
            (true, true) => Self::SemiBreak(framing),
            (false, false) => Self::Reject(framing),
            (false, true) => Self::SemiReject(framing),
        }
    }

    pub fn label(self) -> String {
        match self {
            Self::Break(f) => format!("{}_Break", f.short_label()),
            Self::SemiBreak(f) => format!("{}_Semi_Break", f.short_label()),
            Self::Reject(f) => format!("{0}_{0}", f.short_label()),
            Self::SemiReject(f) => format!("{0}_Semi_{0}", f.short_label()),
            Self::Vibration => "Vibration".to_string(),
            Self::Unknown => String::new(),
        }
    }

    /// Single-glyph marker showing where price went.
    pub fn marker(self) -> &'static str {
        use Framing::*;
        match self {
            Self::Break(Resistance) | Self::Reject(Support) => "↑",
            Self::SemiBreak(Resistance) | Self::SemiReject(Support) => "↗",
            Self::Break(Support) | Self::Reject(Resistance) => "↓",
            Self::SemiBreak(Support) | Self::SemiReject(Resistance) => "↘",
            Self::Vibration => "~",
            Self::Unknown => "",
        }
    }
}

/// First bar (relative to `bars`) whose probing extreme reaches `level`
/// from the other side of the previous bar's opposite extreme.
fn first_crossing(bars: &[Bar], level: f64, framing: Framing) -> Option<usize> {
    let mut prev: Option<f64> = None;

    for (i, bar) in bars.iter().enumerate() {
        let (probe, trailing) = match framing {
            Framing::Resistance => (bar.high, bar.low),
            Framing::Support => (bar.low, bar.high),
        };
        if let Some(pv) = prev {
            if (pv < level && probe >= level) || (pv > level && probe <= level) {
                return Some(i);
            }
        }
        prev = Some(trailing);
    }

    None
}

/// Classify the reaction of price around `level`, walking forward from the
/// bar at (or after) `anchor`.
///
/// From the first crossing the close at a milestone offset decides the
/// behavior; closes in between that escaped the `merge_fraction` band
/// downgrade it to a semi variant or settle a flat milestone. A still
/// ambiguous case looks one more interval ahead before giving up as
/// `Vibration`. No crossing, or no bar at any milestone offset, is `Unknown`.
///
/// A flat milestone with exactly one escape direction settles on the full
/// variant in that direction, not a semi one. This matches the behavior the
/// zone tables have always reported and is intentional.
pub fn classify_behavior(
    series: &Series,
    level: f64,
    anchor: DateTime<Utc>,
    merge_fraction: f64,
    cfg: &FibonacciConfig,
) -> Behavior {
    let Some(anchor_idx) = series.position_at_or_after(anchor) else {
        return Behavior::Unknown;
    };
    let bars = series.bars();
    let framing = Framing::for_level(level, bars[anchor_idx].close);

    let Some(start) = first_crossing(&bars[anchor_idx..], level, framing).map(|i| anchor_idx + i)
    else {
        return Behavior::Unknown;
    };

    let mut forward = cfg.milestone_days;
    let mut milestone = None;
    while forward >= cfg.milestone_floor_days.max(1) && milestone.is_none() {
        milestone = series.position_at_or_after(bars[start].ts + Duration::days(forward));
        forward /= 2;
    }
    let Some(milestone) = milestone else {
        return Behavior::Unknown;
    };

    let thres = level * merge_fraction;
    let interior = bars.get(start + 1..milestone).unwrap_or(&[]);
    let (mut mid_up, mut mid_down) = (false, false);
    for bar in interior {
        if bar.close - level >= thres {
            mid_up = true;
        } else if level - bar.close >= thres {
            mid_down = true;
        }
    }

    let close = bars[milestone].close;
    if close - level >= thres {
        Behavior::settle(framing, true, mid_down)
    } else if level - close >= thres {
        Behavior::settle(framing, false, mid_up)
    } else if mid_up == mid_down {
        match series.position_at_or_after(bars[milestone].ts + Duration::days(forward)) {
            Some(end) if bars[end].close - level >= thres => Behavior::settle(framing, true, true),
            Some(end) if level - bars[end].close >= thres => {
                Behavior::settle(framing, false, true)
            }
            _ => Behavior::Vibration,
        }
    } else {
        Behavior::settle(framing, mid_up, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::test_support::series_from_closes;

    fn cfg() -> FibonacciConfig {
        FibonacciConfig {
            milestone_days: 10,
            milestone_floor_days: 5,
            ..FibonacciConfig::default()
        }
    }

    #[test]
    fn test_settle_maps_direction_to_framing() {
        use Framing::*;
        assert_eq!(Behavior::settle(Resistance, true, false), Behavior::Break(Resistance));
        assert_eq!(Behavior::settle(Resistance, false, false), Behavior::Reject(Resistance));
        assert_eq!(Behavior::settle(Support, false, true), Behavior::SemiBreak(Support));
        assert_eq!(Behavior::settle(Support, true, true), Behavior::SemiReject(Support));
    }

    #[test]
    fn test_labels_and_markers() {
        use Framing::*;
        assert_eq!(Behavior::Break(Resistance).label(), "Res_Break");
        assert_eq!(Behavior::Reject(Support).label(), "Sup_Sup");
        assert_eq!(Behavior::SemiReject(Resistance).label(), "Res_Semi_Res");
        assert_eq!(Behavior::Unknown.label(), "");
        assert_eq!(Behavior::Reject(Support).marker(), "↑");
        assert_eq!(Behavior::Break(Support).marker(), "↓");
    }

    #[test]
    fn test_clean_break_through_resistance() {
        // Rises through 110 on day 5 and keeps going.
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + 2.0 * i as f64).collect();
        let series = series_from_closes(&closes);
        let anchor = series.first().ts;

        let behavior = classify_behavior(&series, 110.0, anchor, 0.01, &cfg());

        assert_eq!(behavior, Behavior::Break(Framing::Resistance));
    }

    #[test]
    fn test_resistance_rejected_after_touch() {
        // Touches 110 on day 5, then falls back well below.
        let mut closes: Vec<f64> = (0..6).map(|i| 100.0 + 2.0 * i as f64).collect();
        closes.extend((0..25).map(|i| 108.0 - i as f64));
        let series = series_from_closes(&closes);
        let anchor = series.first().ts;

        let behavior = classify_behavior(&series, 110.0, anchor, 0.01, &cfg());

        assert_eq!(behavior, Behavior::Reject(Framing::Resistance));
    }

    #[test]
    fn test_support_semi_break_when_price_first_bounced() {
        // Support at 100: cross down, bounce above the band, then end below.
        let mut closes = vec![110.0, 106.0, 102.0, 99.0];
        closes.extend([103.0, 104.0, 103.0]);
        closes.extend((0..20).map(|i| 97.0 - i as f64 * 0.5));
        let series = series_from_closes(&closes);
        let anchor = series.first().ts;

        let behavior = classify_behavior(&series, 100.0, anchor, 0.01, &cfg());

        assert_eq!(behavior, Behavior::SemiBreak(Framing::Support));
    }

    #[test]
    fn test_flat_after_crossing_is_vibration() {
        let mut closes = vec![95.0, 97.0, 100.5];
        closes.extend(std::iter::repeat_n(100.2, 30));
        let series = series_from_closes(&closes);
        let anchor = series.first().ts;

        let behavior = classify_behavior(&series, 100.0, anchor, 0.01, &cfg());

        assert_eq!(behavior, Behavior::Vibration);
    }

    #[test]
    fn test_never_crossed_is_unknown() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + i as f64 * 0.1).collect();
        let series = series_from_closes(&closes);
        let anchor = series.first().ts;

        assert_eq!(
            classify_behavior(&series, 200.0, anchor, 0.01, &cfg()),
            Behavior::Unknown
        );
    }

    #[test]
    fn test_crossing_too_close_to_series_end_is_unknown() {
        let closes = vec![100.0, 105.0, 111.0, 112.0];
        let series = series_from_closes(&closes);
        let anchor = series.first().ts;

        assert_eq!(
            classify_behavior(&series, 110.0, anchor, 0.01, &cfg()),
            Behavior::Unknown
        );
    }
}
