use serde::Serialize;

use crate::data::Series;
use crate::error::BacktestError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PositionSide {
    Long,
    Short,
}

impl PositionSide {
    /// Long for a positive direction, Short for a negative one.
    pub fn from_direction(direction: i8) -> Option<Self> {
        match direction.signum() {
            1 => Some(Self::Long),
            -1 => Some(Self::Short),
            _ => None,
        }
    }

    pub fn sign(self) -> f64 {
        match self {
            Self::Long => 1.0,
            Self::Short => -1.0,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Long => "Long",
            Self::Short => "Short",
        }
    }
}

pub trait Backtester {
    type Output;
    fn run_backtest(&self, series: &Series) -> Result<Self::Output, BacktestError>;
}

/// `numerator / denominator`, or 0 when there is nothing to divide by.
pub fn rate(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        return 0.0;
    }
    numerator as f64 / denominator as f64
}

/// `(prod(1 + r / 100) - 1) * 100` over percentage returns.
pub fn compounded_return_pct<I>(returns_pct: I) -> f64
where
    I: IntoIterator<Item = f64>,
{
    let growth = returns_pct
        .into_iter()
        .fold(1.0, |acc, r| acc * (1.0 + r / 100.0));
    (growth - 1.0) * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_direction() {
        assert_eq!(PositionSide::from_direction(1), Some(PositionSide::Long));
        assert_eq!(PositionSide::from_direction(-1), Some(PositionSide::Short));
        assert_eq!(PositionSide::from_direction(0), None);
    }

    #[test]
    fn test_rate_guards_zero_denominator() {
        assert_eq!(rate(3, 0), 0.0);
        assert_eq!(rate(1, 4), 0.25);
    }

    #[test]
    fn test_compounded_return_pct() {
        // 1.10 * 0.95 = 1.045
        let r = compounded_return_pct([10.0, -5.0]);
        assert!((r - 4.5).abs() < 1e-9);
        assert_eq!(compounded_return_pct(Vec::<f64>::new()), 0.0);
    }
}
