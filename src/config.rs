use std::path::PathBuf;

use serde::Deserialize;

use crate::data::Interval;
use crate::error::ConfigError;

/// Every tunable constant of the analysis core, passed explicitly into each
/// component.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub zigzag: ZigZagConfig,
    pub fibonacci: FibonacciConfig,
    pub trendline: TrendlineConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ZigZagConfig {
    /// Length of each backward scan window, in days.
    pub window_days: i64,
    /// Gap left between the anchor date and the first window, in days.
    pub padding_days: i64,
    /// Maximum number of merge passes over the pivot list.
    pub merge_passes: usize,
    /// Four pivots spanning this many days or more are never merged.
    pub merge_duration_days: i64,
    /// Inner swing must be smaller than `ratio * outer swing` to collapse.
    pub merge_value_ratio: f64,
}

impl Default for ZigZagConfig {
    fn default() -> Self {
        Self {
            window_days: 30,
            padding_days: 1,
            merge_passes: 5,
            merge_duration_days: 100,
            merge_value_ratio: 0.5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FibonacciConfig {
    /// Minimum drop of a downfall, as a fraction of the high price.
    pub min_downfall: f64,
    /// Extension ratios, ascending.
    pub ratios: Vec<f64>,
    /// Levels above `ceiling_factor * current close` are suppressed.
    pub ceiling_factor: f64,
    /// Forward offset (days) used to judge behavior after a crossing.
    pub milestone_days: i64,
    /// The milestone offset is halved down to this floor when no bar exists.
    pub milestone_floor_days: i64,
    /// Minimum holding duration before a position may be closed, in days.
    pub min_hold_days: i64,
    /// Number of recent downfall pairs to project from.
    pub pivot_count: usize,
    /// Relative distance under which levels are clustered together.
    pub merge_fraction: f64,
}

impl Default for FibonacciConfig {
    fn default() -> Self {
        Self {
            min_downfall: 0.05,
            ratios: vec![
                0.236, 0.382, 0.5, 0.618, 0.786, 1.0, 1.236, 1.382, 1.5, 1.618, 1.786, 2.0, 2.618,
                3.618, 4.236,
            ],
            ceiling_factor: 2.0,
            milestone_days: 15,
            milestone_floor_days: 5,
            min_hold_days: 7,
            pivot_count: 5,
            merge_fraction: 0.01,
        }
    }
}

impl FibonacciConfig {
    /// Directional-candle queue length: daily data needs four agreeing candles.
    pub fn sign_queue_len(&self, interval: Interval) -> usize {
        match interval {
            Interval::Daily => 4,
            Interval::Weekly | Interval::Monthly => 1,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrendlineConfig {
    /// Pivot-window scales tested by the backtest.
    pub levels: Vec<usize>,
    /// Pivot window = `window_factor * level`.
    pub window_factor: usize,
    /// Channel look-back = `backcandles_factor * window`.
    pub backcandles_factor: usize,
    pub min_r_squared: f64,
    /// Only the most recent pivots of each kind enter a channel fit.
    pub max_fit_points: usize,
    pub atr_period: usize,
    pub atr_multiplier: f64,
}

impl Default for TrendlineConfig {
    fn default() -> Self {
        Self {
            levels: vec![2, 4, 6, 8, 10],
            window_factor: 3,
            backcandles_factor: 10,
            min_r_squared: 0.85,
            max_fit_points: 4,
            atr_period: 14,
            atr_multiplier: 2.0,
        }
    }
}

impl TrendlineConfig {
    pub fn window(&self, level: usize) -> usize {
        self.window_factor * level
    }

    pub fn backcandles(&self, level: usize) -> usize {
        self.backcandles_factor * self.window(level)
    }
}

impl AnalysisConfig {
    pub fn load(path: PathBuf) -> Result<Self, ConfigError> {
        let filename = path
            .into_os_string()
            .into_string()
            .map_err(|_| ConfigError::FilePathIntoString)?;
        let config: Self = config::Config::builder()
            .add_source(config::File::with_name(&filename))
            .build()
            .map_err(|err| ConfigError::SettingsInit(err.to_string()))?
            .try_deserialize()
            .map_err(|err| ConfigError::Deserialize(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would stall a scan.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks = [
            (self.zigzag.window_days > 0, "zigzag.window_days must be positive"),
            (self.zigzag.padding_days >= 0, "zigzag.padding_days must not be negative"),
            (
                self.fibonacci.milestone_floor_days > 0,
                "fibonacci.milestone_floor_days must be positive",
            ),
            (
                self.fibonacci.milestone_days >= self.fibonacci.milestone_floor_days,
                "fibonacci.milestone_days must not be below milestone_floor_days",
            ),
            (self.fibonacci.min_hold_days >= 0, "fibonacci.min_hold_days must not be negative"),
            (self.trendline.window_factor > 0, "trendline.window_factor must be positive"),
            (self.trendline.atr_period > 0, "trendline.atr_period must be positive"),
        ];
        match checks.iter().find(|(ok, _)| !ok) {
            Some((_, msg)) => Err(ConfigError::Invalid((*msg).to_string())),
            None => Ok(()),
        }
    }

    /// Load from `path` when given, otherwise use the defaults.
    pub fn load_or_default(path: Option<PathBuf>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }
}
