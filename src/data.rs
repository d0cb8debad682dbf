use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::ops::Range;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};

use crate::error::SeriesError;

#[derive(Debug, Deserialize)]
pub struct OhlcvRow {
    #[serde(alias = "timestamp", alias = "Datetime")]
    #[serde(rename = "Date")]
    pub date: String,
    #[serde(rename = "Open")]
    pub open: f64,
    #[serde(rename = "High")]
    pub high: f64,
    #[serde(rename = "Low")]
    pub low: f64,
    #[serde(rename = "Close")]
    pub close: f64,
    #[serde(rename = "Volume")]
    pub volume: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bar {
    pub ts: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// +1 for a bullish candle, -1 for a bearish one, 0 for a doji.
    pub fn direction(&self) -> i8 {
        if self.close > self.open {
            1
        } else if self.close < self.open {
            -1
        } else {
            0
        }
    }

    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }
}

/// Sampling interval of a bar series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interval {
    #[default]
    Daily,
    Weekly,
    Monthly,
}

impl FromStr for Interval {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "1d" | "daily" => Ok(Self::Daily),
            "1wk" | "weekly" => Ok(Self::Weekly),
            "1mo" | "monthly" => Ok(Self::Monthly),
            other => Err(format!("unknown interval: {other} (expected 1d, 1wk or 1mo)")),
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Daily => "1d",
            Self::Weekly => "1wk",
            Self::Monthly => "1mo",
        };
        f.write_str(s)
    }
}

/// A validated, non-empty bar series with strictly increasing timestamps
/// and positive prices.
#[derive(Debug, Clone)]
pub struct Series {
    bars: Vec<Bar>,
}

impl Series {
    pub fn new(bars: Vec<Bar>) -> Result<Self, SeriesError> {
        if bars.is_empty() {
            return Err(SeriesError::Empty);
        }
        for (index, bar) in bars.iter().enumerate() {
            let prices = [bar.open, bar.high, bar.low, bar.close];
            if prices.iter().any(|p| !p.is_finite() || *p <= 0.0) {
                return Err(SeriesError::InvalidPrice { index });
            }
            if index > 0 && bar.ts <= bars[index - 1].ts {
                return Err(SeriesError::NonIncreasingTimestamp { index });
            }
        }
        Ok(Self { bars })
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn first(&self) -> &Bar {
        &self.bars[0]
    }

    pub fn last(&self) -> &Bar {
        &self.bars[self.bars.len() - 1]
    }

    /// Index of the first bar at or after `ts`, `None` past the end.
    pub fn position_at_or_after(&self, ts: DateTime<Utc>) -> Option<usize> {
        let idx = self.bars.partition_point(|b| b.ts < ts);
        (idx < self.bars.len()).then_some(idx)
    }

    /// Indices of the bars with `start <= ts <= end`.
    pub fn range_inclusive(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Range<usize> {
        let lo = self.bars.partition_point(|b| b.ts < start);
        let hi = self.bars.partition_point(|b| b.ts <= end);
        lo..hi.max(lo)
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    let date_part = raw.get(..10).unwrap_or(raw);
    let date = NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .with_context(|| format!("failed to parse timestamp: {raw}"))?;
    Ok(date.and_time(chrono::NaiveTime::MIN).and_utc())
}

/// Read OHLCV bars from CSV with a `Date,Open,High,Low,Close,Volume` header.
pub fn read_bars<R: Read>(reader: R) -> Result<Vec<Bar>> {
    let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(reader);

    let mut bars: Vec<Bar> = Vec::new();

    for result in rdr.deserialize::<OhlcvRow>() {
        let row: OhlcvRow = result.with_context(|| "failed to deserialize CSV row")?;
        bars.push(Bar {
            ts: parse_timestamp(&row.date)?,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
        });
    }
    Ok(bars)
}

pub fn get_bars_from_input_file(input: &Path) -> Result<Vec<Bar>> {
    let file =
        File::open(input).with_context(|| format!("failed to open input file: {:?}", input))?;
    read_bars(file)
}

/// Load bars from a CSV file, resample them to `interval` and validate.
/// Input is assumed to be daily.
pub fn load_series(input: &Path, interval: Interval) -> Result<Series> {
    let bars = get_bars_from_input_file(input)?;
    let bars = match interval {
        Interval::Daily => bars,
        _ => resample(&bars, interval),
    };
    Series::new(bars).with_context(|| format!("invalid bar series in {:?}", input))
}

fn bucket_start(ts: DateTime<Utc>, interval: Interval) -> NaiveDate {
    let date = ts.date_naive();
    match interval {
        Interval::Daily => date,
        Interval::Weekly => date - Duration::days(date.weekday().num_days_from_monday() as i64),
        Interval::Monthly => date.with_day(1).unwrap_or(date),
    }
}

/// Aggregate bars into `interval` buckets (weeks start on Monday).
/// Each bucket keeps the first open, the extreme high/low, the last close,
/// the summed volume and the timestamp of its last bar.
pub fn resample(bars: &[Bar], interval: Interval) -> Vec<Bar> {
    let mut buckets: BTreeMap<NaiveDate, Bar> = BTreeMap::new();

    for bar in bars {
        buckets
            .entry(bucket_start(bar.ts, interval))
            .and_modify(|agg| {
                agg.ts = bar.ts;
                agg.high = agg.high.max(bar.high);
                agg.low = agg.low.min(bar.low);
                agg.close = bar.close;
                agg.volume += bar.volume;
            })
            .or_insert(*bar);
    }

    buckets.into_values().collect()
}
