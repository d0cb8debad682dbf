use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::Serialize;

use crate::data::Series;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymbolSummary {
    pub symbol: String,
    pub last_ts: DateTime<Utc>,
    /// Last close at or above last open.
    pub bullish: bool,
    pub current_price: f64,
    /// The last high, when every earlier high is strictly below it.
    pub new_highest: Option<f64>,
}

pub fn summarize(symbol: &str, series: &Series) -> SymbolSummary {
    let last = series.last();
    let bars = series.bars();
    let earlier = &bars[..bars.len() - 1];
    let new_highest = earlier
        .iter()
        .all(|b| b.high < last.high)
        .then_some(last.high);

    SymbolSummary {
        symbol: symbol.to_string(),
        last_ts: last.ts,
        bullish: last.close >= last.open,
        current_price: last.close,
        new_highest,
    }
}

/// Summaries for many symbols, computed in parallel and returned in input order.
pub fn summarize_all(series: &[(String, Series)]) -> Vec<SymbolSummary> {
    series
        .par_iter()
        .map(|(symbol, s)| summarize(symbol, s))
        .collect()
}
