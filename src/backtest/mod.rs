mod common;
pub mod fibonacci;
pub mod trendline;

pub use common::{Backtester, PositionSide, compounded_return_pct, rate};
pub use fibonacci::{FibonacciBacktester, FibonacciBacktestResult, FibonacciTrade};
pub use trendline::{TrendlineBacktestResult, TrendlineBacktester, TrendlineTrade};
