pub mod atr;
pub mod breakout;
pub mod channel;
pub mod pivot;

pub use atr::{atr, stop_fraction};
pub use breakout::{BreakoutSignal, detect_breakout, evaluate_breakout};
pub use channel::{Channel, Channels, LinearFit, fit_channels, linear_regression};
pub use pivot::{PivotKind, classify_pivot, classify_pivots};
