pub mod backtest;
pub mod config;
pub mod dashboard;
pub mod data;
pub mod error;
pub mod fibonacci;
pub mod indicators;
pub mod output;
pub mod report;
pub mod signal;
pub mod zigzag;
