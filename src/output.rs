use crate::backtest::{FibonacciBacktestResult, TrendlineBacktestResult};
use crate::dashboard::SymbolSummary;
use crate::fibonacci::ExtensionAnalysis;
use crate::signal::TrendlineAnalysis;

pub fn print_extension_analysis(analysis: &ExtensionAnalysis) {
    println!("Anchor date:             {}", analysis.anchor.format("%Y-%m-%d"));
    println!("Current price:           {:.4}", analysis.current_price);
    println!("Pivots detected:         {}", analysis.pivots.len());
    println!("Downfalls used:          {}", analysis.downfalls.len());
    println!("Extension zones:         {}", analysis.zones.len());

    for zone in &analysis.zones {
        let width = zone
            .group
            .width_pct()
            .map(|w| format!("{w:.2}%"))
            .unwrap_or_default();
        println!(
            "  #{:<3} {:>12.4} {:<10} {:>7} {:<2} {}",
            zone.id,
            zone.price(),
            zone.behavior.label(),
            width,
            zone.behavior.marker(),
            zone.group.describe()
        );
    }
}

pub fn print_trendline_analysis(analysis: &TrendlineAnalysis) {
    println!("Level:                   {}", analysis.level);
    println!("Pivot window:            {}", analysis.window);
    println!("Back candles:            {}", analysis.backcandles);
    match analysis.stop_fraction {
        Some(s) => println!("ATR stop:                {:.2}%", s * 100.0),
        None => println!("ATR stop:                n/a"),
    }
    println!("Breakouts:               {}", analysis.breakouts.len());

    for event in &analysis.breakouts {
        let channel = event
            .channel
            .map(|c| format!("slope {:.4}, r2 {:.3}, {} pts", c.slope, c.r_squared, c.points))
            .unwrap_or_default();
        println!(
            "  {} {:?} close {:.4} {}",
            event.ts.format("%Y-%m-%d"),
            event.signal,
            event.close,
            channel
        );
    }
}

pub fn print_fibonacci_backtest(result: &FibonacciBacktestResult) {
    println!("Trades:                  {}", result.trades.len());
    println!("Success rate:            {:.1}%", result.success_rate * 100.0);
    println!("Cumulative profit:       {:.2}%", result.cum_profit * 100.0);
    println!("Zone touches on signals: {}", result.level_touches);
    if let Some(pos) = &result.open_position {
        println!(
            "Open position:           {} since {} at {:.4}",
            pos.side.label(),
            pos.entry_time.format("%Y-%m-%d"),
            pos.entry_price
        );
    }
}

pub fn print_trendline_backtest(result: &TrendlineBacktestResult) {
    println!("Trades:                  {}", result.trades.len());
    println!("Success rate:            {:.1}%", result.success_rate_pct);
    println!("Overall return:          {:.2}%", result.overall_return_pct);
    if let Some(s) = result.stop_fraction {
        println!("ATR stop:                {:.2}%", s * 100.0);
    }
}

pub fn print_dashboard(summaries: &[SymbolSummary]) {
    println!("{:<10} {:<11} {:>14} {:>14}", "Symbol", "State", "Current Price", "New Highest");
    for s in summaries {
        let state = if s.bullish { "↑ Bullish" } else { "↓ Bearish" };
        let high = s
            .new_highest
            .map(|h| format!("√ {h:.4}"))
            .unwrap_or_default();
        println!("{:<10} {:<11} {:>14.4} {:>14}", s.symbol, state, s.current_price, high);
    }
}
