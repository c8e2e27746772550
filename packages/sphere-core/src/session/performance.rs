//! Session performance analytics.
//!
//! Realised P&L is measured on each SELL against the running average cost of
//! the long shares the session held at that point. Selling beyond the long
//! inventory realises nothing for the excess.

use super::types::{AiTrade, OrderSide, TradeStatus, TradingPerformance};
use std::collections::HashMap;

/// Outcome of one closing fill.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClosedTrade {
    /// Realised profit or loss in dollars
    pub pnl: f64,
    /// pnl relative to the cost of the closed shares
    pub return_pct: f64,
}

#[derive(Debug, Default, Clone, Copy)]
struct Inventory {
    shares: u64,
    average_cost: f64,
}

/// Walk filled trades in order and collect the closing outcomes.
pub fn closed_trades(trades: &[AiTrade]) -> Vec<ClosedTrade> {
    let mut inventory: HashMap<&str, Inventory> = HashMap::new();
    let mut closed = Vec::new();

    for trade in trades.iter().filter(|t| t.status == TradeStatus::Filled) {
        let held = inventory.entry(trade.symbol.as_str()).or_default();
        match trade.side {
            OrderSide::Buy => {
                let total = held.shares + trade.quantity;
                if total > 0 {
                    held.average_cost = (held.shares as f64 * held.average_cost
                        + trade.quantity as f64 * trade.price)
                        / total as f64;
                }
                held.shares = total;
            }
            OrderSide::Sell => {
                let closing = trade.quantity.min(held.shares);
                if closing == 0 {
                    continue;
                }

                let cost = closing as f64 * held.average_cost;
                let pnl = closing as f64 * (trade.price - held.average_cost);
                closed.push(ClosedTrade {
                    pnl,
                    return_pct: if cost > 0.0 { pnl / cost } else { 0.0 },
                });

                held.shares -= closing;
                if held.shares == 0 {
                    held.average_cost = 0.0;
                }
            }
        }
    }

    closed
}

/// Recompute performance from a session's capital and trade history.
pub fn calculate_performance(
    initial_capital: f64,
    current_capital: f64,
    trades: &[AiTrade],
) -> TradingPerformance {
    let total_trades = trades
        .iter()
        .filter(|t| t.status == TradeStatus::Filled)
        .count();
    let closed = closed_trades(trades);

    let wins: Vec<f64> = closed.iter().map(|c| c.pnl).filter(|p| *p > 0.0).collect();
    let losses: Vec<f64> = closed.iter().map(|c| c.pnl).filter(|p| *p < 0.0).collect();
    let returns: Vec<f64> = closed.iter().map(|c| c.return_pct).collect();
    let pnls: Vec<f64> = closed.iter().map(|c| c.pnl).collect();

    let total_return = if initial_capital > 0.0 {
        ((current_capital - initial_capital) / initial_capital) * 100.0
    } else {
        0.0
    };

    let win_rate = if closed.is_empty() {
        0.0
    } else {
        wins.len() as f64 / closed.len() as f64
    };

    TradingPerformance {
        total_return,
        sharpe_ratio: sharpe_ratio(&returns),
        max_drawdown: max_drawdown(initial_capital, &pnls) * 100.0,
        win_rate,
        total_trades,
        profitable_trades: wins.len(),
        average_win: mean(&wins),
        average_loss: mean(&losses),
    }
}

/// Per-trade Sharpe ratio (mean over standard deviation, no risk-free rate).
///
/// Returns 0 with fewer than two returns or no dispersion.
pub fn sharpe_ratio(returns: &[f64]) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let std = variance.sqrt();

    if std <= 0.0 {
        return 0.0;
    }

    mean / std
}

/// Largest peak-to-trough decline of `initial + cumulative pnl`, as a
/// decimal (0.15 for 15%).
pub fn max_drawdown(initial_capital: f64, pnls: &[f64]) -> f64 {
    if initial_capital <= 0.0 {
        return 0.0;
    }

    let mut equity = initial_capital;
    let mut peak = initial_capital;
    let mut max_drawdown = 0.0;

    for pnl in pnls {
        equity += pnl;
        if equity > peak {
            peak = equity;
        }
        let drawdown = (peak - equity) / peak;
        if drawdown > max_drawdown {
            max_drawdown = drawdown;
        }
    }

    max_drawdown
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::DataSource;
    use crate::session::types::{SignalAction, TradingSignal};
    use approx::assert_relative_eq;

    fn fill(symbol: &str, side: OrderSide, quantity: u64, price: f64) -> AiTrade {
        let action = match side {
            OrderSide::Buy => SignalAction::Buy,
            OrderSide::Sell => SignalAction::Sell,
        };
        let signal = TradingSignal::new(symbol, action, 0.8, "test");
        AiTrade::filled(&signal, side, quantity, price, DataSource::Live)
    }

    #[test]
    fn test_empty_history() {
        let perf = calculate_performance(10_000.0, 10_000.0, &[]);
        assert_eq!(perf, TradingPerformance::default());
    }

    #[test]
    fn test_only_buys_have_no_outcomes() {
        let trades = vec![fill("AAPL", OrderSide::Buy, 10, 150.0)];
        let perf = calculate_performance(10_000.0, 8_500.0, &trades);

        assert_eq!(perf.total_trades, 1);
        assert_eq!(perf.profitable_trades, 0);
        assert_eq!(perf.win_rate, 0.0);
        assert_relative_eq!(perf.total_return, -15.0);
        assert!(!perf.sharpe_ratio.is_nan());
    }

    #[test]
    fn test_wins_and_losses() {
        let trades = vec![
            fill("AAPL", OrderSide::Buy, 10, 100.0),
            fill("AAPL", OrderSide::Buy, 10, 120.0), // avg 110
            fill("AAPL", OrderSide::Sell, 5, 130.0), // +100
            fill("TSLA", OrderSide::Buy, 4, 250.0),
            fill("TSLA", OrderSide::Sell, 4, 200.0), // -200
        ];
        let closed = closed_trades(&trades);
        assert_eq!(closed.len(), 2);
        assert_relative_eq!(closed[0].pnl, 100.0);
        assert_relative_eq!(closed[1].pnl, -200.0);

        let perf = calculate_performance(10_000.0, 9_900.0, &trades);
        assert_eq!(perf.total_trades, 5);
        assert_eq!(perf.profitable_trades, 1);
        assert_relative_eq!(perf.win_rate, 0.5);
        assert_relative_eq!(perf.average_win, 100.0);
        assert_relative_eq!(perf.average_loss, -200.0);
        // equity 10000 -> 10100 -> 9900
        assert_relative_eq!(perf.max_drawdown, 200.0 / 10_100.0 * 100.0, epsilon = 1e-9);
    }

    #[test]
    fn test_sell_beyond_inventory() {
        let trades = vec![
            fill("NVDA", OrderSide::Sell, 10, 450.0),
            fill("NVDA", OrderSide::Buy, 2, 400.0),
            fill("NVDA", OrderSide::Sell, 5, 420.0),
        ];
        let closed = closed_trades(&trades);

        assert_eq!(closed.len(), 1);
        assert_relative_eq!(closed[0].pnl, 40.0);
    }

    #[test]
    fn test_non_filled_trades_ignored() {
        let mut rejected = fill("AAPL", OrderSide::Buy, 10, 100.0);
        rejected.status = TradeStatus::Rejected;
        let trades = vec![rejected, fill("AAPL", OrderSide::Sell, 10, 120.0)];

        let perf = calculate_performance(10_000.0, 10_000.0, &trades);
        assert_eq!(perf.total_trades, 1);
        assert_eq!(perf.profitable_trades, 0);
    }

    #[test]
    fn test_sharpe_ratio() {
        assert_eq!(sharpe_ratio(&[0.1]), 0.0);
        assert_eq!(sharpe_ratio(&[0.05, 0.05, 0.05]), 0.0);
        assert!(sharpe_ratio(&[0.1, 0.05, 0.2]) > 0.0);
        assert!(sharpe_ratio(&[-0.1, -0.05, -0.2]) < 0.0);
    }

    #[test]
    fn test_max_drawdown() {
        assert_eq!(max_drawdown(1000.0, &[]), 0.0);
        assert_eq!(max_drawdown(1000.0, &[10.0, 20.0]), 0.0);
        assert_relative_eq!(max_drawdown(1000.0, &[-100.0, 50.0, -200.0]), 0.25);
        assert_eq!(max_drawdown(0.0, &[-100.0]), 0.0);
    }

    #[test]
    fn test_recompute_is_stable() {
        let trades = vec![
            fill("AAPL", OrderSide::Buy, 10, 100.0),
            fill("AAPL", OrderSide::Sell, 10, 110.0),
        ];
        let first = calculate_performance(10_000.0, 10_100.0, &trades);
        let second = calculate_performance(10_000.0, 10_100.0, &trades);
        assert_eq!(first, second);
    }
}
