//! Performance metrics over the trade history.
//!
//! All functions are pure folds over trades supplied in date-ascending order;
//! the storage layer guarantees the ordering.

use chrono::NaiveDate;
use serde::Serialize;

use crate::domain::entities::trade::{Trade, TradeResult};

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Rolled-up P/L for a single day's trades.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DailyPl {
    pub total_profit: f64,
    pub total_loss: f64,
    pub net_result: f64,
    pub trades_count: usize,
}

/// Lifetime performance summary.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PerformanceMetrics {
    pub total_trades: usize,
    pub win_rate: f64,
    pub average_rr: f64,
    pub total_profit: f64,
    pub total_loss: f64,
    pub net_profit: f64,
    pub profit_factor: f64,
    pub max_drawdown: f64,
    pub total_wins: usize,
    pub total_losses: usize,
}

/// One point on the cumulative equity curve.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EquityPoint {
    pub date: Option<NaiveDate>,
    pub pnl: f64,
    pub index: usize,
}

/// Sum a day's trades into profit, loss, and net.
pub fn daily_pl(trades: &[Trade]) -> DailyPl {
    let total_profit: f64 = trades
        .iter()
        .filter(|t| t.profit_loss > 0.0)
        .map(|t| t.profit_loss)
        .sum();
    let total_loss: f64 = trades
        .iter()
        .filter(|t| t.profit_loss < 0.0)
        .map(|t| t.profit_loss.abs())
        .sum();
    DailyPl {
        total_profit,
        total_loss,
        net_result: total_profit - total_loss,
        trades_count: trades.len(),
    }
}

/// Lifetime metrics over all trades, date ascending.
pub fn performance_metrics(trades: &[Trade]) -> PerformanceMetrics {
    if trades.is_empty() {
        return PerformanceMetrics::default();
    }

    let wins = trades.iter().filter(|t| t.result == TradeResult::Win).count();
    let losses = trades
        .iter()
        .filter(|t| t.result == TradeResult::Loss)
        .count();
    let win_rate = wins as f64 / trades.len() as f64 * 100.0;

    // A trade without a target contributes 0 to the average.
    let average_rr =
        trades.iter().map(|t| t.rr_ratio.numeric()).sum::<f64>() / trades.len() as f64;

    let total_profit: f64 = trades
        .iter()
        .filter(|t| t.profit_loss > 0.0)
        .map(|t| t.profit_loss)
        .sum();
    let total_loss: f64 = trades
        .iter()
        .filter(|t| t.profit_loss < 0.0)
        .map(|t| t.profit_loss.abs())
        .sum();

    let profit_factor = if total_loss > 0.0 {
        total_profit / total_loss
    } else {
        total_profit
    };

    // Max drawdown over the cumulative equity path.
    let mut peak = 0.0_f64;
    let mut max_drawdown = 0.0_f64;
    let mut equity = 0.0_f64;
    for trade in trades {
        equity += trade.profit_loss;
        if equity > peak {
            peak = equity;
        }
        let drawdown = peak - equity;
        if drawdown > max_drawdown {
            max_drawdown = drawdown;
        }
    }

    PerformanceMetrics {
        total_trades: trades.len(),
        win_rate: round2(win_rate),
        average_rr: round2(average_rr),
        total_profit,
        total_loss,
        net_profit: total_profit - total_loss,
        profit_factor: round2(profit_factor),
        max_drawdown,
        total_wins: wins,
        total_losses: losses,
    }
}

/// Cumulative P/L per trade, with a baseline point when the history is empty.
pub fn equity_curve(trades: &[Trade]) -> Vec<EquityPoint> {
    if trades.is_empty() {
        return vec![EquityPoint {
            date: None,
            pnl: 0.0,
            index: 0,
        }];
    }

    let mut cumulative = 0.0;
    trades
        .iter()
        .enumerate()
        .map(|(i, t)| {
            cumulative += t.profit_loss;
            EquityPoint {
                date: Some(t.trade_date.date_naive()),
                pnl: cumulative,
                index: i + 1,
            }
        })
        .collect()
}
