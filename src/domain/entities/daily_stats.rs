//! Per-user per-day trading rollup and its lock state machine.
//!
//! A day is Open until the loss cap is breached, then Locked. Locking is
//! one-way within the day; the only path back to Open is the stale-lock
//! reconciliation, which fires when the live trade count for the day has
//! dropped to zero (out-of-band deletions). The next calendar day starts
//! Open implicitly because it is a different aggregate row.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::pnl::ProfitLoss;

/// Rollup of one user's trading day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyStats {
    pub user_id: String,
    pub date: NaiveDate,
    pub total_trades: u32,
    pub total_profit: f64,
    pub total_loss: f64,
    pub net_result: f64,
    pub is_locked: bool,
}

impl DailyStats {
    /// Zeroed aggregate for a day with no recorded trades yet.
    pub fn empty(user_id: &str, date: NaiveDate) -> Self {
        DailyStats {
            user_id: user_id.to_string(),
            date,
            total_trades: 0,
            total_profit: 0.0,
            total_loss: 0.0,
            net_result: 0.0,
            is_locked: false,
        }
    }

    /// Fold one admitted trade into the rollup.
    pub fn apply_trade(&mut self, profit_loss: ProfitLoss) {
        self.total_trades += 1;
        if profit_loss.is_profit() {
            self.total_profit += profit_loss.value();
        } else if profit_loss.is_loss() {
            self.total_loss += profit_loss.abs();
        }
        self.net_result += profit_loss.value();
    }

    /// Lock the day, recording the loss that tripped the cap.
    pub fn lock(&mut self, total_loss: f64) {
        self.is_locked = true;
        self.total_loss = total_loss;
    }

    /// Self-heal a stale lock: locked with zero live trades is a state that
    /// should be impossible (it means every trade behind the lock was deleted
    /// out of band), so clear the lock and zero the accumulators. Returns
    /// true if a correction was applied.
    ///
    /// Must run before every admission decision.
    pub fn reconcile_stale_lock(&mut self, live_trade_count: u32) -> bool {
        if self.is_locked && live_trade_count == 0 {
            self.is_locked = false;
            self.total_trades = 0;
            self.total_profit = 0.0;
            self.total_loss = 0.0;
            self.net_result = 0.0;
            true
        } else {
            false
        }
    }
}

/// Half-open UTC interval covering a calendar day: [midnight, next midnight).
pub fn day_bounds(date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN));
    let end = start + chrono::Duration::days(1);
    (start, end)
}
