//! Database Models
//!
//! Row-level structures for settings, trades, and daily stats. Enum fields
//! are stored as their canonical string forms and parsed back into the
//! closed domain enums on the way out; a parse failure means a corrupt row
//! and surfaces as a query error.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::DatabaseError;
use crate::domain::entities::daily_stats::DailyStats;
use crate::domain::entities::settings::UserSettings;
use crate::domain::entities::trade::{Checklist, Trade};
use crate::domain::value_objects::rr::RewardRatio;

/// User settings row
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SettingsRecord {
    pub user_id: String,
    pub max_risk_per_trade: f64,
    pub max_daily_loss: f64,
    pub max_trades_per_day: i64,
    pub starting_balance: f64,
    pub current_balance: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SettingsRecord {
    pub fn into_settings(self) -> UserSettings {
        UserSettings {
            user_id: self.user_id,
            max_risk_per_trade: self.max_risk_per_trade,
            max_daily_loss: self.max_daily_loss,
            max_trades_per_day: self.max_trades_per_day.max(0) as u32,
            starting_balance: self.starting_balance,
            current_balance: self.current_balance,
        }
    }
}

/// Trade row
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TradeRecord {
    pub id: String,
    pub user_id: String,
    pub trade_date: DateTime<Utc>,
    pub pair: String,
    pub session: String,
    pub timeframe: String,
    pub direction: String,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: Option<f64>,
    pub lot_size: f64,
    pub risk_percent: f64,
    /// NULL means no target was set, distinct from a stored 0.0.
    pub rr_ratio: Option<f64>,
    pub result: String,
    pub profit_loss: f64,
    pub notes: Option<String>,
    pub trend_aligned: bool,
    pub entry_at_key_level: bool,
    pub stop_loss_defined: bool,
    pub rr_above_minimum: bool,
    pub risk_within_limit: bool,
    pub created_at: DateTime<Utc>,
}

impl TradeRecord {
    pub fn into_trade(self) -> Result<Trade, DatabaseError> {
        let corrupt = |field: &str, value: &str| {
            DatabaseError::QueryError(format!("Corrupt {} value '{}' in trades row", field, value))
        };

        Ok(Trade {
            session: self
                .session
                .parse()
                .map_err(|_| corrupt("session", &self.session))?,
            timeframe: self
                .timeframe
                .parse()
                .map_err(|_| corrupt("timeframe", &self.timeframe))?,
            direction: self
                .direction
                .parse()
                .map_err(|_| corrupt("direction", &self.direction))?,
            result: self
                .result
                .parse()
                .map_err(|_| corrupt("result", &self.result))?,
            rr_ratio: match self.rr_ratio {
                Some(r) => RewardRatio::Ratio(r),
                None => RewardRatio::NoTarget,
            },
            checklist: Checklist {
                trend_aligned: self.trend_aligned,
                entry_at_key_level: self.entry_at_key_level,
                stop_loss_defined: self.stop_loss_defined,
                rr_above_minimum: self.rr_above_minimum,
                risk_within_limit: self.risk_within_limit,
            },
            id: self.id,
            user_id: self.user_id,
            trade_date: self.trade_date,
            pair: self.pair,
            entry_price: self.entry_price,
            stop_loss: self.stop_loss,
            take_profit: self.take_profit,
            lot_size: self.lot_size,
            risk_percent: self.risk_percent,
            profit_loss: self.profit_loss,
            notes: self.notes,
        })
    }
}

/// Daily stats row
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DailyStatsRecord {
    pub id: i64,
    pub user_id: String,
    pub date: NaiveDate,
    pub total_trades: i64,
    pub total_profit: f64,
    pub total_loss: f64,
    pub net_result: f64,
    pub is_locked: bool,
}

impl DailyStatsRecord {
    pub fn into_stats(self) -> DailyStats {
        DailyStats {
            user_id: self.user_id,
            date: self.date,
            total_trades: self.total_trades.max(0) as u32,
            total_profit: self.total_profit,
            total_loss: self.total_loss,
            net_result: self.net_result,
            is_locked: self.is_locked,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::trade::{Direction, Session, TradeResult};

    fn record() -> TradeRecord {
        TradeRecord {
            id: "t-1".to_string(),
            user_id: "user-1".to_string(),
            trade_date: Utc::now(),
            pair: "XAUUSD".to_string(),
            session: "New York".to_string(),
            timeframe: "M15".to_string(),
            direction: "Sell".to_string(),
            entry_price: 1.1,
            stop_loss: 1.105,
            take_profit: None,
            lot_size: 0.1,
            risk_percent: 0.5,
            rr_ratio: None,
            result: "Loss".to_string(),
            profit_loss: -5.0,
            notes: Some("late entry".to_string()),
            trend_aligned: true,
            entry_at_key_level: true,
            stop_loss_defined: true,
            rr_above_minimum: true,
            risk_within_limit: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_record_to_trade() {
        let trade = record().into_trade().unwrap();
        assert_eq!(trade.session, Session::NewYork);
        assert_eq!(trade.direction, Direction::Sell);
        assert_eq!(trade.result, TradeResult::Loss);
        assert_eq!(trade.rr_ratio, RewardRatio::NoTarget);
        assert!(trade.checklist.rr_above_minimum);
    }

    #[test]
    fn test_null_rr_maps_to_no_target_not_zero() {
        let mut rec = record();
        rec.rr_ratio = Some(0.0);
        assert_eq!(rec.into_trade().unwrap().rr_ratio, RewardRatio::Ratio(0.0));

        let rec = record();
        assert_eq!(rec.into_trade().unwrap().rr_ratio, RewardRatio::NoTarget);
    }

    #[test]
    fn test_corrupt_enum_rejected() {
        let mut rec = record();
        rec.session = "Sydney".to_string();
        assert!(rec.into_trade().is_err());
    }
}
