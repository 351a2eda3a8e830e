use serde::{Deserialize, Serialize};

use crate::domain::errors::RiskError;

/// Per-user risk configuration and account balance.
///
/// `current_balance` is mutated by realized P/L on every admitted or deleted
/// trade. Editing `starting_balance` is an explicit account reset and snaps
/// `current_balance` back to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSettings {
    pub user_id: String,
    /// Maximum risk per trade, percent of current balance.
    pub max_risk_per_trade: f64,
    /// Daily loss cap, percent of current balance. Breaching it locks the day.
    pub max_daily_loss: f64,
    pub max_trades_per_day: u32,
    pub starting_balance: f64,
    pub current_balance: f64,
}

/// Caller-editable subset of the settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsUpdate {
    pub max_risk_per_trade: f64,
    pub max_daily_loss: f64,
    pub max_trades_per_day: u32,
    pub starting_balance: f64,
}

impl UserSettings {
    pub const DEFAULT_MAX_RISK_PER_TRADE: f64 = 2.0;
    pub const DEFAULT_MAX_DAILY_LOSS: f64 = 4.0;
    pub const DEFAULT_MAX_TRADES_PER_DAY: u32 = 5;
    pub const DEFAULT_STARTING_BALANCE: f64 = 100.0;

    /// Settings created at user registration.
    pub fn defaults(user_id: &str) -> Self {
        UserSettings {
            user_id: user_id.to_string(),
            max_risk_per_trade: Self::DEFAULT_MAX_RISK_PER_TRADE,
            max_daily_loss: Self::DEFAULT_MAX_DAILY_LOSS,
            max_trades_per_day: Self::DEFAULT_MAX_TRADES_PER_DAY,
            starting_balance: Self::DEFAULT_STARTING_BALANCE,
            current_balance: Self::DEFAULT_STARTING_BALANCE,
        }
    }
}

impl SettingsUpdate {
    pub fn validate(&self) -> Result<(), RiskError> {
        if !(self.max_risk_per_trade.is_finite() && self.max_risk_per_trade > 0.0) {
            return Err(RiskError::validation(
                "maxRiskPerTrade",
                "must be positive",
            ));
        }
        if !(self.max_daily_loss.is_finite() && self.max_daily_loss > 0.0) {
            return Err(RiskError::validation("maxDailyLoss", "must be positive"));
        }
        if self.max_trades_per_day < 1 {
            return Err(RiskError::validation(
                "maxTradesPerDay",
                "must be at least 1",
            ));
        }
        if !(self.starting_balance.is_finite() && self.starting_balance > 0.0) {
            return Err(RiskError::validation(
                "startingBalance",
                "must be positive",
            ));
        }
        Ok(())
    }

    /// Whether applying this update resets the account balance.
    pub fn resets_balance(&self, current: &UserSettings) -> bool {
        self.starting_balance != current.starting_balance
    }
}
