use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Rejection taxonomy for the risk engine.
///
/// Every admission failure is returned as a structured value, never raised as
/// a panic. Display strings are caller-facing and safe to show verbatim.
#[derive(Debug, Error, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "details")]
pub enum RiskError {
    #[error("User settings not found. Please configure your account first.")]
    ConfigurationMissing,

    #[error("Daily loss limit exceeded: ${daily_loss:.2} ({daily_loss_percent:.2}% of balance). Trading is locked for today.")]
    DailyLossLimitExceeded {
        daily_loss: f64,
        daily_loss_percent: f64,
    },

    #[error("Maximum trades per day ({limit}) reached.")]
    MaxTradesReached { count: u32, limit: u32 },

    #[error("{field}: {message}")]
    ValidationError { field: String, message: String },

    #[error("Risk:Reward ratio ({ratio:.2}) is below minimum ({minimum}:1). Check the RR confirmation.")]
    RewardRatioTooLow { ratio: f64, minimum: f64 },

    #[error("Risk per trade ({risk_percent:.2}%) exceeds maximum allowed ({max_risk}%).")]
    RiskPerTradeTooHigh { risk_percent: f64, max_risk: f64 },

    #[error("Please complete the pre-trade checklist before submitting.")]
    ChecklistIncomplete,

    #[error("Trade not found.")]
    NotFound,

    #[error("Unauthorized.")]
    Unauthorized,

    /// Storage-layer failure. The underlying cause is logged, not surfaced.
    #[error("Internal storage error.")]
    Persistence(String),
}

impl RiskError {
    pub fn validation(field: &str, message: &str) -> Self {
        RiskError::ValidationError {
            field: field.to_string(),
            message: message.to_string(),
        }
    }
}
