//! Risk evaluation service: pure predicates over supplied numbers.
//!
//! Nothing here touches the ledger or the daily rollup, so every rule can be
//! unit-tested in isolation. Override policy (the checklist flags) lives one
//! layer up in the admission pipeline, not here.

use crate::domain::errors::RiskError;
use crate::domain::value_objects::rr::RewardRatio;

/// Default minimum Risk:Reward ratio required for admission.
pub const DEFAULT_MINIMUM_RR: f64 = 2.0;

/// Stateless evaluator for per-trade risk rules.
#[derive(Debug, Clone, Default)]
pub struct RiskEvaluator;

impl RiskEvaluator {
    pub fn new() -> Self {
        Self
    }

    /// Risk percent of a candidate trade: linear dollar risk over balance.
    ///
    /// `abs(entry - stop) * lot_size * 100 / balance * 100`. No rounding here;
    /// rounding is display-only.
    pub fn risk_percent(
        &self,
        entry_price: f64,
        stop_loss: f64,
        lot_size: f64,
        current_balance: f64,
    ) -> f64 {
        let dollar_risk = (entry_price - stop_loss).abs() * lot_size * 100.0;
        dollar_risk / current_balance * 100.0
    }

    /// Hard per-trade risk cap. Equality accepts; there is no override.
    pub fn evaluate_trade_risk(
        &self,
        risk_percent: f64,
        max_risk_per_trade: f64,
    ) -> Result<(), RiskError> {
        if risk_percent > max_risk_per_trade {
            return Err(RiskError::RiskPerTradeTooHigh {
                risk_percent,
                max_risk: max_risk_per_trade,
            });
        }
        Ok(())
    }

    /// Soft RR minimum. An absent target evaluates as 0, so it is rejected
    /// for any positive minimum; the caller may waive this with the
    /// `rr_above_minimum` checklist override.
    pub fn evaluate_reward_ratio(
        &self,
        rr: RewardRatio,
        minimum_rr: f64,
    ) -> Result<(), RiskError> {
        let ratio = rr.numeric();
        if ratio < minimum_rr {
            return Err(RiskError::RewardRatioTooLow {
                ratio,
                minimum: minimum_rr,
            });
        }
        Ok(())
    }
}
