use serde::{Deserialize, Serialize};

use crate::domain::entities::trade::Direction;

/// Risk:Reward ratio of a trade, direction-adjusted.
///
/// `NoTarget` means no take-profit was supplied, which is a different state
/// from a target that happens to produce a ratio of zero. The two must not be
/// collapsed: the UI shows "no target" for one and "0.00" for the other.
/// `NoTarget` serializes as JSON `null`, `Ratio(x)` as the bare number.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RewardRatio {
    NoTarget,
    Ratio(f64),
}

impl RewardRatio {
    /// Calculate the RR ratio from entry, stop loss, and optional take profit.
    ///
    /// Buy:  risk = entry - stop, reward = target - entry.
    /// Sell: risk = stop - entry, reward = entry - target.
    ///
    /// The ratio is rounded to 2 decimals. When the risk leg is not positive
    /// (stop on the wrong side of entry) the ratio is 0 rather than negative
    /// or infinite.
    pub fn calculate(
        entry: f64,
        stop_loss: f64,
        take_profit: Option<f64>,
        direction: Direction,
    ) -> Self {
        let target = match take_profit {
            Some(tp) => tp,
            None => return RewardRatio::NoTarget,
        };

        let (risk, reward) = match direction {
            Direction::Buy => (entry - stop_loss, target - entry),
            Direction::Sell => (stop_loss - entry, entry - target),
        };

        if risk > 0.0 {
            RewardRatio::Ratio((reward / risk * 100.0).round() / 100.0)
        } else {
            RewardRatio::Ratio(0.0)
        }
    }

    /// Numeric value used for admission checks; an absent target counts as 0.
    pub fn numeric(&self) -> f64 {
        match self {
            RewardRatio::NoTarget => 0.0,
            RewardRatio::Ratio(r) => *r,
        }
    }

    pub fn has_target(&self) -> bool {
        matches!(self, RewardRatio::Ratio(_))
    }
}

impl std::fmt::Display for RewardRatio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RewardRatio::NoTarget => write!(f, "no target"),
            RewardRatio::Ratio(r) => write!(f, "{:.2}:1", r),
        }
    }
}
