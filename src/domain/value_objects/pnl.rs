use serde::{Deserialize, Serialize};

use crate::domain::errors::RiskError;

/// Realized profit or loss on a single trade.
///
/// Negative values are losses, positive values profits, zero is breakeven.
/// The only constraint is finiteness; a journal entry with NaN P/L would
/// silently corrupt every daily accumulator downstream.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfitLoss(f64);

impl ProfitLoss {
    pub fn new(value: f64) -> Result<Self, RiskError> {
        if !value.is_finite() {
            return Err(RiskError::validation("profitLoss", "must be a finite number"));
        }
        Ok(ProfitLoss(value))
    }

    pub fn value(&self) -> f64 {
        self.0
    }

    pub fn is_profit(&self) -> bool {
        self.0 > 0.0
    }

    pub fn is_loss(&self) -> bool {
        self.0 < 0.0
    }

    pub fn abs(&self) -> f64 {
        self.0.abs()
    }

    pub fn zero() -> Self {
        ProfitLoss(0.0)
    }
}

impl std::fmt::Display for ProfitLoss {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0 >= 0.0 {
            write!(f, "+${:.2}", self.0)
        } else {
            write!(f, "-${:.2}", self.0.abs())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profit() {
        let pl = ProfitLoss::new(25.0).unwrap();
        assert!(pl.is_profit());
        assert!(!pl.is_loss());
        assert_eq!(pl.value(), 25.0);
    }

    #[test]
    fn test_loss() {
        let pl = ProfitLoss::new(-5.0).unwrap();
        assert!(pl.is_loss());
        assert_eq!(pl.abs(), 5.0);
    }

    #[test]
    fn test_breakeven_is_neither() {
        let pl = ProfitLoss::zero();
        assert!(!pl.is_profit());
        assert!(!pl.is_loss());
    }

    #[test]
    fn test_rejects_non_finite() {
        assert!(ProfitLoss::new(f64::NAN).is_err());
        assert!(ProfitLoss::new(f64::INFINITY).is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", ProfitLoss::new(12.5).unwrap()), "+$12.50");
        assert_eq!(format!("{}", ProfitLoss::new(-3.0).unwrap()), "-$3.00");
    }
}
