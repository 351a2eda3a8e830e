//! Trade entity and its closed vocabulary.
//!
//! Sessions, timeframes, directions, and results are tagged enums rather than
//! free-form strings so that a new variant fails to compile at every
//! consumption site until it is handled.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::errors::RiskError;
use crate::domain::value_objects::pnl::ProfitLoss;
use crate::domain::value_objects::rr::RewardRatio;

/// Trading session during which the trade was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Session {
    Asia,
    London,
    #[serde(rename = "New York")]
    NewYork,
}

impl std::fmt::Display for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Session::Asia => write!(f, "Asia"),
            Session::London => write!(f, "London"),
            Session::NewYork => write!(f, "New York"),
        }
    }
}

impl std::str::FromStr for Session {
    type Err = RiskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Asia" => Ok(Session::Asia),
            "London" => Ok(Session::London),
            "New York" => Ok(Session::NewYork),
            other => Err(RiskError::validation(
                "session",
                &format!("unknown session '{}'", other),
            )),
        }
    }
}

/// Chart timeframe the setup was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Timeframe {
    M1,
    M5,
    M15,
    M30,
    H1,
    H4,
    D1,
    W1,
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Timeframe::M1 => "M1",
            Timeframe::M5 => "M5",
            Timeframe::M15 => "M15",
            Timeframe::M30 => "M30",
            Timeframe::H1 => "H1",
            Timeframe::H4 => "H4",
            Timeframe::D1 => "D1",
            Timeframe::W1 => "W1",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for Timeframe {
    type Err = RiskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "M1" => Ok(Timeframe::M1),
            "M5" => Ok(Timeframe::M5),
            "M15" => Ok(Timeframe::M15),
            "M30" => Ok(Timeframe::M30),
            "H1" => Ok(Timeframe::H1),
            "H4" => Ok(Timeframe::H4),
            "D1" => Ok(Timeframe::D1),
            "W1" => Ok(Timeframe::W1),
            other => Err(RiskError::validation(
                "timeframe",
                &format!("unknown timeframe '{}'", other),
            )),
        }
    }
}

/// Trade direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Buy,
    Sell,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Buy => write!(f, "Buy"),
            Direction::Sell => write!(f, "Sell"),
        }
    }
}

impl std::str::FromStr for Direction {
    type Err = RiskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Buy" => Ok(Direction::Buy),
            "Sell" => Ok(Direction::Sell),
            other => Err(RiskError::validation(
                "direction",
                &format!("unknown direction '{}'", other),
            )),
        }
    }
}

/// Outcome of a closed trade. `BE` is breakeven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeResult {
    Win,
    Loss,
    BE,
}

impl std::fmt::Display for TradeResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeResult::Win => write!(f, "Win"),
            TradeResult::Loss => write!(f, "Loss"),
            TradeResult::BE => write!(f, "BE"),
        }
    }
}

impl std::str::FromStr for TradeResult {
    type Err = RiskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Win" => Ok(TradeResult::Win),
            "Loss" => Ok(TradeResult::Loss),
            "BE" => Ok(TradeResult::BE),
            other => Err(RiskError::validation(
                "result",
                &format!("unknown result '{}'", other),
            )),
        }
    }
}

/// Pre-trade discipline checklist.
///
/// The first three flags are hard gates on admission. `rr_above_minimum` is
/// an override assertion (the trader knowingly waives the RR minimum) and
/// `risk_within_limit` is purely advisory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checklist {
    pub trend_aligned: bool,
    pub entry_at_key_level: bool,
    pub stop_loss_defined: bool,
    pub rr_above_minimum: bool,
    pub risk_within_limit: bool,
}

impl Checklist {
    /// The three foundational confirmations required for every trade.
    pub fn foundation_complete(&self) -> bool {
        self.trend_aligned && self.entry_at_key_level && self.stop_loss_defined
    }
}

/// Caller-supplied trade proposal, before the engine computes risk and RR.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeDraft {
    pub trade_date: DateTime<Utc>,
    pub pair: String,
    pub session: Session,
    pub timeframe: Timeframe,
    pub direction: Direction,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: Option<f64>,
    pub lot_size: f64,
    pub result: TradeResult,
    pub profit_loss: f64,
    pub notes: Option<String>,
    #[serde(flatten)]
    pub checklist: Checklist,
}

impl TradeDraft {
    /// Input-shape validation. Fails on the first violation with a
    /// field-level message; enum fields are already proven by the type.
    pub fn validate(&self) -> Result<(), RiskError> {
        if self.pair.trim().is_empty() {
            return Err(RiskError::validation("pair", "Pair is required"));
        }
        if !(self.entry_price.is_finite() && self.entry_price > 0.0) {
            return Err(RiskError::validation(
                "entryPrice",
                "Entry price must be positive",
            ));
        }
        if !(self.stop_loss.is_finite() && self.stop_loss > 0.0) {
            return Err(RiskError::validation(
                "stopLoss",
                "Stop loss must be positive",
            ));
        }
        if let Some(tp) = self.take_profit {
            if !(tp.is_finite() && tp > 0.0) {
                return Err(RiskError::validation(
                    "takeProfit",
                    "Take profit must be positive",
                ));
            }
        }
        if !(self.lot_size.is_finite() && self.lot_size > 0.0) {
            return Err(RiskError::validation(
                "lotSize",
                "Lot size must be positive",
            ));
        }
        ProfitLoss::new(self.profit_loss)?;
        Ok(())
    }

    pub fn reward_ratio(&self) -> RewardRatio {
        RewardRatio::calculate(
            self.entry_price,
            self.stop_loss,
            self.take_profit,
            self.direction,
        )
    }
}

/// A journaled trade. Computed fields (`risk_percent`, `rr_ratio`) are fixed
/// at admission; the record is never edited in place, only deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub id: String,
    pub user_id: String,
    pub trade_date: DateTime<Utc>,
    pub pair: String,
    pub session: Session,
    pub timeframe: Timeframe,
    pub direction: Direction,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: Option<f64>,
    pub lot_size: f64,
    pub risk_percent: f64,
    pub rr_ratio: RewardRatio,
    pub result: TradeResult,
    pub profit_loss: f64,
    pub notes: Option<String>,
    #[serde(flatten)]
    pub checklist: Checklist,
}
