//! Behavioural pattern detection over the recent trade history.
//!
//! Strictly advisory: the admission pipeline asks for a warning after a trade
//! is admitted, and any failure here is logged and dropped. Nothing in this
//! module can block a trade.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::domain::entities::trade::{Trade, TradeResult};

/// Advisory collaborator consulted after admission. A no-op implementation
/// is a valid substitute; the pipeline must behave identically without one.
#[async_trait]
pub trait PatternAdvisor: Send + Sync {
    /// Review the user's recent trades and return a human-readable warning,
    /// or `None` when nothing looks off.
    async fn review(&self, recent_trades: &[Trade]) -> Result<Option<String>, String>;
}

/// Advisor that never warns. Used when advisory analysis is disabled.
#[derive(Debug, Clone, Default)]
pub struct NoopAdvisor;

#[async_trait]
impl PatternAdvisor for NoopAdvisor {
    async fn review(&self, _recent_trades: &[Trade]) -> Result<Option<String>, String> {
        Ok(None)
    }
}

/// Patterns found in a trade window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PatternReport {
    pub revenge_trading: bool,
    pub overtrading: bool,
    pub checklist_skipping: bool,
}

impl PatternReport {
    pub fn is_clean(&self) -> bool {
        !(self.revenge_trading || self.overtrading || self.checklist_skipping)
    }
}

/// Rule-based detector for revenge trading, overtrading, and checklist
/// skipping within a sliding window.
#[derive(Debug, Clone)]
pub struct RulePatternDetector {
    /// Window over which patterns are evaluated.
    pub window: Duration,
    /// A trade this soon after a loss counts as revenge trading.
    pub revenge_gap: Duration,
    /// More trades than this inside the window counts as overtrading.
    pub overtrade_threshold: usize,
}

impl Default for RulePatternDetector {
    fn default() -> Self {
        Self {
            window: Duration::hours(24),
            revenge_gap: Duration::minutes(30),
            overtrade_threshold: 5,
        }
    }
}

impl RulePatternDetector {
    /// Evaluate the rules against trades, relative to `now`.
    ///
    /// Fewer than 3 trades is not enough signal for any pattern.
    pub fn detect(&self, trades: &[Trade], now: DateTime<Utc>) -> PatternReport {
        if trades.len() < 3 {
            return PatternReport::default();
        }

        let window_start = now - self.window;
        let mut in_window: Vec<&Trade> = trades
            .iter()
            .filter(|t| t.trade_date >= window_start)
            .collect();
        in_window.sort_by_key(|t| t.trade_date);

        let revenge_trading = in_window.windows(2).any(|pair| {
            pair[0].result == TradeResult::Loss
                && pair[1].trade_date - pair[0].trade_date < self.revenge_gap
        });

        let overtrading = in_window.len() > self.overtrade_threshold;

        let checklist_skipping = in_window
            .iter()
            .any(|t| !t.checklist.trend_aligned || !t.checklist.entry_at_key_level);

        PatternReport {
            revenge_trading,
            overtrading,
            checklist_skipping,
        }
    }

    /// One warning at a time, worst pattern first.
    pub fn warning_message(report: PatternReport) -> Option<String> {
        if report.revenge_trading {
            Some("Revenge trading detected: you re-entered within 30 minutes of a loss.".to_string())
        } else if report.overtrading {
            Some("Overtrading detected: too many trades in the last 24 hours.".to_string())
        } else if report.checklist_skipping {
            Some("Some recent trades skipped the pre-trade checklist.".to_string())
        } else {
            None
        }
    }
}

#[async_trait]
impl PatternAdvisor for RulePatternDetector {
    async fn review(&self, recent_trades: &[Trade]) -> Result<Option<String>, String> {
        let report = self.detect(recent_trades, Utc::now());
        Ok(Self::warning_message(report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::trade::{Checklist, Direction, Session, Timeframe};
    use crate::domain::value_objects::rr::RewardRatio;
    use chrono::TimeZone;

    fn trade(minutes_ago: i64, now: DateTime<Utc>, result: TradeResult, clean: bool) -> Trade {
        Trade {
            id: format!("t-{}", minutes_ago),
            user_id: "user-1".to_string(),
            trade_date: now - Duration::minutes(minutes_ago),
            pair: "EURUSD".to_string(),
            session: Session::London,
            timeframe: Timeframe::M15,
            direction: Direction::Buy,
            entry_price: 1.1,
            stop_loss: 1.09,
            take_profit: Some(1.12),
            lot_size: 0.1,
            risk_percent: 1.0,
            rr_ratio: RewardRatio::Ratio(2.0),
            result,
            profit_loss: if result == TradeResult::Loss { -5.0 } else { 5.0 },
            notes: None,
            checklist: Checklist {
                trend_aligned: clean,
                entry_at_key_level: clean,
                stop_loss_defined: true,
                rr_above_minimum: false,
                risk_within_limit: false,
            },
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_too_few_trades_is_clean() {
        let detector = RulePatternDetector::default();
        let trades = vec![
            trade(10, now(), TradeResult::Loss, true),
            trade(5, now(), TradeResult::Win, true),
        ];
        assert!(detector.detect(&trades, now()).is_clean());
    }

    #[test]
    fn test_revenge_trading_detected() {
        let detector = RulePatternDetector::default();
        let trades = vec![
            trade(120, now(), TradeResult::Win, true),
            trade(50, now(), TradeResult::Loss, true),
            // 20 minutes after the loss
            trade(30, now(), TradeResult::Win, true),
        ];
        let report = detector.detect(&trades, now());
        assert!(report.revenge_trading);
    }

    #[test]
    fn test_no_revenge_after_cooldown() {
        let detector = RulePatternDetector::default();
        let trades = vec![
            trade(300, now(), TradeResult::Win, true),
            trade(200, now(), TradeResult::Loss, true),
            // 160 minutes after the loss
            trade(40, now(), TradeResult::Win, true),
        ];
        let report = detector.detect(&trades, now());
        assert!(!report.revenge_trading);
    }

    #[test]
    fn test_quick_reentry_after_win_is_fine() {
        let detector = RulePatternDetector::default();
        let trades = vec![
            trade(120, now(), TradeResult::Win, true),
            trade(50, now(), TradeResult::Win, true),
            trade(45, now(), TradeResult::Win, true),
        ];
        assert!(!detector.detect(&trades, now()).revenge_trading);
    }

    #[test]
    fn test_overtrading_detected() {
        let detector = RulePatternDetector::default();
        let trades: Vec<Trade> = (0..6)
            .map(|i| trade(60 * (i + 1), now(), TradeResult::Win, true))
            .collect();
        let report = detector.detect(&trades, now());
        assert!(report.overtrading);
    }

    #[test]
    fn test_trades_outside_window_ignored() {
        let detector = RulePatternDetector::default();
        // 6 trades, but 4 of them older than 24h.
        let mut trades: Vec<Trade> = (0..4)
            .map(|i| trade(60 * 25 + i, now(), TradeResult::Win, true))
            .collect();
        trades.push(trade(60, now(), TradeResult::Win, true));
        trades.push(trade(30, now(), TradeResult::Win, true));
        let report = detector.detect(&trades, now());
        assert!(!report.overtrading);
    }

    #[test]
    fn test_checklist_skipping_detected() {
        let detector = RulePatternDetector::default();
        let trades = vec![
            trade(120, now(), TradeResult::Win, true),
            trade(60, now(), TradeResult::Win, false),
            trade(30, now(), TradeResult::Win, true),
        ];
        let report = detector.detect(&trades, now());
        assert!(report.checklist_skipping);
    }

    #[test]
    fn test_warning_precedence() {
        let msg = RulePatternDetector::warning_message(PatternReport {
            revenge_trading: true,
            overtrading: true,
            checklist_skipping: true,
        })
        .unwrap();
        assert!(msg.contains("Revenge trading"));

        assert!(RulePatternDetector::warning_message(PatternReport::default()).is_none());
    }

    #[tokio::test]
    async fn test_noop_advisor_never_warns() {
        let advisor = NoopAdvisor;
        let trades = vec![
            trade(10, now(), TradeResult::Loss, false),
            trade(5, now(), TradeResult::Loss, false),
            trade(1, now(), TradeResult::Loss, false),
        ];
        assert_eq!(advisor.review(&trades).await, Ok(None));
    }
}
