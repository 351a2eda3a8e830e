//! Trade Admission Pipeline
//!
//! Orchestrates the risk evaluator, trade ledger, daily stats, and settings
//! into a single admit-or-reject decision, and applies the consequences of
//! admission (trade row, balance update, daily rollup, possible day lock).
//!
//! Per (user, day) the state machine is Open -> Locked, terminal for the day
//! except for the stale-lock reconciliation, then implicitly Open again the
//! next day. Lock state is re-derived from raw trade sums on every check
//! rather than trusting the cached flag blindly.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::JournalConfig;
use crate::domain::entities::settings::{SettingsUpdate, UserSettings};
use crate::domain::entities::trade::{Trade, TradeDraft};
use crate::domain::errors::RiskError;
use crate::domain::services::metrics::{self, DailyPl, EquityPoint, PerformanceMetrics};
use crate::domain::services::pattern_detector::PatternAdvisor;
use crate::domain::services::risk_evaluator::RiskEvaluator;
use crate::domain::value_objects::pnl::ProfitLoss;
use crate::persistence::repository::{
    AdmitOutcome, DailyStatsRepository, SettingsRepository, TradeRepository,
};
use crate::persistence::{DatabaseError, DbPool};

/// Positive admission decision: trading is currently allowed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Admission {
    pub daily_loss: f64,
    pub daily_loss_percent: f64,
    pub trades_count: u32,
    /// Loss percent still available before the daily cap locks the day.
    pub remaining_risk: f64,
}

/// Result of a successful trade creation.
#[derive(Debug, Clone, Serialize)]
pub struct AdmittedTrade {
    pub trade: Trade,
    /// Advisory warning from the pattern detector, if any. Never gates.
    pub warning: Option<String>,
}

/// Application service owning the storage repositories and the evaluator.
/// Constructed once in `main` with an injected pool and advisor.
pub struct JournalService {
    settings: SettingsRepository,
    trades: TradeRepository,
    daily_stats: DailyStatsRepository,
    evaluator: RiskEvaluator,
    advisor: Arc<dyn PatternAdvisor>,
    config: JournalConfig,
}

fn persistence(e: DatabaseError) -> RiskError {
    // Details are already logged at the repository layer.
    RiskError::Persistence(e.to_string())
}

impl JournalService {
    pub fn new(pool: DbPool, advisor: Arc<dyn PatternAdvisor>, config: JournalConfig) -> Self {
        Self {
            settings: SettingsRepository::new(pool.clone()),
            trades: TradeRepository::new(pool.clone()),
            daily_stats: DailyStatsRepository::new(pool),
            evaluator: RiskEvaluator::new(),
            advisor,
            config,
        }
    }

    /// Create default settings for a newly registered user.
    pub async fn register_user(&self, user_id: &str) -> Result<UserSettings, RiskError> {
        self.settings
            .create_defaults(user_id)
            .await
            .map_err(persistence)
    }

    pub async fn get_settings(&self, user_id: &str) -> Result<UserSettings, RiskError> {
        self.settings
            .get(user_id)
            .await
            .map_err(persistence)?
            .ok_or(RiskError::ConfigurationMissing)
    }

    /// Apply a settings edit. Changing the starting balance is an explicit
    /// account reset: the current balance snaps back to it.
    pub async fn update_settings(
        &self,
        user_id: &str,
        update: SettingsUpdate,
    ) -> Result<UserSettings, RiskError> {
        update.validate()?;
        let current = self.get_settings(user_id).await?;
        let reset = update.resets_balance(&current);
        if reset {
            info!(
                "Starting balance edit for {}: resetting current balance to {:.2}",
                user_id, update.starting_balance
            );
        }
        self.settings
            .update(user_id, &update, reset)
            .await
            .map_err(persistence)
    }

    /// Can this user trade at all right now? Ordered checks, first failure
    /// short-circuits with a caller-facing reason. Read-only except for the
    /// stale-lock self-heal and the lazy daily-loss lock.
    pub async fn is_trade_allowed(&self, user_id: &str) -> Result<Admission, RiskError> {
        // 1. Settings must exist.
        let settings = self
            .settings
            .get(user_id)
            .await
            .map_err(persistence)?
            .ok_or(RiskError::ConfigurationMissing)?;

        let today = Utc::now().date_naive();

        // 2. Live trade count and stored rollup, then stale-lock self-heal.
        let trades_count = self
            .trades
            .count_for_day(user_id, today)
            .await
            .map_err(persistence)?;

        let stored = self
            .daily_stats
            .get_by_user_day(user_id, today)
            .await
            .map_err(persistence)?;

        if let Some(mut stats) = stored {
            if stats.reconcile_stale_lock(trades_count) {
                warn!(
                    "Stale lock for {} on {}: locked with zero trades, self-healing",
                    user_id, today
                );
                self.daily_stats
                    .clear_stale_lock(user_id, today)
                    .await
                    .map_err(persistence)?;
            } else if stats.is_locked {
                // 3. Locked with trades behind it: enforce.
                return Err(RiskError::DailyLossLimitExceeded {
                    daily_loss: stats.total_loss,
                    daily_loss_percent: stats.total_loss / settings.current_balance * 100.0,
                });
            }
        }

        // 4. Trade count cap.
        if trades_count >= settings.max_trades_per_day {
            return Err(RiskError::MaxTradesReached {
                count: trades_count,
                limit: settings.max_trades_per_day,
            });
        }

        // 5. Daily loss cap, re-derived from raw trade sums so an external
        //    balance edit can trip the lock lazily.
        let daily_loss: f64 = self
            .trades
            .list_pl_for_day(user_id, today)
            .await
            .map_err(persistence)?
            .iter()
            .filter(|pl| **pl < 0.0)
            .map(|pl| pl.abs())
            .sum();

        let daily_loss_percent = daily_loss / settings.current_balance * 100.0;

        if daily_loss_percent >= settings.max_daily_loss {
            info!(
                "Locking {} for {}: daily loss {:.2} ({:.2}%) >= cap {:.2}%",
                today, user_id, daily_loss, daily_loss_percent, settings.max_daily_loss
            );
            self.daily_stats
                .lock(user_id, today, daily_loss)
                .await
                .map_err(persistence)?;
            return Err(RiskError::DailyLossLimitExceeded {
                daily_loss,
                daily_loss_percent,
            });
        }

        // 6. Admit.
        Ok(Admission {
            daily_loss,
            daily_loss_percent,
            trades_count,
            remaining_risk: settings.max_daily_loss - daily_loss_percent,
        })
    }

    /// Admit and persist a prospective trade. Layers the per-trade checks on
    /// top of `is_trade_allowed`, then applies the consequences atomically.
    pub async fn create_trade(
        &self,
        user_id: &str,
        draft: TradeDraft,
    ) -> Result<AdmittedTrade, RiskError> {
        // Steps 1-6: can the user trade at all right now?
        self.is_trade_allowed(user_id).await?;

        let settings = self.get_settings(user_id).await?;

        // 7. Input shape.
        draft.validate()?;

        // 8. RR minimum, waivable via the checklist override.
        let rr_ratio = draft.reward_ratio();
        if let Err(e) = self
            .evaluator
            .evaluate_reward_ratio(rr_ratio, self.config.minimum_rr)
        {
            if !draft.checklist.rr_above_minimum {
                return Err(e);
            }
        }

        // 9. Per-trade risk cap. Hard; no override escape.
        let risk_percent = self.evaluator.risk_percent(
            draft.entry_price,
            draft.stop_loss,
            draft.lot_size,
            settings.current_balance,
        );
        self.evaluator
            .evaluate_trade_risk(risk_percent, settings.max_risk_per_trade)?;

        // 10. Foundational checklist.
        if !draft.checklist.foundation_complete() {
            return Err(RiskError::ChecklistIncomplete);
        }

        // 11. Persist trade + balance + daily rollup in one transaction. The
        //     insert re-checks the count cap and the day lock in storage, so
        //     a concurrent admission that also passed steps 1-6 cannot land
        //     past the gate.
        let profit_loss = ProfitLoss::new(draft.profit_loss)?;
        let trade = Trade {
            id: new_trade_id(user_id),
            user_id: user_id.to_string(),
            trade_date: draft.trade_date,
            pair: draft.pair,
            session: draft.session,
            timeframe: draft.timeframe,
            direction: draft.direction,
            entry_price: draft.entry_price,
            stop_loss: draft.stop_loss,
            take_profit: draft.take_profit,
            lot_size: draft.lot_size,
            risk_percent,
            rr_ratio,
            result: draft.result,
            profit_loss: profit_loss.value(),
            notes: draft.notes,
            checklist: draft.checklist,
        };
        let today = Utc::now().date_naive();
        match self
            .trades
            .admit(&trade, today, settings.max_trades_per_day)
            .await
            .map_err(persistence)?
        {
            AdmitOutcome::Admitted => {}
            AdmitOutcome::CapReached { count } => {
                return Err(RiskError::MaxTradesReached {
                    count,
                    limit: settings.max_trades_per_day,
                });
            }
            AdmitOutcome::DayLocked { total_loss } => {
                return Err(RiskError::DailyLossLimitExceeded {
                    daily_loss: total_loss,
                    daily_loss_percent: total_loss / settings.current_balance * 100.0,
                });
            }
        }

        info!(
            "Admitted trade {} for {}: {} {} P/L {}",
            trade.id, user_id, trade.pair, trade.direction, profit_loss
        );

        // Advisory review. Must never block or fail admission.
        let warning = self.advisory_warning(user_id).await;

        Ok(AdmittedTrade { trade, warning })
    }

    async fn advisory_warning(&self, user_id: &str) -> Option<String> {
        let recent = match self
            .trades
            .list_recent(user_id, self.config.advisory_lookback)
            .await
        {
            Ok(trades) => trades,
            Err(e) => {
                warn!("Advisory history load failed for {}: {}", user_id, e);
                return None;
            }
        };

        match self.advisor.review(&recent).await {
            Ok(warning) => warning,
            Err(e) => {
                warn!("Pattern advisor failed for {}: {}", user_id, e);
                None
            }
        }
    }

    /// Delete a trade, reverting its P/L from the balance. Daily stats are
    /// not recomputed here; a stale lock heals on the next admission check.
    pub async fn delete_trade(&self, user_id: &str, trade_id: &str) -> Result<Trade, RiskError> {
        let trade = self
            .trades
            .get(trade_id)
            .await
            .map_err(persistence)?
            .ok_or(RiskError::NotFound)?;

        // Ownership mismatch reads the same as absence to the caller.
        if trade.user_id != user_id {
            return Err(RiskError::NotFound);
        }

        self.trades
            .delete_reverting_balance(&trade)
            .await
            .map_err(persistence)?;

        info!("Deleted trade {} for {}", trade_id, user_id);
        Ok(trade)
    }

    pub async fn list_trades(&self, user_id: &str) -> Result<Vec<Trade>, RiskError> {
        self.trades.list_all(user_id).await.map_err(persistence)
    }

    pub async fn daily_pl(&self, user_id: &str) -> Result<DailyPl, RiskError> {
        let today = Utc::now().date_naive();
        let trades = self
            .trades
            .list_for_day(user_id, today)
            .await
            .map_err(persistence)?;
        Ok(metrics::daily_pl(&trades))
    }

    pub async fn performance(&self, user_id: &str) -> Result<PerformanceMetrics, RiskError> {
        let trades = self.list_trades(user_id).await?;
        Ok(metrics::performance_metrics(&trades))
    }

    pub async fn equity_curve(&self, user_id: &str) -> Result<Vec<EquityPoint>, RiskError> {
        let trades = self.list_trades(user_id).await?;
        Ok(metrics::equity_curve(&trades))
    }
}

fn new_trade_id(user_id: &str) -> String {
    // Nanos alone can collide under concurrent admissions.
    static TRADE_SEQ: AtomicU64 = AtomicU64::new(0);
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let seq = TRADE_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("trade-{}-{}-{}", user_id, nanos, seq)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::trade::{
        Checklist, Direction, Session, Timeframe, TradeResult,
    };
    use crate::domain::services::pattern_detector::NoopAdvisor;
    use crate::persistence::init_database;

    async fn service() -> JournalService {
        let pool = init_database("sqlite::memory:").await.unwrap();
        JournalService::new(pool, Arc::new(NoopAdvisor), JournalConfig::default())
    }

    fn draft(pl: f64) -> TradeDraft {
        TradeDraft {
            trade_date: Utc::now(),
            pair: "EURUSD".to_string(),
            session: Session::London,
            timeframe: Timeframe::M15,
            direction: Direction::Buy,
            entry_price: 1.1000,
            stop_loss: 1.0950,
            take_profit: Some(1.1100),
            lot_size: 0.1,
            result: if pl < 0.0 {
                TradeResult::Loss
            } else if pl > 0.0 {
                TradeResult::Win
            } else {
                TradeResult::BE
            },
            profit_loss: pl,
            notes: None,
            checklist: Checklist {
                trend_aligned: true,
                entry_at_key_level: true,
                stop_loss_defined: true,
                rr_above_minimum: false,
                risk_within_limit: false,
            },
        }
    }

    #[tokio::test]
    async fn test_missing_settings_rejected() {
        let svc = service().await;
        let err = svc.is_trade_allowed("ghost").await.unwrap_err();
        assert_eq!(err, RiskError::ConfigurationMissing);
    }

    #[tokio::test]
    async fn test_admission_with_fresh_account() {
        let svc = service().await;
        svc.register_user("user-1").await.unwrap();

        let admission = svc.is_trade_allowed("user-1").await.unwrap();
        assert_eq!(admission.trades_count, 0);
        assert_eq!(admission.daily_loss, 0.0);
        assert_eq!(admission.remaining_risk, 4.0);
    }

    #[tokio::test]
    async fn test_admission_is_idempotent() {
        let svc = service().await;
        svc.register_user("user-1").await.unwrap();
        svc.create_trade("user-1", draft(-2.0)).await.unwrap();

        let first = svc.is_trade_allowed("user-1").await.unwrap();
        let second = svc.is_trade_allowed("user-1").await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_loss_moves_balance_and_stats() {
        let svc = service().await;
        svc.register_user("user-1").await.unwrap();

        svc.create_trade("user-1", draft(-5.0)).await.unwrap();

        let settings = svc.get_settings("user-1").await.unwrap();
        assert_eq!(settings.current_balance, 95.0);

        let pl = svc.daily_pl("user-1").await.unwrap();
        assert_eq!(pl.total_loss, 5.0);
        assert_eq!(pl.trades_count, 1);
    }

    #[tokio::test]
    async fn test_delete_restores_balance() {
        let svc = service().await;
        svc.register_user("user-1").await.unwrap();

        let admitted = svc.create_trade("user-1", draft(-5.0)).await.unwrap();
        assert_eq!(
            svc.get_settings("user-1").await.unwrap().current_balance,
            95.0
        );

        svc.delete_trade("user-1", &admitted.trade.id).await.unwrap();
        assert_eq!(
            svc.get_settings("user-1").await.unwrap().current_balance,
            100.0
        );
    }

    #[tokio::test]
    async fn test_delete_requires_ownership() {
        let svc = service().await;
        svc.register_user("user-1").await.unwrap();
        svc.register_user("user-2").await.unwrap();

        let admitted = svc.create_trade("user-1", draft(1.0)).await.unwrap();
        let err = svc
            .delete_trade("user-2", &admitted.trade.id)
            .await
            .unwrap_err();
        assert_eq!(err, RiskError::NotFound);

        // Still there for the owner.
        assert!(svc.delete_trade("user-1", &admitted.trade.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_daily_loss_cap_locks_the_day() {
        let svc = service().await;
        svc.register_user("user-1").await.unwrap();

        // Loss of 5 against a balance of 95 is 5.26% >= 4% cap.
        svc.create_trade("user-1", draft(-5.0)).await.unwrap();

        let err = svc.is_trade_allowed("user-1").await.unwrap_err();
        assert!(matches!(err, RiskError::DailyLossLimitExceeded { daily_loss, .. } if daily_loss == 5.0));

        // The lock persisted: further attempts keep failing the same way.
        let err = svc.create_trade("user-1", draft(10.0)).await.unwrap_err();
        assert!(matches!(err, RiskError::DailyLossLimitExceeded { .. }));
    }

    #[tokio::test]
    async fn test_stale_lock_self_heals_when_trades_vanish() {
        let svc = service().await;
        svc.register_user("user-1").await.unwrap();

        let admitted = svc.create_trade("user-1", draft(-5.0)).await.unwrap();
        // Trip the lock.
        assert!(svc.is_trade_allowed("user-1").await.is_err());

        // Deleting the only trade leaves a locked day with zero trades;
        // the next admission check reconciles and admits.
        svc.delete_trade("user-1", &admitted.trade.id).await.unwrap();
        let admission = svc.is_trade_allowed("user-1").await.unwrap();
        assert_eq!(admission.trades_count, 0);
        assert_eq!(admission.daily_loss, 0.0);
    }

    #[tokio::test]
    async fn test_partial_deletion_does_not_unlock() {
        let svc = service().await;
        svc.register_user("user-1").await.unwrap();

        let first = svc.create_trade("user-1", draft(-2.0)).await.unwrap();
        let _second = svc.create_trade("user-1", draft(-3.0)).await.unwrap();
        // 5 lost against 95 balance: locked.
        assert!(svc.is_trade_allowed("user-1").await.is_err());

        // Deleting one trade brings the loss back under the cap
        // mathematically, but the lock stands while trades remain.
        svc.delete_trade("user-1", &first.trade.id).await.unwrap();
        let err = svc.is_trade_allowed("user-1").await.unwrap_err();
        assert!(matches!(err, RiskError::DailyLossLimitExceeded { .. }));
    }

    #[tokio::test]
    async fn test_max_trades_per_day() {
        let svc = service().await;
        svc.register_user("user-1").await.unwrap();

        for _ in 0..5 {
            svc.create_trade("user-1", draft(1.0)).await.unwrap();
        }

        let err = svc.create_trade("user-1", draft(1.0)).await.unwrap_err();
        assert_eq!(err, RiskError::MaxTradesReached { count: 5, limit: 5 });
    }

    #[tokio::test]
    async fn test_concurrent_admissions_respect_trade_cap() {
        let svc = Arc::new(service().await);
        svc.register_user("user-1").await.unwrap();
        svc.update_settings(
            "user-1",
            SettingsUpdate {
                max_risk_per_trade: 2.0,
                max_daily_loss: 4.0,
                max_trades_per_day: 1,
                starting_balance: 100.0,
            },
        )
        .await
        .unwrap();

        // All tasks pass the read-side checks before any of them has
        // inserted; only the storage guard can keep the count at the cap.
        let mut handles = Vec::new();
        for _ in 0..8 {
            let svc = Arc::clone(&svc);
            handles.push(tokio::spawn(
                async move { svc.create_trade("user-1", draft(1.0)).await },
            ));
        }

        let mut admitted = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => admitted += 1,
                Err(RiskError::MaxTradesReached { limit, .. }) => assert_eq!(limit, 1),
                Err(other) => panic!("unexpected rejection: {:?}", other),
            }
        }
        assert_eq!(admitted, 1);
        assert_eq!(svc.list_trades("user-1").await.unwrap().len(), 1);
        assert_eq!(
            svc.get_settings("user-1").await.unwrap().current_balance,
            101.0
        );
    }

    #[tokio::test]
    async fn test_low_rr_rejected_without_override() {
        let svc = service().await;
        svc.register_user("user-1").await.unwrap();

        let mut d = draft(1.0);
        d.take_profit = Some(1.1050); // RR = 1.0
        let err = svc.create_trade("user-1", d).await.unwrap_err();
        assert!(matches!(err, RiskError::RewardRatioTooLow { ratio, .. } if ratio == 1.0));
    }

    #[tokio::test]
    async fn test_low_rr_admitted_with_override() {
        let svc = service().await;
        svc.register_user("user-1").await.unwrap();

        let mut d = draft(1.0);
        d.take_profit = Some(1.1050);
        d.checklist.rr_above_minimum = true;
        assert!(svc.create_trade("user-1", d).await.is_ok());
    }

    #[tokio::test]
    async fn test_missing_target_rejected_without_override() {
        let svc = service().await;
        svc.register_user("user-1").await.unwrap();

        let mut d = draft(1.0);
        d.take_profit = None;
        let err = svc.create_trade("user-1", d).await.unwrap_err();
        assert!(matches!(err, RiskError::RewardRatioTooLow { ratio, .. } if ratio == 0.0));
    }

    #[tokio::test]
    async fn test_risk_cap_has_no_override() {
        let svc = service().await;
        svc.register_user("user-1").await.unwrap();

        // |1.2 - 1.1| * 0.5 * 100 = 5 dollars on a 100 balance = 5% > 2%.
        let mut d = draft(1.0);
        d.entry_price = 1.2;
        d.stop_loss = 1.1;
        d.take_profit = Some(1.4);
        d.lot_size = 0.5;
        d.checklist.rr_above_minimum = true;
        d.checklist.risk_within_limit = true;
        let err = svc.create_trade("user-1", d).await.unwrap_err();
        assert!(matches!(err, RiskError::RiskPerTradeTooHigh { .. }));
    }

    #[tokio::test]
    async fn test_incomplete_checklist_rejected() {
        let svc = service().await;
        svc.register_user("user-1").await.unwrap();

        for flag in 0..3 {
            let mut d = draft(1.0);
            match flag {
                0 => d.checklist.trend_aligned = false,
                1 => d.checklist.entry_at_key_level = false,
                _ => d.checklist.stop_loss_defined = false,
            }
            let err = svc.create_trade("user-1", d).await.unwrap_err();
            assert_eq!(err, RiskError::ChecklistIncomplete);
        }
    }

    #[tokio::test]
    async fn test_validation_rejects_bad_shape() {
        let svc = service().await;
        svc.register_user("user-1").await.unwrap();

        let mut d = draft(1.0);
        d.entry_price = -1.0;
        let err = svc.create_trade("user-1", d).await.unwrap_err();
        assert!(matches!(err, RiskError::ValidationError { .. }));
    }

    #[tokio::test]
    async fn test_settings_update_reset() {
        let svc = service().await;
        svc.register_user("user-1").await.unwrap();
        svc.create_trade("user-1", draft(-2.0)).await.unwrap();
        assert_eq!(
            svc.get_settings("user-1").await.unwrap().current_balance,
            98.0
        );

        let updated = svc
            .update_settings(
                "user-1",
                SettingsUpdate {
                    max_risk_per_trade: 2.0,
                    max_daily_loss: 4.0,
                    max_trades_per_day: 5,
                    starting_balance: 1000.0,
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.current_balance, 1000.0);
    }

    #[tokio::test]
    async fn test_performance_and_equity() {
        let svc = service().await;
        svc.register_user("user-1").await.unwrap();
        svc.create_trade("user-1", draft(10.0)).await.unwrap();
        svc.create_trade("user-1", draft(-4.0)).await.unwrap();

        let m = svc.performance("user-1").await.unwrap();
        assert_eq!(m.total_trades, 2);
        assert_eq!(m.net_profit, 6.0);

        let curve = svc.equity_curve("user-1").await.unwrap();
        assert_eq!(curve.last().unwrap().pnl, 6.0);
    }
}
