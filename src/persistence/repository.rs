//! Database Repositories
//!
//! Data access for settings, the trade ledger, and daily stats. Multi-write
//! operations (trade admission, trade deletion) run inside a single
//! transaction, and every counter mutation is an in-SQL increment or
//! conditional upsert so concurrent requests cannot interleave a
//! read-then-write on the same row.

use chrono::{NaiveDate, Utc};
use sqlx::Row;
use tracing::{debug, error};

use super::models::{DailyStatsRecord, SettingsRecord, TradeRecord};
use super::{DatabaseError, DbPool};
use crate::domain::entities::daily_stats::{day_bounds, DailyStats};
use crate::domain::entities::settings::{SettingsUpdate, UserSettings};
use crate::domain::entities::trade::Trade;
use crate::domain::value_objects::pnl::ProfitLoss;
use crate::domain::value_objects::rr::RewardRatio;

/// User settings repository
pub struct SettingsRepository {
    pool: DbPool,
}

impl SettingsRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get settings for a user, if configured.
    pub async fn get(&self, user_id: &str) -> Result<Option<UserSettings>, DatabaseError> {
        let record = sqlx::query_as::<_, SettingsRecord>(
            "SELECT * FROM user_settings WHERE user_id = ?1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to get settings for {}: {}", user_id, e);
            DatabaseError::QueryError(format!("Failed to get settings: {}", e))
        })?;

        Ok(record.map(SettingsRecord::into_settings))
    }

    /// Create settings with registration defaults. No-op if they exist.
    pub async fn create_defaults(&self, user_id: &str) -> Result<UserSettings, DatabaseError> {
        let defaults = UserSettings::defaults(user_id);
        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO user_settings (
                user_id, max_risk_per_trade, max_daily_loss, max_trades_per_day,
                starting_balance, current_balance, created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
            ON CONFLICT(user_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(defaults.max_risk_per_trade)
        .bind(defaults.max_daily_loss)
        .bind(defaults.max_trades_per_day as i64)
        .bind(defaults.starting_balance)
        .bind(defaults.current_balance)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to create settings for {}: {}", user_id, e);
            DatabaseError::QueryError(format!("Failed to create settings: {}", e))
        })?;

        debug!("Ensured settings exist for {}", user_id);
        // Read back: a concurrent earlier insert wins over our defaults.
        self.get(user_id).await?.ok_or_else(|| {
            DatabaseError::QueryError(format!("Settings missing after insert for {}", user_id))
        })
    }

    /// Apply a settings edit. When `reset_balance` is set (starting balance
    /// changed), the current balance snaps back to the new starting balance.
    pub async fn update(
        &self,
        user_id: &str,
        update: &SettingsUpdate,
        reset_balance: bool,
    ) -> Result<UserSettings, DatabaseError> {
        let now = Utc::now();
        let rows_affected = if reset_balance {
            sqlx::query(
                r#"
                UPDATE user_settings
                SET max_risk_per_trade = ?1, max_daily_loss = ?2, max_trades_per_day = ?3,
                    starting_balance = ?4, current_balance = ?4, updated_at = ?5
                WHERE user_id = ?6
                "#,
            )
            .bind(update.max_risk_per_trade)
            .bind(update.max_daily_loss)
            .bind(update.max_trades_per_day as i64)
            .bind(update.starting_balance)
            .bind(now)
            .bind(user_id)
            .execute(&self.pool)
            .await
        } else {
            sqlx::query(
                r#"
                UPDATE user_settings
                SET max_risk_per_trade = ?1, max_daily_loss = ?2, max_trades_per_day = ?3,
                    starting_balance = ?4, updated_at = ?5
                WHERE user_id = ?6
                "#,
            )
            .bind(update.max_risk_per_trade)
            .bind(update.max_daily_loss)
            .bind(update.max_trades_per_day as i64)
            .bind(update.starting_balance)
            .bind(now)
            .bind(user_id)
            .execute(&self.pool)
            .await
        }
        .map_err(|e| {
            error!("Failed to update settings for {}: {}", user_id, e);
            DatabaseError::QueryError(format!("Failed to update settings: {}", e))
        })?
        .rows_affected();

        if rows_affected == 0 {
            return Err(DatabaseError::QueryError(format!(
                "Settings not found: {}",
                user_id
            )));
        }

        self.get(user_id).await?.ok_or_else(|| {
            DatabaseError::QueryError(format!("Settings missing after update for {}", user_id))
        })
    }
}

/// Outcome of an admission attempt at the storage level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AdmitOutcome {
    Admitted,
    /// The day's trade count was already at the cap when the insert ran.
    CapReached { count: u32 },
    /// The day was locked when the insert ran; carries the recorded loss.
    DayLocked { total_loss: f64 },
}

/// Trade ledger repository
pub struct TradeRepository {
    pool: DbPool,
}

impl TradeRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Admit a trade: insert the ledger row, apply its P/L to the user's
    /// balance, and fold it into the daily rollup. One transaction; the
    /// insert itself re-checks the trade cap and the day lock for
    /// `admission_day`, so two requests that both passed the read-side gate
    /// cannot both land. Zero rows inserted means the gate closed in between,
    /// reported as a non-`Admitted` outcome.
    pub async fn admit(
        &self,
        trade: &Trade,
        admission_day: NaiveDate,
        max_trades_per_day: u32,
    ) -> Result<AdmitOutcome, DatabaseError> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            error!("Failed to begin admission transaction: {}", e);
            DatabaseError::QueryError(format!("Failed to begin transaction: {}", e))
        })?;

        let rr: Option<f64> = match trade.rr_ratio {
            RewardRatio::Ratio(r) => Some(r),
            RewardRatio::NoTarget => None,
        };
        let now = Utc::now();
        let (start, end) = day_bounds(admission_day);

        let inserted = sqlx::query(
            r#"
            INSERT INTO trades (
                id, user_id, trade_date, pair, session, timeframe, direction,
                entry_price, stop_loss, take_profit, lot_size, risk_percent,
                rr_ratio, result, profit_loss, notes,
                trend_aligned, entry_at_key_level, stop_loss_defined,
                rr_above_minimum, risk_within_limit, created_at
            )
            SELECT ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12,
                   ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22
            WHERE (SELECT COUNT(*) FROM trades
                   WHERE user_id = ?2 AND trade_date >= ?23 AND trade_date < ?24) < ?25
              AND NOT EXISTS (SELECT 1 FROM daily_stats
                              WHERE user_id = ?2 AND date = ?26 AND is_locked = 1)
            "#,
        )
        .bind(&trade.id)
        .bind(&trade.user_id)
        .bind(trade.trade_date)
        .bind(&trade.pair)
        .bind(trade.session.to_string())
        .bind(trade.timeframe.to_string())
        .bind(trade.direction.to_string())
        .bind(trade.entry_price)
        .bind(trade.stop_loss)
        .bind(trade.take_profit)
        .bind(trade.lot_size)
        .bind(trade.risk_percent)
        .bind(rr)
        .bind(trade.result.to_string())
        .bind(trade.profit_loss)
        .bind(&trade.notes)
        .bind(trade.checklist.trend_aligned)
        .bind(trade.checklist.entry_at_key_level)
        .bind(trade.checklist.stop_loss_defined)
        .bind(trade.checklist.rr_above_minimum)
        .bind(trade.checklist.risk_within_limit)
        .bind(now)
        .bind(start)
        .bind(end)
        .bind(max_trades_per_day as i64)
        .bind(admission_day)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            error!("Failed to insert trade: {}", e);
            DatabaseError::QueryError(format!("Failed to insert trade: {}", e))
        })?
        .rows_affected();

        if inserted == 0 {
            // Which gate closed between the read-side check and the insert.
            let locked = sqlx::query(
                "SELECT total_loss FROM daily_stats WHERE user_id = ?1 AND date = ?2 AND is_locked = 1",
            )
            .bind(&trade.user_id)
            .bind(admission_day)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| {
                error!("Failed to read lock state for {}: {}", trade.user_id, e);
                DatabaseError::QueryError(format!("Failed to read lock state: {}", e))
            })?;

            if let Some(row) = locked {
                return Ok(AdmitOutcome::DayLocked {
                    total_loss: row.get("total_loss"),
                });
            }

            let row = sqlx::query(
                "SELECT COUNT(*) as count FROM trades WHERE user_id = ?1 AND trade_date >= ?2 AND trade_date < ?3",
            )
            .bind(&trade.user_id)
            .bind(start)
            .bind(end)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                error!("Failed to count trades for {}: {}", trade.user_id, e);
                DatabaseError::QueryError(format!("Failed to count trades: {}", e))
            })?;
            let count: i64 = row.get("count");
            return Ok(AdmitOutcome::CapReached {
                count: count.max(0) as u32,
            });
        }

        sqlx::query(
            "UPDATE user_settings SET current_balance = current_balance + ?1, updated_at = ?2 WHERE user_id = ?3",
        )
        .bind(trade.profit_loss)
        .bind(now)
        .bind(&trade.user_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            error!("Failed to apply P/L to balance: {}", e);
            DatabaseError::QueryError(format!("Failed to update balance: {}", e))
        })?;

        // Rollup increments come from the aggregate transition itself, so the
        // SQL deltas cannot drift from `DailyStats::apply_trade`.
        let profit_loss = ProfitLoss::new(trade.profit_loss).map_err(|_| {
            DatabaseError::QueryError(format!("Non-finite P/L on trade {}", trade.id))
        })?;
        let mut delta = DailyStats::empty(&trade.user_id, trade.trade_date.date_naive());
        delta.apply_trade(profit_loss);

        sqlx::query(
            r#"
            INSERT INTO daily_stats (user_id, date, total_trades, total_profit, total_loss, net_result, is_locked)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0)
            ON CONFLICT(user_id, date) DO UPDATE SET
                total_trades = total_trades + ?3,
                total_profit = total_profit + ?4,
                total_loss = total_loss + ?5,
                net_result = net_result + ?6
            "#,
        )
        .bind(&trade.user_id)
        .bind(delta.date)
        .bind(delta.total_trades as i64)
        .bind(delta.total_profit)
        .bind(delta.total_loss)
        .bind(delta.net_result)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            error!("Failed to upsert daily stats: {}", e);
            DatabaseError::QueryError(format!("Failed to upsert daily stats: {}", e))
        })?;

        tx.commit().await.map_err(|e| {
            error!("Failed to commit admission transaction: {}", e);
            DatabaseError::QueryError(format!("Failed to commit transaction: {}", e))
        })?;

        debug!("Admitted trade {} for {}", trade.id, trade.user_id);
        Ok(AdmitOutcome::Admitted)
    }

    /// Get a trade by id.
    pub async fn get(&self, id: &str) -> Result<Option<Trade>, DatabaseError> {
        let record = sqlx::query_as::<_, TradeRecord>("SELECT * FROM trades WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to get trade {}: {}", id, e);
                DatabaseError::QueryError(format!("Failed to get trade: {}", e))
            })?;

        record.map(TradeRecord::into_trade).transpose()
    }

    /// Delete a trade and revert its P/L from the user's balance. Daily
    /// stats are deliberately left untouched; a locked day only heals via
    /// the stale-lock reconciliation once its trade count reaches zero.
    pub async fn delete_reverting_balance(&self, trade: &Trade) -> Result<(), DatabaseError> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            error!("Failed to begin deletion transaction: {}", e);
            DatabaseError::QueryError(format!("Failed to begin transaction: {}", e))
        })?;

        sqlx::query(
            "UPDATE user_settings SET current_balance = current_balance - ?1, updated_at = ?2 WHERE user_id = ?3",
        )
        .bind(trade.profit_loss)
        .bind(Utc::now())
        .bind(&trade.user_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            error!("Failed to revert balance for trade {}: {}", trade.id, e);
            DatabaseError::QueryError(format!("Failed to revert balance: {}", e))
        })?;

        let rows_affected = sqlx::query("DELETE FROM trades WHERE id = ?1")
            .bind(&trade.id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                error!("Failed to delete trade {}: {}", trade.id, e);
                DatabaseError::QueryError(format!("Failed to delete trade: {}", e))
            })?
            .rows_affected();

        if rows_affected == 0 {
            return Err(DatabaseError::QueryError(format!(
                "Trade not found: {}",
                trade.id
            )));
        }

        tx.commit().await.map_err(|e| {
            error!("Failed to commit deletion transaction: {}", e);
            DatabaseError::QueryError(format!("Failed to commit transaction: {}", e))
        })?;

        debug!("Deleted trade {} for {}", trade.id, trade.user_id);
        Ok(())
    }

    /// Number of trades a user logged on a calendar day.
    pub async fn count_for_day(
        &self,
        user_id: &str,
        day: NaiveDate,
    ) -> Result<u32, DatabaseError> {
        let (start, end) = day_bounds(day);
        let row = sqlx::query(
            "SELECT COUNT(*) as count FROM trades WHERE user_id = ?1 AND trade_date >= ?2 AND trade_date < ?3",
        )
        .bind(user_id)
        .bind(start)
        .bind(end)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to count trades for {}: {}", user_id, e);
            DatabaseError::QueryError(format!("Failed to count trades: {}", e))
        })?;

        let count: i64 = row.get("count");
        Ok(count.max(0) as u32)
    }

    /// Profit/loss amounts of a user's trades on a calendar day.
    pub async fn list_pl_for_day(
        &self,
        user_id: &str,
        day: NaiveDate,
    ) -> Result<Vec<f64>, DatabaseError> {
        let (start, end) = day_bounds(day);
        let rows = sqlx::query(
            "SELECT profit_loss FROM trades WHERE user_id = ?1 AND trade_date >= ?2 AND trade_date < ?3",
        )
        .bind(user_id)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to list day P/L for {}: {}", user_id, e);
            DatabaseError::QueryError(format!("Failed to list trades: {}", e))
        })?;

        Ok(rows.iter().map(|r| r.get("profit_loss")).collect())
    }

    /// All trades for a user's day, date ascending.
    pub async fn list_for_day(
        &self,
        user_id: &str,
        day: NaiveDate,
    ) -> Result<Vec<Trade>, DatabaseError> {
        let (start, end) = day_bounds(day);
        let records = sqlx::query_as::<_, TradeRecord>(
            "SELECT * FROM trades WHERE user_id = ?1 AND trade_date >= ?2 AND trade_date < ?3 ORDER BY trade_date ASC",
        )
        .bind(user_id)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to list day trades for {}: {}", user_id, e);
            DatabaseError::QueryError(format!("Failed to list trades: {}", e))
        })?;

        records.into_iter().map(TradeRecord::into_trade).collect()
    }

    /// Full trade history for a user, date ascending (metrics order).
    pub async fn list_all(&self, user_id: &str) -> Result<Vec<Trade>, DatabaseError> {
        let records = sqlx::query_as::<_, TradeRecord>(
            "SELECT * FROM trades WHERE user_id = ?1 ORDER BY trade_date ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to list trades for {}: {}", user_id, e);
            DatabaseError::QueryError(format!("Failed to list trades: {}", e))
        })?;

        records.into_iter().map(TradeRecord::into_trade).collect()
    }

    /// Most recent N trades for a user, newest first (advisory window).
    pub async fn list_recent(&self, user_id: &str, limit: u32) -> Result<Vec<Trade>, DatabaseError> {
        let records = sqlx::query_as::<_, TradeRecord>(
            "SELECT * FROM trades WHERE user_id = ?1 ORDER BY trade_date DESC LIMIT ?2",
        )
        .bind(user_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to list recent trades for {}: {}", user_id, e);
            DatabaseError::QueryError(format!("Failed to list recent trades: {}", e))
        })?;

        records.into_iter().map(TradeRecord::into_trade).collect()
    }
}

/// Daily stats repository
pub struct DailyStatsRepository {
    pool: DbPool,
}

impl DailyStatsRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get the rollup for a user's day, if one has been persisted.
    pub async fn get_by_user_day(
        &self,
        user_id: &str,
        day: NaiveDate,
    ) -> Result<Option<DailyStats>, DatabaseError> {
        let record = sqlx::query_as::<_, DailyStatsRecord>(
            "SELECT * FROM daily_stats WHERE user_id = ?1 AND date = ?2",
        )
        .bind(user_id)
        .bind(day)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to get daily stats for {}: {}", user_id, e);
            DatabaseError::QueryError(format!("Failed to get daily stats: {}", e))
        })?;

        Ok(record.map(DailyStatsRecord::into_stats))
    }

    /// Lock the day, recording the loss that tripped the cap. Single
    /// conditional upsert so two racing admission checks cannot both slip
    /// past an unlocked read.
    pub async fn lock(
        &self,
        user_id: &str,
        day: NaiveDate,
        total_loss: f64,
    ) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO daily_stats (user_id, date, total_loss, is_locked)
            VALUES (?1, ?2, ?3, 1)
            ON CONFLICT(user_id, date) DO UPDATE SET
                total_loss = ?3,
                is_locked = 1
            "#,
        )
        .bind(user_id)
        .bind(day)
        .bind(total_loss)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to lock day for {}: {}", user_id, e);
            DatabaseError::QueryError(format!("Failed to lock day: {}", e))
        })?;

        debug!("Locked {} for {} (loss {:.2})", day, user_id, total_loss);
        Ok(())
    }

    /// Clear a stale lock: conditional on the row still being locked, zeroes
    /// every accumulator. Called only after the live trade count for the day
    /// was observed to be zero.
    pub async fn clear_stale_lock(
        &self,
        user_id: &str,
        day: NaiveDate,
    ) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            UPDATE daily_stats
            SET is_locked = 0, total_trades = 0, total_profit = 0.0,
                total_loss = 0.0, net_result = 0.0
            WHERE user_id = ?1 AND date = ?2 AND is_locked = 1
            "#,
        )
        .bind(user_id)
        .bind(day)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to clear stale lock for {}: {}", user_id, e);
            DatabaseError::QueryError(format!("Failed to clear stale lock: {}", e))
        })?;

        debug!("Cleared stale lock on {} for {}", day, user_id);
        Ok(())
    }
}
