//! Persistence Layer
//!
//! SQLite storage for user settings, the trade ledger, and daily stats,
//! accessed through async sqlx repositories.
//!
//! # Database Schema
//!
//! ## user_settings
//! - user_id: unique per user
//! - max_risk_per_trade / max_daily_loss: percent caps
//! - max_trades_per_day: integer cap
//! - starting_balance / current_balance
//!
//! ## trades
//! - id: UUID-ish string
//! - user_id, trade_date, pair, session, timeframe, direction
//! - entry_price, stop_loss, take_profit (nullable), lot_size
//! - risk_percent, rr_ratio (nullable = no target), result, profit_loss
//! - notes, five checklist flags
//!
//! ## daily_stats
//! - (user_id, date) unique
//! - total_trades, total_profit, total_loss, net_result, is_locked

pub mod models;
pub mod repository;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::ConnectOptions;
use std::path::Path;
use std::str::FromStr;
use tracing::info;

/// Database connection pool
pub type DbPool = SqlitePool;

/// Database initialization and query errors
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Database connection error: {0}")]
    ConnectionError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrationError(String),

    #[error("Query error: {0}")]
    QueryError(String),
}

/// Initialize the database connection pool and run migrations.
///
/// # Arguments
/// - `database_url`: SQLite URL (e.g., "sqlite://data/tradekeeper.db")
pub async fn init_database(database_url: &str) -> Result<DbPool, DatabaseError> {
    info!("Initializing database: {}", database_url);

    // Ensure data directory exists
    if let Some(db_path) = database_url.strip_prefix("sqlite://") {
        if let Some(parent) = Path::new(db_path).parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::ConnectionError(sqlx::Error::Configuration(Box::new(e)))
            })?;
        }
    }

    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .log_statements(tracing::log::LevelFilter::Debug);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;

    info!("✓ Database initialized successfully");

    Ok(pool)
}

async fn run_migrations(pool: &DbPool) -> Result<(), DatabaseError> {
    info!("Running database migrations...");

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS user_settings (
            user_id TEXT PRIMARY KEY,
            max_risk_per_trade REAL NOT NULL,
            max_daily_loss REAL NOT NULL,
            max_trades_per_day INTEGER NOT NULL,
            starting_balance REAL NOT NULL,
            current_balance REAL NOT NULL,
            created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| {
        DatabaseError::MigrationError(format!("Failed to create user_settings table: {}", e))
    })?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS trades (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            trade_date DATETIME NOT NULL,
            pair TEXT NOT NULL,
            session TEXT NOT NULL CHECK(session IN ('Asia', 'London', 'New York')),
            timeframe TEXT NOT NULL,
            direction TEXT NOT NULL CHECK(direction IN ('Buy', 'Sell')),
            entry_price REAL NOT NULL,
            stop_loss REAL NOT NULL,
            take_profit REAL,
            lot_size REAL NOT NULL,
            risk_percent REAL NOT NULL,
            rr_ratio REAL,
            result TEXT NOT NULL CHECK(result IN ('Win', 'Loss', 'BE')),
            profit_loss REAL NOT NULL,
            notes TEXT,
            trend_aligned BOOLEAN NOT NULL DEFAULT 0,
            entry_at_key_level BOOLEAN NOT NULL DEFAULT 0,
            stop_loss_defined BOOLEAN NOT NULL DEFAULT 0,
            rr_above_minimum BOOLEAN NOT NULL DEFAULT 0,
            risk_within_limit BOOLEAN NOT NULL DEFAULT 0,
            created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| DatabaseError::MigrationError(format!("Failed to create trades table: {}", e)))?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS daily_stats (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            date TEXT NOT NULL,
            total_trades INTEGER NOT NULL DEFAULT 0,
            total_profit REAL NOT NULL DEFAULT 0.0,
            total_loss REAL NOT NULL DEFAULT 0.0,
            net_result REAL NOT NULL DEFAULT 0.0,
            is_locked BOOLEAN NOT NULL DEFAULT 0,
            UNIQUE(user_id, date)
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| {
        DatabaseError::MigrationError(format!("Failed to create daily_stats table: {}", e))
    })?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_trades_user_date ON trades(user_id, trade_date)")
        .execute(pool)
        .await
        .map_err(|e| DatabaseError::MigrationError(format!("Failed to create index: {}", e)))?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_daily_stats_user ON daily_stats(user_id)")
        .execute(pool)
        .await
        .map_err(|e| DatabaseError::MigrationError(format!("Failed to create index: {}", e)))?;

    info!("✓ Database migrations completed successfully");

    Ok(())
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Database URL (e.g., "sqlite://data/tradekeeper.db")
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://data/tradekeeper.db".to_string(),
            max_connections: 5,
        }
    }
}

impl DatabaseConfig {
    /// Load from environment variables
    pub fn from_env() -> Self {
        let url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://data/tradekeeper.db".to_string());

        let max_connections = std::env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5);

        Self {
            url,
            max_connections,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_database_init() {
        let pool = init_database("sqlite::memory:").await;
        assert!(pool.is_ok());
    }

    #[tokio::test]
    async fn test_migrations() {
        let pool = init_database("sqlite::memory:").await.unwrap();

        let result: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name IN ('user_settings', 'trades', 'daily_stats')"
        )
        .fetch_one(&pool)
        .await
        .unwrap();

        assert_eq!(result.0, 3);
    }

    #[test]
    fn test_database_config_default() {
        let config = DatabaseConfig::default();
        assert_eq!(config.url, "sqlite://data/tradekeeper.db");
        assert_eq!(config.max_connections, 5);
    }
}
