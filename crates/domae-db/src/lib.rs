//! PostgreSQL access layer.
//!
//! Owns the connection pool, embedded migrations, and one module per
//! table. Query functions that participate in multi-statement write flows
//! take `&mut PgConnection` so callers can run them inside a transaction;
//! read-side selectors take `&PgPool`.

mod collected_products;
mod collection_batches;
mod price_alerts;
mod product_history;

pub use collected_products::{
    count_products_by_status, expire_stale_products, find_product_by_natural_key, get_product,
    insert_collected_product, list_popular_products, list_price_sweep_products, list_priority_products,
    list_products, list_stale_products, touch_product_freshness, update_product_observed,
    update_stock_observation, CollectedProductRow, NewCollectedProduct, ProductUpdate,
};
pub use collection_batches::{
    complete_batch, create_batch, fail_batch, get_batch, list_recent_batches, start_batch,
    BatchCounts, CollectionBatchRow,
};
pub use price_alerts::{
    create_price_alert, deactivate_alert, list_active_alerts, record_alert_fired, PriceAlertRow,
};
pub use product_history::{
    count_history_for_batch, insert_product_history, latest_price_change, list_product_history,
    NewProductHistory, ProductHistoryRow,
};

use std::time::Duration;

use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use domae_core::AppConfig;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("DATABASE_URL is not set")]
    MissingDatabaseUrl,

    #[error("invalid value for {var}: {reason}")]
    InvalidPoolVar { var: &'static str, reason: String },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("collection batch {batch_id} is not {expected_status}")]
    InvalidBatchTransition {
        batch_id: String,
        expected_status: &'static str,
    },

    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

/// Connection pool parameters.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl PoolConfig {
    /// Build from process environment variables, using defaults for
    /// everything except `DATABASE_URL`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::MissingDatabaseUrl`] when `DATABASE_URL` is
    /// unset, or [`DbError::InvalidPoolVar`] when a tuning knob fails to
    /// parse.
    pub fn from_env() -> Result<Self, DbError> {
        let database_url =
            std::env::var("DATABASE_URL").map_err(|_| DbError::MissingDatabaseUrl)?;
        Ok(Self {
            database_url,
            max_connections: env_u32("DATABASE_MAX_CONNECTIONS", 10)?,
            min_connections: env_u32("DATABASE_MIN_CONNECTIONS", 2)?,
            acquire_timeout_secs: u64::from(env_u32("DATABASE_ACQUIRE_TIMEOUT_SECS", 30)?),
        })
    }

    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            database_url: config.database_url.clone(),
            max_connections: config.db_max_connections,
            min_connections: config.db_min_connections,
            acquire_timeout_secs: config.db_acquire_timeout_secs,
        }
    }
}

fn env_u32(var: &'static str, default: u32) -> Result<u32, DbError> {
    match std::env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e: std::num::ParseIntError| DbError::InvalidPoolVar {
                var,
                reason: e.to_string(),
            }),
        Err(_) => Ok(default),
    }
}

/// Open a connection pool.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] when the pool cannot be established.
pub async fn connect_pool(config: &PoolConfig) -> Result<PgPool, DbError> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect(&config.database_url)
        .await?;
    Ok(pool)
}

/// Apply any pending migrations.
///
/// # Errors
///
/// Returns [`DbError::Migrate`] when a migration fails.
pub async fn run_migrations(pool: &PgPool) -> Result<(), DbError> {
    MIGRATOR.run(pool).await?;
    tracing::info!("database migrations up to date");
    Ok(())
}

/// Cheap connectivity probe used by the health endpoint.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] when the round trip fails.
pub async fn ping(pool: &PgPool) -> Result<(), DbError> {
    sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(pool).await?;
    Ok(())
}

