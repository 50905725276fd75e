//! Database initialization
//!
//! Each table is created by its own `CREATE TABLE IF NOT EXISTS` statement so
//! initialization is idempotent and safe to run on every startup.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Open a connection pool for `database_url` and create the schema if needed
pub async fn init_database(database_url: &str) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(Duration::from_millis(5000));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    info!("Opened database: {}", database_url);

    init_schema(&pool).await?;

    Ok(pool)
}

/// Create all tables (idempotent)
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    create_time_series_table(pool).await?;
    create_data_points_table(pool).await?;
    create_modules_table(pool).await?;
    create_module_series_table(pool).await?;
    create_metrics_table(pool).await?;
    create_policy_events_table(pool).await?;

    info!("Database schema initialized");
    Ok(())
}

async fn create_time_series_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS time_series (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            source TEXT NOT NULL,
            units TEXT NOT NULL,
            frequency TEXT NOT NULL,
            last_updated TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_data_points_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS data_points (
            series_id TEXT NOT NULL REFERENCES time_series(id) ON DELETE CASCADE,
            date TEXT NOT NULL,
            value REAL NOT NULL,
            source TEXT NOT NULL,
            period TEXT NOT NULL,
            units TEXT NOT NULL,
            as_of TEXT NOT NULL,
            revised INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (series_id, date)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_modules_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS modules (
            id TEXT PRIMARY KEY,
            slug TEXT NOT NULL UNIQUE,
            title TEXT NOT NULL,
            headline TEXT NOT NULL,
            subhead TEXT,
            methodology TEXT,
            confounders TEXT NOT NULL DEFAULT '[]',
            policy_band_start TEXT,
            policy_band_end TEXT,
            policy_band_label TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_module_series_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS module_series (
            module_id TEXT NOT NULL REFERENCES modules(id) ON DELETE CASCADE,
            series_id TEXT NOT NULL REFERENCES time_series(id),
            position INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (module_id, series_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_metrics_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS metrics (
            module_id TEXT NOT NULL REFERENCES modules(id) ON DELETE CASCADE,
            id TEXT NOT NULL,
            value REAL NOT NULL,
            delta REAL,
            delta_percent REAL,
            period TEXT NOT NULL,
            trend TEXT NOT NULL,
            sparkline TEXT,
            source TEXT NOT NULL,
            last_updated TEXT NOT NULL,
            PRIMARY KEY (module_id, id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_policy_events_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS policy_events (
            id TEXT PRIMARY KEY,
            date TEXT NOT NULL,
            title TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            source_url TEXT,
            type TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
