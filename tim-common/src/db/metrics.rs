//! KPI metric persistence
//!
//! Metrics are keyed by (module id, metric id). Each metrics run overwrites
//! the previous values and removes ids it no longer produces; no history is
//! kept.

use crate::models::{KpiMetric, Trend};
use crate::Result;
use sqlx::{Row, SqlitePool};

/// Insert or replace one metric owned by `module_id`
pub async fn upsert_metric(pool: &SqlitePool, module_id: &str, metric: &KpiMetric) -> Result<()> {
    let sparkline = metric
        .sparkline
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    sqlx::query(
        r#"
        INSERT INTO metrics (
            module_id, id, value, delta, delta_percent, period, trend,
            sparkline, source, last_updated
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(module_id, id) DO UPDATE SET
            value = excluded.value,
            delta = excluded.delta,
            delta_percent = excluded.delta_percent,
            period = excluded.period,
            trend = excluded.trend,
            sparkline = excluded.sparkline,
            source = excluded.source,
            last_updated = excluded.last_updated
        "#,
    )
    .bind(module_id)
    .bind(&metric.id)
    .bind(metric.value)
    .bind(metric.delta)
    .bind(metric.delta_percent)
    .bind(&metric.period)
    .bind(metric.trend.as_str())
    .bind(sparkline)
    .bind(&metric.source)
    .bind(&metric.last_updated)
    .execute(pool)
    .await?;

    Ok(())
}

/// Current metrics of one module, ordered by metric id
pub async fn get_module_metrics(pool: &SqlitePool, module_id: &str) -> Result<Vec<KpiMetric>> {
    let rows = sqlx::query(
        r#"
        SELECT id, value, delta, delta_percent, period, trend, sparkline, source, last_updated
        FROM metrics
        WHERE module_id = ?
        ORDER BY id
        "#,
    )
    .bind(module_id)
    .fetch_all(pool)
    .await?;

    let mut metrics = Vec::with_capacity(rows.len());
    for row in rows {
        let trend: String = row.get("trend");
        let sparkline: Option<String> = row.get("sparkline");

        metrics.push(KpiMetric {
            id: row.get("id"),
            value: row.get("value"),
            delta: row.get("delta"),
            delta_percent: row.get("delta_percent"),
            period: row.get("period"),
            trend: trend.parse::<Trend>()?,
            sparkline: sparkline.map(|s| serde_json::from_str(&s)).transpose()?,
            source: row.get("source"),
            last_updated: row.get("last_updated"),
        });
    }

    Ok(metrics)
}

/// Delete every metric of `module_id` whose id is not in `keep`.
///
/// Returns the removed ids.
pub async fn delete_metrics_except(
    pool: &SqlitePool,
    module_id: &str,
    keep: &[String],
) -> Result<Vec<String>> {
    let mut tx = pool.begin().await?;

    let existing: Vec<String> = sqlx::query_scalar("SELECT id FROM metrics WHERE module_id = ? ORDER BY id")
        .bind(module_id)
        .fetch_all(&mut *tx)
        .await?;

    let stale: Vec<String> = existing.into_iter().filter(|id| !keep.contains(id)).collect();
    for id in &stale {
        sqlx::query("DELETE FROM metrics WHERE module_id = ? AND id = ?")
            .bind(module_id)
            .bind(id)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    Ok(stale)
}
