//! Module persistence
//!
//! A module write links every referenced series. Series that have not been
//! ingested yet get a placeholder `time_series` row (source "Pending") inside
//! the same transaction, so the link is never dangling and a later ingest
//! simply overwrites the placeholder header.

use crate::db::metrics::get_module_metrics;
use crate::models::{Module, PolicyBand, PENDING_SOURCE};
use crate::Result;
use chrono::{SecondsFormat, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::debug;

/// Insert or update a module and replace its series links.
///
/// Stored KPI metrics are left alone; the metrics job owns them.
pub async fn upsert_module(pool: &SqlitePool, module: &Module) -> Result<()> {
    let confounders = serde_json::to_string(&module.confounders)?;
    let (band_start, band_end, band_label) = match &module.policy_band {
        Some(band) => (
            Some(band.start.as_str()),
            band.end.as_deref(),
            Some(band.label.as_str()),
        ),
        None => (None, None, None),
    };

    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO modules (
            id, slug, title, headline, subhead, methodology, confounders,
            policy_band_start, policy_band_end, policy_band_label
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            slug = excluded.slug,
            title = excluded.title,
            headline = excluded.headline,
            subhead = excluded.subhead,
            methodology = excluded.methodology,
            confounders = excluded.confounders,
            policy_band_start = excluded.policy_band_start,
            policy_band_end = excluded.policy_band_end,
            policy_band_label = excluded.policy_band_label
        "#,
    )
    .bind(&module.id)
    .bind(&module.slug)
    .bind(&module.title)
    .bind(&module.headline)
    .bind(&module.subhead)
    .bind(&module.methodology)
    .bind(&confounders)
    .bind(band_start)
    .bind(band_end)
    .bind(band_label)
    .execute(&mut *tx)
    .await?;

    sqlx::query("DELETE FROM module_series WHERE module_id = ?")
        .bind(&module.id)
        .execute(&mut *tx)
        .await?;

    let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);

    for (position, series_id) in module.series.iter().enumerate() {
        let created = sqlx::query(
            r#"
            INSERT INTO time_series (id, name, source, units, frequency, last_updated)
            VALUES (?, ?, ?, 'N/A', 'Monthly', ?)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(series_id)
        .bind(series_id)
        .bind(PENDING_SOURCE)
        .bind(&now)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if created > 0 {
            debug!(module = %module.id, series_id = %series_id, "Created placeholder series");
        }

        sqlx::query(
            r#"
            INSERT INTO module_series (module_id, series_id, position)
            VALUES (?, ?, ?)
            ON CONFLICT(module_id, series_id) DO UPDATE SET position = excluded.position
            "#,
        )
        .bind(&module.id)
        .bind(series_id)
        .bind(position as i64)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    Ok(())
}

/// Load one module by slug with its linked series ids and current metrics
pub async fn get_module_by_slug(pool: &SqlitePool, slug: &str) -> Result<Option<Module>> {
    let row = sqlx::query(
        r#"
        SELECT id, slug, title, headline, subhead, methodology, confounders,
               policy_band_start, policy_band_end, policy_band_label
        FROM modules
        WHERE slug = ?
        "#,
    )
    .bind(slug)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => Ok(Some(load_module(pool, &row).await?)),
        None => Ok(None),
    }
}

/// Load every module, ordered by id
pub async fn get_all_modules(pool: &SqlitePool) -> Result<Vec<Module>> {
    let rows = sqlx::query(
        r#"
        SELECT id, slug, title, headline, subhead, methodology, confounders,
               policy_band_start, policy_band_end, policy_band_label
        FROM modules
        ORDER BY id
        "#,
    )
    .fetch_all(pool)
    .await?;

    let mut modules = Vec::with_capacity(rows.len());
    for row in &rows {
        modules.push(load_module(pool, row).await?);
    }

    Ok(modules)
}

/// Series ids linked to a module, in display order
pub async fn get_module_series_ids(pool: &SqlitePool, module_id: &str) -> Result<Vec<String>> {
    let ids: Vec<String> = sqlx::query_scalar(
        "SELECT series_id FROM module_series WHERE module_id = ? ORDER BY position, series_id",
    )
    .bind(module_id)
    .fetch_all(pool)
    .await?;

    Ok(ids)
}

async fn load_module(pool: &SqlitePool, row: &SqliteRow) -> Result<Module> {
    let id: String = row.get("id");
    let confounders: String = row.get("confounders");
    let band_start: Option<String> = row.get("policy_band_start");

    let policy_band = band_start.map(|start| PolicyBand {
        start,
        end: row.get("policy_band_end"),
        label: row
            .get::<Option<String>, _>("policy_band_label")
            .unwrap_or_default(),
    });

    let series = get_module_series_ids(pool, &id).await?;
    let kpis = get_module_metrics(pool, &id).await?;

    Ok(Module {
        slug: row.get("slug"),
        title: row.get("title"),
        headline: row.get("headline"),
        subhead: row.get("subhead"),
        kpis,
        series,
        policy_band,
        methodology: row.get("methodology"),
        confounders: serde_json::from_str(&confounders)?,
        id,
    })
}
