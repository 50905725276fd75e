//! Time series and data point persistence

use crate::models::{DataPoint, TimeSeries};
use crate::Result;
use sqlx::{Row, SqlitePool};

/// Insert or update a series header row (everything except its points)
pub async fn upsert_series_header(pool: &SqlitePool, series: &TimeSeries) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO time_series (id, name, source, units, frequency, last_updated)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            source = excluded.source,
            units = excluded.units,
            frequency = excluded.frequency,
            last_updated = excluded.last_updated
        "#,
    )
    .bind(&series.id)
    .bind(&series.name)
    .bind(&series.source)
    .bind(&series.units)
    .bind(&series.frequency)
    .bind(&series.last_updated)
    .execute(pool)
    .await?;

    Ok(())
}

/// Insert or update one observation, keyed by (series id, date).
///
/// Re-ingesting a date overwrites the stored value; upstream revisions win.
pub async fn upsert_data_point(pool: &SqlitePool, series_id: &str, point: &DataPoint) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO data_points (series_id, date, value, source, period, units, as_of, revised)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(series_id, date) DO UPDATE SET
            value = excluded.value,
            source = excluded.source,
            period = excluded.period,
            units = excluded.units,
            as_of = excluded.as_of,
            revised = excluded.revised
        "#,
    )
    .bind(series_id)
    .bind(&point.date)
    .bind(point.value)
    .bind(&point.source)
    .bind(&point.period)
    .bind(&point.units)
    .bind(&point.as_of)
    .bind(point.revised)
    .execute(pool)
    .await?;

    Ok(())
}

/// Load one series with its points ascending by date
pub async fn get_time_series(pool: &SqlitePool, series_id: &str) -> Result<Option<TimeSeries>> {
    let header = sqlx::query(
        r#"
        SELECT id, name, source, units, frequency, last_updated
        FROM time_series
        WHERE id = ?
        "#,
    )
    .bind(series_id)
    .fetch_optional(pool)
    .await?;

    let header = match header {
        Some(row) => row,
        None => return Ok(None),
    };

    let rows = sqlx::query(
        r#"
        SELECT date, value, source, period, units, as_of, revised
        FROM data_points
        WHERE series_id = ?
        ORDER BY date ASC
        "#,
    )
    .bind(series_id)
    .fetch_all(pool)
    .await?;

    let data = rows
        .iter()
        .map(|row| DataPoint {
            date: row.get("date"),
            value: row.get("value"),
            source: row.get("source"),
            period: row.get("period"),
            units: row.get("units"),
            as_of: row.get("as_of"),
            revised: row.get("revised"),
        })
        .collect();

    Ok(Some(TimeSeries {
        id: header.get("id"),
        name: header.get("name"),
        data,
        units: header.get("units"),
        frequency: header.get("frequency"),
        source: header.get("source"),
        last_updated: header.get("last_updated"),
    }))
}

/// Number of stored points for one series
pub async fn count_data_points(pool: &SqlitePool, series_id: &str) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM data_points WHERE series_id = ?")
        .bind(series_id)
        .fetch_one(pool)
        .await?;

    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to create in-memory database");
        init_schema(&pool).await.expect("Failed to initialize schema");
        pool
    }

    fn point(date: &str, value: f64) -> DataPoint {
        DataPoint {
            date: date.to_string(),
            value,
            source: "FRED".to_string(),
            period: date.to_string(),
            units: "Index".to_string(),
            as_of: "2024-04-01T00:00:00Z".to_string(),
            revised: false,
        }
    }

    fn header(id: &str) -> TimeSeries {
        TimeSeries {
            id: id.to_string(),
            name: "Test series".to_string(),
            data: Vec::new(),
            units: "Index".to_string(),
            frequency: "Monthly".to_string(),
            source: "FRED".to_string(),
            last_updated: "2024-04-01T00:00:00Z".to_string(),
        }
    }

    #[tokio::test]
    async fn test_points_read_back_ascending() {
        let pool = test_pool().await;
        upsert_series_header(&pool, &header("CPI")).await.unwrap();

        for p in [point("2024-03-01", 3.0), point("2024-01-01", 1.0), point("2024-02-01", 2.0)] {
            upsert_data_point(&pool, "CPI", &p).await.unwrap();
        }

        let series = get_time_series(&pool, "CPI").await.unwrap().unwrap();
        let dates: Vec<_> = series.data.iter().map(|p| p.date.as_str()).collect();
        assert_eq!(dates, vec!["2024-01-01", "2024-02-01", "2024-03-01"]);
    }

    #[tokio::test]
    async fn test_point_upsert_overwrites_by_date() {
        let pool = test_pool().await;
        upsert_series_header(&pool, &header("CPI")).await.unwrap();

        upsert_data_point(&pool, "CPI", &point("2024-01-01", 1.0)).await.unwrap();
        let mut revised = point("2024-01-01", 1.5);
        revised.revised = true;
        upsert_data_point(&pool, "CPI", &revised).await.unwrap();

        assert_eq!(count_data_points(&pool, "CPI").await.unwrap(), 1);
        let series = get_time_series(&pool, "CPI").await.unwrap().unwrap();
        assert_eq!(series.data[0].value, 1.5);
        assert!(series.data[0].revised);
    }

    #[tokio::test]
    async fn test_missing_series_is_none() {
        let pool = test_pool().await;
        assert!(get_time_series(&pool, "nope").await.unwrap().is_none());
    }
}
