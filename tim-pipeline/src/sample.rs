//! Offline sample data
//!
//! Fills every module series that has no stored points with a synthetic
//! monthly history, so the metrics job and the read API can be exercised
//! without upstream API keys. Series that already hold ingested data are
//! never touched. Values are deterministic: a per-series base level with a
//! seasonal swing that drifts upward once the module's policy band starts.

use crate::adapters::base::{DEFAULT_FREQUENCY, DEFAULT_UNITS};
use crate::validation;
use anyhow::{Context, Result};
use chrono::{Datelike, Months, NaiveDate};
use sqlx::SqlitePool;
use std::f64::consts::PI;
use tim_common::{db, DataPoint, Module, TimeSeries};
use tracing::{debug, info};

/// Source label on every generated series and point
pub const SAMPLE_SOURCE: &str = "Sample";
/// First generated month
pub const SAMPLE_START: (i32, u32) = (2017, 1);

const PLACEHOLDER_UNITS: &str = "N/A";
const SEASONAL_AMPLITUDE: f64 = 0.02;
const MONTHLY_DRIFT: f64 = 0.004;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SampleStats {
    pub filled: usize,
    pub skipped: usize,
}

fn base_level(series_id: &str) -> f64 {
    let spread = series_id.bytes().map(u32::from).sum::<u32>() % 200;
    100.0 + f64::from(spread)
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Monthly points from [`SAMPLE_START`] through the month containing `end`
pub fn sample_points(
    series_id: &str,
    band_start: Option<NaiveDate>,
    end: NaiveDate,
    units: &str,
    as_of: &str,
) -> Vec<DataPoint> {
    let Some(mut month) = NaiveDate::from_ymd_opt(SAMPLE_START.0, SAMPLE_START.1, 1) else {
        return Vec::new();
    };
    let end = first_of_month(end);
    let band_start = band_start.map(first_of_month);
    let base = base_level(series_id);

    let mut points = Vec::new();
    let mut index = 0u32;
    while month <= end {
        let seasonal = base * SEASONAL_AMPLITUDE * (f64::from(index) * PI / 6.0).sin();
        let drift = match band_start {
            Some(start) if month >= start => {
                let months_after = (month.year() - start.year()) * 12
                    + month.month() as i32
                    - start.month() as i32;
                base * MONTHLY_DRIFT * f64::from(months_after)
            }
            _ => 0.0,
        };
        let value = ((base + seasonal + drift) * 100.0).round() / 100.0;

        points.push(DataPoint {
            date: month.format("%Y-%m-%d").to_string(),
            value,
            source: SAMPLE_SOURCE.to_string(),
            period: month.format("%Y-%m").to_string(),
            units: units.to_string(),
            as_of: as_of.to_string(),
            revised: false,
        });

        month = match month.checked_add_months(Months::new(1)) {
            Some(next) => next,
            None => break,
        };
        index += 1;
    }
    points
}

fn band_start(module: &Module) -> Result<Option<NaiveDate>> {
    module
        .policy_band
        .as_ref()
        .map(|band| {
            NaiveDate::parse_from_str(&band.start, "%Y-%m-%d")
                .with_context(|| format!("Module '{}' has an invalid policy band start", module.id))
        })
        .transpose()
}

/// Generate and store sample history for every empty module series
pub async fn load_sample_data(pool: &SqlitePool, end: NaiveDate, as_of: &str) -> Result<SampleStats> {
    let modules = db::get_all_modules(pool).await?;
    let mut stats = SampleStats::default();

    for module in &modules {
        let band_start = band_start(module)?;

        for series_id in &module.series {
            let existing = db::get_time_series(pool, series_id).await?;
            if existing.as_ref().is_some_and(|s| !s.data.is_empty()) {
                debug!(series_id = %series_id, "Series already has data, leaving it alone");
                stats.skipped += 1;
                continue;
            }

            let (name, units) = match existing {
                Some(s) if s.units != PLACEHOLDER_UNITS => (s.name, s.units),
                Some(s) => (s.name, DEFAULT_UNITS.to_string()),
                None => (series_id.clone(), DEFAULT_UNITS.to_string()),
            };

            let series = TimeSeries {
                id: series_id.clone(),
                name,
                data: sample_points(series_id, band_start, end, &units, as_of),
                units,
                frequency: DEFAULT_FREQUENCY.to_string(),
                source: SAMPLE_SOURCE.to_string(),
                last_updated: as_of.to_string(),
            };
            validation::validate_time_series(&series)
                .with_context(|| format!("Generated series '{}' is invalid", series_id))?;

            db::upsert_series_header(pool, &series).await?;
            for point in &series.data {
                db::upsert_data_point(pool, &series.id, point).await?;
            }
            info!(module = %module.slug, series_id = %series_id, points = series.data.len(),
                "Loaded sample series");
            stats.filled += 1;
        }
    }

    info!(filled = stats.filled, skipped = stats.skipped, "Sample data complete");
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::{Job, MetricsJob};
    use sqlx::sqlite::SqlitePoolOptions;
    use tim_common::PolicyBand;

    const AS_OF: &str = "2024-04-02T00:00:00.000Z";

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn module() -> Module {
        Module {
            id: "soybeans".to_string(),
            slug: "soybeans".to_string(),
            title: "Soybeans".to_string(),
            headline: "Exports fell".to_string(),
            subhead: None,
            kpis: vec![],
            series: vec!["PSOYBUSDM".to_string(), "soybeans_china".to_string()],
            policy_band: Some(PolicyBand {
                start: "2018-07-06".to_string(),
                end: None,
                label: "Section 301 Tariffs".to_string(),
            }),
            methodology: None,
            confounders: vec![],
        }
    }

    async fn pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        db::init_schema(&pool).await.unwrap();
        pool
    }

    #[test]
    fn test_sample_points_are_monthly_and_deterministic() {
        let band = Some(date("2018-07-06"));
        let points = sample_points("PSOYBUSDM", band, date("2018-12-15"), "USD/MT", AS_OF);

        assert_eq!(points.len(), 24);
        assert_eq!(points[0].date, "2017-01-01");
        assert_eq!(points[23].date, "2018-12-01");
        assert_eq!(points[23].period, "2018-12");
        assert!(points.iter().all(|p| p.source == SAMPLE_SOURCE && p.units == "USD/MT"));

        let again = sample_points("PSOYBUSDM", band, date("2018-12-15"), "USD/MT", AS_OF);
        assert_eq!(points, again);

        // Same calendar month a year apart differs only by post-band drift.
        let flat = sample_points("PSOYBUSDM", None, date("2018-12-15"), "USD/MT", AS_OF);
        assert!((flat[0].value - flat[12].value).abs() < 1e-9);
        assert!(points[23].value > flat[23].value);
    }

    #[tokio::test]
    async fn test_sample_data_feeds_metrics_and_never_overwrites() {
        let pool = pool().await;
        db::upsert_module(&pool, &module()).await.unwrap();

        let stats = load_sample_data(&pool, date("2024-03-10"), AS_OF).await.unwrap();
        assert_eq!(stats, SampleStats { filled: 2, skipped: 0 });

        let series = db::get_time_series(&pool, "soybeans_china").await.unwrap().unwrap();
        assert!(!series.is_placeholder());
        assert_eq!(series.units, DEFAULT_UNITS);
        assert_eq!(series.data.last().unwrap().date, "2024-03-01");

        let stats = load_sample_data(&pool, date("2024-03-10"), AS_OF).await.unwrap();
        assert_eq!(stats, SampleStats { filled: 0, skipped: 2 });

        let report = MetricsJob::new(pool.clone()).run().await;
        assert!(report.success);
        assert_eq!(report.stats.succeeded, 2);

        let ids: Vec<_> = db::get_module_metrics(&pool, "soybeans")
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(
            ids,
            vec!["PSOYBUSDM_baseline", "PSOYBUSDM_latest", "soybeans_china_baseline", "soybeans_china_latest"]
        );
    }
}
