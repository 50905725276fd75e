//! Metrics engine
//!
//! Derives KPIs from a persisted series: the latest value compared with the
//! point nearest one year earlier, and (when the module has a policy band)
//! the latest value compared with the point nearest the band start.

use crate::adapters::base::{delta, delta_percent};
use chrono::{Months, NaiveDate};
use thiserror::Error;
use tim_common::{DataPoint, KpiMetric, Module, TimeSeries, Trend};

/// Recent values carried in a latest-value metric
pub const SPARKLINE_LEN: usize = 12;
/// Percent change beyond which a YoY trend is `up`/`down`
pub const YOY_TREND_THRESHOLD: f64 = 1.0;
/// Wider band for baseline comparisons, which span longer windows
pub const BASELINE_TREND_THRESHOLD: f64 = 5.0;

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("Invalid date '{date}' in series {series_id}")]
    InvalidDate { series_id: String, date: String },

    #[error("Invalid policy band start '{0}'")]
    InvalidBandStart(String),
}

fn parse_date(date: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}

/// Point whose date is nearest `target` by absolute day distance.
///
/// Linear scan in slice order; on a tie the first point encountered wins.
/// Points with unparseable dates are ignored.
pub fn find_nearest(points: &[DataPoint], target: NaiveDate) -> Option<&DataPoint> {
    let mut best: Option<(&DataPoint, i64)> = None;
    for point in points {
        let Some(date) = parse_date(&point.date) else {
            continue;
        };
        let distance = (date - target).num_days().abs();
        match best {
            Some((_, min)) if distance >= min => {}
            _ => best = Some((point, distance)),
        }
    }
    best.map(|(point, _)| point)
}

/// The most recent `len` values in chronological order
pub fn sparkline(points: &[DataPoint], len: usize) -> Vec<f64> {
    let start = points.len().saturating_sub(len);
    points[start..].iter().map(|p| p.value).collect()
}

/// Id of the latest-value KPI of a series
pub fn latest_metric_id(series_id: &str) -> String {
    format!("{}_latest", series_id)
}

/// Id of the policy-baseline KPI of a series
pub fn baseline_metric_id(series_id: &str) -> String {
    format!("{}_baseline", series_id)
}

/// KPIs for one series within one module.
///
/// Empty series produce no metrics. A series with no earlier point has no
/// YoY delta and a `stable` trend.
pub fn compute_series_metrics(
    series: &TimeSeries,
    module: &Module,
) -> Result<Vec<KpiMetric>, MetricsError> {
    let Some((latest, earlier)) = series.data.split_last() else {
        return Ok(Vec::new());
    };
    let latest_date = parse_date(&latest.date).ok_or_else(|| MetricsError::InvalidDate {
        series_id: series.id.clone(),
        date: latest.date.clone(),
    })?;

    let mut metrics = Vec::with_capacity(2);

    let year_ago = latest_date
        .checked_sub_months(Months::new(12))
        .and_then(|target| find_nearest(earlier, target));
    let (yoy_delta, yoy_percent) = match year_ago {
        Some(prior) => (
            Some(delta(latest.value, prior.value)),
            Some(delta_percent(latest.value, prior.value)),
        ),
        None => (None, None),
    };

    metrics.push(KpiMetric {
        id: latest_metric_id(&series.id),
        value: latest.value,
        delta: yoy_delta,
        delta_percent: yoy_percent,
        period: format!("YoY to {}", latest_date.format("%b %Y")),
        trend: yoy_percent
            .map(|dp| Trend::from_delta_percent(dp, YOY_TREND_THRESHOLD))
            .unwrap_or(Trend::Stable),
        sparkline: Some(sparkline(&series.data, SPARKLINE_LEN)),
        source: series.source.clone(),
        last_updated: series.last_updated.clone(),
    });

    if let Some(band) = &module.policy_band {
        let start = parse_date(&band.start)
            .ok_or_else(|| MetricsError::InvalidBandStart(band.start.clone()))?;

        if let Some(baseline) = find_nearest(&series.data, start) {
            let dp = delta_percent(latest.value, baseline.value);
            metrics.push(KpiMetric {
                id: baseline_metric_id(&series.id),
                value: latest.value,
                delta: Some(delta(latest.value, baseline.value)),
                delta_percent: Some(dp),
                period: format!("vs {} baseline", start.format("%b %Y")),
                trend: Trend::from_delta_percent(dp, BASELINE_TREND_THRESHOLD),
                sparkline: None,
                source: series.source.clone(),
                last_updated: series.last_updated.clone(),
            });
        }
    }

    Ok(metrics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tim_common::PolicyBand;

    fn point(date: &str, value: f64) -> DataPoint {
        DataPoint {
            date: date.to_string(),
            value,
            source: "BLS".to_string(),
            period: date.to_string(),
            units: "Index".to_string(),
            as_of: "2024-04-02T00:00:00.000Z".to_string(),
            revised: false,
        }
    }

    fn series(points: Vec<DataPoint>) -> TimeSeries {
        TimeSeries {
            id: "PPI_steel".to_string(),
            name: "PPI steel".to_string(),
            data: points,
            units: "Index".to_string(),
            frequency: "Monthly".to_string(),
            source: "BLS".to_string(),
            last_updated: "2024-04-02T00:00:00.000Z".to_string(),
        }
    }

    fn module(band_start: Option<&str>) -> Module {
        Module {
            id: "steel".to_string(),
            slug: "steel-aluminum".to_string(),
            title: "Steel".to_string(),
            headline: "Steel prices".to_string(),
            subhead: None,
            kpis: vec![],
            series: vec!["PPI_steel".to_string()],
            policy_band: band_start.map(|start| PolicyBand {
                start: start.to_string(),
                end: None,
                label: "Section 232".to_string(),
            }),
            methodology: None,
            confounders: vec![],
        }
    }

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_nearest_without_exact_match() {
        let points = vec![
            point("2023-01-01", 1.0),
            point("2023-02-01", 2.0),
            point("2023-03-01", 3.0),
        ];
        let nearest = find_nearest(&points, day("2023-02-20")).unwrap();
        assert_eq!(nearest.value, 3.0);
    }

    #[test]
    fn test_nearest_tie_keeps_earlier_point() {
        let points = vec![point("2023-01-01", 1.0), point("2023-01-11", 2.0)];
        let nearest = find_nearest(&points, day("2023-01-06")).unwrap();
        assert_eq!(nearest.value, 1.0);
    }

    #[test]
    fn test_single_point_has_no_delta_and_no_baseline() {
        let s = series(vec![point("2024-03-01", 300.0)]);
        let metrics = compute_series_metrics(&s, &module(None)).unwrap();

        assert_eq!(metrics.len(), 1);
        let latest = &metrics[0];
        assert_eq!(latest.id, "PPI_steel_latest");
        assert_eq!(latest.value, 300.0);
        assert!(latest.delta.is_none());
        assert!(latest.delta_percent.is_none());
        assert_eq!(latest.trend, Trend::Stable);
        assert_eq!(latest.period, "YoY to Mar 2024");
    }

    #[test]
    fn test_yoy_and_baseline() {
        let s = series(vec![
            point("2018-03-01", 100.0),
            point("2023-03-01", 200.0),
            point("2023-09-01", 205.0),
            point("2024-03-01", 220.0),
        ]);
        let metrics = compute_series_metrics(&s, &module(Some("2018-03-23"))).unwrap();
        assert_eq!(metrics.len(), 2);

        let latest = &metrics[0];
        assert_eq!(latest.delta, Some(20.0));
        assert!((latest.delta_percent.unwrap() - 10.0).abs() < 1e-9);
        assert_eq!(latest.trend, Trend::Up);
        assert_eq!(latest.sparkline.as_deref(), Some(&[100.0, 200.0, 205.0, 220.0][..]));

        let baseline = &metrics[1];
        assert_eq!(baseline.id, "PPI_steel_baseline");
        assert_eq!(baseline.delta, Some(120.0));
        assert_eq!(baseline.trend, Trend::Up);
        assert_eq!(baseline.period, "vs Mar 2018 baseline");
        assert!(baseline.sparkline.is_none());
    }

    #[test]
    fn test_baseline_trend_uses_wider_band() {
        let s = series(vec![point("2018-03-01", 100.0), point("2024-03-01", 104.0)]);
        let metrics = compute_series_metrics(&s, &module(Some("2018-03-01"))).unwrap();
        assert_eq!(metrics[1].trend, Trend::Stable);
    }

    #[test]
    fn test_sparkline_keeps_last_twelve() {
        let points: Vec<_> = (1..=15)
            .map(|m| point(&format!("{}-{:02}-01", 2023 + (m - 1) / 12, (m - 1) % 12 + 1), m as f64))
            .collect();
        let values = sparkline(&points, SPARKLINE_LEN);
        assert_eq!(values.len(), 12);
        assert_eq!(values[0], 4.0);
        assert_eq!(values[11], 15.0);
    }

    #[test]
    fn test_empty_series_yields_nothing() {
        let metrics = compute_series_metrics(&series(vec![]), &module(Some("2018-03-01"))).unwrap();
        assert!(metrics.is_empty());
    }

    #[test]
    fn test_bad_band_start_is_error() {
        let s = series(vec![point("2024-03-01", 1.0)]);
        assert!(matches!(
            compute_series_metrics(&s, &module(Some("March 2018"))),
            Err(MetricsError::InvalidBandStart(_))
        ));
    }
}
