//! BLS (Bureau of Labor Statistics) adapter
//!
//! POSTs to `timeseries/data/` with a five-year lookback window. Monthly
//! period codes `M01`..`M12` become the first day of that month; other period
//! codes (annual averages `M13`, quarters) have no calendar day and are skipped.
//! An item whose period is the literal revision marker carries a revised value
//! for the latest month of its year and is folded into that month's point.

use super::base::{self, DEFAULT_FREQUENCY, DEFAULT_UNITS};
use super::{AdapterError, SourceAdapter};
use chrono::{Datelike, Utc};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tim_common::config::{Environment, SeriesConfig, SourceConfig};
use tim_common::{DataPoint, TimeSeries};
use tracing::debug;

const AGENCY: &str = "BLS";
const LOOKBACK_YEARS: i32 = 5;
const STATUS_SUCCEEDED: &str = "REQUEST_SUCCEEDED";
/// Period value BLS uses for a revised observation
pub const REVISION_MARKER: &str = "R1";
const REVISION_FOOTNOTE: &str = "R";
const MISSING_MARKER: &str = "-";

#[derive(Debug, Deserialize)]
struct BlsResponse {
    status: Option<String>,
    #[serde(default)]
    message: Vec<String>,
    #[serde(rename = "Results")]
    results: Option<BlsResults>,
}

#[derive(Debug, Deserialize)]
struct BlsResults {
    #[serde(default)]
    series: Vec<BlsSeries>,
}

#[derive(Debug, Deserialize)]
struct BlsSeries {
    #[serde(default)]
    data: Vec<BlsItem>,
}

#[derive(Debug, Deserialize)]
struct BlsItem {
    year: String,
    period: String,
    value: String,
    #[serde(default)]
    footnotes: Vec<BlsFootnote>,
}

#[derive(Debug, Deserialize)]
struct BlsFootnote {
    code: Option<String>,
}

pub struct BlsAdapter {
    http: reqwest::Client,
    env: Arc<dyn Environment>,
}

impl BlsAdapter {
    pub fn new(http: reqwest::Client, env: Arc<dyn Environment>) -> Self {
        Self { http, env }
    }
}

#[async_trait::async_trait]
impl SourceAdapter for BlsAdapter {
    fn name(&self) -> &'static str {
        AGENCY
    }

    async fn fetch_series(
        &self,
        series_id: &str,
        config: &SourceConfig,
    ) -> Result<TimeSeries, AdapterError> {
        let api_key = config.resolve_api_key(self.env.as_ref())?;
        let series = base::required_series(config, series_id)?;
        let code = base::upstream_code(series_id, Some(series));
        let now = Utc::now();

        let url = format!("{}/timeseries/data/", config.base_url.trim_end_matches('/'));
        let body = request_body(code, &api_key, now.year());

        debug!(series_id = %series_id, code = %code, "Querying BLS");

        let payload = base::send_json(self.http.post(&url).json(&body), AGENCY).await?;
        parse_response(series_id, payload, series, &base::timestamp(now))
    }

    async fn fetch_latest(
        &self,
        series_id: &str,
        config: &SourceConfig,
    ) -> Result<DataPoint, AdapterError> {
        let series = self.fetch_series(series_id, config).await?;
        series
            .data
            .into_iter()
            .last()
            .ok_or_else(|| AdapterError::NoData(series_id.to_string()))
    }
}

/// JSON body for one series over `end_year - 5 ..= end_year`
pub fn request_body(code: &str, api_key: &str, end_year: i32) -> serde_json::Value {
    json!({
        "seriesid": [code],
        "startyear": (end_year - LOOKBACK_YEARS).to_string(),
        "endyear": end_year.to_string(),
        "registrationkey": api_key,
    })
}

/// Convert a BLS year and monthly period code into `YYYY-MM-01`.
///
/// Returns `None` for anything that is not `M01`..`M12` of a four-digit year.
pub fn period_to_date(year: &str, period: &str) -> Option<String> {
    if year.len() != 4 || !year.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let month = period.strip_prefix('M')?;
    if month.len() != 2 {
        return None;
    }
    match month.parse::<u32>() {
        Ok(1..=12) => Some(format!("{}-{}-01", year, month)),
        _ => None,
    }
}

/// Overwrite the latest monthly point of `year` with a revised value
fn apply_revision(series_id: &str, points: &mut [DataPoint], year: &str, value: f64) {
    let prefix = format!("{}-", year);
    let target = points
        .iter_mut()
        .filter(|p| p.date.starts_with(&prefix))
        .max_by(|a, b| a.date.cmp(&b.date));

    match target {
        Some(point) => {
            point.value = value;
            point.revised = true;
        }
        None => debug!(series_id = %series_id, year = %year,
            "Dropping BLS revision with no monthly observation in its year"),
    }
}

/// Normalize a `timeseries/data` payload
pub fn parse_response(
    series_id: &str,
    payload: serde_json::Value,
    series: &SeriesConfig,
    as_of: &str,
) -> Result<TimeSeries, AdapterError> {
    let response: BlsResponse = serde_json::from_value(payload)
        .map_err(|e| AdapterError::Parse(format!("BLS payload for {}: {}", series_id, e)))?;

    let items = response
        .results
        .and_then(|r| r.series.into_iter().next())
        .map(|s| s.data);

    let status = response.status.as_deref().unwrap_or(STATUS_SUCCEEDED);
    let items = match items {
        Some(items) if !items.is_empty() || status == STATUS_SUCCEEDED => items,
        _ if status != STATUS_SUCCEEDED => {
            return Err(AdapterError::Upstream {
                upstream: AGENCY,
                status: 200,
                message: format!("{}: {}", status, response.message.join("; ")),
            })
        }
        _ => {
            return Err(AdapterError::Parse(format!(
                "BLS payload for {} has no Results.series",
                series_id
            )))
        }
    };

    let units = series.units.clone().unwrap_or_else(|| DEFAULT_UNITS.to_string());

    let mut points = Vec::with_capacity(items.len());
    let mut revisions: Vec<(String, f64)> = Vec::new();
    for item in items {
        let raw = item.value.trim();
        if raw == MISSING_MARKER || raw.is_empty() {
            continue;
        }

        if item.period == REVISION_MARKER {
            let value: f64 = raw.parse().map_err(|_| {
                AdapterError::Parse(format!(
                    "BLS revised value '{}' for {} {} is not numeric",
                    raw, series_id, item.year
                ))
            })?;
            revisions.push((item.year, value));
            continue;
        }

        let date = match period_to_date(&item.year, &item.period) {
            Some(date) => date,
            None => {
                debug!(series_id = %series_id, year = %item.year, period = %item.period,
                    "Skipping BLS item without a calendar month");
                continue;
            }
        };

        let value: f64 = raw.parse().map_err(|_| {
            AdapterError::Parse(format!(
                "BLS value '{}' for {} {} is not numeric",
                raw, series_id, date
            ))
        })?;

        let revised = item
            .footnotes
            .iter()
            .any(|f| f.code.as_deref() == Some(REVISION_FOOTNOTE));

        points.push(DataPoint {
            date,
            value,
            source: AGENCY.to_string(),
            period: format!("{}-{}", item.year, item.period),
            units: units.clone(),
            as_of: as_of.to_string(),
            revised,
        });
    }

    for (year, value) in revisions {
        apply_revision(series_id, &mut points, &year, value);
    }

    Ok(TimeSeries {
        id: series_id.to_string(),
        name: series.name.clone().unwrap_or_else(|| series_id.to_string()),
        data: base::finalize_points(points),
        units,
        frequency: series
            .frequency
            .clone()
            .unwrap_or_else(|| DEFAULT_FREQUENCY.to_string()),
        source: AGENCY.to_string(),
        last_updated: as_of.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const AS_OF: &str = "2024-04-02T00:00:00.000Z";

    fn steel() -> SeriesConfig {
        SeriesConfig {
            id: Some("WPU101".to_string()),
            name: Some("PPI: Iron and steel".to_string()),
            units: Some("Index Dec 1982=100".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_period_to_date() {
        assert_eq!(period_to_date("2020", "M01").as_deref(), Some("2020-01-01"));
        assert_eq!(period_to_date("2023", "M12").as_deref(), Some("2023-12-01"));
        assert_eq!(period_to_date("2023", "M13"), None);
        assert_eq!(period_to_date("2023", "Q01"), None);
        assert_eq!(period_to_date("2023", REVISION_MARKER), None);
        assert_eq!(period_to_date("23", "M01"), None);
    }

    #[test]
    fn test_request_body_window() {
        let body = request_body("WPU101", "key", 2024);
        assert_eq!(body["seriesid"][0], "WPU101");
        assert_eq!(body["startyear"], "2019");
        assert_eq!(body["endyear"], "2024");
        assert_eq!(body["registrationkey"], "key");
    }

    #[test]
    fn test_parse_sorts_ascending_and_labels_period() {
        let payload = json!({
            "status": "REQUEST_SUCCEEDED",
            "Results": { "series": [{ "seriesID": "WPU101", "data": [
                { "year": "2024", "period": "M02", "value": "310.2", "footnotes": [{}] },
                { "year": "2024", "period": "M01", "value": "305.0", "footnotes": [{ "code": "R", "text": "revised" }] },
                { "year": "2023", "period": "M13", "value": "300.0", "footnotes": [] },
                { "year": "2023", "period": "M12", "value": "301.5", "footnotes": [] }
            ]}]}
        });

        let series = parse_response("PPI_steel", payload, &steel(), AS_OF).unwrap();
        let dates: Vec<_> = series.data.iter().map(|p| p.date.as_str()).collect();
        assert_eq!(dates, vec!["2023-12-01", "2024-01-01", "2024-02-01"]);
        assert_eq!(series.data[1].period, "2024-M01");
        assert!(series.data[1].revised);
        assert!(!series.data[0].revised);
        assert_eq!(series.name, "PPI: Iron and steel");
        assert_eq!(series.id, "PPI_steel");
    }

    #[test]
    fn test_revision_marker_revises_latest_month_of_year() {
        let payload = json!({
            "status": "REQUEST_SUCCEEDED",
            "Results": { "series": [{ "seriesID": "WPU101", "data": [
                { "year": "2024", "period": REVISION_MARKER, "value": "305.0", "footnotes": [] },
                { "year": "2024", "period": "M01", "value": "300.0", "footnotes": [] },
                { "year": "2023", "period": "M12", "value": "299.0", "footnotes": [] },
                { "year": "2022", "period": REVISION_MARKER, "value": "1.0", "footnotes": [] }
            ]}]}
        });

        let series = parse_response("PPI_steel", payload, &steel(), AS_OF).unwrap();
        assert_eq!(series.data.len(), 2);

        let jan = &series.data[1];
        assert_eq!(jan.date, "2024-01-01");
        assert!(jan.revised);
        assert_eq!(jan.value, 305.0);

        let dec = &series.data[0];
        assert!(!dec.revised);
        assert_eq!(dec.value, 299.0);
    }

    #[test]
    fn test_failed_request_is_upstream_error() {
        let payload = json!({
            "status": "REQUEST_NOT_PROCESSED",
            "message": ["Daily threshold for total number of requests allocated to API key has been reached."],
            "Results": {}
        });

        let err = parse_response("PPI_steel", payload, &steel(), AS_OF).unwrap_err();
        assert!(matches!(err, AdapterError::Upstream { upstream: "BLS", .. }));
    }

    #[test]
    fn test_missing_results_is_parse_error() {
        let payload = json!({ "status": "REQUEST_SUCCEEDED" });
        let err = parse_response("PPI_steel", payload, &steel(), AS_OF).unwrap_err();
        assert!(matches!(err, AdapterError::Parse(_)));
    }
}
