//! Census international trade adapter
//!
//! The `timeseries/intltrade` endpoints do not return a fixed shape. Most
//! answer with an array of rows whose first row holds the column labels;
//! some answer with an array of objects. The shape is detected per response
//! and the time/value columns are located by substring match on the labels.

use super::base::{self, DEFAULT_FREQUENCY};
use super::{AdapterError, SourceAdapter};
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use tim_common::config::{expand_placeholders, Environment, SeriesConfig, SourceConfig};
use tim_common::{DataPoint, TimeSeries};
use tracing::{debug, warn};

const AGENCY: &str = "Census";
const DEFAULT_UNITS: &str = "USD";
const DEFAULT_TRADE_TYPE: &str = "exports";
const DEFAULT_FIELDS: &str = "ALL_VAL_MO";
const DEFAULT_COMMODITY_LEVEL: &str = "HS6";
const DEFAULT_START: &str = "2020-01";

const TIME_NEEDLES: [&str; 3] = ["time", "period", "date"];
const VALUE_NEEDLES: [&str; 3] = ["val", "value", "trade"];

pub struct CensusAdapter {
    http: reqwest::Client,
    env: Arc<dyn Environment>,
}

impl CensusAdapter {
    pub fn new(http: reqwest::Client, env: Arc<dyn Environment>) -> Self {
        Self { http, env }
    }
}

#[async_trait::async_trait]
impl SourceAdapter for CensusAdapter {
    fn name(&self) -> &'static str {
        AGENCY
    }

    async fn fetch_series(
        &self,
        series_id: &str,
        config: &SourceConfig,
    ) -> Result<TimeSeries, AdapterError> {
        let series = base::required_series(config, series_id)?;
        let now = Utc::now();

        // The key is optional for Census; a configured one must still resolve.
        let api_key = match config.api_key.as_deref() {
            Some(raw) => Some(expand_placeholders(raw, self.env.as_ref())?),
            None => None,
        };

        let url = endpoint(&config.base_url, series);
        let params = query_params(series, &now.format("%Y-%m").to_string(), api_key);

        debug!(series_id = %series_id, url = %url, "Querying Census");

        let request = self.http.get(&url).query(&params);
        let payload = base::send_json(request, AGENCY).await?;
        parse_payload(series_id, payload, series, &base::timestamp(now))
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

/// Trade-direction endpoint, `{base}/imports` or `{base}/exports`
pub fn endpoint(base_url: &str, series: &SeriesConfig) -> String {
    let trade_type = series
        .trade_type
        .as_deref()
        .filter(|t| !t.is_empty())
        .unwrap_or(DEFAULT_TRADE_TYPE);
    format!("{}/{}", base_url.trim_end_matches('/'), trade_type)
}

/// Query parameters for one series; `time_to` is the current `YYYY-MM`
pub fn query_params(
    series: &SeriesConfig,
    time_to: &str,
    api_key: Option<String>,
) -> Vec<(&'static str, String)> {
    let mut params = vec![
        (
            "get",
            series.fields.clone().unwrap_or_else(|| DEFAULT_FIELDS.to_string()),
        ),
        (
            "COMM_LVL",
            series
                .commodity_level
                .clone()
                .unwrap_or_else(|| DEFAULT_COMMODITY_LEVEL.to_string()),
        ),
        (
            "time_from",
            series.start_date.clone().unwrap_or_else(|| DEFAULT_START.to_string()),
        ),
        ("time_to", time_to.to_string()),
    ];

    if let Some(hs) = &series.hs_code {
        params.push(("HS", hs.clone()));
    }
    if let Some(country) = &series.country {
        params.push(("CTY_CODE", country.clone()));
    }
    if let Some(key) = api_key {
        params.push(("key", key));
    }
    params
}

/// Normalize a Census period label to `YYYY-MM-DD`.
///
/// `YYYY-MM` and `YYYYMM` get day `01`; anything else (including a full
/// `YYYY-MM-DD`) passes through unchanged and is left to validation.
pub fn normalize_period(period: &str) -> String {
    let period = period.trim();
    let bytes = period.as_bytes();
    let digits = |range: std::ops::Range<usize>| bytes[range].iter().all(u8::is_ascii_digit);

    if bytes.len() == 7 && bytes[4] == b'-' && digits(0..4) && digits(5..7) {
        return format!("{}-01", period);
    }
    if bytes.len() == 6 && digits(0..6) {
        return format!("{}-{}-01", &period[..4], &period[4..6]);
    }
    period.to_string()
}

/// Index of the first label containing any needle (case-insensitive)
pub fn locate_column<S: AsRef<str>>(labels: &[S], needles: &[&str]) -> Option<usize> {
    labels.iter().position(|label| {
        let label = label.as_ref().to_ascii_lowercase();
        needles.iter().any(|needle| label.contains(needle))
    })
}

/// Normalize a Census payload of either shape
pub fn parse_payload(
    series_id: &str,
    payload: Value,
    series: &SeriesConfig,
    as_of: &str,
) -> Result<TimeSeries, AdapterError> {
    let rows = match payload {
        Value::Array(rows) => rows,
        _ => {
            return Err(AdapterError::Parse(format!(
                "Census response for {} is not an array",
                series_id
            )))
        }
    };

    let raw = match rows.first() {
        None => {
            warn!(series_id = %series_id, "Census returned an empty response");
            Vec::new()
        }
        Some(Value::Array(_)) => parse_rows(series_id, &rows)?,
        Some(Value::Object(_)) => parse_objects(series_id, &rows)?,
        Some(_) => {
            return Err(AdapterError::Parse(format!(
                "Unsupported Census response format for {}",
                series_id
            )))
        }
    };

    let units = series.units.clone().unwrap_or_else(|| DEFAULT_UNITS.to_string());

    let points = raw
        .into_iter()
        .filter_map(|(period, value)| {
            // Non-numeric cells are dropped rather than stored as zero.
            let value = value?;
            Some(DataPoint {
                date: normalize_period(&period),
                value,
                source: AGENCY.to_string(),
                period,
                units: units.clone(),
                as_of: as_of.to_string(),
                revised: false,
            })
        })
        .collect();

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

fn parse_rows(series_id: &str, rows: &[Value]) -> Result<Vec<(String, Option<f64>)>, AdapterError> {
    let header: Vec<String> = match rows.first() {
        Some(Value::Array(cells)) => cells.iter().map(cell_text).collect(),
        _ => Vec::new(),
    };
    let (time_idx, value_idx) = locate_columns(series_id, &header)?;

    let mut out = Vec::with_capacity(rows.len().saturating_sub(1));
    for row in &rows[1..] {
        let cells = match row {
            Value::Array(cells) => cells,
            _ => continue,
        };
        let (Some(time), Some(value)) = (cells.get(time_idx), cells.get(value_idx)) else {
            continue;
        };
        out.push((cell_text(time), cell_number(value)));
    }
    Ok(out)
}

fn parse_objects(
    series_id: &str,
    rows: &[Value],
) -> Result<Vec<(String, Option<f64>)>, AdapterError> {
    let keys: Vec<String> = match rows.first() {
        Some(Value::Object(map)) => map.keys().cloned().collect(),
        _ => Vec::new(),
    };
    let (time_idx, value_idx) = locate_columns(series_id, &keys)?;
    let (time_key, value_key) = (&keys[time_idx], &keys[value_idx]);

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let Value::Object(map) = row else {
            continue;
        };
        let Some(time) = map.get(time_key) else {
            continue;
        };
        out.push((cell_text(time), map.get(value_key).and_then(cell_number)));
    }
    Ok(out)
}

fn locate_columns(series_id: &str, labels: &[String]) -> Result<(usize, usize), AdapterError> {
    match (
        locate_column(labels, &TIME_NEEDLES),
        locate_column(labels, &VALUE_NEEDLES),
    ) {
        (Some(time), Some(value)) => Ok((time, value)),
        _ => Err(AdapterError::Parse(format!(
            "Could not parse Census response for {}: missing time or value columns in {:?}",
            series_id, labels
        ))),
    }
}

fn cell_text(cell: &Value) -> String {
    match cell {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn cell_number(cell: &Value) -> Option<f64> {
    let value = match cell {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    value.is_finite().then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const AS_OF: &str = "2024-04-02T00:00:00.000Z";

    fn soybeans() -> SeriesConfig {
        SeriesConfig {
            name: Some("Soybean exports to China".to_string()),
            trade_type: Some("exports".to_string()),
            hs_code: Some("1201".to_string()),
            country: Some("5700".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_normalize_period() {
        assert_eq!(normalize_period("202003"), "2020-03-01");
        assert_eq!(normalize_period("2020-03"), "2020-03-01");
        assert_eq!(normalize_period("2020-03-01"), "2020-03-01");
        assert_eq!(normalize_period("garbage"), "garbage");
    }

    #[test]
    fn test_locate_column_is_fuzzy() {
        let header = ["CTY_CODE", "ALL_VAL_MO", "time"];
        assert_eq!(locate_column(&header, &TIME_NEEDLES), Some(2));
        assert_eq!(locate_column(&header, &VALUE_NEEDLES), Some(1));
        assert_eq!(locate_column(&["a", "b"], &TIME_NEEDLES), None);
    }

    #[test]
    fn test_parse_array_of_rows() {
        let payload = json!([
            ["ALL_VAL_MO", "COMM_LVL", "time"],
            ["1500000", "HS6", "2024-02"],
            ["(X)", "HS6", "2024-03"],
            ["0", "HS6", "2024-04"],
            ["1200000", "HS6", "2024-01"]
        ]);

        let series = parse_payload("soybeans_china", payload, &soybeans(), AS_OF).unwrap();
        let dates: Vec<_> = series.data.iter().map(|p| p.date.as_str()).collect();
        assert_eq!(dates, vec!["2024-01-01", "2024-02-01", "2024-04-01"]);
        assert_eq!(series.data[0].value, 1_200_000.0);
        assert_eq!(series.data[2].value, 0.0);
        assert_eq!(series.data[1].period, "2024-02");
        assert_eq!(series.units, "USD");
        assert_eq!(series.source, "Census");
    }

    #[test]
    fn test_parse_array_of_objects() {
        let payload = json!([
            { "period": "202312", "trade_value": 10.5 },
            { "period": "202401", "trade_value": "11.25" }
        ]);

        let series = parse_payload("steel_imports", payload, &SeriesConfig::default(), AS_OF).unwrap();
        assert_eq!(series.data.len(), 2);
        assert_eq!(series.data[0].date, "2023-12-01");
        assert_eq!(series.data[1].value, 11.25);
        assert_eq!(series.name, "steel_imports");
    }

    #[test]
    fn test_missing_columns_is_parse_error() {
        let payload = json!([["CTY_CODE", "COMM_LVL"], ["5700", "HS6"]]);
        let err = parse_payload("x", payload, &soybeans(), AS_OF).unwrap_err();
        assert!(matches!(err, AdapterError::Parse(_)));
    }

    #[test]
    fn test_empty_and_non_array_payloads() {
        let empty = parse_payload("x", json!([]), &soybeans(), AS_OF).unwrap();
        assert!(empty.data.is_empty());

        let err = parse_payload("x", json!({ "error": "bad" }), &soybeans(), AS_OF).unwrap_err();
        assert!(matches!(err, AdapterError::Parse(_)));
    }

    #[test]
    fn test_query_params() {
        let params = query_params(&soybeans(), "2024-04", Some("k".to_string()));
        let get = |name: &str| {
            params
                .iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| v.as_str())
        };

        assert_eq!(get("get"), Some("ALL_VAL_MO"));
        assert_eq!(get("COMM_LVL"), Some("HS6"));
        assert_eq!(get("time_from"), Some("2020-01"));
        assert_eq!(get("time_to"), Some("2024-04"));
        assert_eq!(get("HS"), Some("1201"));
        assert_eq!(get("CTY_CODE"), Some("5700"));
        assert_eq!(get("key"), Some("k"));

        let bare = query_params(&SeriesConfig::default(), "2024-04", None);
        assert!(bare.iter().all(|(k, _)| *k != "key" && *k != "HS"));
    }

    #[test]
    fn test_endpoint_by_trade_type() {
        let imports = SeriesConfig {
            trade_type: Some("imports".to_string()),
            ..Default::default()
        };
        assert_eq!(
            endpoint("https://api.census.gov/data/timeseries/intltrade/", &imports),
            "https://api.census.gov/data/timeseries/intltrade/imports"
        );
        assert_eq!(endpoint("http://h", &SeriesConfig::default()), "http://h/exports");
    }
}
