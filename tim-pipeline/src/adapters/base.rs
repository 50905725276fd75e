//! Helpers shared by all adapters

use super::AdapterError;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::RequestBuilder;
use std::time::Duration;
use tim_common::config::{SeriesConfig, SourceConfig};
use tim_common::DataPoint;

const USER_AGENT: &str = concat!("tim-pipeline/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT_SECS: u64 = 30;
const ERROR_BODY_LIMIT: usize = 200;

pub const DEFAULT_UNITS: &str = "Index";
pub const DEFAULT_FREQUENCY: &str = "Monthly";

/// Absolute change
pub fn delta(current: f64, previous: f64) -> f64 {
    current - previous
}

/// Percent change relative to `previous`.
///
/// Defined as `0` when `previous` is `0`; this is an approximation, not a
/// true percentage.
pub fn delta_percent(current: f64, previous: f64) -> f64 {
    if previous == 0.0 {
        return 0.0;
    }
    (current - previous) / previous * 100.0
}

/// RFC 3339 ingestion timestamp
pub fn timestamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Upstream code for a configured series, falling back to the document key
pub fn upstream_code<'a>(series_id: &'a str, series: Option<&'a SeriesConfig>) -> &'a str {
    series
        .and_then(|s| s.id.as_deref())
        .filter(|code| !code.is_empty())
        .unwrap_or(series_id)
}

/// Per-series config that must exist for sources that need fetch parameters
pub fn required_series<'a>(
    config: &'a SourceConfig,
    series_id: &str,
) -> Result<&'a SeriesConfig, AdapterError> {
    Ok(config.series_config(series_id)?)
}

/// Sort ascending by date and keep one point per date (the later one wins)
pub fn finalize_points(mut points: Vec<DataPoint>) -> Vec<DataPoint> {
    // Stable sort keeps upstream order among equal dates.
    points.sort_by(|a, b| a.date.cmp(&b.date));

    let mut out: Vec<DataPoint> = Vec::with_capacity(points.len());
    for point in points {
        match out.last_mut() {
            Some(last) if last.date == point.date => *last = point,
            _ => out.push(point),
        }
    }
    out
}

/// HTTP client shared by all adapters
pub fn build_http_client() -> Result<reqwest::Client, AdapterError> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()
        .map_err(|e| AdapterError::Network(e.to_string()))
}

/// Send a request and decode a JSON body.
///
/// Non-2xx statuses become [`AdapterError::Upstream`] with the status code and
/// the start of the response body.
pub async fn send_json(
    request: RequestBuilder,
    upstream: &'static str,
) -> Result<serde_json::Value, AdapterError> {
    let response = request
        .send()
        .await
        .map_err(|e| AdapterError::Network(format!("{} request failed: {}", upstream, e)))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let mut message = status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string();
        let excerpt: String = body.trim().chars().take(ERROR_BODY_LIMIT).collect();
        if !excerpt.is_empty() {
            message = format!("{} ({})", message, excerpt);
        }
        return Err(AdapterError::Upstream {
            upstream,
            status: status.as_u16(),
            message,
        });
    }

    response
        .json::<serde_json::Value>()
        .await
        .map_err(|e| AdapterError::Parse(format!("{} response is not JSON: {}", upstream, e)))
}
