//! FRED (Federal Reserve Economic Data) adapter
//!
//! Single GET against `series/observations`. FRED marks missing observations
//! with the value `"."`; those are dropped before parsing.

use super::base::{self, DEFAULT_FREQUENCY, DEFAULT_UNITS};
use super::{AdapterError, SourceAdapter};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use tim_common::config::{Environment, SeriesConfig, SourceConfig};
use tim_common::{DataPoint, TimeSeries};
use tracing::debug;

const AGENCY: &str = "FRED";
const MISSING_MARKER: &str = ".";

#[derive(Debug, Deserialize)]
struct ObservationsResponse {
    #[serde(default)]
    observations: Vec<Observation>,
    /// Series metadata, present when the endpoint echoes it
    #[serde(default)]
    seriess: Vec<SeriesInfo>,
}

#[derive(Debug, Deserialize)]
struct Observation {
    date: String,
    value: String,
}

#[derive(Debug, Default, Deserialize)]
struct SeriesInfo {
    title: Option<String>,
    units: Option<String>,
    frequency: Option<String>,
}

pub struct FredAdapter {
    http: reqwest::Client,
    env: Arc<dyn Environment>,
}

impl FredAdapter {
    pub fn new(http: reqwest::Client, env: Arc<dyn Environment>) -> Self {
        Self { http, env }
    }

    async fn request(
        &self,
        series_id: &str,
        config: &SourceConfig,
        latest_only: bool,
    ) -> Result<serde_json::Value, AdapterError> {
        let api_key = config.resolve_api_key(self.env.as_ref())?;
        let code = base::upstream_code(series_id, config.series.get(series_id));
        let url = format!("{}/series/observations", config.base_url.trim_end_matches('/'));

        debug!(series_id = %series_id, code = %code, "Querying FRED");

        let mut request = self.http.get(&url).query(&[
            ("series_id", code),
            ("api_key", api_key.as_str()),
            ("file_type", "json"),
        ]);
        if latest_only {
            request = request.query(&[("limit", "1"), ("sort_order", "desc")]);
        }

        base::send_json(request, AGENCY).await
    }
}

#[async_trait::async_trait]
impl SourceAdapter for FredAdapter {
    fn name(&self) -> &'static str {
        AGENCY
    }

    async fn fetch_series(
        &self,
        series_id: &str,
        config: &SourceConfig,
    ) -> Result<TimeSeries, AdapterError> {
        let payload = self.request(series_id, config, false).await?;
        parse_observations(
            series_id,
            payload,
            config.series.get(series_id),
            &base::timestamp(Utc::now()),
        )
    }

    async fn fetch_latest(
        &self,
        series_id: &str,
        config: &SourceConfig,
    ) -> Result<DataPoint, AdapterError> {
        let payload = self.request(series_id, config, true).await?;
        parse_latest(series_id, payload, config.series.get(series_id), &base::timestamp(Utc::now()))
    }
}

/// Normalize a `series/observations` payload.
///
/// Name, units and frequency come from echoed metadata, then the series
/// config, then defaults (series id, "Index", "Monthly").
pub fn parse_observations(
    series_id: &str,
    payload: serde_json::Value,
    series: Option<&SeriesConfig>,
    as_of: &str,
) -> Result<TimeSeries, AdapterError> {
    let response: ObservationsResponse = serde_json::from_value(payload)
        .map_err(|e| AdapterError::Parse(format!("FRED payload for {}: {}", series_id, e)))?;

    let info = response.seriess.into_iter().next().unwrap_or_default();
    let units = info
        .units
        .or_else(|| series.and_then(|s| s.units.clone()))
        .unwrap_or_else(|| DEFAULT_UNITS.to_string());
    let name = info
        .title
        .or_else(|| series.and_then(|s| s.name.clone()))
        .unwrap_or_else(|| series_id.to_string());
    let frequency = info
        .frequency
        .or_else(|| series.and_then(|s| s.frequency.clone()))
        .unwrap_or_else(|| DEFAULT_FREQUENCY.to_string());

    let mut points = Vec::with_capacity(response.observations.len());
    for obs in response.observations {
        if let Some(point) = observation_to_point(series_id, obs, &units, as_of)? {
            points.push(point);
        }
    }

    Ok(TimeSeries {
        id: series_id.to_string(),
        name,
        data: base::finalize_points(points),
        units,
        frequency,
        source: AGENCY.to_string(),
        last_updated: as_of.to_string(),
    })
}

/// Normalize a `limit=1&sort_order=desc` payload into its single point
pub fn parse_latest(
    series_id: &str,
    payload: serde_json::Value,
    series: Option<&SeriesConfig>,
    as_of: &str,
) -> Result<DataPoint, AdapterError> {
    let parsed = parse_observations(series_id, payload, series, as_of)?;
    parsed
        .data
        .into_iter()
        .last()
        .ok_or_else(|| AdapterError::NoData(series_id.to_string()))
}

fn observation_to_point(
    series_id: &str,
    obs: Observation,
    units: &str,
    as_of: &str,
) -> Result<Option<DataPoint>, AdapterError> {
    let raw = obs.value.trim();
    if raw == MISSING_MARKER || raw.is_empty() {
        return Ok(None);
    }

    let value: f64 = raw.parse().map_err(|_| {
        AdapterError::Parse(format!(
            "FRED value '{}' on {} for {} is not numeric",
            raw, obs.date, series_id
        ))
    })?;

    Ok(Some(DataPoint {
        period: obs.date.clone(),
        date: obs.date,
        value,
        source: AGENCY.to_string(),
        units: units.to_string(),
        as_of: as_of.to_string(),
        revised: false,
    }))
}
