//! Pre-persistence checks
//!
//! Schema checks reject malformed records (bad date, non-finite value, bad
//! timestamp, bad URL). The data-quality check is separate: an empty series
//! or a non-finite value after normalization points at an adapter bug rather
//! than a malformed payload. Neither coerces; the caller skips the record.

use chrono::{DateTime, NaiveDate};
use thiserror::Error;
use tim_common::{DataPoint, KpiMetric, Module, PolicyEvent, TimeSeries};

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Schema violation in {field}: {message}")]
    Schema { field: String, message: String },

    #[error("Data quality check failed: {0}")]
    DataQuality(String),
}

type Result<T> = std::result::Result<T, ValidationError>;

fn schema(field: impl Into<String>, message: impl Into<String>) -> ValidationError {
    ValidationError::Schema {
        field: field.into(),
        message: message.into(),
    }
}

/// `YYYY-MM-DD` that is also a real calendar day
pub fn check_date(field: &str, value: &str) -> Result<()> {
    let shaped = value.len() == 10
        && value.bytes().enumerate().all(|(i, b)| match i {
            4 | 7 => b == b'-',
            _ => b.is_ascii_digit(),
        });
    if !shaped {
        return Err(schema(field, format!("'{}' is not YYYY-MM-DD", value)));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map(|_| ())
        .map_err(|_| schema(field, format!("'{}' is not a calendar date", value)))
}

/// RFC 3339 date-time
pub fn check_timestamp(field: &str, value: &str) -> Result<()> {
    DateTime::parse_from_rfc3339(value)
        .map(|_| ())
        .map_err(|e| schema(field, format!("'{}' is not an RFC 3339 timestamp: {}", value, e)))
}

fn check_finite(field: &str, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(schema(field, format!("{} is not finite", value)))
    }
}

fn check_non_empty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        Err(schema(field, "must not be empty"))
    } else {
        Ok(())
    }
}

pub fn validate_data_point(point: &DataPoint) -> Result<()> {
    check_date("date", &point.date)?;
    check_finite("value", point.value)?;
    check_non_empty("source", &point.source)?;
    check_timestamp("as_of", &point.as_of)
}

/// Header fields plus every point
pub fn validate_time_series(series: &TimeSeries) -> Result<()> {
    check_non_empty("id", &series.id)?;
    check_non_empty("name", &series.name)?;
    check_timestamp("last_updated", &series.last_updated)?;

    for point in &series.data {
        validate_data_point(point).map_err(|e| match e {
            ValidationError::Schema { field, message } => {
                schema(format!("data[{}].{}", point.date, field), message)
            }
            other => other,
        })?;
    }
    Ok(())
}

/// Business-level check: at least one point and every value finite
pub fn check_data_quality(series: &TimeSeries) -> Result<()> {
    if series.data.is_empty() {
        return Err(ValidationError::DataQuality(format!(
            "series {} has no data points",
            series.id
        )));
    }

    if let Some(point) = series.data.iter().find(|p| !p.value.is_finite()) {
        return Err(ValidationError::DataQuality(format!(
            "series {} has a non-finite value on {}",
            series.id, point.date
        )));
    }
    Ok(())
}

pub fn validate_kpi_metric(metric: &KpiMetric) -> Result<()> {
    check_non_empty("id", &metric.id)?;
    check_finite("value", metric.value)?;
    if let Some(delta) = metric.delta {
        check_finite("delta", delta)?;
    }
    if let Some(delta_percent) = metric.delta_percent {
        check_finite("delta_percent", delta_percent)?;
    }
    if let Some(sparkline) = &metric.sparkline {
        for value in sparkline {
            check_finite("sparkline", *value)?;
        }
    }
    check_timestamp("last_updated", &metric.last_updated)
}

pub fn validate_policy_event(event: &PolicyEvent) -> Result<()> {
    check_non_empty("id", &event.id)?;
    check_date("date", &event.date)?;
    check_non_empty("title", &event.title)?;
    if let Some(url) = &event.source_url {
        reqwest::Url::parse(url)
            .map_err(|e| schema("source_url", format!("'{}' is not a URL: {}", url, e)))?;
    }
    Ok(())
}

/// Module records from the seed document
pub fn validate_module(module: &Module) -> Result<()> {
    check_non_empty("id", &module.id)?;
    check_non_empty("slug", &module.slug)?;
    check_non_empty("title", &module.title)?;
    if let Some(band) = &module.policy_band {
        check_date("policy_band.start", &band.start)?;
        if let Some(end) = &band.end {
            check_date("policy_band.end", end)?;
        }
    }
    if let Some(series_id) = module.series.iter().find(|s| s.trim().is_empty()) {
        return Err(schema("series", format!("empty series id '{}'", series_id)));
    }
    Ok(())
}
