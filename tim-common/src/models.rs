//! Domain types shared by the pipeline and the read API
//!
//! These are the read contracts the presentation layer consumes, so field names
//! serialize exactly as stored (`snake_case`, `type` for policy event kind).
//! Dates and timestamps stay in their canonical string forms (`YYYY-MM-DD`,
//! RFC 3339); the validation layer checks them before anything is persisted.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Source tag written into series that a module references before any data exists
pub const PENDING_SOURCE: &str = "Pending";

/// One observation of a series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    /// Calendar day, `YYYY-MM-DD`
    pub date: String,
    pub value: f64,
    /// Issuing agency tag (e.g. "FRED")
    pub source: String,
    /// Native upstream period label (e.g. "2020-M01")
    pub period: String,
    pub units: String,
    /// Ingestion timestamp (RFC 3339)
    pub as_of: String,
    /// Upstream marked this value as a correction
    #[serde(default)]
    pub revised: bool,
}

/// Named, date-ordered collection of points for one upstream series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    pub id: String,
    pub name: String,
    /// Points, ascending by date, unique by date
    pub data: Vec<DataPoint>,
    pub units: String,
    /// Reporting cadence (e.g. "Monthly")
    pub frequency: String,
    pub source: String,
    /// RFC 3339 timestamp
    pub last_updated: String,
}

impl TimeSeries {
    /// Most recent point (points are kept ascending by date)
    pub fn latest(&self) -> Option<&DataPoint> {
        self.data.last()
    }

    /// True for the placeholder rows created when a module links a series
    /// that has not been ingested yet
    pub fn is_placeholder(&self) -> bool {
        self.source == PENDING_SOURCE
    }
}

/// Date interval during which a policy was in effect
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyBand {
    /// `YYYY-MM-DD`
    pub start: String,
    /// `YYYY-MM-DD`; absent means the policy is ongoing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
    pub label: String,
}

/// Topical dashboard unit bundling a narrative, KPIs and series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub id: String,
    /// URL key, unique
    pub slug: String,
    pub title: String,
    pub headline: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subhead: Option<String>,
    #[serde(default)]
    pub kpis: Vec<KpiMetric>,
    /// Referenced series identifiers, in display order
    #[serde(default)]
    pub series: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_band: Option<PolicyBand>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub methodology: Option<String>,
    #[serde(default)]
    pub confounders: Vec<String>,
}

/// Direction of a KPI's change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    Stable,
}

impl Trend {
    /// Classify a percent change against a symmetric threshold.
    ///
    /// `up` above `threshold`, `down` below `-threshold`, otherwise `stable`.
    pub fn from_delta_percent(delta_percent: f64, threshold: f64) -> Self {
        if delta_percent > threshold {
            Trend::Up
        } else if delta_percent < -threshold {
            Trend::Down
        } else {
            Trend::Stable
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Trend::Up => "up",
            Trend::Down => "down",
            Trend::Stable => "stable",
        }
    }
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Trend {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(Trend::Up),
            "down" => Ok(Trend::Down),
            "stable" => Ok(Trend::Stable),
            other => Err(crate::Error::InvalidInput(format!("unknown trend '{}'", other))),
        }
    }
}

/// Derived statistic owned by one module
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiMetric {
    pub id: String,
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta_percent: Option<f64>,
    /// Human label for the comparison window (e.g. "YoY to Mar 2024")
    pub period: String,
    pub trend: Trend,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sparkline: Option<Vec<f64>>,
    pub source: String,
    pub last_updated: String,
}

/// Kind of policy action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyEventType {
    Tariff,
    Exclusion,
    Retaliation,
    Other,
}

impl PolicyEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyEventType::Tariff => "tariff",
            PolicyEventType::Exclusion => "exclusion",
            PolicyEventType::Retaliation => "retaliation",
            PolicyEventType::Other => "other",
        }
    }
}

impl FromStr for PolicyEventType {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tariff" => Ok(PolicyEventType::Tariff),
            "exclusion" => Ok(PolicyEventType::Exclusion),
            "retaliation" => Ok(PolicyEventType::Retaliation),
            "other" => Ok(PolicyEventType::Other),
            other => Err(crate::Error::InvalidInput(format!(
                "unknown policy event type '{}'",
                other
            ))),
        }
    }
}

/// Immutable record of a policy action, created out-of-band
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyEvent {
    pub id: String,
    /// `YYYY-MM-DD`
    pub date: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(rename = "type")]
    pub event_type: PolicyEventType,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trend_thresholds() {
        assert_eq!(Trend::from_delta_percent(1.5, 1.0), Trend::Up);
        assert_eq!(Trend::from_delta_percent(-1.5, 1.0), Trend::Down);
        assert_eq!(Trend::from_delta_percent(1.0, 1.0), Trend::Stable);
        assert_eq!(Trend::from_delta_percent(4.9, 5.0), Trend::Stable);
        assert_eq!(Trend::from_delta_percent(-5.1, 5.0), Trend::Down);
    }

    #[test]
    fn test_policy_event_type_serializes_as_type() {
        let event = PolicyEvent {
            id: "s301".to_string(),
            date: "2018-07-06".to_string(),
            title: "Section 301 List 1".to_string(),
            description: String::new(),
            source_url: None,
            event_type: PolicyEventType::Tariff,
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "tariff");
        assert!(json.get("source_url").is_none());
    }

    #[test]
    fn test_trend_round_trips_through_str() {
        for trend in [Trend::Up, Trend::Down, Trend::Stable] {
            assert_eq!(trend.as_str().parse::<Trend>().unwrap(), trend);
        }
        assert!("sideways".parse::<Trend>().is_err());
    }
}
