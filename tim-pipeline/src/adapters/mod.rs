//! Source adapters
//!
//! One adapter per upstream statistical API. Each encapsulates a wire format
//! and produces the canonical [`TimeSeries`]/[`DataPoint`] shape.
//!
//! Wire parsing lives in pure `parse_*` functions so normalization can be
//! exercised without network access.

pub mod base;
pub mod bls;
pub mod census;
pub mod fred;

pub use bls::BlsAdapter;
pub use census::CensusAdapter;
pub use fred::FredAdapter;

use thiserror::Error;
use tim_common::config::SourceConfig;
use tim_common::{DataPoint, TimeSeries};

/// Adapter errors
///
/// All variants are contained per series by the owning job.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// Missing API key, unset placeholder variable, unknown series or source
    #[error("Configuration error: {0}")]
    Config(String),

    /// Request never produced a response
    #[error("Network error: {0}")]
    Network(String),

    /// Upstream answered with a non-success status
    #[error("{upstream} API error {status}: {message}")]
    Upstream {
        upstream: &'static str,
        status: u16,
        message: String,
    },

    /// Response shape not recognized
    #[error("Parse error: {0}")]
    Parse(String),

    /// Response was well-formed but carried no usable observation
    #[error("No data available for {0}")]
    NoData(String),
}

impl From<tim_common::Error> for AdapterError {
    fn from(err: tim_common::Error) -> Self {
        match err {
            tim_common::Error::Config(msg) => AdapterError::Config(msg),
            other => AdapterError::Config(other.to_string()),
        }
    }
}

/// Capability shared by every upstream source
#[async_trait::async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Agency tag written into produced series (e.g. "FRED")
    fn name(&self) -> &'static str;

    /// Fetch and normalize the full available history of one series
    async fn fetch_series(
        &self,
        series_id: &str,
        config: &SourceConfig,
    ) -> Result<TimeSeries, AdapterError>;

    /// Fetch the most recent observation of one series
    async fn fetch_latest(
        &self,
        series_id: &str,
        config: &SourceConfig,
    ) -> Result<DataPoint, AdapterError>;
}
