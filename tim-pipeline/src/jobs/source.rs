//! Source ingestion job: fetch, validate, persist every configured series

use super::{ignore_duplicate, Job, JobError, JobStats, SeriesError};
use crate::adapters::{AdapterError, SourceAdapter};
use crate::registry::AdapterRegistry;
use crate::validation;
use async_trait::async_trait;
use sqlx::SqlitePool;
use std::sync::Arc;
use tim_common::config::{SourceConfig, SourceType};
use tim_common::db;
use tracing::{debug, info, warn};

pub struct SourceJob {
    name: String,
    source: SourceType,
    registry: Arc<AdapterRegistry>,
    pool: SqlitePool,
}

impl SourceJob {
    pub fn new(source: SourceType, registry: Arc<AdapterRegistry>, pool: SqlitePool) -> Self {
        Self {
            name: format!("pull-{}", source.key()),
            source,
            registry,
            pool,
        }
    }

    pub fn source(&self) -> SourceType {
        self.source
    }

    /// Fetch, validate and upsert one series; returns the number of points written
    async fn ingest_series(
        &self,
        adapter: &dyn SourceAdapter,
        config: &SourceConfig,
        series_id: &str,
    ) -> Result<usize, SeriesError> {
        let series = adapter.fetch_series(series_id, config).await?;
        debug!(job = %self.name, series_id = %series_id, points = series.data.len(), "Fetched series");

        validation::validate_time_series(&series)?;
        validation::check_data_quality(&series)?;

        ignore_duplicate(db::upsert_series_header(&self.pool, &series).await)?;
        for point in &series.data {
            ignore_duplicate(db::upsert_data_point(&self.pool, &series.id, point).await)?;
        }
        Ok(series.data.len())
    }
}

#[async_trait]
impl Job for SourceJob {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self) -> Result<JobStats, JobError> {
        let (adapter, config) = self
            .registry
            .resolve_source(self.source)
            .map_err(|e| match e {
                AdapterError::Config(msg) => JobError::Config(msg),
                other => JobError::Config(other.to_string()),
            })?;

        let mut stats = JobStats::default();
        if config.series.is_empty() {
            warn!(job = %self.name, "No series configured");
            return Ok(stats);
        }

        info!(job = %self.name, series = config.series.len(), "Ingesting series");

        for series_id in config.series.keys() {
            match self.ingest_series(adapter.as_ref(), config, series_id).await {
                Ok(points) => {
                    info!(job = %self.name, series_id = %series_id, points, "Stored series");
                    stats.succeeded += 1;
                }
                Err(SeriesError::Storage(e)) => return Err(JobError::Storage(e)),
                Err(e) => {
                    warn!(job = %self.name, series_id = %series_id, error = %e, "Skipping series");
                    stats.failed += 1;
                }
            }
        }

        if stats.succeeded == 0 && stats.failed > 0 {
            return Err(JobError::AllSeriesFailed {
                failed: stats.failed,
            });
        }
        Ok(stats)
    }
}
