//! Metrics job: recompute every module's KPIs from stored series
//!
//! After a module's series are processed, metric ids the run no longer
//! produces (an unlinked series, a dropped policy band, a series with no
//! data) are removed. Series that failed keep their last written metrics.

use super::{ignore_duplicate, Job, JobError, JobStats, SeriesError};
use crate::metrics::{baseline_metric_id, compute_series_metrics, latest_metric_id};
use crate::validation;
use async_trait::async_trait;
use sqlx::SqlitePool;
use tim_common::{db, Module};
use tracing::{debug, info, warn};

const JOB_NAME: &str = "compute-metrics";

pub struct MetricsJob {
    pool: SqlitePool,
}

impl MetricsJob {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Returns the ids of the metrics written, or `None` when the series has no data.
    ///
    /// Nothing is written if any computed metric is invalid.
    async fn process_series(
        &self,
        module: &Module,
        series_id: &str,
    ) -> Result<Option<Vec<String>>, SeriesError> {
        let series = match db::get_time_series(&self.pool, series_id).await? {
            Some(series) if !series.data.is_empty() => series,
            _ => return Ok(None),
        };

        let metrics = compute_series_metrics(&series, module)?;
        for metric in &metrics {
            validation::validate_kpi_metric(metric)?;
        }

        let mut written = Vec::with_capacity(metrics.len());
        for metric in &metrics {
            ignore_duplicate(db::upsert_metric(&self.pool, &module.id, metric).await)?;
            written.push(metric.id.clone());
        }
        Ok(Some(written))
    }

    async fn process_module(&self, module: &Module, stats: &mut JobStats) -> Result<(), JobError> {
        let mut keep = Vec::new();

        for series_id in &module.series {
            match self.process_series(module, series_id).await {
                Ok(Some(ids)) => {
                    debug!(job = JOB_NAME, module = %module.slug, series_id = %series_id,
                        metrics = ids.len(), "Computed metrics");
                    keep.extend(ids);
                    stats.succeeded += 1;
                }
                Ok(None) => {
                    info!(job = JOB_NAME, module = %module.slug, series_id = %series_id,
                        "Skipping series with no data");
                    stats.skipped += 1;
                }
                Err(SeriesError::Storage(e)) => return Err(JobError::Storage(e)),
                Err(e) => {
                    warn!(job = JOB_NAME, module = %module.slug, series_id = %series_id,
                        error = %e, "Failed to compute metrics");
                    keep.push(latest_metric_id(series_id));
                    keep.push(baseline_metric_id(series_id));
                    stats.failed += 1;
                }
            }
        }

        let removed = db::delete_metrics_except(&self.pool, &module.id, &keep).await?;
        if !removed.is_empty() {
            info!(job = JOB_NAME, module = %module.slug, removed = ?removed, "Removed stale metrics");
        }
        Ok(())
    }
}

#[async_trait]
impl Job for MetricsJob {
    fn name(&self) -> &str {
        JOB_NAME
    }

    async fn execute(&self) -> Result<JobStats, JobError> {
        let modules = db::get_all_modules(&self.pool).await?;
        info!(job = JOB_NAME, modules = modules.len(), "Computing metrics");

        let mut stats = JobStats::default();
        for module in &modules {
            self.process_module(module, &mut stats).await?;
        }

        Ok(stats)
    }
}
