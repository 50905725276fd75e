//! Pipeline jobs
//!
//! One job per source plus the metrics job. Jobs process their work units
//! sequentially and contain failures per series: a failing series is logged
//! and skipped, and only storage failures or a systemic condition fail the
//! job itself.

pub mod metrics;
pub mod orchestrator;
pub mod source;

pub use metrics::MetricsJob;
pub use orchestrator::{run_all, source_jobs, PipelineSummary};
pub use source::SourceJob;

use crate::adapters::AdapterError;
use crate::metrics::MetricsError;
use crate::validation::ValidationError;
use async_trait::async_trait;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{error, info};

/// Failure of one series within a job
#[derive(Debug, Error)]
pub enum SeriesError {
    #[error(transparent)]
    Adapter(#[from] AdapterError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Metrics(#[from] MetricsError),

    #[error(transparent)]
    Storage(#[from] tim_common::Error),
}

/// Failure of a whole job
#[derive(Debug, Error)]
pub enum JobError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(#[from] tim_common::Error),

    #[error("All {failed} configured series failed")]
    AllSeriesFailed { failed: usize },
}

/// Per-job counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobStats {
    pub succeeded: usize,
    pub failed: usize,
    /// Units with nothing to do (e.g. a module series with no data yet)
    pub skipped: usize,
}

/// Outcome of one job run
#[derive(Debug, Clone)]
pub struct JobReport {
    pub job: String,
    /// The job ran to completion; individual series may still have failed
    pub success: bool,
    pub error: Option<String>,
    pub elapsed: Duration,
    pub stats: JobStats,
}

impl JobReport {
    pub fn elapsed_ms(&self) -> u128 {
        self.elapsed.as_millis()
    }
}

#[async_trait]
pub trait Job: Send + Sync {
    fn name(&self) -> &str;

    /// Do the work; per-series failures are contained inside
    async fn execute(&self) -> Result<JobStats, JobError>;

    /// Execute with timing and logging, folding any error into the report
    async fn run(&self) -> JobReport {
        let job = self.name().to_string();
        info!(job = %job, "Job started");
        let start = Instant::now();

        let result = self.execute().await;
        let elapsed = start.elapsed();

        match result {
            Ok(stats) => {
                info!(
                    job = %job,
                    elapsed_ms = elapsed.as_millis() as u64,
                    succeeded = stats.succeeded,
                    failed = stats.failed,
                    skipped = stats.skipped,
                    "Job completed"
                );
                JobReport {
                    job,
                    success: true,
                    error: None,
                    elapsed,
                    stats,
                }
            }
            Err(e) => {
                error!(job = %job, elapsed_ms = elapsed.as_millis() as u64, error = %e, "Job failed");
                JobReport {
                    job,
                    success: false,
                    error: Some(e.to_string()),
                    elapsed,
                    stats: JobStats::default(),
                }
            }
        }
    }
}

/// Treat a duplicate-key conflict as already ingested
pub(crate) fn ignore_duplicate(result: tim_common::Result<()>) -> tim_common::Result<()> {
    match result {
        Err(e) if e.is_unique_violation() => {
            tracing::debug!(error = %e, "Duplicate key, already ingested");
            Ok(())
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedJob(Result<JobStats, &'static str>);

    #[async_trait]
    impl Job for FixedJob {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn execute(&self) -> Result<JobStats, JobError> {
            self.0.map_err(|msg| JobError::Config(msg.to_string()))
        }
    }

    #[tokio::test]
    async fn test_run_reports_success() {
        let stats = JobStats {
            succeeded: 2,
            failed: 1,
            skipped: 0,
        };
        let report = FixedJob(Ok(stats)).run().await;
        assert!(report.success);
        assert!(report.error.is_none());
        assert_eq!(report.stats, stats);
        assert_eq!(report.job, "fixed");
    }

    #[tokio::test]
    async fn test_run_folds_error_into_report() {
        let report = FixedJob(Err("no config")).run().await;
        assert!(!report.success);
        assert_eq!(report.error.as_deref(), Some("Configuration error: no config"));
    }

    #[test]
    fn test_ignore_duplicate_passes_other_errors() {
        assert!(ignore_duplicate(Ok(())).is_ok());
        let err = ignore_duplicate(Err(tim_common::Error::Config("x".into())));
        assert!(err.is_err());
    }
}
