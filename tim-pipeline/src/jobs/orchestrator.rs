//! Master orchestrator
//!
//! Runs the source jobs in fixed order (FRED, BLS, Census) and the metrics job
//! last, since metrics read what the source jobs just wrote. A single failing
//! source job is tolerated; the run is critical only when the metrics job
//! fails or every source job failed.

use super::{Job, JobReport, SourceJob};
use crate::registry::AdapterRegistry;
use sqlx::SqlitePool;
use std::sync::Arc;
use tim_common::config::SourceType;
use tracing::{error, info};

const SUMMARY_ERROR_LIMIT: usize = 120;

#[derive(Debug, Clone)]
pub struct PipelineSummary {
    pub sources: Vec<JobReport>,
    pub metrics: JobReport,
}

impl PipelineSummary {
    pub fn reports(&self) -> impl Iterator<Item = &JobReport> {
        self.sources.iter().chain(std::iter::once(&self.metrics))
    }

    /// Metrics failed, or at least one source job ran and all of them failed
    pub fn is_critical_failure(&self) -> bool {
        let all_sources_failed =
            !self.sources.is_empty() && self.sources.iter().all(|r| !r.success);
        !self.metrics.success || all_sources_failed
    }

    pub fn succeeded(&self) -> usize {
        self.reports().filter(|r| r.success).count()
    }

    pub fn failed(&self) -> usize {
        self.reports().filter(|r| !r.success).count()
    }

    /// One line per job, then totals
    pub fn log_summary(&self) {
        for report in self.reports() {
            if report.success {
                info!(job = %report.job, elapsed_ms = report.elapsed_ms() as u64, "OK");
            } else {
                let message: String = report
                    .error
                    .as_deref()
                    .unwrap_or("unknown error")
                    .chars()
                    .take(SUMMARY_ERROR_LIMIT)
                    .collect();
                error!(job = %report.job, elapsed_ms = report.elapsed_ms() as u64, error = %message, "FAILED");
            }
        }

        if self.is_critical_failure() {
            error!(succeeded = self.succeeded(), failed = self.failed(), "Pipeline run failed");
        } else {
            info!(succeeded = self.succeeded(), failed = self.failed(), "Pipeline run completed");
        }
    }
}

/// Source jobs in ingestion order
pub fn source_jobs(registry: Arc<AdapterRegistry>, pool: &SqlitePool) -> Vec<Box<dyn Job>> {
    SourceType::ALL
        .iter()
        .map(|source| {
            Box::new(SourceJob::new(*source, registry.clone(), pool.clone())) as Box<dyn Job>
        })
        .collect()
}

/// Run every source job, then the metrics job, regardless of earlier failures
pub async fn run_all(sources: Vec<Box<dyn Job>>, metrics: Box<dyn Job>) -> PipelineSummary {
    info!(jobs = sources.len() + 1, "Starting pipeline run");

    let mut reports = Vec::with_capacity(sources.len());
    for job in &sources {
        reports.push(job.run().await);
    }
    let metrics = metrics.run().await;

    PipelineSummary {
        sources: reports,
        metrics,
    }
}
