//! tim-pipeline - batch ingestion and metrics for the Tariff Impact Monitor
//!
//! Intended to be invoked on a schedule. Each job is runnable on its own;
//! `run-all` runs the sources in order and then recomputes metrics, exiting
//! non-zero only on a critical failure.

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tim_common::config::{ProcessEnvironment, SourceType, SourcesDocument};
use tim_common::db;
use tim_pipeline::adapters::base::timestamp;
use tim_pipeline::jobs::{self, Job, MetricsJob, SourceJob};
use tim_pipeline::sample;
use tim_pipeline::seed::{self, SeedDocument};
use tim_pipeline::AdapterRegistry;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "tim-pipeline")]
#[command(about = "Economic time-series ingestion pipeline")]
#[command(version)]
struct Args {
    /// SQLite connection string
    #[arg(long, env = "TIM_DATABASE_URL", default_value = "sqlite://tariff_impact.db?mode=rwc")]
    database_url: String,

    /// Sources document (TOML, or JSON by extension)
    #[arg(long, env = "TIM_SOURCES_PATH", default_value = "data/sources.toml")]
    sources: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create all tables
    InitDb,
    /// Load modules and policy events from a seed document
    Seed {
        #[arg(long, default_value = "data/seed.toml")]
        file: PathBuf,
    },
    /// Fill every empty module series with synthetic monthly history
    SampleData {
        /// Last generated month (YYYY-MM-DD); defaults to the current month
        #[arg(long)]
        end: Option<String>,
    },
    /// Run a single job
    Run {
        #[arg(value_enum)]
        job: JobKind,
    },
    /// Run every source job, then the metrics job
    RunAll,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum JobKind {
    Fred,
    Bls,
    Census,
    Metrics,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tim_pipeline=info,tim_common=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    info!("Starting tim-pipeline v{}", env!("CARGO_PKG_VERSION"));

    match dispatch(args).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Returns whether the command succeeded
async fn dispatch(args: Args) -> Result<bool> {
    let pool = db::init_database(&args.database_url)
        .await
        .with_context(|| format!("Failed to open database {}", args.database_url))?;

    match args.command {
        Command::InitDb => {
            info!("Database schema ready");
            Ok(true)
        }
        Command::Seed { file } => {
            let document = SeedDocument::load(&file)?;
            seed::seed(&pool, &document).await?;
            Ok(true)
        }
        Command::SampleData { end } => {
            let now = Utc::now();
            let end = match end {
                Some(end) => NaiveDate::parse_from_str(&end, "%Y-%m-%d")
                    .with_context(|| format!("Invalid --end date '{}'", end))?,
                None => now.date_naive(),
            };
            sample::load_sample_data(&pool, end, &timestamp(now)).await?;
            Ok(true)
        }
        Command::Run { job } => {
            let job: Box<dyn Job> = match job {
                JobKind::Metrics => Box::new(MetricsJob::new(pool)),
                JobKind::Fred => source_job(SourceType::Fred, &args.sources, pool)?,
                JobKind::Bls => source_job(SourceType::Bls, &args.sources, pool)?,
                JobKind::Census => source_job(SourceType::Census, &args.sources, pool)?,
            };
            let report = job.run().await;
            Ok(report.success)
        }
        Command::RunAll => {
            let registry = load_registry(&args.sources)?;
            let summary = jobs::run_all(
                jobs::source_jobs(registry, &pool),
                Box::new(MetricsJob::new(pool.clone())),
            )
            .await;
            summary.log_summary();
            Ok(!summary.is_critical_failure())
        }
    }
}

fn load_registry(path: &Path) -> Result<Arc<AdapterRegistry>> {
    let document = SourcesDocument::load(path)?;
    let registry = AdapterRegistry::new(document, Arc::new(ProcessEnvironment))?;
    Ok(Arc::new(registry))
}

fn source_job(source: SourceType, sources: &Path, pool: SqlitePool) -> Result<Box<dyn Job>> {
    let registry = load_registry(sources)?;
    Ok(Box::new(SourceJob::new(source, registry, pool)))
}
