//! tim-api - read API for modules, series and policy events

use anyhow::{Context, Result};
use clap::Parser;
use tim_api::{build_router, AppState};
use tim_common::db;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "tim-api")]
#[command(about = "Read API for the Tariff Impact Monitor")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "5730", env = "TIM_API_PORT")]
    port: u16,

    /// SQLite connection string
    #[arg(long, env = "TIM_DATABASE_URL", default_value = "sqlite://tariff_impact.db?mode=rwc")]
    database_url: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tim_api=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    info!("Starting tim-api v{} on port {}", env!("CARGO_PKG_VERSION"), args.port);

    let pool = db::init_database(&args.database_url)
        .await
        .with_context(|| format!("Failed to open database {}", args.database_url))?;

    let app = build_router(AppState::new(pool));

    let addr = format!("127.0.0.1:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("tim-api listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
