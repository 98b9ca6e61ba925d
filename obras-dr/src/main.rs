//! obras-dr: read-only dashboard data service over the ObrasGov store
//!
//! Database path and bind address come from flags, then environment,
//! then config.toml, then defaults.

use anyhow::Result;
use clap::Parser;
use obras_common::config::{Settings, ENV_DASHBOARD_BIND, ENV_DATABASE_PATH};
use obras_common::db::connect_readonly;
use obras_dr::{build_router, AppState};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "obras-dr", version, about = "ObrasGov dashboard data service")]
struct Args {
    /// SQLite store written by obras-etl
    #[arg(long, env = ENV_DATABASE_PATH)]
    database: Option<PathBuf>,

    /// Listen address
    #[arg(long, env = ENV_DASHBOARD_BIND)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let (settings, config_source) = Settings::load()?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting ObrasGov dashboard service (obras-dr) v{}", env!("CARGO_PKG_VERSION"));
    config_source.log();

    let db_path = args.database.unwrap_or(settings.store.database_path);
    let bind = args.bind.unwrap_or(settings.dashboard_bind);
    info!("Database path: {}", db_path.display());

    let pool = match connect_readonly(&db_path).await {
        Ok(pool) => {
            info!("Connected to database (read-only)");
            pool
        }
        Err(e) => {
            error!("Failed to connect to database: {}", e);
            return Err(e.into());
        }
    };

    let app = build_router(AppState::new(pool));

    let listener = tokio::net::TcpListener::bind(&bind).await?;
    info!("obras-dr listening on http://{}", bind);
    info!("Health check: http://{}/health", bind);

    axum::serve(listener, app).await?;

    Ok(())
}
