//! obras-etl - ObrasGov full-refresh batch
//!
//! Fetches every investment-project record for the configured state,
//! normalizes it into the star schema and reloads the store.
//!
//! Takes no flags. Configuration comes from the environment and
//! config.toml (see `obras_common::config`). Exits non-zero on
//! unrecoverable failure (store unreachable, fatal upstream status,
//! integrity violation).
//!
//! Runs must be serialized by the scheduler; two concurrent runs against
//! the same store are not supported.

use anyhow::{Context, Result};
use obras_common::config::Settings;
use obras_common::db::{ensure_schema, open_store};
use obras_etl::{run_pipeline, ObrasGovClient};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let (settings, config_source) = Settings::load().context("Failed to load configuration")?;

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting obras-etl v{}", env!("CARGO_PKG_VERSION"));
    config_source.log();
    info!(uf = %settings.api.uf, url = %settings.api.base_url, "Upstream");
    info!("Database: {}", settings.store.database_path.display());

    let pool = open_store(&settings.store).await?;
    let ready = ensure_schema(&pool).await?;

    let client = ObrasGovClient::new(settings.api.clone())?;
    let report = run_pipeline(&client, &pool, &ready).await?;

    if !report.rejected.is_empty() {
        info!(
            rejected = report.rejected.len(),
            "Some records were skipped; see warnings above"
        );
    }

    info!(
        "Load complete: {} operations, {} axes, {} types, {} subtypes",
        report.counts.operacoes, report.counts.eixos, report.counts.tipos, report.counts.subtipos
    );

    pool.close().await;
    Ok(())
}
