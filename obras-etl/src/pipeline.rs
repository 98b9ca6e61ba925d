//! Pipeline orchestration: fetch → normalize → refresh
//!
//! Strictly sequential. A run either commits a complete new snapshot or
//! fails without touching the previous one; rerunning is always safe.

use crate::error::EtlError;
use crate::fetcher::RecordSource;
use crate::loader;
use crate::normalizer::{normalize, RecordError};
use chrono::{DateTime, Utc};
use obras_common::db::{SchemaReady, TableCounts};
use sqlx::SqlitePool;
use tracing::{info, warn};

/// Outcome of one pipeline run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub records_fetched: usize,
    pub rejected: Vec<RecordError>,
    pub duplicate_operations: usize,
    pub counts: TableCounts,
}

impl RunReport {
    pub fn elapsed_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}

/// Run one full-refresh batch against an initialized store
pub async fn run_pipeline<S: RecordSource + ?Sized>(
    source: &S,
    pool: &SqlitePool,
    ready: &SchemaReady,
) -> Result<RunReport, EtlError> {
    let started_at = Utc::now();
    info!(source = source.name(), "Fetching records");

    let records = source.fetch_all().await?;
    info!(records = records.len(), "Fetch complete");

    let normalized = normalize(&records);
    for rejection in &normalized.rejected {
        warn!("Rejected {}", rejection);
    }

    let counts = loader::refresh(pool, ready, &normalized.schema).await?;

    let report = RunReport {
        started_at,
        finished_at: Utc::now(),
        records_fetched: records.len(),
        rejected: normalized.rejected,
        duplicate_operations: normalized.duplicate_operations,
        counts,
    };

    info!(
        records = report.records_fetched,
        rejected = report.rejected.len(),
        operacoes = report.counts.operacoes,
        elapsed_ms = report.elapsed_ms(),
        "Pipeline run complete"
    );

    Ok(report)
}
