//! Retention reaper: periodic garbage collection of expired event logs, command contexts and
//! shared files.
//!
//! The sweep runs across all organizations. It only ever deletes rows strictly older than the
//! cutoff, so it can run concurrently with traffic writing fresh rows.

use std::sync::Arc;

use chrono::{Duration, Utc};
use metrics::counter;
use sqlx::{Connection, PgConnection, PgPool};
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::config::RetentionConfig;
use crate::db::errors::Result;
use crate::diagnostics::DiagnosticSink;

/// Rows removed by one sweep, per table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepSummary {
    pub event_logs: u64,
    pub command_contexts: u64,
    pub shared_files: u64,
}

impl SweepSummary {
    pub fn total(&self) -> u64 {
        self.event_logs + self.command_contexts + self.shared_files
    }
}

/// Delete every retention-governed row older than `retention_days`, in one transaction.
///
/// `retention_days <= 0` disables retention and deletes nothing.
#[instrument(skip(conn), err)]
pub async fn sweep(conn: &mut PgConnection, retention_days: i64) -> Result<SweepSummary> {
    if retention_days <= 0 {
        return Ok(SweepSummary::default());
    }

    let cutoff = Utc::now() - Duration::days(retention_days);
    let mut tx = conn.begin().await?;

    let event_logs = sqlx::query("DELETE FROM event_logs WHERE timestamp < $1")
        .bind(cutoff)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    let command_contexts = sqlx::query("DELETE FROM command_contexts WHERE timestamp < $1")
        .bind(cutoff)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    let shared_files = sqlx::query("DELETE FROM shared_files WHERE timestamp < $1")
        .bind(cutoff)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    tx.commit().await?;

    counter!("fleetctl_retention_rows_deleted_total", "table" => "event_logs").increment(event_logs);
    counter!("fleetctl_retention_rows_deleted_total", "table" => "command_contexts").increment(command_contexts);
    counter!("fleetctl_retention_rows_deleted_total", "table" => "shared_files").increment(shared_files);

    Ok(SweepSummary {
        event_logs,
        command_contexts,
        shared_files,
    })
}

/// Run [`sweep`] on `config.sweep_interval` until `shutdown` fires.
pub async fn run_retention_reaper(pool: PgPool, config: RetentionConfig, diagnostics: Arc<DiagnosticSink>, shutdown: CancellationToken) {
    tracing::info!(
        data_retention_days = config.data_retention_days,
        sweep_interval = ?config.sweep_interval,
        "Starting retention reaper"
    );

    loop {
        tokio::select! {
            _ = tokio::time::sleep(config.sweep_interval) => {}
            _ = shutdown.cancelled() => {
                tracing::info!("Retention reaper shutting down");
                return;
            }
        }

        if config.data_retention_days <= 0 {
            tracing::trace!("Retention disabled, skipping sweep");
            continue;
        }

        let result = match pool.acquire().await {
            Ok(mut conn) => sweep(&mut conn, config.data_retention_days).await,
            Err(e) => Err(e.into()),
        };

        match result {
            Ok(summary) if summary.total() > 0 => {
                tracing::info!(
                    event_logs = summary.event_logs,
                    command_contexts = summary.command_contexts,
                    shared_files = summary.shared_files,
                    "Retention sweep removed expired rows"
                );
                diagnostics
                    .record_info(format!(
                        "Retention sweep removed {} event logs, {} command contexts, {} shared files.",
                        summary.event_logs, summary.command_contexts, summary.shared_files
                    ))
                    .await;
            }
            Ok(_) => tracing::debug!("Retention sweep found nothing to remove"),
            Err(e) => {
                tracing::error!(error = %e, "Retention sweep failed");
                diagnostics.record_error(format!("Retention sweep failed: {e}")).await;
            }
        }
    }
}
