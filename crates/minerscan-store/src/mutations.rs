//! Write operations for the outcome store.
//!
//! Outcomes use upsert semantics keyed on the host address so a host rescanned
//! any number of times keeps exactly one row holding its latest observation.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::params;

use minerscan_core::{RunRecord, ScanOutcome};

use crate::client::{OutcomeStore, StoreError};

impl OutcomeStore {
    /// Insert or overwrite the row for `outcome.host` in a single statement.
    pub fn upsert_outcome(&self, outcome: &ScanOutcome) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO miner_details (ip_address, status, endpoint_used, response_json, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(ip_address) DO UPDATE SET
                   status = excluded.status,
                   endpoint_used = excluded.endpoint_used,
                   response_json = excluded.response_json,
                   updated_at = excluded.updated_at",
                params![
                    outcome.host.as_str(),
                    outcome.status.as_str(),
                    outcome.endpoint_used,
                    outcome.payload.to_stored(),
                    format_timestamp(&outcome.observed_at),
                ],
            )?;
            Ok(())
        })?;

        tracing::debug!(
            host = %outcome.host,
            status = %outcome.status,
            "Outcome persisted"
        );
        Ok(())
    }

    /// Write the audit row for a scan invocation, replacing any earlier row for the run.
    pub fn record_run(&self, run: &RunRecord) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO scan_runs (run_id, mode, started_at, completed_at, total, \
                 succeeded, failed, persist_failures, interrupted) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    run.run_id.to_string(),
                    run.mode.as_str(),
                    format_timestamp(&run.started_at),
                    format_timestamp(&run.completed_at),
                    run.total as i64,
                    run.succeeded as i64,
                    run.failed as i64,
                    run.persist_failures as i64,
                    run.interrupted,
                ],
            )?;
            Ok(())
        })
    }
}

/// RFC 3339 with fixed-width nanoseconds, so stored timestamps sort lexically.
pub(crate) fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}
