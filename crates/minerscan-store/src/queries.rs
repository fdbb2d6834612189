//! Read operations over persisted outcomes, scan runs, and the upstream worker list.

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use minerscan_core::{Host, ProbeStatus, ResponsePayload, RunMode, RunRecord, ScanOutcome};

use crate::client::{OutcomeStore, StoreError};
use crate::schema::{table_exists, WORKERS_TABLE};

/// Row counts per probe status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct StatusSummary {
    pub success: usize,
    pub failed: usize,
}

impl StatusSummary {
    pub fn total(&self) -> usize {
        self.success + self.failed
    }
}

/// Raw column values of one `miner_details` row. Rows written by the older
/// scanner may carry NULLs in every column but the key.
type OutcomeRow = (String, Option<String>, Option<String>, Option<String>, Option<String>);

/// Timestamp layout used by the older scanner (local wall clock, no zone).
const LEGACY_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Raw column values of one `scan_runs` row.
type RunRow = (String, String, String, String, i64, i64, i64, i64, bool);

impl OutcomeStore {
    // ── Outcomes ─────────────────────────────────────────────────

    /// Latest outcome recorded for `host`, if it was ever scanned.
    pub fn get_outcome(&self, host: &Host) -> Result<Option<ScanOutcome>, StoreError> {
        let row = self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT ip_address, status, endpoint_used, response_json, updated_at
                     FROM miner_details WHERE ip_address = ?1",
                    [host.as_str()],
                    read_outcome_row,
                )
                .optional()?)
        })?;

        row.map(outcome_from_row).transpose()
    }

    pub fn count_outcomes(&self) -> Result<usize, StoreError> {
        self.with_conn(|conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM miner_details", [], |row| row.get(0))?;
            Ok(count as usize)
        })
    }

    /// All outcomes, optionally restricted to one status, ordered by host.
    pub fn list_outcomes(
        &self,
        status: Option<ProbeStatus>,
    ) -> Result<Vec<ScanOutcome>, StoreError> {
        let rows = self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT ip_address, status, endpoint_used, response_json, updated_at
                 FROM miner_details
                 WHERE ?1 IS NULL OR status = ?1
                 ORDER BY ip_address",
            )?;
            let rows = stmt
                .query_map(params![status.map(|s| s.as_str())], read_outcome_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })?;

        rows.into_iter().map(outcome_from_row).collect()
    }

    pub fn status_summary(&self) -> Result<StatusSummary, StoreError> {
        let counts = self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT status, COUNT(*) FROM miner_details GROUP BY status")?;
            let counts = stmt
                .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(counts)
        })?;

        let mut summary = StatusSummary::default();
        for (status, count) in counts {
            match status.parse::<ProbeStatus>() {
                Ok(ProbeStatus::Success) => summary.success = count as usize,
                Ok(ProbeStatus::Failed) => summary.failed = count as usize,
                Err(e) => tracing::warn!(status = %status, error = %e, "Ignoring unknown status"),
            }
        }
        Ok(summary)
    }

    // ── Runs ─────────────────────────────────────────────────────

    /// Most recent scan runs, newest first.
    pub fn recent_runs(&self, limit: usize) -> Result<Vec<RunRecord>, StoreError> {
        let rows = self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT run_id, mode, started_at, completed_at, total, succeeded, failed,
                        persist_failures, interrupted
                 FROM scan_runs ORDER BY started_at DESC LIMIT ?1",
            )?;
            let rows = stmt
                .query_map([limit as i64], |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                        row.get(6)?,
                        row.get(7)?,
                        row.get(8)?,
                    ))
                })?
                .collect::<rusqlite::Result<Vec<RunRow>>>()?;
            Ok(rows)
        })?;

        rows.into_iter().map(run_from_row).collect()
    }

    // ── Targets ──────────────────────────────────────────────────

    /// Distinct, non-empty addresses from the upstream `workers` table.
    pub fn worker_hosts(&self) -> Result<Vec<String>, StoreError> {
        self.with_conn(|conn| {
            if !table_exists(conn, WORKERS_TABLE)? {
                return Err(StoreError::MissingTable(WORKERS_TABLE.to_string()));
            }

            let mut stmt = conn.prepare(
                "SELECT DISTINCT ip_address FROM workers
                 WHERE ip_address IS NOT NULL AND ip_address != ''",
            )?;
            let hosts = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(hosts)
        })
    }
}

fn read_outcome_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<OutcomeRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
    ))
}

fn outcome_from_row(row: OutcomeRow) -> Result<ScanOutcome, StoreError> {
    let (ip, status, endpoint_used, payload, updated_at) = row;

    let host = Host::parse(&ip).ok_or_else(|| corrupt(&ip, "empty host address"))?;
    let status = status
        .ok_or_else(|| corrupt(&ip, "missing status"))?
        .parse::<ProbeStatus>()
        .map_err(|e| corrupt(&ip, &e.to_string()))?;
    let updated_at = updated_at.ok_or_else(|| corrupt(&ip, "missing timestamp"))?;
    let observed_at = parse_timestamp(&ip, &updated_at)?;

    Ok(ScanOutcome {
        host,
        status,
        endpoint_used: endpoint_used.unwrap_or_default(),
        payload: ResponsePayload::from_stored(payload.as_deref().unwrap_or_default()),
        observed_at,
    })
}

fn run_from_row(row: RunRow) -> Result<RunRecord, StoreError> {
    let (
        run_id,
        mode,
        started_at,
        completed_at,
        total,
        succeeded,
        failed,
        persist_failures,
        interrupted,
    ) = row;

    Ok(RunRecord {
        run_id: Uuid::parse_str(&run_id).map_err(|e| corrupt(&run_id, &e.to_string()))?,
        mode: mode
            .parse::<RunMode>()
            .map_err(|e| corrupt(&run_id, &e.to_string()))?,
        started_at: parse_timestamp(&run_id, &started_at)?,
        completed_at: parse_timestamp(&run_id, &completed_at)?,
        total: total as usize,
        succeeded: succeeded as usize,
        failed: failed as usize,
        persist_failures: persist_failures as usize,
        interrupted,
    })
}

/// RFC 3339, falling back to the older scanner's zone-less layout read as UTC.
fn parse_timestamp(key: &str, raw: &str) -> Result<DateTime<Utc>, StoreError> {
    if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
        return Ok(t.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, LEGACY_TIMESTAMP_FORMAT)
        .map(|t| t.and_utc())
        .map_err(|e| corrupt(key, &format!("bad timestamp {raw:?}: {e}")))
}

fn corrupt(key: &str, reason: &str) -> StoreError {
    StoreError::Corrupt {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}
