//! Tables owned by the engine.
//!
//! The `workers` table that supplies target hosts belongs to the upstream
//! listing job and is only ever read here.

use rusqlite::Connection;

pub const OUTCOMES_TABLE: &str = "miner_details";
pub const RUNS_TABLE: &str = "scan_runs";
pub const WORKERS_TABLE: &str = "workers";

/// Create the engine's tables if they do not exist yet.
pub fn initialize(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {OUTCOMES_TABLE} (
            ip_address    TEXT PRIMARY KEY,
            status        TEXT NOT NULL,
            endpoint_used TEXT NOT NULL,
            response_json TEXT NOT NULL,
            updated_at    TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS {RUNS_TABLE} (
            run_id           TEXT PRIMARY KEY,
            mode             TEXT NOT NULL,
            started_at       TEXT NOT NULL,
            completed_at     TEXT NOT NULL,
            total            INTEGER NOT NULL,
            succeeded        INTEGER NOT NULL,
            failed           INTEGER NOT NULL,
            persist_failures INTEGER NOT NULL,
            interrupted      INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_{OUTCOMES_TABLE}_status ON {OUTCOMES_TABLE}(status);"
    ))
}

/// Whether a table exists in the connected database.
pub fn table_exists(conn: &Connection, table: &str) -> rusqlite::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [table],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}
