//! minerscan-store: SQLite persistence for probe outcomes.
//!
//! This crate is the single write path for scan results. Every outcome is
//! upserted by host address so repeated scans converge on one row per host,
//! and every scan invocation leaves an audit row in `scan_runs`.

pub mod client;
pub mod mutations;
pub mod queries;
pub mod schema;

pub use client::{OutcomeStore, StoreConfig, StoreError};
pub use queries::StatusSummary;
