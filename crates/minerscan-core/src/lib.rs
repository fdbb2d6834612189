//! minerscan-core: Shared domain types and error handling for the minerscan engine.
//!
//! This crate provides the foundational types used across all minerscan components:
//! - Host addresses admitted to a scan run
//! - Probe outcomes (one authoritative record per host per pass)
//! - Run audit records
//! - Common error types

pub mod error;
pub mod types;

pub use error::CoreError;
pub use types::{Host, ProbeStatus, ResponsePayload, RunMode, RunRecord, ScanOutcome};
