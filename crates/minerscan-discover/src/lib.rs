//! minerscan-discover: Endpoint discovery for network-attached miners.
//!
//! Probes each candidate host against a ranked list of management endpoints
//! under digest-then-basic credentials, bounds concurrency across the host
//! set, and upserts exactly one outcome per host into the store.

pub mod auth;
pub mod config;
pub mod error;
pub mod persist;
pub mod prober;
pub mod scanner;
pub mod targets;
