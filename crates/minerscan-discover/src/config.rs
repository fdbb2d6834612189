//! Configuration for the minerscan scanner.

use std::time::Duration;

use serde::Deserialize;

use crate::error::{DiscoverError, Result};

/// Top-level scan configuration.
///
/// Loaded from the `minerscan.toml` `[scan]` section or
/// `MINERSCAN__SCAN__*` environment variables. Passed by value into the
/// prober and scanner; nothing reads it from global state.
#[derive(Debug, Clone, Deserialize)]
pub struct ScanConfig {
    /// Management paths to try, highest priority first.
    #[serde(default = "default_endpoints")]
    pub endpoints: Vec<String>,

    /// Username for both auth tiers.
    #[serde(default = "default_username")]
    pub username: String,

    /// Password for both auth tiers.
    #[serde(default = "default_password")]
    pub password: String,

    /// Maximum probes in flight at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Per-request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Log a progress line every this many outcomes.
    #[serde(default = "default_progress_every")]
    pub progress_every: usize,

    /// SQLite database holding `workers` and the scan results.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// URL scheme used to reach the devices.
    #[serde(default = "default_scheme")]
    pub scheme: String,
}

impl ScanConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(DiscoverError::Config("concurrency must be at least 1".into()));
        }
        if self.timeout_ms == 0 {
            return Err(DiscoverError::Config("timeout_ms must be positive".into()));
        }
        if self.endpoints.is_empty() {
            return Err(DiscoverError::Config("at least one endpoint is required".into()));
        }
        if let Some(bad) = self.endpoints.iter().find(|e| !e.starts_with('/')) {
            return Err(DiscoverError::Config(format!(
                "endpoint {bad:?} must start with '/'"
            )));
        }
        if !matches!(self.scheme.as_str(), "http" | "https") {
            return Err(DiscoverError::Config(format!(
                "unsupported scheme {:?}",
                self.scheme
            )));
        }
        Ok(())
    }
}

fn default_endpoints() -> Vec<String> {
    [
        "/cgi-bin/stats.cgi",
        "/cgi-bin/miner_stats.cgi",
        "/cgi-bin/summary.cgi",
        "/cgi-bin/get_system_info.cgi",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_username() -> String {
    "root".to_string()
}

fn default_password() -> String {
    "root".to_string()
}

fn default_concurrency() -> usize {
    20
}

fn default_timeout_ms() -> u64 {
    3000
}

fn default_progress_every() -> usize {
    50
}

fn default_database_path() -> String {
    "antpool_workers.db".to_string()
}

fn default_scheme() -> String {
    "http".to_string()
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            endpoints: default_endpoints(),
            username: default_username(),
            password: default_password(),
            concurrency: default_concurrency(),
            timeout_ms: default_timeout_ms(),
            progress_every: default_progress_every(),
            database_path: default_database_path(),
            scheme: default_scheme(),
        }
    }
}
