//! Outcome persistence seam.

use async_trait::async_trait;

use minerscan_core::{RunRecord, ScanOutcome};
use minerscan_store::OutcomeStore;

use crate::error::Result;

/// Destination for scan outcomes, called once per outcome as soon as it is known.
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// Durably record one outcome, overwriting any earlier outcome for the same host.
    async fn record(&self, outcome: &ScanOutcome) -> Result<()>;

    /// Record the audit row of a finished (or interrupted) run.
    async fn record_run(&self, _run: &RunRecord) -> Result<()> {
        Ok(())
    }
}

/// The SQLite store is the production sink. Writes run on the blocking pool.
#[async_trait]
impl ResultSink for OutcomeStore {
    async fn record(&self, outcome: &ScanOutcome) -> Result<()> {
        let store = self.clone();
        let outcome = outcome.clone();
        tokio::task::spawn_blocking(move || store.upsert_outcome(&outcome)).await??;
        Ok(())
    }

    async fn record_run(&self, run: &RunRecord) -> Result<()> {
        let store = self.clone();
        let run = run.clone();
        tokio::task::spawn_blocking(move || store.record_run(&run)).await??;
        Ok(())
    }
}
