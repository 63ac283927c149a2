//! Fire-and-forget reporting of completed ingestion jobs.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestEvent {
    pub job_id: String,
    pub brain_id: String,
    pub source_id: String,
    pub urls_processed: usize,
    pub facts_added: u64,
    pub facts_updated: u64,
}

/// Receives one event per successful job. Must not block or fail the job.
pub trait TelemetrySink: Send + Sync {
    fn emit(&self, event: IngestEvent);
}

/// Writes events as structured `tracing` records on the `telemetry` target.
pub struct TracingSink;

impl TelemetrySink for TracingSink {
    fn emit(&self, event: IngestEvent) {
        tracing::info!(
            target: "telemetry",
            job_id = %event.job_id,
            brain_id = %event.brain_id,
            source_id = %event.source_id,
            urls_processed = event.urls_processed,
            facts_added = event.facts_added,
            facts_updated = event.facts_updated,
            "ingest completed"
        );
    }
}
