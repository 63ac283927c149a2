//! Storage abstraction for brain-ingest.
//!
//! The [`BrainStore`] trait is the narrow read/write contract the ingestion
//! pipeline consumes: sources, job records, and the per-brain fact table.
//! Backends are pluggable (SQLite in the main crate, in-memory here).
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{Fact, IngestJob, JobCompletion, Source};

/// Abstract storage backend for the ingestion pipeline.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`put_source`](BrainStore::put_source) | Create or replace a source |
/// | [`get_source`](BrainStore::get_source) | Read one source by ID |
/// | [`list_sources`](BrainStore::list_sources) | All sources of a brain |
/// | [`mark_source_ingested`](BrainStore::mark_source_ingested) | Stamp `last_ingested_at` |
/// | [`create_job`](BrainStore::create_job) | Insert a running job record |
/// | [`update_job_progress`](BrainStore::update_job_progress) | Persist progress and logs |
/// | [`finish_job`](BrainStore::finish_job) | Write the terminal state |
/// | [`get_job`](BrainStore::get_job) | Read one job by ID |
/// | [`list_facts`](BrainStore::list_facts) | All facts of a brain |
/// | [`insert_fact`](BrainStore::insert_fact) | Insert a fact for a new key |
/// | [`update_fact`](BrainStore::update_fact) | Replace a less confident fact |
#[async_trait]
pub trait BrainStore: Send + Sync {
    async fn put_source(&self, source: &Source) -> Result<()>;

    async fn get_source(&self, source_id: &str) -> Result<Option<Source>>;

    async fn list_sources(&self, brain_id: &str) -> Result<Vec<Source>>;

    async fn mark_source_ingested(&self, source_id: &str, at: DateTime<Utc>) -> Result<()>;

    async fn create_job(&self, job: &IngestJob) -> Result<()>;

    /// Persist intermediate progress for a running job.
    async fn update_job_progress(&self, job_id: &str, progress: u8, logs: &str) -> Result<()>;

    /// Move a running job to its terminal state.
    ///
    /// Fails if the job does not exist or is already terminal.
    async fn finish_job(&self, job_id: &str, completion: &JobCompletion) -> Result<()>;

    async fn get_job(&self, job_id: &str) -> Result<Option<IngestJob>>;

    async fn list_facts(&self, brain_id: &str) -> Result<Vec<Fact>>;

    /// Insert a fact for a key the brain did not have.
    ///
    /// If a concurrent writer stored the key first, the row is only replaced
    /// when `fact.confidence` is strictly greater. Returns whether the row
    /// was written.
    async fn insert_fact(&self, fact: &Fact) -> Result<bool>;

    /// Replace the stored fact for `(brain_id, key)` when `fact.confidence`
    /// is strictly greater. Value, source, confidence, and verification
    /// time change together. Returns whether the row was written.
    async fn update_fact(&self, fact: &Fact) -> Result<bool>;
}
