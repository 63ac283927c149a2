//! Ingestion job orchestration.
//!
//! Runs one source through the full flow: discovery → fetch + extract →
//! fact extraction → reconciliation → storage, recording progress and a
//! log line on the job after every step.
//!
//! Progress milestones: 0 (created), 10 (discovering), 25 (discovered),
//! 25–55 (pages), 60–90 (facts), 95 (reconciled), 100 (done).
//!
//! Failures inside a job never escape [`IngestPipeline::run`]: the job is
//! marked `failed` with the error appended to its log. Only a failure to
//! write the terminal status is returned to the caller.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use sha2::{Digest, Sha256};

use brain_ingest_core::models::{Document, IngestJob, JobCompletion, JobStatus, Source};
use brain_ingest_core::reconcile::reconcile;
use brain_ingest_core::store::BrainStore;

use crate::config::Config;
use crate::discover::UrlDiscoverer;
use crate::error::IngestError;
use crate::extract::ContentExtractor;
use crate::facts::FactExtractor;
use crate::fetcher::{HttpFetcher, PageFetcher};
use crate::llm::{call_budget, create_extractor, LlmExtractor};
use crate::pacing::Pacer;
use crate::progress::{JobProgressReporter, NoProgress, ProgressEvent, ProgressMode};
use crate::sqlite_store::SqliteStore;
use crate::telemetry::{IngestEvent, TelemetrySink, TracingSink};

/// Attempts per fact write before the job fails.
const UPSERT_ATTEMPTS: u32 = 3;

/// Result of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobOutcome {
    pub job_id: String,
    pub status: JobStatus,
    pub facts_added: u64,
    pub facts_updated: u64,
    pub urls_discovered: usize,
    pub urls_processed: usize,
    pub error: Option<String>,
}

#[derive(Default)]
struct RunStats {
    urls_discovered: usize,
    urls_processed: usize,
    facts_added: u64,
    facts_updated: u64,
}

/// Owns the in-flight state of one job record. Progress only moves forward.
struct JobTracker<'a> {
    store: &'a dyn BrainStore,
    reporter: &'a dyn JobProgressReporter,
    job_id: String,
    progress: u8,
    logs: String,
}

impl<'a> JobTracker<'a> {
    fn new(
        store: &'a dyn BrainStore,
        reporter: &'a dyn JobProgressReporter,
        job_id: String,
    ) -> Self {
        Self {
            store,
            reporter,
            job_id,
            progress: 0,
            logs: String::new(),
        }
    }

    fn append(&mut self, message: &str) {
        self.logs.push_str(&format!(
            "[{}] {}\n",
            Utc::now().format("%Y-%m-%dT%H:%M:%SZ"),
            message
        ));
    }

    /// Append a log line without moving progress. Persisted with the next step.
    fn note(&mut self, message: &str) {
        self.append(message);
    }

    /// Record a step: advance progress, append the message and persist both.
    async fn step(&mut self, progress: u8, message: &str) {
        self.progress = self.progress.max(progress.min(100));
        self.append(message);
        if let Err(e) = self
            .store
            .update_job_progress(&self.job_id, self.progress, &self.logs)
            .await
        {
            tracing::warn!(job_id = %self.job_id, error = %e, "failed to persist job progress");
        }
        self.reporter.report(&ProgressEvent {
            job_id: self.job_id.clone(),
            progress: self.progress,
            message: message.to_string(),
        });
    }

    async fn finish(&mut self, status: JobStatus, stats: &RunStats, message: &str) -> Result<()> {
        if status == JobStatus::Success {
            self.progress = 100;
        }
        self.append(message);
        let completion = JobCompletion {
            status,
            progress: self.progress,
            logs: self.logs.clone(),
            facts_added: stats.facts_added,
            facts_updated: stats.facts_updated,
            finished_at: Utc::now(),
        };
        self.store
            .finish_job(&self.job_id, &completion)
            .await
            .with_context(|| format!("Failed to finalize job {}", self.job_id))?;
        self.reporter.report(&ProgressEvent {
            job_id: self.job_id.clone(),
            progress: self.progress,
            message: message.to_string(),
        });
        Ok(())
    }
}

/// Scaled progress for item `done` of `total` within `[start, start + span]`.
fn scaled(start: u8, span: u8, done: usize, total: usize) -> u8 {
    if total == 0 {
        return start + span;
    }
    start + ((done.min(total) * span as usize) / total) as u8
}

/// Run `op` up to [`UPSERT_ATTEMPTS`] times with doubling backoff.
async fn with_retry<T, F, Fut>(what: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < UPSERT_ATTEMPTS => {
                tracing::warn!(attempt, error = %e, "{} failed, retrying", what);
                tokio::time::sleep(Duration::from_millis(100 << (attempt - 1))).await;
            }
            Err(e) => return Err(e.context(format!("{} failed after {} attempts", what, attempt))),
        }
    }
}

pub struct IngestPipeline {
    store: Arc<dyn BrainStore>,
    fetcher: Arc<dyn PageFetcher>,
    discoverer: UrlDiscoverer,
    extractor: ContentExtractor,
    facts: FactExtractor,
    page_pacer: Pacer,
    llm_pacer: Pacer,
    telemetry: Arc<dyn TelemetrySink>,
    reporter: Arc<dyn JobProgressReporter>,
}

impl IngestPipeline {
    pub fn new(
        config: &Config,
        store: Arc<dyn BrainStore>,
        fetcher: Arc<dyn PageFetcher>,
        llm: Arc<dyn LlmExtractor>,
    ) -> Self {
        let llm_delay = if config.llm.is_enabled() {
            config.pacing.llm_delay_ms
        } else {
            0
        };
        Self {
            store,
            discoverer: UrlDiscoverer::new(fetcher.clone(), config),
            fetcher,
            extractor: ContentExtractor::new(&config.extraction),
            facts: FactExtractor::new(llm, call_budget(&config.llm)),
            page_pacer: Pacer::from_millis(config.pacing.page_delay_ms),
            llm_pacer: Pacer::from_millis(llm_delay),
            telemetry: Arc::new(TracingSink),
            reporter: Arc::new(NoProgress),
        }
    }

    /// Production wiring: HTTP fetcher and the configured LLM provider.
    pub fn from_config(config: &Config, store: Arc<dyn BrainStore>) -> Result<Self> {
        let fetcher = HttpFetcher::new(&config.fetch).context("Failed to build HTTP client")?;
        let llm = create_extractor(&config.llm)?;
        Ok(Self::new(config, store, Arc::new(fetcher), llm))
    }

    pub fn with_telemetry(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.telemetry = sink;
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn JobProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Run one ingestion job for `source_id`.
    ///
    /// Unknown sources, and sources owned by another brain, are rejected
    /// before any job is created.
    pub async fn run(&self, brain_id: &str, source_id: &str) -> Result<JobOutcome, IngestError> {
        let source = self
            .store
            .get_source(source_id)
            .await?
            .ok_or_else(|| IngestError::SourceNotFound(source_id.to_string()))?;
        if source.brain_id != brain_id {
            return Err(IngestError::SourceBrainMismatch {
                source_id: source_id.to_string(),
                brain_id: brain_id.to_string(),
            });
        }

        let job = IngestJob::start(brain_id, source_id);
        self.store
            .create_job(&job)
            .await
            .context("Failed to create ingest job")?;
        tracing::info!(job_id = %job.id, brain_id, source_id, "ingest job started");

        let mut tracker = JobTracker::new(self.store.as_ref(), self.reporter.as_ref(), job.id.clone());
        tracker.step(0, "Starting ingestion...").await;

        let mut stats = RunStats::default();
        let result = self.execute(&mut tracker, &source, &mut stats).await;

        let (status, error) = match result {
            Ok(()) => {
                let summary = format!(
                    "Ingestion complete: {} facts added, {} facts updated",
                    stats.facts_added, stats.facts_updated
                );
                tracker.finish(JobStatus::Success, &stats, &summary).await?;
                tracing::info!(
                    job_id = %job.id,
                    added = stats.facts_added,
                    updated = stats.facts_updated,
                    "ingest job succeeded"
                );
                self.telemetry.emit(IngestEvent {
                    job_id: job.id.clone(),
                    brain_id: brain_id.to_string(),
                    source_id: source_id.to_string(),
                    urls_processed: stats.urls_processed,
                    facts_added: stats.facts_added,
                    facts_updated: stats.facts_updated,
                });
                (JobStatus::Success, None)
            }
            Err(e) => {
                let message = format!("{:#}", e);
                tracker
                    .finish(JobStatus::Failed, &stats, &format!("Ingestion failed: {}", message))
                    .await?;
                tracing::error!(job_id = %job.id, error = %message, "ingest job failed");
                (JobStatus::Failed, Some(message))
            }
        };

        Ok(JobOutcome {
            job_id: job.id,
            status,
            facts_added: stats.facts_added,
            facts_updated: stats.facts_updated,
            urls_discovered: stats.urls_discovered,
            urls_processed: stats.urls_processed,
            error,
        })
    }

    async fn execute(
        &self,
        tracker: &mut JobTracker<'_>,
        source: &Source,
        stats: &mut RunStats,
    ) -> Result<(), IngestError> {
        tracker.step(10, "Discovering URLs...").await;
        let urls = self.discoverer.discover(source).await?;
        stats.urls_discovered = urls.len();
        tracker
            .step(25, &format!("Discovered {} URLs", urls.len()))
            .await;

        let documents = self.fetch_documents(tracker, &urls).await;
        stats.urls_processed = documents.len();

        tracker
            .step(60, &format!("Extracting facts from {} documents", documents.len()))
            .await;
        let mut candidates = Vec::new();
        for (i, doc) in documents.iter().enumerate() {
            self.llm_pacer.wait().await;
            let found = self.facts.extract_facts(doc).await;
            let message = format!("Extracted {} facts from {}", found.len(), doc.url);
            candidates.extend(found);
            tracker
                .step(scaled(60, 30, i + 1, documents.len()), &message)
                .await;
        }

        let existing = self
            .store
            .list_facts(&source.brain_id)
            .await
            .context("Failed to load existing facts")?;
        let plan = reconcile(&candidates, &existing);
        tracker
            .step(
                95,
                &format!(
                    "Reconciled {} candidates: {} new, {} updates, {} discarded",
                    candidates.len(),
                    plan.to_insert.len(),
                    plan.to_update.len(),
                    plan.discarded
                ),
            )
            .await;

        let now = Utc::now();
        for candidate in plan.to_insert {
            let fact = candidate.into_fact(&source.brain_id, now);
            if with_retry("insert fact", || self.store.insert_fact(&fact)).await? {
                stats.facts_added += 1;
            }
        }
        for candidate in plan.to_update {
            let fact = candidate.into_fact(&source.brain_id, now);
            if with_retry("update fact", || self.store.update_fact(&fact)).await? {
                stats.facts_updated += 1;
            }
        }
        with_retry("mark source ingested", || {
            self.store.mark_source_ingested(&source.id, now)
        })
        .await?;

        Ok(())
    }

    /// Fetch and extract every URL in order. Failures are logged and skipped,
    /// as are pages whose text repeats one already seen in this run.
    async fn fetch_documents(&self, tracker: &mut JobTracker<'_>, urls: &[String]) -> Vec<Document> {
        let mut documents = Vec::new();
        let mut seen_content: HashSet<Vec<u8>> = HashSet::new();

        for (i, url) in urls.iter().enumerate() {
            self.page_pacer.wait().await;
            let progress = scaled(25, 30, i + 1, urls.len());

            let html = match self.fetcher.fetch_html(url).await {
                Ok(html) => html,
                Err(e) => {
                    tracing::warn!(url = %url, error = %e, "skipping url");
                    tracker
                        .step(progress, &format!("Failed to fetch {}: {}", url, e))
                        .await;
                    continue;
                }
            };

            let Some(doc) = self.extractor.extract_content(&html, url) else {
                tracing::warn!(url = %url, "no content extracted");
                tracker
                    .step(progress, &format!("No content extracted from {}", url))
                    .await;
                continue;
            };

            let digest = Sha256::digest(doc.text_content.as_bytes()).to_vec();
            if !doc.text_content.is_empty() && !seen_content.insert(digest) {
                tracker
                    .step(progress, &format!("Skipping duplicate content at {}", url))
                    .await;
                continue;
            }

            tracker.note(&format!("Fetched {} ({} chars)", url, doc.text_content.len()));
            tracker
                .step(progress, &format!("Processed {}/{} pages", i + 1, urls.len()))
                .await;
            documents.push(doc);
        }

        documents
    }
}

/// CLI entry point for `brain ingest`. Prints the outcome as JSON on stdout
/// and exits non-zero when the job fails.
pub async fn run_ingest(
    config: &Config,
    brain_id: &str,
    source_id: &str,
    progress: ProgressMode,
) -> Result<()> {
    let store = Arc::new(SqliteStore::connect(config).await?);
    let pipeline = IngestPipeline::from_config(config, store.clone())?
        .with_reporter(progress.reporter());

    let outcome = pipeline.run(brain_id, source_id).await?;
    store.pool().close().await;

    println!("{}", serde_json::to_string_pretty(&outcome)?);
    if outcome.status != JobStatus::Success {
        anyhow::bail!(
            "ingestion job {} failed: {}",
            outcome.job_id,
            outcome.error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}
