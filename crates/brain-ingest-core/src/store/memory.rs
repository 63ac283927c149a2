//! In-memory [`BrainStore`] implementation for tests and library callers.
//!
//! Uses `HashMap` and `Vec` behind `std::sync::RwLock`. Facts are keyed by
//! `(brain_id, key)` so the uniqueness invariant holds by construction.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{Fact, IngestJob, JobCompletion, JobStatus, Source};

use super::BrainStore;

/// In-memory store. Lock poisoning is reported as an error.
pub struct InMemoryStore {
    sources: RwLock<Vec<Source>>,
    jobs: RwLock<HashMap<String, IngestJob>>,
    facts: RwLock<HashMap<(String, String), Fact>>,
    /// Every `(job_id, progress)` write, in order. Used to observe progress.
    progress_log: RwLock<Vec<(String, u8)>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            sources: RwLock::new(Vec::new()),
            jobs: RwLock::new(HashMap::new()),
            facts: RwLock::new(HashMap::new()),
            progress_log: RwLock::new(Vec::new()),
        }
    }

    /// Progress values written for a job, in write order.
    pub fn progress_history(&self, job_id: &str) -> Vec<u8> {
        self.progress_log
            .read()
            .map(|log| {
                log.iter()
                    .filter(|(id, _)| id == job_id)
                    .map(|(_, p)| *p)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of stored facts across all brains.
    pub fn fact_count(&self) -> usize {
        self.facts.read().map(|f| f.len()).unwrap_or(0)
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow!("in-memory store lock poisoned")
}

#[async_trait]
impl BrainStore for InMemoryStore {
    async fn put_source(&self, source: &Source) -> Result<()> {
        let mut sources = self.sources.write().map_err(poisoned)?;
        sources.retain(|s| s.id != source.id);
        sources.push(source.clone());
        Ok(())
    }

    async fn get_source(&self, source_id: &str) -> Result<Option<Source>> {
        let sources = self.sources.read().map_err(poisoned)?;
        Ok(sources.iter().find(|s| s.id == source_id).cloned())
    }

    async fn list_sources(&self, brain_id: &str) -> Result<Vec<Source>> {
        let sources = self.sources.read().map_err(poisoned)?;
        Ok(sources
            .iter()
            .filter(|s| s.brain_id == brain_id)
            .cloned()
            .collect())
    }

    async fn mark_source_ingested(&self, source_id: &str, at: DateTime<Utc>) -> Result<()> {
        let mut sources = self.sources.write().map_err(poisoned)?;
        if let Some(source) = sources.iter_mut().find(|s| s.id == source_id) {
            source.last_ingested_at = Some(at);
        }
        Ok(())
    }

    async fn create_job(&self, job: &IngestJob) -> Result<()> {
        let mut jobs = self.jobs.write().map_err(poisoned)?;
        if jobs.contains_key(&job.id) {
            bail!("job already exists: {}", job.id);
        }
        jobs.insert(job.id.clone(), job.clone());
        Ok(())
    }

    async fn update_job_progress(&self, job_id: &str, progress: u8, logs: &str) -> Result<()> {
        {
            let mut jobs = self.jobs.write().map_err(poisoned)?;
            let job = jobs
                .get_mut(job_id)
                .ok_or_else(|| anyhow!("job not found: {}", job_id))?;
            if job.status.is_terminal() {
                bail!("job {} is already {}", job_id, job.status);
            }
            job.progress = progress;
            job.logs = logs.to_string();
        }
        self.progress_log
            .write()
            .map_err(poisoned)?
            .push((job_id.to_string(), progress));
        Ok(())
    }

    async fn finish_job(&self, job_id: &str, completion: &JobCompletion) -> Result<()> {
        {
            let mut jobs = self.jobs.write().map_err(poisoned)?;
            let job = jobs
                .get_mut(job_id)
                .ok_or_else(|| anyhow!("job not found: {}", job_id))?;
            if job.status != JobStatus::Running {
                bail!("job {} is already {}", job_id, job.status);
            }
            job.status = completion.status;
            job.progress = completion.progress;
            job.logs = completion.logs.clone();
            job.facts_added = completion.facts_added;
            job.facts_updated = completion.facts_updated;
            job.finished_at = Some(completion.finished_at);
        }
        self.progress_log
            .write()
            .map_err(poisoned)?
            .push((job_id.to_string(), completion.progress));
        Ok(())
    }

    async fn get_job(&self, job_id: &str) -> Result<Option<IngestJob>> {
        let jobs = self.jobs.read().map_err(poisoned)?;
        Ok(jobs.get(job_id).cloned())
    }

    async fn list_facts(&self, brain_id: &str) -> Result<Vec<Fact>> {
        let facts = self.facts.read().map_err(poisoned)?;
        let mut out: Vec<Fact> = facts
            .values()
            .filter(|f| f.brain_id == brain_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(out)
    }

    async fn insert_fact(&self, fact: &Fact) -> Result<bool> {
        let mut facts = self.facts.write().map_err(poisoned)?;
        let key = (fact.brain_id.clone(), fact.key.clone());
        match facts.get(&key) {
            Some(existing) if existing.confidence >= fact.confidence => Ok(false),
            _ => {
                facts.insert(key, fact.clone());
                Ok(true)
            }
        }
    }

    async fn update_fact(&self, fact: &Fact) -> Result<bool> {
        let mut facts = self.facts.write().map_err(poisoned)?;
        let key = (fact.brain_id.clone(), fact.key.clone());
        match facts.get_mut(&key) {
            Some(existing) if fact.confidence > existing.confidence => {
                *existing = fact.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
