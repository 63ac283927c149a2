//! SQLite-backed [`BrainStore`] implementation.
//!
//! Timestamps are stored as Unix milliseconds. Fact writes are conditional
//! on confidence inside the SQL statement itself, so two jobs racing on the
//! same `(brain_id, key)` cannot lower a stored confidence.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use brain_ingest_core::models::{
    Fact, IngestJob, JobCompletion, JobStatus, Source, SourceConfig,
};
use brain_ingest_core::store::BrainStore;

use crate::config::Config;
use crate::db;

/// SQLite implementation of the [`BrainStore`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open the configured database. The schema must already exist (`brain init`).
    pub async fn connect(config: &Config) -> Result<Self> {
        Ok(Self::new(db::connect(config).await?))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

fn source_from_row(row: &SqliteRow) -> Result<Source> {
    let config_json: String = row.try_get("config_json")?;
    let config: SourceConfig = serde_json::from_str(&config_json)
        .with_context(|| format!("Invalid source config JSON: {}", config_json))?;
    let last: Option<i64> = row.try_get("last_ingested_at")?;
    Ok(Source {
        id: row.try_get("id")?,
        brain_id: row.try_get("brain_id")?,
        source_type: row.try_get("type")?,
        config,
        last_ingested_at: last.map(from_millis),
    })
}

fn job_from_row(row: &SqliteRow) -> Result<IngestJob> {
    let status: String = row.try_get("status")?;
    let progress: i64 = row.try_get("progress")?;
    let finished: Option<i64> = row.try_get("finished_at")?;
    Ok(IngestJob {
        id: row.try_get("id")?,
        brain_id: row.try_get("brain_id")?,
        source_id: row.try_get("source_id")?,
        status: status.parse()?,
        progress: progress.clamp(0, 100) as u8,
        logs: row.try_get("logs")?,
        facts_added: row.try_get::<i64, _>("facts_added")?.max(0) as u64,
        facts_updated: row.try_get::<i64, _>("facts_updated")?.max(0) as u64,
        started_at: from_millis(row.try_get("started_at")?),
        finished_at: finished.map(from_millis),
    })
}

fn fact_from_row(row: &SqliteRow) -> Result<Fact> {
    Ok(Fact {
        brain_id: row.try_get("brain_id")?,
        key: row.try_get("key")?,
        value: row.try_get("value")?,
        source: row.try_get("source")?,
        confidence: row.try_get("confidence")?,
        last_verified_at: from_millis(row.try_get("last_verified_at")?),
    })
}

#[async_trait]
impl BrainStore for SqliteStore {
    async fn put_source(&self, source: &Source) -> Result<()> {
        let config_json = serde_json::to_string(&source.config)?;
        sqlx::query(
            r#"
            INSERT INTO knowledge_sources (id, brain_id, type, config_json, last_ingested_at, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                brain_id = excluded.brain_id,
                type = excluded.type,
                config_json = excluded.config_json,
                last_ingested_at = excluded.last_ingested_at
            "#,
        )
        .bind(&source.id)
        .bind(&source.brain_id)
        .bind(&source.source_type)
        .bind(&config_json)
        .bind(source.last_ingested_at.map(to_millis))
        .bind(to_millis(Utc::now()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_source(&self, source_id: &str) -> Result<Option<Source>> {
        let row = sqlx::query(
            "SELECT id, brain_id, type, config_json, last_ingested_at FROM knowledge_sources WHERE id = ?",
        )
        .bind(source_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(source_from_row).transpose()
    }

    async fn list_sources(&self, brain_id: &str) -> Result<Vec<Source>> {
        let rows = sqlx::query(
            r#"
            SELECT id, brain_id, type, config_json, last_ingested_at
            FROM knowledge_sources
            WHERE brain_id = ?
            ORDER BY created_at, id
            "#,
        )
        .bind(brain_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(source_from_row).collect()
    }

    async fn mark_source_ingested(&self, source_id: &str, at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE knowledge_sources SET last_ingested_at = ? WHERE id = ?")
            .bind(to_millis(at))
            .bind(source_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn create_job(&self, job: &IngestJob) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO ingest_jobs (id, brain_id, source_id, status, progress, logs,
                                     facts_added, facts_updated, started_at, finished_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&job.id)
        .bind(&job.brain_id)
        .bind(&job.source_id)
        .bind(job.status.as_str())
        .bind(job.progress as i64)
        .bind(&job.logs)
        .bind(job.facts_added as i64)
        .bind(job.facts_updated as i64)
        .bind(to_millis(job.started_at))
        .bind(job.finished_at.map(to_millis))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_job_progress(&self, job_id: &str, progress: u8, logs: &str) -> Result<()> {
        let result = sqlx::query(
            "UPDATE ingest_jobs SET progress = ?, logs = ? WHERE id = ? AND status = 'running'",
        )
        .bind(progress as i64)
        .bind(logs)
        .bind(job_id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            bail!("no running job with id {}", job_id);
        }
        Ok(())
    }

    async fn finish_job(&self, job_id: &str, completion: &JobCompletion) -> Result<()> {
        if completion.status == JobStatus::Running {
            return Err(anyhow!("cannot finish job {} as running", job_id));
        }
        let result = sqlx::query(
            r#"
            UPDATE ingest_jobs
            SET status = ?, progress = ?, logs = ?, facts_added = ?, facts_updated = ?, finished_at = ?
            WHERE id = ? AND status = 'running'
            "#,
        )
        .bind(completion.status.as_str())
        .bind(completion.progress as i64)
        .bind(&completion.logs)
        .bind(completion.facts_added as i64)
        .bind(completion.facts_updated as i64)
        .bind(to_millis(completion.finished_at))
        .bind(job_id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            bail!("no running job with id {}", job_id);
        }
        Ok(())
    }

    async fn get_job(&self, job_id: &str) -> Result<Option<IngestJob>> {
        let row = sqlx::query(
            r#"
            SELECT id, brain_id, source_id, status, progress, logs, facts_added,
                   facts_updated, started_at, finished_at
            FROM ingest_jobs WHERE id = ?
            "#,
        )
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(job_from_row).transpose()
    }

    async fn list_facts(&self, brain_id: &str) -> Result<Vec<Fact>> {
        let rows = sqlx::query(
            r#"
            SELECT brain_id, key, value, source, confidence, last_verified_at
            FROM brain_facts WHERE brain_id = ? ORDER BY key
            "#,
        )
        .bind(brain_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(fact_from_row).collect()
    }

    async fn insert_fact(&self, fact: &Fact) -> Result<bool> {
        let now = to_millis(Utc::now());
        let result = sqlx::query(
            r#"
            INSERT INTO brain_facts (brain_id, key, value, source, confidence, last_verified_at, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(brain_id, key) DO UPDATE SET
                value = excluded.value,
                source = excluded.source,
                confidence = excluded.confidence,
                last_verified_at = excluded.last_verified_at
            WHERE excluded.confidence > brain_facts.confidence
            "#,
        )
        .bind(&fact.brain_id)
        .bind(&fact.key)
        .bind(&fact.value)
        .bind(&fact.source)
        .bind(fact.confidence)
        .bind(to_millis(fact.last_verified_at))
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn update_fact(&self, fact: &Fact) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE brain_facts
            SET value = ?, source = ?, confidence = ?, last_verified_at = ?
            WHERE brain_id = ? AND key = ? AND confidence < ?
            "#,
        )
        .bind(&fact.value)
        .bind(&fact.source)
        .bind(fact.confidence)
        .bind(to_millis(fact.last_verified_at))
        .bind(&fact.brain_id)
        .bind(&fact.key)
        .bind(fact.confidence)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
