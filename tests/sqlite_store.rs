//! `SqliteStore` against a real database file in a temp directory.

mod common;

use std::sync::Arc;

use chrono::{Duration, Utc};
use tempfile::TempDir;

use brain_ingest::core::models::{
    Fact, IngestJob, JobCompletion, JobStatus, Source, SourceConfig, SourceType,
};
use brain_ingest::core::store::BrainStore;
use brain_ingest::db::connect_path;
use brain_ingest::ingest::IngestPipeline;
use brain_ingest::llm::DisabledExtractor;
use brain_ingest::migrate::migrate_pool;
use brain_ingest::sqlite_store::SqliteStore;

use common::{page, test_config, StubFetcher};

async fn open_store(tmp: &TempDir) -> SqliteStore {
    let pool = connect_path(&tmp.path().join("data/brain.sqlite"))
        .await
        .unwrap();
    migrate_pool(&pool).await.unwrap();
    SqliteStore::new(pool)
}

fn fact(key: &str, value: &str, confidence: f64) -> Fact {
    Fact {
        brain_id: "b1".to_string(),
        key: key.to_string(),
        value: value.to_string(),
        source: "https://acme.test/".to_string(),
        confidence,
        last_verified_at: Utc::now(),
    }
}

#[tokio::test]
async fn migrations_are_idempotent() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;
    migrate_pool(store.pool()).await.unwrap();
    assert!(store.list_facts("b1").await.unwrap().is_empty());
}

#[tokio::test]
async fn source_round_trips_with_config() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;
    let source = Source::new(
        "b1",
        SourceType::Sitemap,
        SourceConfig {
            url: "https://acme.test/sitemap.xml".to_string(),
            include: vec!["/blog/".to_string()],
            exclude: vec!["draft".to_string()],
            max_pages: Some(5),
        },
    );
    store.put_source(&source).await.unwrap();

    let loaded = store.get_source(&source.id).await.unwrap().unwrap();
    assert_eq!(loaded.source_type, "sitemap");
    assert_eq!(loaded.config, source.config);
    assert!(loaded.last_ingested_at.is_none());

    let at = Utc::now();
    store.mark_source_ingested(&source.id, at).await.unwrap();
    let loaded = store.get_source(&source.id).await.unwrap().unwrap();
    assert_eq!(
        loaded.last_ingested_at.map(|t| t.timestamp_millis()),
        Some(at.timestamp_millis())
    );

    assert_eq!(store.list_sources("b1").await.unwrap().len(), 1);
    assert!(store.list_sources("b2").await.unwrap().is_empty());
    assert!(store.get_source("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn fact_writes_never_lower_confidence() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;

    assert!(store.insert_fact(&fact("Email", "a@acme.test", 0.8)).await.unwrap());
    assert!(!store.insert_fact(&fact("Email", "b@acme.test", 0.5)).await.unwrap());
    assert!(!store.update_fact(&fact("Email", "c@acme.test", 0.8)).await.unwrap());

    let facts = store.list_facts("b1").await.unwrap();
    assert_eq!(facts.len(), 1);
    assert_eq!(facts[0].value, "a@acme.test");

    assert!(store.update_fact(&fact("Email", "d@acme.test", 0.9)).await.unwrap());
    assert!(store.insert_fact(&fact("Email", "e@acme.test", 0.95)).await.unwrap());
    let facts = store.list_facts("b1").await.unwrap();
    assert_eq!(facts.len(), 1);
    assert_eq!(facts[0].value, "e@acme.test");
    assert_eq!(facts[0].confidence, 0.95);
}

#[tokio::test]
async fn facts_are_scoped_by_brain_and_sorted_by_key() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;
    store.insert_fact(&fact("Phone", "555", 0.6)).await.unwrap();
    store.insert_fact(&fact("Email", "a@acme.test", 0.6)).await.unwrap();
    let mut other = fact("Email", "x@other.test", 0.6);
    other.brain_id = "b2".to_string();
    store.insert_fact(&other).await.unwrap();

    let keys: Vec<String> = store
        .list_facts("b1")
        .await
        .unwrap()
        .into_iter()
        .map(|f| f.key)
        .collect();
    assert_eq!(keys, vec!["Email", "Phone"]);
    assert_eq!(store.list_facts("b2").await.unwrap().len(), 1);
}

#[tokio::test]
async fn finished_jobs_are_immutable() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;
    let job = IngestJob::start("b1", "s1");
    store.create_job(&job).await.unwrap();
    store.update_job_progress(&job.id, 40, "half way\n").await.unwrap();

    let loaded = store.get_job(&job.id).await.unwrap().unwrap();
    assert_eq!(loaded.status, JobStatus::Running);
    assert_eq!(loaded.progress, 40);
    assert_eq!(loaded.logs, "half way\n");

    let completion = JobCompletion {
        status: JobStatus::Success,
        progress: 100,
        logs: "done\n".to_string(),
        facts_added: 3,
        facts_updated: 1,
        finished_at: job.started_at + Duration::seconds(5),
    };
    store.finish_job(&job.id, &completion).await.unwrap();
    assert!(store.finish_job(&job.id, &completion).await.is_err());
    assert!(store.update_job_progress(&job.id, 50, "late\n").await.is_err());

    let loaded = store.get_job(&job.id).await.unwrap().unwrap();
    assert_eq!(loaded.status, JobStatus::Success);
    assert_eq!(loaded.progress, 100);
    assert_eq!(loaded.facts_added, 3);
    assert_eq!(loaded.facts_updated, 1);
    assert!(loaded.finished_at.unwrap() >= loaded.started_at);
}

#[tokio::test]
async fn pipeline_runs_against_sqlite() {
    let tmp = TempDir::new().unwrap();
    let store = Arc::new(open_store(&tmp).await);
    let source = Source::new("b1", SourceType::Url, SourceConfig::new("https://acme.test/"));
    store.put_source(&source).await.unwrap();
    let fetcher = StubFetcher::new().page(
        "https://acme.test/",
        page("Acme", "Acme makes widgets", "<p>Call (555) 123-4567 today.</p>"),
    );
    let pipeline = IngestPipeline::new(
        &test_config(),
        store.clone(),
        Arc::new(fetcher),
        Arc::new(DisabledExtractor),
    );

    let first = pipeline.run("b1", &source.id).await.unwrap();
    assert_eq!(first.status, JobStatus::Success);
    assert!(first.facts_added >= 3);

    let second = pipeline.run("b1", &source.id).await.unwrap();
    assert_eq!(second.facts_added, 0);
    assert_eq!(second.facts_updated, 0);

    let job = store.get_job(&second.job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Success);
    assert_eq!(job.progress, 100);
}
