//! `brain job` and `brain facts`: read back what ingestion stored.

use anyhow::{bail, Result};

use brain_ingest_core::store::BrainStore;

use crate::config::Config;
use crate::sqlite_store::SqliteStore;

pub async fn run_get_job(config: &Config, job_id: &str, json: bool) -> Result<()> {
    let store = SqliteStore::connect(config).await?;
    let job = store.get_job(job_id).await?;
    store.pool().close().await;

    let Some(job) = job else {
        bail!("job not found: {}", job_id);
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&job)?);
        return Ok(());
    }

    println!("--- Job ---");
    println!("id:            {}", job.id);
    println!("brain_id:      {}", job.brain_id);
    println!("source_id:     {}", job.source_id);
    println!("status:        {}", job.status);
    println!("progress:      {}%", job.progress);
    println!("facts_added:   {}", job.facts_added);
    println!("facts_updated: {}", job.facts_updated);
    println!("started_at:    {}", job.started_at.format("%Y-%m-%dT%H:%M:%SZ"));
    if let Some(finished) = job.finished_at {
        println!("finished_at:   {}", finished.format("%Y-%m-%dT%H:%M:%SZ"));
    }
    println!();
    println!("--- Logs ---");
    print!("{}", job.logs);
    Ok(())
}

pub async fn run_list_facts(config: &Config, brain_id: &str, json: bool) -> Result<()> {
    let store = SqliteStore::connect(config).await?;
    let facts = store.list_facts(brain_id).await?;
    store.pool().close().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&facts)?);
        return Ok(());
    }
    if facts.is_empty() {
        println!("No facts for brain {}.", brain_id);
        return Ok(());
    }

    println!("{:<24} {:>5}  {:<40} SOURCE", "KEY", "CONF", "VALUE");
    for fact in &facts {
        println!(
            "{:<24} {:>5.2}  {:<40} {}",
            fact.key,
            fact.confidence,
            truncate(&fact.value, 40),
            fact.source
        );
    }
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
        out.push('…');
        out
    }
}
