//! `brain source add` and `brain source list`.

use anyhow::{Context, Result};

use brain_ingest_core::models::{Source, SourceConfig, SourceType};
use brain_ingest_core::store::BrainStore;

use crate::config::Config;
use crate::sqlite_store::SqliteStore;

/// Register a new source for a brain and print its id.
pub async fn run_source_add(
    config: &Config,
    brain_id: &str,
    source_type: &str,
    url: &str,
    include: Vec<String>,
    exclude: Vec<String>,
    max_pages: Option<usize>,
) -> Result<()> {
    let kind: SourceType = source_type.parse()?;
    url::Url::parse(url).with_context(|| format!("Invalid source URL: {}", url))?;

    let source_config = SourceConfig {
        url: url.to_string(),
        include,
        exclude,
        max_pages,
    };
    let source = Source::new(brain_id, kind, source_config);

    let store = SqliteStore::connect(config).await?;
    store.put_source(&source).await?;
    store.pool().close().await;

    println!("{}", source.id);
    Ok(())
}

pub async fn run_source_list(config: &Config, brain_id: &str) -> Result<()> {
    let store = SqliteStore::connect(config).await?;
    let sources = store.list_sources(brain_id).await?;
    store.pool().close().await;

    if sources.is_empty() {
        println!("No sources for brain {}.", brain_id);
        return Ok(());
    }

    println!("{:<38} {:<8} {:<21} URL", "ID", "TYPE", "LAST INGESTED");
    for source in &sources {
        let last = source
            .last_ingested_at
            .map(|t| t.format("%Y-%m-%dT%H:%M:%SZ").to_string())
            .unwrap_or_else(|| "never".to_string());
        println!(
            "{:<38} {:<8} {:<21} {}",
            source.id, source.source_type, last, source.config.url
        );
        if !source.config.include.is_empty() {
            println!("{:<38} include: {}", "", source.config.include.join(", "));
        }
        if !source.config.exclude.is_empty() {
            println!("{:<38} exclude: {}", "", source.config.exclude.join(", "));
        }
    }
    Ok(())
}
