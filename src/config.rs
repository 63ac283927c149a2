//! TOML configuration parsing and validation.
//!
//! Every section and field has a default, so an empty file is a valid
//! configuration. See `config/brain.example.toml` for all settings.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub pacing: PacingConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./data/brain.sqlite")
}

#[derive(Debug, Deserialize, Clone)]
pub struct FetchConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_fetch_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_secs: default_fetch_timeout_secs(),
            max_redirects: default_max_redirects(),
        }
    }
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_user_agent() -> String {
    format!(
        "Mozilla/5.0 (compatible; BrainIngestBot/{}; +https://github.com/brain-ingest)",
        env!("CARGO_PKG_VERSION")
    )
}
fn default_fetch_timeout_secs() -> u64 {
    15
}
fn default_max_redirects() -> usize {
    10
}

/// Fixed delays between outbound calls.
#[derive(Debug, Deserialize, Clone)]
pub struct PacingConfig {
    /// Delay between page fetches during a job.
    #[serde(default = "default_page_delay_ms")]
    pub page_delay_ms: u64,
    /// Delay between LLM extraction calls.
    #[serde(default = "default_llm_delay_ms")]
    pub llm_delay_ms: u64,
    /// Delay after each page during a link-following crawl.
    #[serde(default = "default_crawl_delay_ms")]
    pub crawl_delay_ms: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            page_delay_ms: default_page_delay_ms(),
            llm_delay_ms: default_llm_delay_ms(),
            crawl_delay_ms: default_crawl_delay_ms(),
        }
    }
}

fn default_page_delay_ms() -> u64 {
    500
}
fn default_llm_delay_ms() -> u64 {
    1500
}
fn default_crawl_delay_ms() -> u64 {
    1000
}

#[derive(Debug, Deserialize, Clone)]
pub struct DiscoveryConfig {
    #[serde(default = "default_max_crawl_visits")]
    pub max_crawl_visits: usize,
    #[serde(default = "default_max_sitemap_depth")]
    pub max_sitemap_depth: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            max_crawl_visits: default_max_crawl_visits(),
            max_sitemap_depth: default_max_sitemap_depth(),
        }
    }
}

fn default_max_crawl_visits() -> usize {
    100
}
fn default_max_sitemap_depth() -> usize {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExtractionConfig {
    /// Minimum text length for a scored region to count as the article.
    #[serde(default = "default_min_article_chars")]
    pub min_article_chars: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            min_article_chars: default_min_article_chars(),
        }
    }
}

fn default_min_article_chars() -> usize {
    100
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_llm_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_llm_max_retries")]
    pub max_retries: u32,
    /// Page text beyond this many characters is not sent to the model.
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            model: None,
            base_url: default_llm_base_url(),
            timeout_secs: default_llm_timeout_secs(),
            max_retries: default_llm_max_retries(),
            max_input_chars: default_max_input_chars(),
        }
    }
}

impl LlmConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_llm_provider() -> String {
    "disabled".to_string()
}
fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_llm_timeout_secs() -> u64 {
    60
}
fn default_llm_max_retries() -> u32 {
    2
}
fn default_max_input_chars() -> usize {
    8000
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7340".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.fetch.timeout_secs == 0 {
        anyhow::bail!("fetch.timeout_secs must be > 0");
    }
    if config.fetch.user_agent.trim().is_empty() {
        anyhow::bail!("fetch.user_agent must not be empty");
    }
    if config.discovery.max_crawl_visits == 0 {
        anyhow::bail!("discovery.max_crawl_visits must be > 0");
    }
    if config.llm.timeout_secs == 0 {
        anyhow::bail!("llm.timeout_secs must be > 0");
    }

    match config.llm.provider.as_str() {
        "disabled" => {}
        "openai" => {
            if config.llm.model.is_none() {
                anyhow::bail!("llm.model must be specified when provider is 'openai'");
            }
        }
        other => anyhow::bail!(
            "Unknown llm provider: '{}'. Must be disabled or openai.",
            other
        ),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        validate(&config).unwrap();
        assert_eq!(config.pacing.page_delay_ms, 500);
        assert_eq!(config.pacing.llm_delay_ms, 1500);
        assert_eq!(config.discovery.max_crawl_visits, 100);
        assert_eq!(config.discovery.max_sitemap_depth, 3);
        assert!(!config.llm.is_enabled());
    }

    #[test]
    fn openai_requires_model() {
        let config: Config = toml::from_str("[llm]\nprovider = \"openai\"\n").unwrap();
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("llm.model"));
    }

    #[test]
    fn example_config_is_valid() {
        let config: Config = toml::from_str(include_str!("../config/brain.example.toml")).unwrap();
        validate(&config).unwrap();
        assert_eq!(config.server.bind, "127.0.0.1:7340");
    }

    #[test]
    fn unknown_provider_rejected() {
        let config: Config = toml::from_str("[llm]\nprovider = \"magic\"\n").unwrap();
        assert!(validate(&config).is_err());
    }
}
