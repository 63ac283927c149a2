//! Core data models used throughout brain-ingest.
//!
//! These types represent the sources, documents, facts, and jobs that flow
//! through the ingestion pipeline: discovery → extraction → fact extraction
//! → reconciliation → storage.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default cap on discovered pages when a source does not set `max_pages`.
pub const DEFAULT_MAX_PAGES: usize = 20;

/// Priority assigned to sitemap entries without a usable `<priority>`.
pub const DEFAULT_SITEMAP_PRIORITY: f64 = 0.5;

// ═══════════════════════════════════════════════════════════════════════
// Sources
// ═══════════════════════════════════════════════════════════════════════

/// The supported kinds of knowledge source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    /// A single page.
    Url,
    /// An XML sitemap (or sitemap index).
    Sitemap,
    /// A feed. Ingested as its root URL only.
    Feed,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Url => "url",
            SourceType::Sitemap => "sitemap",
            SourceType::Feed => "feed",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a stored source type is not one of `url`, `sitemap`, `feed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownSourceType(pub String);

impl fmt::Display for UnknownSourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unsupported source type: {}", self.0)
    }
}

impl std::error::Error for UnknownSourceType {}

impl FromStr for SourceType {
    type Err = UnknownSourceType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "url" => Ok(SourceType::Url),
            "sitemap" => Ok(SourceType::Sitemap),
            "feed" => Ok(SourceType::Feed),
            other => Err(UnknownSourceType(other.to_string())),
        }
    }
}

/// Per-source discovery configuration, stored as JSON alongside the source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceConfig {
    pub url: String,
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default)]
    pub max_pages: Option<usize>,
}

impl SourceConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// The configured page cap, or [`DEFAULT_MAX_PAGES`].
    pub fn page_cap(&self) -> usize {
        self.max_pages.unwrap_or(DEFAULT_MAX_PAGES)
    }
}

/// A knowledge source owned by one brain.
///
/// `source_type` is kept as the raw stored string: an unsupported value is a
/// configuration error surfaced when a job runs, not when the row is read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    pub id: String,
    pub brain_id: String,
    pub source_type: String,
    pub config: SourceConfig,
    pub last_ingested_at: Option<DateTime<Utc>>,
}

impl Source {
    pub fn new(brain_id: impl Into<String>, source_type: SourceType, config: SourceConfig) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            brain_id: brain_id.into(),
            source_type: source_type.as_str().to_string(),
            config,
            last_ingested_at: None,
        }
    }

    pub fn kind(&self) -> Result<SourceType, UnknownSourceType> {
        self.source_type.parse()
    }
}

/// One `<url>` element of an XML sitemap.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SitemapEntry {
    pub url: String,
    pub lastmod: Option<String>,
    pub changefreq: Option<String>,
    pub priority: f64,
}

// ═══════════════════════════════════════════════════════════════════════
// Documents
// ═══════════════════════════════════════════════════════════════════════

/// The `<meta>` fields the pipeline knows how to interpret.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MetaKey {
    OgSiteName,
    OgTitle,
    OgDescription,
    Description,
    Author,
    Keywords,
    PublishedTime,
    Other(String),
}

impl MetaKey {
    /// Classify a `<meta>` `name` or `property` attribute value.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "og:site_name" => MetaKey::OgSiteName,
            "og:title" => MetaKey::OgTitle,
            "og:description" => MetaKey::OgDescription,
            "description" => MetaKey::Description,
            "author" => MetaKey::Author,
            "keywords" => MetaKey::Keywords,
            "article:published_time" => MetaKey::PublishedTime,
            other => MetaKey::Other(other.to_string()),
        }
    }
}

/// Metadata collected from a page's `<meta>` tags.
///
/// Well-known fields are typed; everything else lands in `extra`, keyed by
/// the lowercased `name`/`property` value. The first occurrence of a field wins.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PageMetadata {
    pub site_name: Option<String>,
    pub og_title: Option<String>,
    pub og_description: Option<String>,
    pub description: Option<String>,
    pub author: Option<String>,
    pub keywords: Option<String>,
    pub published_time: Option<String>,
    pub extra: BTreeMap<String, String>,
}

impl PageMetadata {
    /// Record a `<meta>` name/content pair. Empty content is ignored.
    pub fn insert(&mut self, name: &str, content: &str) {
        let content = content.trim();
        if content.is_empty() || name.trim().is_empty() {
            return;
        }
        let slot = match MetaKey::from_name(name) {
            MetaKey::OgSiteName => &mut self.site_name,
            MetaKey::OgTitle => &mut self.og_title,
            MetaKey::OgDescription => &mut self.og_description,
            MetaKey::Description => &mut self.description,
            MetaKey::Author => &mut self.author,
            MetaKey::Keywords => &mut self.keywords,
            MetaKey::PublishedTime => &mut self.published_time,
            MetaKey::Other(key) => {
                self.extra.entry(key).or_insert_with(|| content.to_string());
                return;
            }
        };
        if slot.is_none() {
            *slot = Some(content.to_string());
        }
    }

    pub fn get(&self, key: &MetaKey) -> Option<&str> {
        match key {
            MetaKey::OgSiteName => self.site_name.as_deref(),
            MetaKey::OgTitle => self.og_title.as_deref(),
            MetaKey::OgDescription => self.og_description.as_deref(),
            MetaKey::Description => self.description.as_deref(),
            MetaKey::Author => self.author.as_deref(),
            MetaKey::Keywords => self.keywords.as_deref(),
            MetaKey::PublishedTime => self.published_time.as_deref(),
            MetaKey::Other(name) => self.extra.get(name).map(String::as_str),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.site_name.is_none()
            && self.og_title.is_none()
            && self.og_description.is_none()
            && self.description.is_none()
            && self.author.is_none()
            && self.keywords.is_none()
            && self.published_time.is_none()
            && self.extra.is_empty()
    }
}

/// Normalized content extracted from one fetched page.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Document {
    pub url: String,
    pub title: String,
    /// Cleaned HTML of the main content region.
    pub content: String,
    /// Plain text with whitespace collapsed.
    pub text_content: String,
    pub excerpt: String,
    pub byline: Option<String>,
    pub site_name: Option<String>,
    pub published_time: Option<String>,
    pub images: Vec<String>,
    pub links: Vec<String>,
    pub metadata: PageMetadata,
}

// ═══════════════════════════════════════════════════════════════════════
// Facts
// ═══════════════════════════════════════════════════════════════════════

/// A fact produced by extraction, not yet reconciled or persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactCandidate {
    pub key: String,
    pub value: String,
    pub confidence: f64,
    pub source: String,
}

impl FactCandidate {
    pub fn new(
        key: impl Into<String>,
        value: impl Into<String>,
        confidence: f64,
        source: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            confidence,
            source: source.into(),
        }
    }

    /// Stamp the candidate with its brain and verification time.
    pub fn into_fact(self, brain_id: &str, verified_at: DateTime<Utc>) -> Fact {
        Fact {
            brain_id: brain_id.to_string(),
            key: self.key,
            value: self.value,
            source: self.source,
            confidence: self.confidence,
            last_verified_at: verified_at,
        }
    }
}

/// A persisted fact. Unique per `(brain_id, key)`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Fact {
    pub brain_id: String,
    pub key: String,
    pub value: String,
    pub source: String,
    pub confidence: f64,
    pub last_verified_at: DateTime<Utc>,
}

// ═══════════════════════════════════════════════════════════════════════
// Jobs
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Running,
    Success,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Running => "running",
            JobStatus::Success => "success",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Running)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(JobStatus::Running),
            "success" => Ok(JobStatus::Success),
            "failed" => Ok(JobStatus::Failed),
            other => anyhow::bail!("Unknown job status: {}", other),
        }
    }
}

/// One execution of the pipeline against one source.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestJob {
    pub id: String,
    pub brain_id: String,
    pub source_id: String,
    pub status: JobStatus,
    pub progress: u8,
    pub logs: String,
    pub facts_added: u64,
    pub facts_updated: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl IngestJob {
    pub fn start(brain_id: &str, source_id: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            brain_id: brain_id.to_string(),
            source_id: source_id.to_string(),
            status: JobStatus::Running,
            progress: 0,
            logs: String::new(),
            facts_added: 0,
            facts_updated: 0,
            started_at: Utc::now(),
            finished_at: None,
        }
    }
}

/// Terminal state written when a job finishes.
#[derive(Debug, Clone)]
pub struct JobCompletion {
    pub status: JobStatus,
    pub progress: u8,
    pub logs: String,
    pub facts_added: u64,
    pub facts_updated: u64,
    pub finished_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_type_round_trips_known_values() {
        for t in [SourceType::Url, SourceType::Sitemap, SourceType::Feed] {
            assert_eq!(t.as_str().parse::<SourceType>().unwrap(), t);
        }
        let err = "rss".parse::<SourceType>().unwrap_err();
        assert_eq!(err.to_string(), "Unsupported source type: rss");
    }

    #[test]
    fn metadata_routes_known_fields_and_keeps_first() {
        let mut meta = PageMetadata::default();
        meta.insert("OG:Site_Name", "Acme");
        meta.insert("og:site_name", "Other");
        meta.insert("description", "  Widgets  ");
        meta.insert("viewport", "width=device-width");
        meta.insert("robots", "");

        assert_eq!(meta.get(&MetaKey::OgSiteName), Some("Acme"));
        assert_eq!(meta.get(&MetaKey::Description), Some("Widgets"));
        assert_eq!(
            meta.get(&MetaKey::Other("viewport".into())),
            Some("width=device-width")
        );
        assert!(!meta.extra.contains_key("robots"));
    }

    #[test]
    fn source_config_defaults_page_cap() {
        let cfg: SourceConfig = serde_json::from_str(r#"{"url":"https://a.test"}"#).unwrap();
        assert_eq!(cfg.page_cap(), DEFAULT_MAX_PAGES);
        let cfg: SourceConfig =
            serde_json::from_str(r#"{"url":"https://a.test","maxPages":3}"#).unwrap();
        assert_eq!(cfg.page_cap(), 3);
    }
}
