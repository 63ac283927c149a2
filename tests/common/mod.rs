//! Shared fixtures for integration tests: a scripted fetcher and LLM.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;

use brain_ingest::config::Config;
use brain_ingest::fetcher::{FetchError, PageFetcher};
use brain_ingest::llm::LlmExtractor;
use brain_ingest::core::models::{Document, FactCandidate};

/// Serves canned HTML and XML bodies. Unknown URLs answer 404.
#[derive(Default)]
pub struct StubFetcher {
    pages: HashMap<String, String>,
    xml: HashMap<String, String>,
    requests: Mutex<Vec<String>>,
}

impl StubFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, html: impl Into<String>) -> Self {
        self.pages.insert(url.to_string(), html.into());
        self
    }

    pub fn xml(mut self, url: &str, body: impl Into<String>) -> Self {
        self.xml.insert(url.to_string(), body.into());
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageFetcher for StubFetcher {
    async fn fetch_html(&self, url: &str) -> Result<String, FetchError> {
        self.requests.lock().unwrap().push(url.to_string());
        self.pages.get(url).cloned().ok_or(FetchError::Status(404))
    }

    async fn fetch_xml(&self, url: &str) -> Result<String, FetchError> {
        self.requests.lock().unwrap().push(url.to_string());
        self.xml.get(url).cloned().ok_or(FetchError::Status(404))
    }
}

/// Returns the same facts for every document, sourced from the document URL.
pub struct StaticLlm(pub Vec<(&'static str, &'static str, f64)>);

#[async_trait]
impl LlmExtractor for StaticLlm {
    async fn extract_facts(&self, document: &Document) -> Result<Vec<FactCandidate>> {
        Ok(self
            .0
            .iter()
            .map(|(k, v, c)| FactCandidate::new(*k, *v, *c, document.url.clone()))
            .collect())
    }
}

/// Defaults with every pacing delay disabled.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.pacing.page_delay_ms = 0;
    config.pacing.llm_delay_ms = 0;
    config.pacing.crawl_delay_ms = 0;
    config
}

/// A small page with a description meta tag and a `<main>` body.
pub fn page(title: &str, description: &str, body: &str) -> String {
    format!(
        r#"<!doctype html><html><head><title>{}</title>
<meta name="description" content="{}"></head>
<body><main>{}</main></body></html>"#,
        title, description, body
    )
}

pub fn urlset(urls: &[String]) -> String {
    let entries: String = urls
        .iter()
        .map(|u| format!("<url><loc>{}</loc></url>", u))
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">{}</urlset>"#,
        entries
    )
}

pub fn sitemap_index(children: &[&str]) -> String {
    let entries: String = children
        .iter()
        .map(|u| format!("<sitemap><loc>{}</loc></sitemap>", u))
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">{}</sitemapindex>"#,
        entries
    )
}
