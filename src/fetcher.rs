//! HTTP fetching for pages and sitemaps.
//!
//! [`HttpFetcher`] is the production implementation of [`PageFetcher`]. It
//! sends an identifying user agent, follows a bounded number of redirects
//! and bounds every request by the configured timeout. There are no retries
//! here; the pipeline skips URLs that fail.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use thiserror::Error;

use crate::config::FetchConfig;

const HTML_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const XML_ACCEPT: &str = "application/xml,text/xml;q=0.9,*/*;q=0.8";

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP {0}")]
    Status(u16),
    #[error("Invalid content type: {0}")]
    InvalidContentType(String),
    #[error("Timeout after {0:?}")]
    Timeout(Duration),
}

/// Source of raw page and sitemap bodies.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch an HTML page. Non-HTML responses are rejected.
    async fn fetch_html(&self, url: &str) -> Result<String, FetchError>;

    /// Fetch an XML document. Any 2xx body is accepted.
    async fn fetch_xml(&self, url: &str) -> Result<String, FetchError>;
}

pub struct HttpFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout())
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()?;
        Ok(Self {
            client,
            timeout: config.timeout(),
        })
    }

    async fn get(&self, url: &str, accept: &str) -> Result<reqwest::Response, FetchError> {
        let response = self
            .client
            .get(url)
            .header(ACCEPT, accept)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        Ok(response)
    }

    fn classify(&self, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout(self.timeout)
        } else {
            FetchError::Http(err)
        }
    }
}

/// Whether a `Content-Type` header value denotes an HTML document.
pub fn is_html_content_type(value: &str) -> bool {
    let mime = value
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    mime == "text/html" || mime == "application/xhtml+xml"
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch_html(&self, url: &str) -> Result<String, FetchError> {
        let response = self.get(url, HTML_ACCEPT).await?;
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if !is_html_content_type(&content_type) {
            return Err(FetchError::InvalidContentType(content_type));
        }
        response.text().await.map_err(|e| self.classify(e))
    }

    async fn fetch_xml(&self, url: &str) -> Result<String, FetchError> {
        let response = self.get(url, XML_ACCEPT).await?;
        response.text().await.map_err(|e| self.classify(e))
    }
}
