//! URL discovery for a knowledge source.
//!
//! [`UrlDiscoverer::discover`] turns a source into its bounded candidate
//! URL list. [`Crawler::discover_urls`] walks same-host links breadth-first
//! from a base URL and is exposed through `brain crawl`.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use url::Url;

use brain_ingest_core::filter::filter_for_source;
use brain_ingest_core::models::{Source, SourceType};

use crate::config::Config;
use crate::error::IngestError;
use crate::extract::extract_links;
use crate::fetcher::{HttpFetcher, PageFetcher};
use crate::pacing::Pacer;
use crate::sitemap::SitemapResolver;

pub struct UrlDiscoverer {
    sitemaps: SitemapResolver,
}

impl UrlDiscoverer {
    pub fn new(fetcher: Arc<dyn PageFetcher>, config: &Config) -> Self {
        Self {
            sitemaps: SitemapResolver::new(fetcher, config.discovery.max_sitemap_depth),
        }
    }

    /// Candidate page URLs for `source`, filtered and capped by its config.
    pub async fn discover(&self, source: &Source) -> Result<Vec<String>, IngestError> {
        let urls = match source.kind()? {
            SourceType::Url | SourceType::Feed => vec![source.config.url.clone()],
            SourceType::Sitemap => self
                .sitemaps
                .parse_sitemap(&source.config.url)
                .await
                .into_iter()
                .map(|entry| entry.url)
                .collect(),
        };
        let found = urls.len();
        let urls = filter_for_source(urls, &source.config);
        tracing::info!(
            source_id = %source.id,
            found,
            kept = urls.len(),
            "discovered urls"
        );
        Ok(urls)
    }
}

/// Breadth-first, same-host link crawler.
pub struct Crawler {
    fetcher: Arc<dyn PageFetcher>,
    pacer: Pacer,
    max_visits: usize,
}

impl Crawler {
    pub fn new(fetcher: Arc<dyn PageFetcher>, config: &Config) -> Self {
        Self {
            fetcher,
            pacer: Pacer::from_millis(config.pacing.crawl_delay_ms),
            max_visits: config.discovery.max_crawl_visits,
        }
    }

    /// Every URL discovered from `base_url`, in discovery order.
    ///
    /// Pages at `max_depth` are fetched but their links are not followed.
    /// The walk stops after `max_visits` fetches. The result is not capped.
    pub async fn discover_urls(&self, base_url: &str, max_depth: usize) -> Vec<String> {
        let Some(host) = Url::parse(base_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
        else {
            tracing::warn!(url = base_url, "crawl base is not a valid URL");
            return Vec::new();
        };

        let mut discovered = vec![base_url.to_string()];
        let mut seen: HashSet<String> = HashSet::from([base_url.to_string()]);
        let mut visited: HashSet<String> = HashSet::new();
        let mut queue = VecDeque::from([(base_url.to_string(), 0usize)]);

        while let Some((url, depth)) = queue.pop_front() {
            if visited.len() >= self.max_visits {
                tracing::debug!(visits = visited.len(), "crawl visit limit reached");
                break;
            }
            if depth > max_depth || !visited.insert(url.clone()) {
                continue;
            }

            self.pacer.wait().await;
            let html = match self.fetcher.fetch_html(&url).await {
                Ok(html) => html,
                Err(e) => {
                    tracing::warn!(url = %url, error = %e, "crawl fetch failed");
                    continue;
                }
            };

            if depth == max_depth {
                continue;
            }
            for link in extract_links(&html, &url) {
                if !same_host(&link, &host) {
                    continue;
                }
                let link = strip_fragment(&link);
                if seen.insert(link.clone()) {
                    discovered.push(link.clone());
                    queue.push_back((link, depth + 1));
                }
            }
        }

        discovered
    }
}

/// CLI entry point for `brain crawl`: print every discovered URL.
pub async fn run_crawl(config: &Config, url: &str, depth: usize) -> anyhow::Result<()> {
    let fetcher = HttpFetcher::new(&config.fetch)?;
    let crawler = Crawler::new(Arc::new(fetcher), config);
    let urls = crawler.discover_urls(url, depth).await;
    for url in &urls {
        println!("{}", url);
    }
    eprintln!("{} URLs discovered", urls.len());
    Ok(())
}

fn same_host(link: &str, host: &str) -> bool {
    Url::parse(link)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.eq_ignore_ascii_case(host)))
        .unwrap_or(false)
}

fn strip_fragment(link: &str) -> String {
    match Url::parse(link) {
        Ok(mut url) => {
            url.set_fragment(None);
            url.to_string()
        }
        Err(_) => link.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_matching_ignores_case_and_scheme() {
        assert!(same_host("http://A.test/x", "a.test"));
        assert!(!same_host("https://b.test/x", "a.test"));
        assert!(!same_host("mailto:x@a.test", "a.test"));
    }

    #[test]
    fn fragments_are_stripped() {
        assert_eq!(strip_fragment("https://a.test/p#s"), "https://a.test/p");
    }
}
