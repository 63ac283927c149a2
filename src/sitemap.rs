//! XML sitemap parsing and sitemap-index expansion.
//!
//! [`parse_sitemap_xml`] is a pure parser over `quick-xml` events. The
//! [`SitemapResolver`] fetches a sitemap and expands nested indexes
//! depth-first, keeping child order. Each sitemap URL is fetched at most
//! once per call and nesting deeper than `max_depth` is not followed.
//! A sitemap that cannot be fetched or parsed contributes no entries.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{Context, Result};
use quick_xml::events::Event;

use brain_ingest_core::models::{SitemapEntry, DEFAULT_SITEMAP_PRIORITY};

use crate::config::Config;
use crate::fetcher::{HttpFetcher, PageFetcher};

/// A parsed sitemap document.
#[derive(Debug, Clone, PartialEq)]
pub enum SitemapDocument {
    /// A `<urlset>` of page entries.
    UrlSet(Vec<SitemapEntry>),
    /// A `<sitemapindex>`: locations of child sitemaps.
    Index(Vec<String>),
}

#[derive(Clone, Copy, PartialEq)]
enum Field {
    Loc,
    Lastmod,
    Changefreq,
    Priority,
}

#[derive(Default)]
struct PendingEntry {
    loc: Option<String>,
    lastmod: Option<String>,
    changefreq: Option<String>,
    priority: Option<String>,
}

impl PendingEntry {
    fn set(&mut self, field: Field, value: String) {
        let slot = match field {
            Field::Loc => &mut self.loc,
            Field::Lastmod => &mut self.lastmod,
            Field::Changefreq => &mut self.changefreq,
            Field::Priority => &mut self.priority,
        };
        slot.get_or_insert_with(String::new).push_str(&value);
    }

    fn into_entry(self) -> Option<SitemapEntry> {
        let url = self.loc.map(|l| l.trim().to_string()).filter(|l| !l.is_empty())?;
        let priority = self
            .priority
            .and_then(|p| p.trim().parse::<f64>().ok())
            .filter(|p| p.is_finite())
            .unwrap_or(DEFAULT_SITEMAP_PRIORITY);
        Some(SitemapEntry {
            url,
            lastmod: self.lastmod.map(|v| v.trim().to_string()),
            changefreq: self.changefreq.map(|v| v.trim().to_string()),
            priority,
        })
    }
}

/// Parse a sitemap or sitemap index.
pub fn parse_sitemap_xml(xml: &str) -> Result<SitemapDocument> {
    let mut reader = quick_xml::Reader::from_reader(xml.as_bytes());
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    let mut is_index = false;
    let mut entries = Vec::new();
    let mut children = Vec::new();
    let mut current: Option<PendingEntry> = None;
    let mut field: Option<Field> = None;

    loop {
        match reader
            .read_event_into(&mut buf)
            .context("Malformed sitemap XML")?
        {
            Event::Start(e) => match e.local_name().as_ref() {
                b"sitemapindex" => is_index = true,
                b"url" | b"sitemap" => current = Some(PendingEntry::default()),
                b"loc" => field = Some(Field::Loc),
                b"lastmod" => field = Some(Field::Lastmod),
                b"changefreq" => field = Some(Field::Changefreq),
                b"priority" => field = Some(Field::Priority),
                _ => field = None,
            },
            Event::Text(te) => {
                if let (Some(entry), Some(f)) = (current.as_mut(), field) {
                    entry.set(f, te.unescape().unwrap_or_default().into_owned());
                }
            }
            Event::CData(cd) => {
                if let (Some(entry), Some(f)) = (current.as_mut(), field) {
                    entry.set(f, String::from_utf8_lossy(&cd.into_inner()).into_owned());
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"url" => {
                    if let Some(entry) = current.take().and_then(PendingEntry::into_entry) {
                        entries.push(entry);
                    }
                }
                b"sitemap" => {
                    if let Some(entry) = current.take().and_then(PendingEntry::into_entry) {
                        children.push(entry.url);
                    }
                }
                _ => field = None,
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if is_index || (!children.is_empty() && entries.is_empty()) {
        Ok(SitemapDocument::Index(children))
    } else {
        Ok(SitemapDocument::UrlSet(entries))
    }
}

pub struct SitemapResolver {
    fetcher: Arc<dyn PageFetcher>,
    max_depth: usize,
}

impl SitemapResolver {
    pub fn new(fetcher: Arc<dyn PageFetcher>, max_depth: usize) -> Self {
        Self { fetcher, max_depth }
    }

    /// All page entries reachable from `url`. Index documents contribute
    /// only their children's entries.
    pub async fn parse_sitemap(&self, url: &str) -> Vec<SitemapEntry> {
        let mut out = Vec::new();
        let mut visited: HashSet<String> = HashSet::new();
        let mut stack = vec![(url.to_string(), 0usize)];

        while let Some((sitemap_url, depth)) = stack.pop() {
            if !visited.insert(sitemap_url.clone()) {
                tracing::debug!(url = %sitemap_url, "sitemap already visited, skipping");
                continue;
            }

            let xml = match self.fetcher.fetch_xml(&sitemap_url).await {
                Ok(xml) => xml,
                Err(e) => {
                    tracing::warn!(url = %sitemap_url, error = %e, "failed to fetch sitemap");
                    continue;
                }
            };

            match parse_sitemap_xml(&xml) {
                Ok(SitemapDocument::UrlSet(entries)) => out.extend(entries),
                Ok(SitemapDocument::Index(children)) => {
                    if depth >= self.max_depth {
                        tracing::warn!(
                            url = %sitemap_url,
                            depth,
                            "sitemap index nested too deeply, not expanding"
                        );
                        continue;
                    }
                    stack.extend(children.into_iter().rev().map(|c| (c, depth + 1)));
                }
                Err(e) => {
                    tracing::warn!(url = %sitemap_url, error = %e, "failed to parse sitemap");
                }
            }
        }

        out
    }
}

/// CLI entry point for `brain sitemap`: print resolved entries, tab separated.
pub async fn run_sitemap(config: &Config, url: &str) -> Result<()> {
    let fetcher = HttpFetcher::new(&config.fetch)?;
    let resolver = SitemapResolver::new(Arc::new(fetcher), config.discovery.max_sitemap_depth);
    let entries = resolver.parse_sitemap(url).await;
    for entry in &entries {
        println!(
            "{}\t{}\t{}\t{:.1}",
            entry.url,
            entry.lastmod.as_deref().unwrap_or("-"),
            entry.changefreq.as_deref().unwrap_or("-"),
            entry.priority
        );
    }
    eprintln!("{} entries", entries.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_urlset_with_defaults() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url><loc>https://a.test/</loc><lastmod>2024-01-01</lastmod><changefreq>daily</changefreq><priority>0.9</priority></url>
  <url><loc> https://a.test/about </loc><priority>high</priority></url>
  <url><loc><![CDATA[https://a.test/q?a=1&b=2]]></loc></url>
  <url><lastmod>2024-01-01</lastmod></url>
</urlset>"#;
        let SitemapDocument::UrlSet(entries) = parse_sitemap_xml(xml).unwrap() else {
            panic!("expected urlset");
        };
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].lastmod.as_deref(), Some("2024-01-01"));
        assert_eq!(entries[0].changefreq.as_deref(), Some("daily"));
        assert_eq!(entries[0].priority, 0.9);
        assert_eq!(entries[1].url, "https://a.test/about");
        assert_eq!(entries[1].priority, DEFAULT_SITEMAP_PRIORITY);
        assert_eq!(entries[2].url, "https://a.test/q?a=1&b=2");
    }

    #[test]
    fn parses_index() {
        let xml = r#"<sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <sitemap><loc>https://a.test/s1.xml</loc></sitemap>
  <sitemap><loc>https://a.test/s2.xml</loc><lastmod>2024-02-02</lastmod></sitemap>
</sitemapindex>"#;
        assert_eq!(
            parse_sitemap_xml(xml).unwrap(),
            SitemapDocument::Index(vec![
                "https://a.test/s1.xml".to_string(),
                "https://a.test/s2.xml".to_string()
            ])
        );
    }

    #[test]
    fn escaped_text_is_unescaped() {
        let xml = "<urlset><url><loc>https://a.test/?x=1&amp;y=2</loc></url></urlset>";
        let SitemapDocument::UrlSet(entries) = parse_sitemap_xml(xml).unwrap() else {
            panic!("expected urlset");
        };
        assert_eq!(entries[0].url, "https://a.test/?x=1&y=2");
    }

    #[test]
    fn malformed_xml_is_an_error() {
        assert!(parse_sitemap_xml("<urlset><url><loc>x</url>").is_err());
    }
}
