//! HTML to [`Document`] extraction.
//!
//! The primary path runs Mozilla's readability algorithm (the `readability`
//! crate) and accepts its product as the article when it carries at least
//! `min_article_chars` of text. Title, byline, metadata, images and links
//! always come from a `scraper` pass over the full page.
//!
//! When readability fails or finds too little, the first structural content
//! region (`main`, `article`, `[role=main]`, `.content`, `#content`, else
//! `body`) is used as-is and images/links are left empty.
//!
//! Extraction never fails loudly: bad input yields `None`.

use std::collections::HashSet;
use std::io::Cursor;

use scraper::{ElementRef, Html, Selector};
use url::Url;

use brain_ingest_core::models::{Document, MetaKey, PageMetadata};

use crate::config::ExtractionConfig;

pub const MAX_IMAGES: usize = 20;
pub const MAX_LINKS: usize = 100;
pub const EXCERPT_CHARS: usize = 200;

const FALLBACK_SELECTORS: &[&str] = &["main", "article", "[role=main]", ".content", "#content"];
const BYLINE_SELECTORS: &[&str] = &["[rel=author]", "[itemprop=author]", ".byline", ".author"];
const SKIPPED_TAGS: &[&str] = &["script", "style", "noscript", "template", "svg"];

/// Main content found by readability.
struct Article {
    content: String,
    text: String,
}

pub struct ContentExtractor {
    min_article_chars: usize,
}

impl Default for ContentExtractor {
    fn default() -> Self {
        Self::new(&ExtractionConfig::default())
    }
}

impl ContentExtractor {
    pub fn new(config: &ExtractionConfig) -> Self {
        Self {
            min_article_chars: config.min_article_chars,
        }
    }

    /// Extract a normalized document from raw HTML fetched from `url`.
    pub fn extract_content(&self, html: &str, url: &str) -> Option<Document> {
        let base = Url::parse(url).ok()?;
        if html.trim().is_empty() {
            return None;
        }
        let document = Html::parse_document(html);

        let metadata = collect_metadata(&document);
        let title = extract_title(&document, &metadata);
        let byline = extract_byline(&document, &metadata);
        let description = metadata
            .get(&MetaKey::OgDescription)
            .or_else(|| metadata.get(&MetaKey::Description))
            .map(str::to_string);

        if let Some(article) = self.read_article(html, &base) {
            tracing::debug!(url, chars = article.text.len(), "readability article accepted");
            let excerpt = description.unwrap_or_else(|| truncate_chars(&article.text, EXCERPT_CHARS));
            return Some(Document {
                url: url.to_string(),
                title,
                content: article.content,
                excerpt,
                byline,
                site_name: metadata.site_name.clone(),
                published_time: metadata.published_time.clone(),
                images: extract_images(&document, &base),
                links: extract_links_from(&document, &base),
                text_content: article.text,
                metadata,
            });
        }

        let region = fallback_region(&document)?;
        let text_content = element_text(region);
        tracing::debug!(url, chars = text_content.len(), "using structural fallback");
        Some(Document {
            url: url.to_string(),
            title,
            content: region.html(),
            excerpt: truncate_chars(&text_content, EXCERPT_CHARS),
            byline,
            site_name: metadata.site_name.clone(),
            published_time: metadata.published_time.clone(),
            images: Vec::new(),
            links: Vec::new(),
            text_content,
            metadata,
        })
    }

    fn read_article(&self, html: &str, base: &Url) -> Option<Article> {
        let mut cursor = Cursor::new(html.as_bytes());
        let Ok(product) = readability::extractor::extract(&mut cursor, base) else {
            tracing::debug!(url = %base, "readability found no article");
            return None;
        };
        let text = collapse_whitespace(&product.text);
        if text.chars().count() < self.min_article_chars {
            return None;
        }
        Some(Article {
            content: product.content,
            text,
        })
    }
}

fn fallback_region(document: &Html) -> Option<ElementRef<'_>> {
    FALLBACK_SELECTORS
        .iter()
        .chain(std::iter::once(&"body"))
        .filter_map(|css| Selector::parse(css).ok())
        .find_map(|selector| document.select(&selector).next())
}

fn push_text(el: ElementRef<'_>, out: &mut String) {
    for child in el.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
            out.push(' ');
        } else if let Some(child_el) = ElementRef::wrap(child) {
            if !SKIPPED_TAGS.contains(&child_el.value().name()) {
                push_text(child_el, out);
            }
        }
    }
}

/// Visible text of an element with whitespace collapsed.
pub fn element_text(el: ElementRef<'_>) -> String {
    let mut raw = String::new();
    push_text(el, &mut raw);
    collapse_whitespace(&raw)
}

pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

fn collect_metadata(document: &Html) -> PageMetadata {
    let mut metadata = PageMetadata::default();
    let Ok(selector) = Selector::parse("meta[content]") else {
        return metadata;
    };
    for meta in document.select(&selector) {
        let value = meta.value();
        let name = value.attr("property").or_else(|| value.attr("name"));
        if let (Some(name), Some(content)) = (name, value.attr("content")) {
            metadata.insert(name, content);
        }
    }
    metadata
}

fn first_text(document: &Html, css: &str) -> Option<String> {
    let selector = Selector::parse(css).ok()?;
    document
        .select(&selector)
        .map(element_text)
        .find(|t| !t.is_empty())
}

fn extract_title(document: &Html, metadata: &PageMetadata) -> String {
    metadata
        .get(&MetaKey::OgTitle)
        .map(str::to_string)
        .or_else(|| first_text(document, "title"))
        .or_else(|| first_text(document, "h1"))
        .unwrap_or_default()
}

fn extract_byline(document: &Html, metadata: &PageMetadata) -> Option<String> {
    metadata
        .get(&MetaKey::Author)
        .map(str::to_string)
        .or_else(|| BYLINE_SELECTORS.iter().find_map(|css| first_text(document, css)))
}

fn resolve(base: &Url, href: &str) -> Option<String> {
    let joined = base.join(href.trim()).ok()?;
    matches!(joined.scheme(), "http" | "https").then(|| joined.to_string())
}

fn extract_images(document: &Html, base: &Url) -> Vec<String> {
    let Ok(selector) = Selector::parse("img[src]") else {
        return Vec::new();
    };
    let mut seen = HashSet::new();
    document
        .select(&selector)
        .filter_map(|img| img.value().attr("src"))
        .filter_map(|src| resolve(base, src))
        .filter(|src| seen.insert(src.clone()))
        .take(MAX_IMAGES)
        .collect()
}

fn extract_links_from(document: &Html, base: &Url) -> Vec<String> {
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };
    let mut seen = HashSet::new();
    document
        .select(&selector)
        .filter_map(|a| a.value().attr("href"))
        .map(str::trim)
        .filter(|href| !href.is_empty() && !href.starts_with('#'))
        .filter(|href| !href.to_ascii_lowercase().starts_with("javascript:"))
        .filter_map(|href| resolve(base, href))
        .filter(|link| seen.insert(link.clone()))
        .take(MAX_LINKS)
        .collect()
}

/// Absolute outbound links of a page, in document order. Used by the crawler,
/// which needs links even when no article is found.
pub fn extract_links(html: &str, base_url: &str) -> Vec<String> {
    let Ok(base) = Url::parse(base_url) else {
        return Vec::new();
    };
    let document = Html::parse_document(html);
    extract_links_from(&document, &base)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARTICLE: &str = r##"<!doctype html>
<html><head>
  <title>Acme Widgets | Home</title>
  <meta property="og:site_name" content="Acme">
  <meta name="description" content="Acme makes widgets for everyone.">
  <meta name="author" content="Jane Roe">
</head><body>
  <nav class="menu"><a href="/a">A</a> <a href="/b">B</a> <a href="/c">C</a></nav>
  <div id="sidebar"><p>Subscribe to our newsletter, follow us, share, like, and so on forever.</p></div>
  <div class="post-body">
    <p>Acme has been building widgets since 1999, serving customers in forty countries, with care.</p>
    <p>Our widgets are assembled by hand, tested twice, and shipped in recycled packaging to you.</p>
    <p>Reach the team at hello@acme.test or (555) 123-4567 for wholesale orders and support.</p>
    <img src="/img/widget.png">
    <a href="/contact">Contact</a> <a href="#top">Top</a> <a href="javascript:void(0)">x</a>
  </div>
</body></html>"##;

    #[test]
    fn readability_selects_the_article_region() {
        let doc = ContentExtractor::default()
            .extract_content(ARTICLE, "https://acme.test/about")
            .unwrap();
        assert_eq!(doc.title, "Acme Widgets | Home");
        assert!(doc.text_content.starts_with("Acme has been building widgets"));
        assert!(!doc.text_content.contains("newsletter"));
        assert!(doc.content.contains("recycled packaging"));
        assert_eq!(doc.excerpt, "Acme makes widgets for everyone.");
        assert_eq!(doc.byline.as_deref(), Some("Jane Roe"));
        assert_eq!(doc.site_name.as_deref(), Some("Acme"));
        assert_eq!(doc.images, vec!["https://acme.test/img/widget.png"]);
        assert!(doc.links.contains(&"https://acme.test/contact".to_string()));
        assert!(doc.links.iter().all(|l| !l.contains("javascript") && !l.ends_with("#top")));
    }

    #[test]
    fn equally_scored_regions_extract_the_same_way_every_time() {
        let para = |word: &str| {
            format!(
                "<div><p>{} {}</p></div>",
                word,
                "The quick brown fox jumps over the lazy dog, again and again, until dusk falls on the hill."
            )
        };
        let html = format!(
            "<html><body>{}{}</body></html>",
            para("alpha"),
            para("bravo")
        );
        let extractor = ContentExtractor::default();
        let first = extractor
            .extract_content(&html, "https://a.test/")
            .unwrap()
            .text_content;
        for _ in 0..20 {
            let doc = extractor.extract_content(&html, "https://a.test/").unwrap();
            assert_eq!(doc.text_content, first);
        }
    }

    #[test]
    fn bare_main_page_uses_fallback() {
        let html = "<html><body><nav>Menu</nav><main>Hello   world\n\n  from <b>main</b></main>\
                    <img src=\"/x.png\"><a href=\"/y\">y</a></body></html>";
        let doc = ContentExtractor::default()
            .extract_content(html, "https://a.test/")
            .unwrap();
        assert_eq!(doc.text_content, "Hello world from main");
        assert_eq!(doc.excerpt, "Hello world from main");
        assert!(doc.images.is_empty());
        assert!(doc.links.is_empty());
    }

    #[test]
    fn fallback_excerpt_is_truncated() {
        let body = "word ".repeat(100);
        let html = format!("<html><body><div>{}</div></body></html>", body);
        let doc = ContentExtractor::default()
            .extract_content(&html, "https://a.test/")
            .unwrap();
        assert_eq!(doc.excerpt.chars().count(), EXCERPT_CHARS);
    }

    #[test]
    fn title_falls_back_to_h1() {
        let html = "<html><body><h1>Heading</h1><main>short</main></body></html>";
        let doc = ContentExtractor::default()
            .extract_content(html, "https://a.test/")
            .unwrap();
        assert_eq!(doc.title, "Heading");
    }

    #[test]
    fn bad_input_yields_none() {
        let extractor = ContentExtractor::default();
        assert!(extractor.extract_content("<p>x</p>", "not a url").is_none());
        assert!(extractor.extract_content("   ", "https://a.test/").is_none());
    }

    #[test]
    fn crawler_links_are_absolute_and_deduplicated() {
        let html = r##"<a href="/a">1</a><a href="/a">2</a><a href="https://other.test/b">3</a><a href="#x">4</a>"##;
        assert_eq!(
            extract_links(html, "https://a.test/dir/"),
            vec!["https://a.test/a", "https://other.test/b"]
        );
    }
}
