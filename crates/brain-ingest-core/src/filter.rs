//! Include/exclude filtering and page capping for discovered URLs.

use std::collections::HashSet;

use crate::models::SourceConfig;

/// Filter discovered URLs, preserving discovery order.
///
/// 1. Repeated URLs are dropped (first occurrence kept).
/// 2. When `include` is non-empty, a URL must contain at least one include substring.
/// 3. A URL containing any `exclude` substring is dropped.
/// 4. The result is truncated to `max_pages`.
pub fn apply_filters(
    urls: Vec<String>,
    include: &[String],
    exclude: &[String],
    max_pages: usize,
) -> Vec<String> {
    let mut seen = HashSet::new();
    urls.into_iter()
        .filter(|url| seen.insert(url.clone()))
        .filter(|url| include.is_empty() || include.iter().any(|p| url.contains(p.as_str())))
        .filter(|url| !exclude.iter().any(|p| url.contains(p.as_str())))
        .take(max_pages)
        .collect()
}

/// [`apply_filters`] with the settings of a source.
pub fn filter_for_source(urls: Vec<String>, config: &SourceConfig) -> Vec<String> {
    apply_filters(urls, &config.include, &config.exclude, config.page_cap())
}
