//! Deterministic fact extraction used when the LLM tier yields nothing.
//!
//! Facts come from typed page metadata and from the first email address
//! and phone number found in the page text. Every heuristic fact carries
//! [`HEURISTIC_CONFIDENCE`] and the document URL as its source.

use std::sync::OnceLock;

use regex::Regex;

use crate::models::{Document, FactCandidate, MetaKey};

/// Confidence assigned to every heuristic fact.
pub const HEURISTIC_CONFIDENCE: f64 = 0.6;

pub const KEY_SITE_NAME: &str = "Site Name";
pub const KEY_DESCRIPTION: &str = "Description";
pub const KEY_PAGE_TITLE: &str = "Page Title";
pub const KEY_EMAIL: &str = "Email";
pub const KEY_PHONE: &str = "Phone";

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}").expect("valid email regex")
    })
}

fn phone_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}").expect("valid phone regex")
    })
}

/// First email-shaped match in `text`.
pub fn find_email(text: &str) -> Option<&str> {
    email_regex().find(text).map(|m| m.as_str())
}

/// First phone-number-shaped match in `text`.
pub fn find_phone(text: &str) -> Option<&str> {
    phone_regex().find(text).map(|m| m.as_str().trim())
}

/// Derive facts from a document without calling a model.
pub fn heuristic_facts(doc: &Document) -> Vec<FactCandidate> {
    let mut facts = Vec::new();
    let mut push = |key: &str, value: &str| {
        let value = value.trim();
        if !value.is_empty() {
            facts.push(FactCandidate::new(
                key,
                value,
                HEURISTIC_CONFIDENCE,
                doc.url.clone(),
            ));
        }
    };

    let meta = &doc.metadata;
    if let Some(site_name) = meta.get(&MetaKey::OgSiteName) {
        push(KEY_SITE_NAME, site_name);
    }

    let description = meta
        .get(&MetaKey::OgDescription)
        .or_else(|| meta.get(&MetaKey::Description));
    if let Some(description) = description {
        push(KEY_DESCRIPTION, description);
    }

    push(KEY_PAGE_TITLE, &doc.title);

    if let Some(email) = find_email(&doc.text_content) {
        push(KEY_EMAIL, email);
    }
    if let Some(phone) = find_phone(&doc.text_content) {
        push(KEY_PHONE, phone);
    }

    facts
}
