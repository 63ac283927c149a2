//! # brain-ingest
//!
//! Ingestion pipeline for knowledge brains: discover pages from a source,
//! extract readable content, derive key/value facts, and merge them into a
//! brain's fact set by confidence.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐   ┌──────────┐
//! │  Discovery   │──▶│ Fetch+Extract│──▶│ Fact extract │──▶│ Reconcile│
//! │ url/sitemap  │   │  scraper     │   │ LLM→heuristic│   │ + SQLite │
//! └──────────────┘   └──────────────┘   └──────────────┘   └────┬─────┘
//!                                                              │
//!                                     ┌────────────────────────┤
//!                                     ▼                        ▼
//!                                ┌──────────┐            ┌──────────┐
//!                                │   CLI    │            │   HTTP   │
//!                                │ (brain)  │            │ /ingest  │
//!                                └──────────┘            └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! brain init
//! brain source add acme sitemap https://acme.test/sitemap.xml --include /about
//! brain ingest acme <source-id>
//! brain facts acme
//! brain serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`fetcher`] | HTTP fetching with content-type checks |
//! | [`extract`] | HTML to document extraction |
//! | [`sitemap`] | Sitemap parsing and index expansion |
//! | [`discover`] | Source URL discovery and link crawling |
//! | [`llm`] | LLM fact extraction providers |
//! | [`facts`] | LLM-then-heuristic fact extraction |
//! | [`ingest`] | Job orchestration |
//! | [`sqlite_store`] | SQLite persistence |
//! | [`server`] | HTTP server |
//!
//! Models, filtering, heuristics, reconciliation and the store trait live in
//! the `brain-ingest-core` crate.

pub mod config;
pub mod db;
pub mod discover;
pub mod error;
pub mod extract;
pub mod facts;
pub mod fetcher;
pub mod get;
pub mod ingest;
pub mod llm;
pub mod migrate;
pub mod pacing;
pub mod progress;
pub mod server;
pub mod sitemap;
pub mod sources;
pub mod sqlite_store;
pub mod telemetry;

pub use brain_ingest_core as core;
