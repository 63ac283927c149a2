//! # brain-ingest core
//!
//! Runtime-agnostic logic for brain-ingest: data models, URL filtering,
//! heuristic fact extraction, fact reconciliation, and the store trait.
//!
//! This crate contains no tokio, sqlx, network, or filesystem I/O. The
//! main crate supplies fetching, HTML parsing, LLM calls, and SQLite.

pub mod filter;
pub mod heuristics;
pub mod models;
pub mod reconcile;
pub mod store;
