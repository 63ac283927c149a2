//! Typed errors for the ingestion pipeline.
//!
//! Network failures live in [`crate::fetcher::FetchError`]. Store and other
//! infrastructure failures are carried as `anyhow::Error`.

use thiserror::Error;

use brain_ingest_core::models::UnknownSourceType;

#[derive(Debug, Error)]
pub enum IngestError {
    /// The stored source type is not one the pipeline can discover URLs for.
    #[error("Unsupported source type: {0}")]
    UnsupportedSourceType(String),
    #[error("Source not found: {0}")]
    SourceNotFound(String),
    #[error("Source {source_id} does not belong to brain {brain_id}")]
    SourceBrainMismatch { source_id: String, brain_id: String },
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl From<UnknownSourceType> for IngestError {
    fn from(err: UnknownSourceType) -> Self {
        IngestError::UnsupportedSourceType(err.0)
    }
}

impl IngestError {
    /// Errors that mean the caller asked for something that does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            IngestError::SourceNotFound(_) | IngestError::SourceBrainMismatch { .. }
        )
    }
}
