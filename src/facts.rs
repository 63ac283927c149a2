//! Two-tier fact extraction: the configured LLM first, page heuristics when
//! the model produces nothing.

use std::sync::Arc;
use std::time::Duration;

use brain_ingest_core::heuristics::heuristic_facts;
use brain_ingest_core::models::{Document, FactCandidate};

use crate::llm::LlmExtractor;

/// `timeout` bounds the whole LLM call, retries included.
pub struct FactExtractor {
    llm: Arc<dyn LlmExtractor>,
    timeout: Duration,
}

impl FactExtractor {
    pub fn new(llm: Arc<dyn LlmExtractor>, timeout: Duration) -> Self {
        Self { llm, timeout }
    }

    pub async fn extract_facts(&self, document: &Document) -> Vec<FactCandidate> {
        let from_llm = match tokio::time::timeout(self.timeout, self.llm.extract_facts(document))
            .await
        {
            Ok(Ok(facts)) => facts,
            Ok(Err(e)) => {
                tracing::warn!(url = %document.url, error = %e, "LLM extraction failed");
                Vec::new()
            }
            Err(_) => {
                tracing::warn!(url = %document.url, timeout = ?self.timeout, "LLM extraction timed out");
                Vec::new()
            }
        };

        if !from_llm.is_empty() {
            tracing::debug!(url = %document.url, facts = from_llm.len(), "LLM facts");
            return from_llm;
        }

        let facts = heuristic_facts(document);
        tracing::debug!(url = %document.url, facts = facts.len(), "heuristic facts");
        facts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use anyhow::{anyhow, Result};
    use async_trait::async_trait;

    use crate::config::LlmConfig;
    use crate::llm::{call_budget, retry_backoff};

    struct Fixed(Result<Vec<FactCandidate>, String>);

    #[async_trait]
    impl LlmExtractor for Fixed {
        async fn extract_facts(&self, _document: &Document) -> Result<Vec<FactCandidate>> {
            self.0.clone().map_err(|e| anyhow!(e))
        }
    }

    struct Slow;

    #[async_trait]
    impl LlmExtractor for Slow {
        async fn extract_facts(&self, _document: &Document) -> Result<Vec<FactCandidate>> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(vec![FactCandidate::new("k", "v", 0.9, "u")])
        }
    }

    /// Times out its first request and answers the retry, like a provider
    /// that stalls once.
    struct StallsOnce {
        calls: AtomicUsize,
        per_request: Duration,
    }

    #[async_trait]
    impl LlmExtractor for StallsOnce {
        async fn extract_facts(&self, _document: &Document) -> Result<Vec<FactCandidate>> {
            for attempt in 0..2 {
                if attempt > 0 {
                    tokio::time::sleep(retry_backoff(attempt)).await;
                }
                let n = self.calls.fetch_add(1, Ordering::SeqCst);
                let request = async move {
                    if n == 0 {
                        tokio::time::sleep(Duration::from_secs(30)).await;
                    }
                    vec![FactCandidate::new("Founded", "1999", 0.9, "https://a.test/")]
                };
                if let Ok(facts) = tokio::time::timeout(self.per_request, request).await {
                    return Ok(facts);
                }
            }
            Err(anyhow!("timed out"))
        }
    }

    fn doc() -> Document {
        Document {
            url: "https://a.test/".into(),
            title: "Acme".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn llm_facts_win_when_present() {
        let llm = Fixed(Ok(vec![FactCandidate::new("Founded", "1999", 0.9, "https://a.test/")]));
        let facts = FactExtractor::new(Arc::new(llm), Duration::from_secs(1))
            .extract_facts(&doc())
            .await;
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].key, "Founded");
    }

    #[tokio::test]
    async fn errors_fall_back_to_heuristics() {
        let llm = Fixed(Err("boom".into()));
        let facts = FactExtractor::new(Arc::new(llm), Duration::from_secs(1))
            .extract_facts(&doc())
            .await;
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].key, "Page Title");
        assert_eq!(facts[0].confidence, 0.6);
    }

    #[tokio::test]
    async fn retry_after_a_stalled_request_is_not_cut_off() {
        let config = LlmConfig {
            timeout_secs: 1,
            max_retries: 1,
            ..LlmConfig::default()
        };
        let llm = Arc::new(StallsOnce {
            calls: AtomicUsize::new(0),
            per_request: Duration::from_secs(config.timeout_secs),
        });
        let facts = FactExtractor::new(llm.clone(), call_budget(&config))
            .extract_facts(&doc())
            .await;
        assert_eq!(llm.calls.load(Ordering::SeqCst), 2);
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].key, "Founded");
    }

    #[tokio::test]
    async fn timeouts_fall_back_to_heuristics() {
        let facts = FactExtractor::new(Arc::new(Slow), Duration::from_millis(20))
            .extract_facts(&doc())
            .await;
        assert_eq!(facts[0].key, "Page Title");
    }
}
