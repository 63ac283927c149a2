//! HTTP contract tests: the router is served on an ephemeral port and
//! driven with `reqwest`.

mod common;

use std::sync::Arc;

use serde_json::{json, Value};

use brain_ingest::core::models::{Source, SourceConfig, SourceType};
use brain_ingest::core::store::memory::InMemoryStore;
use brain_ingest::core::store::BrainStore;
use brain_ingest::ingest::IngestPipeline;
use brain_ingest::llm::DisabledExtractor;
use brain_ingest::server::{router, AppState};

use common::{page, test_config, StubFetcher};

struct TestServer {
    base: String,
    store: Arc<InMemoryStore>,
    client: reqwest::Client,
}

impl TestServer {
    async fn start() -> Self {
        let store = Arc::new(InMemoryStore::new());
        let fetcher = StubFetcher::new().page(
            "https://acme.test/",
            page("Acme", "Acme makes widgets", "<p>Write to hello@acme.test.</p>"),
        );
        let pipeline = IngestPipeline::new(
            &test_config(),
            store.clone(),
            Arc::new(fetcher),
            Arc::new(DisabledExtractor),
        );
        let app = router(AppState::new(store.clone(), Arc::new(pipeline)));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base: format!("http://{}", addr),
            store,
            client: reqwest::Client::new(),
        }
    }

    async fn source(&self, brain_id: &str, source_type: &str) -> String {
        let mut source = Source::new(brain_id, SourceType::Url, SourceConfig::new("https://acme.test/"));
        source.source_type = source_type.to_string();
        self.store.put_source(&source).await.unwrap();
        source.id
    }

    async fn post_ingest(&self, body: Value) -> (u16, Value) {
        let resp = self
            .client
            .post(format!("{}/ingest", self.base))
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap())
    }

    async fn get(&self, path: &str) -> (u16, Value) {
        let resp = self
            .client
            .get(format!("{}{}", self.base, path))
            .send()
            .await
            .unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap())
    }
}

#[tokio::test]
async fn health_reports_version() {
    let server = TestServer::start().await;
    let (status, body) = server.get("/health").await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn ingest_requires_brain_and_source() {
    let server = TestServer::start().await;

    let (status, body) = server.post_ingest(json!({ "sourceId": "s1" })).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
    assert_eq!(body["error"]["message"], "brainId is required");

    let (status, body) = server.post_ingest(json!({ "brainId": "b1", "sourceId": "  " })).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["message"], "sourceId is required");
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() {
    let server = TestServer::start().await;
    let resp = server
        .client
        .post(format!("{}/ingest", server.base))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn unknown_or_foreign_source_is_not_found() {
    let server = TestServer::start().await;
    let (status, body) = server
        .post_ingest(json!({ "brainId": "b1", "sourceId": "missing" }))
        .await;
    assert_eq!(status, 404);
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    let id = server.source("b2", "url").await;
    let (status, _) = server.post_ingest(json!({ "brainId": "b1", "sourceId": id })).await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn successful_ingest_is_accepted_and_queryable() {
    let server = TestServer::start().await;
    let id = server.source("b1", "url").await;

    let (status, body) = server.post_ingest(json!({ "brainId": "b1", "sourceId": id })).await;
    assert_eq!(status, 202);
    assert_eq!(body["status"], "completed");
    assert!(body["factsAdded"].as_u64().unwrap() > 0);
    assert_eq!(body["factsUpdated"], 0);

    let job_id = body["jobId"].as_str().unwrap();
    let (status, job) = server.get(&format!("/jobs/{}", job_id)).await;
    assert_eq!(status, 200);
    assert_eq!(job["status"], "success");
    assert_eq!(job["progress"], 100);
    assert_eq!(job["sourceId"], id.as_str());

    let (status, facts) = server.get("/brains/b1/facts").await;
    assert_eq!(status, 200);
    let facts = facts["facts"].as_array().unwrap();
    assert!(facts.iter().any(|f| f["key"] == "Email" && f["value"] == "hello@acme.test"));
}

#[tokio::test]
async fn failed_job_is_an_ingest_error() {
    let server = TestServer::start().await;
    let id = server.source("b1", "rss").await;

    let (status, body) = server.post_ingest(json!({ "brainId": "b1", "sourceId": id })).await;
    assert_eq!(status, 500);
    assert_eq!(body["error"]["code"], "INGEST_ERROR");
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("Unsupported source type: rss"));
}

#[tokio::test]
async fn missing_job_is_not_found() {
    let server = TestServer::start().await;
    let (status, body) = server.get("/jobs/nope").await;
    assert_eq!(status, 404);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}
