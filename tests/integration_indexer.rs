#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

//! End-to-end indexing and search against mocked Ollama and Qdrant servers
//!
//! Both servers are wiremock instances, so these tests need no running
//! services. The blocking HTTP client runs on the test thread while the mock
//! servers answer from the tokio runtime.

use serde_json::json;
use std::fs;
use std::time::Duration;
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use deckhand::config::{OllamaConfig, QdrantConfig};
use deckhand::database::VectorStore;
use deckhand::embeddings::{ChunkingConfig, OllamaClient};
use deckhand::indexer::CodebaseIndexer;
use deckhand::search::{SemanticSearch, format_results};

const COLLECTION: &str = "codebase";

struct Services {
    ollama: MockServer,
    qdrant: MockServer,
}

impl Services {
    async fn start() -> Self {
        let services = Self {
            ollama: MockServer::start().await,
            qdrant: MockServer::start().await,
        };

        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "models": [{ "name": "nomic-embed-text:latest", "size": 274302450 }]
            })))
            .mount(&services.ollama)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/embeddings"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "embedding": [0.5, 0.5, 0.5] })),
            )
            .mount(&services.ollama)
            .await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "title": "qdrant - vector search engine",
                "version": "1.12.0"
            })))
            .mount(&services.qdrant)
            .await;

        services
    }

    fn client(&self) -> OllamaClient {
        OllamaClient::new(&OllamaConfig::default())
            .expect("Failed to create client")
            .with_base_url(Url::parse(&self.ollama.uri()).expect("mock uri should parse"))
            .with_retry_attempts(1)
            .with_backoff(Duration::from_millis(1))
    }

    fn store(&self) -> VectorStore {
        VectorStore::new(&QdrantConfig {
            collection: COLLECTION.to_string(),
            ..QdrantConfig::default()
        })
        .expect("should create store")
        .with_base_url(Url::parse(&self.qdrant.uri()).expect("mock uri should parse"))
    }

    async fn mount_collection(&self, points: u64) {
        Mock::given(method("GET"))
            .and(path(format!("/collections/{}", COLLECTION)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": {
                    "status": "green",
                    "points_count": points,
                    "config": { "params": { "vectors": { "size": 3, "distance": "Cosine" } } }
                }
            })))
            .mount(&self.qdrant)
            .await;
    }
}

#[tokio::test]
async fn index_tree_creates_collection_and_upserts_text_files() {
    let services = Services::start().await;

    // No collection yet: the lookup 404s once, then the created one is described
    Mock::given(method("GET"))
        .and(path(format!("/collections/{}", COLLECTION)))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "status": { "error": "Not found: Collection `codebase` doesn't exist!" }
        })))
        .up_to_n_times(1)
        .mount(&services.qdrant)
        .await;
    Mock::given(method("PUT"))
        .and(path(format!("/collections/{}", COLLECTION)))
        .and(body_partial_json(json!({
            "vectors": { "size": 3, "distance": "Cosine" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": true })))
        .expect(1)
        .mount(&services.qdrant)
        .await;
    services.mount_collection(0).await;

    Mock::given(method("PUT"))
        .and(path(format!("/collections/{}/points", COLLECTION)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": { "operation_id": 7, "status": "completed" }
        })))
        .expect(2)
        .mount(&services.qdrant)
        .await;

    let tree = TempDir::new().expect("Failed to create temp dir");
    fs::create_dir_all(tree.path().join("src")).expect("create src");
    fs::create_dir_all(tree.path().join("node_modules/pkg")).expect("create node_modules");
    fs::write(tree.path().join("src/main.rs"), "fn main() {}\n").expect("write main");
    fs::write(tree.path().join("README.md"), "# Project\n").expect("write readme");
    fs::write(tree.path().join("node_modules/pkg/index.js"), "x").expect("write dep");
    fs::write(tree.path().join("logo.png"), [0x89, 0x50]).expect("write image");

    let indexer = CodebaseIndexer::from_parts(
        services.client(),
        services.store(),
        ChunkingConfig::default(),
        3,
    );
    indexer.check_services().expect("services should be healthy");

    let stats = indexer
        .index_directory(tree.path())
        .expect("indexing should succeed");
    assert_eq!(stats.files_indexed, 2);
    assert_eq!(stats.chunks_indexed, 2);
    assert_eq!(stats.errors, 0);
}

#[tokio::test]
async fn indexed_chunks_are_searchable() {
    let services = Services::start().await;
    services.mount_collection(2).await;

    Mock::given(method("POST"))
        .and(path(format!("/collections/{}/points/search", COLLECTION)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": [
                { "id": "a", "score": 0.82, "payload": {
                    "content": "fn main() {}", "file_path": "src/main.rs",
                    "chunk_index": 0, "language": "rs" } },
                { "id": "b", "score": 0.31, "payload": {
                    "content": "# Project", "file_path": "README.md",
                    "chunk_index": 0, "language": "md" } }
            ]
        })))
        .mount(&services.qdrant)
        .await;

    let search = SemanticSearch::from_parts(services.client(), services.store(), 3);
    let (healthy, message) = search.health_check();
    assert!(healthy, "unexpected health: {}", message);

    let info = search
        .require_populated_collection()
        .expect("collection has points");
    assert_eq!(info.points_count, 2);

    let results = search
        .search("entry point", 5, 0.5)
        .expect("search should succeed");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].file_path, "src/main.rs");

    let formatted = format_results(&results, 300);
    assert!(formatted.starts_with("Result 1 (score: 0.82)"));
    assert!(formatted.contains("File: src/main.rs (chunk 0, rs)"));
}

#[tokio::test]
async fn unreachable_ollama_fails_the_service_check() {
    let qdrant = MockServer::start().await;
    let store = VectorStore::new(&QdrantConfig::default())
        .expect("should create store")
        .with_base_url(Url::parse(&qdrant.uri()).expect("mock uri should parse"));
    let client = OllamaClient::new(&OllamaConfig::default())
        .expect("Failed to create client")
        .with_base_url(Url::parse("http://127.0.0.1:9").expect("valid url"))
        .with_retry_attempts(1)
        .with_backoff(Duration::from_millis(1));

    let indexer = CodebaseIndexer::from_parts(client, store, ChunkingConfig::default(), 3);
    let err = indexer
        .check_services()
        .expect_err("ollama is unreachable");
    assert!(format!("{:#}", err).contains("Ollama"));
}
