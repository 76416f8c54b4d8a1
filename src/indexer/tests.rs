use super::*;
use crate::config::{OllamaConfig, QdrantConfig};
use serde_json::json;
use std::time::Duration;
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn indexer_for(ollama: &MockServer, qdrant: &MockServer, chunking: ChunkingConfig) -> CodebaseIndexer {
    let client = OllamaClient::new(&OllamaConfig::default())
        .expect("Failed to create client")
        .with_base_url(Url::parse(&ollama.uri()).expect("mock uri should parse"))
        .with_retry_attempts(1)
        .with_backoff(Duration::from_millis(1));
    let store = VectorStore::new(&QdrantConfig {
        collection: "codebase".to_string(),
        ..QdrantConfig::default()
    })
    .expect("should create store")
    .with_base_url(Url::parse(&qdrant.uri()).expect("mock uri should parse"));

    CodebaseIndexer::from_parts(client, store, chunking, 3)
}

async fn mount_embedding(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/embeddings"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "embedding": [0.5, 0.25, 0.125] })),
        )
        .mount(server)
        .await;
}

async fn mount_collection(server: &MockServer, size: u64) {
    Mock::given(method("GET"))
        .and(path("/collections/codebase"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": {
                "status": "green",
                "points_count": 0,
                "config": { "params": { "vectors": { "size": size, "distance": "Cosine" } } }
            }
        })))
        .mount(server)
        .await;
}

fn upsert_ok() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "result": { "operation_id": 1, "status": "completed" }
    }))
}

#[tokio::test]
async fn clipboard_text_is_indexed_under_its_label() {
    let ollama = MockServer::start().await;
    let qdrant = MockServer::start().await;
    mount_embedding(&ollama).await;

    Mock::given(method("PUT"))
        .and(path("/collections/codebase/points"))
        .and(body_partial_json(json!({
            "points": [{
                "vector": [0.5, 0.25, 0.125],
                "payload": {
                    "file_path": "clipboard.txt",
                    "chunk_index": 0,
                    "content": "hello world",
                    "language": "txt"
                }
            }]
        })))
        .respond_with(upsert_ok())
        .expect(1)
        .mount(&qdrant)
        .await;

    let indexed = indexer_for(&ollama, &qdrant, ChunkingConfig::default())
        .index_document("clipboard.txt", "hello world")
        .expect("indexing should succeed");
    assert_eq!(indexed, 1);
}

#[tokio::test]
async fn long_documents_produce_one_point_per_chunk() {
    let ollama = MockServer::start().await;
    let qdrant = MockServer::start().await;
    mount_embedding(&ollama).await;

    Mock::given(method("PUT"))
        .and(path("/collections/codebase/points"))
        .respond_with(upsert_ok())
        .expect(1)
        .mount(&qdrant)
        .await;

    let chunking = ChunkingConfig {
        chunk_size: 10,
        overlap: 2,
    };
    // 26 chars with size 10, overlap 2: windows start at 0, 8, 16
    let indexed = indexer_for(&ollama, &qdrant, chunking)
        .index_document("alpha.md", "abcdefghijklmnopqrstuvwxyz")
        .expect("indexing should succeed");
    assert_eq!(indexed, 3);
}

#[tokio::test]
async fn dimension_mismatch_is_rejected() {
    let ollama = MockServer::start().await;
    let qdrant = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "embedding": [0.1, 0.2] })))
        .mount(&ollama)
        .await;
    Mock::given(method("PUT"))
        .and(path("/collections/codebase/points"))
        .respond_with(upsert_ok())
        .expect(0)
        .mount(&qdrant)
        .await;

    let err = indexer_for(&ollama, &qdrant, ChunkingConfig::default())
        .index_document("a.py", "print('hi')")
        .expect_err("wrong dimension should fail");
    assert!(format!("{:#}", err).contains("expected 3"));
}

#[tokio::test]
async fn directory_walk_skips_excluded_and_blank_files() {
    let ollama = MockServer::start().await;
    let qdrant = MockServer::start().await;
    mount_embedding(&ollama).await;
    mount_collection(&qdrant, 3).await;

    Mock::given(method("PUT"))
        .and(path("/collections/codebase/points"))
        .respond_with(upsert_ok())
        .expect(2)
        .mount(&qdrant)
        .await;

    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let root = temp_dir.path();
    fs::create_dir_all(root.join("src")).expect("mkdir src");
    fs::create_dir_all(root.join("node_modules/pkg")).expect("mkdir node_modules");
    fs::create_dir_all(root.join(".git")).expect("mkdir .git");
    fs::write(root.join("src/main.rs"), "fn main() {}").expect("write main.rs");
    fs::write(root.join("README.md"), "# Title\n\nSome docs").expect("write readme");
    fs::write(root.join("empty.txt"), "   \n").expect("write empty");
    fs::write(root.join("logo.png"), [0_u8, 159, 146, 150]).expect("write png");
    fs::write(root.join("node_modules/pkg/index.js"), "module.exports = 1").expect("write js");
    fs::write(root.join(".git/config.toml"), "[core]").expect("write git config");

    let stats = indexer_for(&ollama, &qdrant, ChunkingConfig::default())
        .index_directory(root)
        .expect("indexing should succeed");

    assert_eq!(
        stats,
        IndexingStats {
            files_seen: 3,
            files_indexed: 2,
            chunks_indexed: 2,
            errors: 0,
        }
    );
}

#[tokio::test]
async fn per_file_failures_are_counted() {
    let ollama = MockServer::start().await;
    let qdrant = MockServer::start().await;
    mount_embedding(&ollama).await;
    mount_collection(&qdrant, 3).await;

    Mock::given(method("PUT"))
        .and(path("/collections/codebase/points"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&qdrant)
        .await;

    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    fs::write(temp_dir.path().join("a.py"), "x = 1").expect("write a.py");
    fs::write(temp_dir.path().join("b.py"), "y = 2").expect("write b.py");

    let stats = indexer_for(&ollama, &qdrant, ChunkingConfig::default())
        .index_directory(temp_dir.path())
        .expect("file errors should not abort the run");

    assert_eq!(stats.files_seen, 2);
    assert_eq!(stats.files_indexed, 0);
    assert_eq!(stats.errors, 2);
}

#[tokio::test]
async fn mismatched_collection_size_aborts() {
    let ollama = MockServer::start().await;
    let qdrant = MockServer::start().await;
    mount_collection(&qdrant, 768).await;

    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let err = indexer_for(&ollama, &qdrant, ChunkingConfig::default())
        .index_directory(temp_dir.path())
        .expect_err("size mismatch should fail");
    assert!(err.to_string().contains("768-dimensional"));
}

#[test]
fn file_filter() {
    assert!(should_index_file(Path::new("src/main.rs")));
    assert!(should_index_file(Path::new("docs/Guide.MD")));
    assert!(should_index_file(Path::new("config.toml")));

    assert!(!should_index_file(Path::new(".git/config")));
    assert!(!should_index_file(Path::new("node_modules/pkg/index.js")));
    assert!(!should_index_file(Path::new("pkg/__pycache__/mod.py")));
    assert!(!should_index_file(Path::new("target/debug/build.rs")));
    assert!(!should_index_file(Path::new("debug.log")));
    assert!(!should_index_file(Path::new("logo.png")));
    assert!(!should_index_file(Path::new("release.tar.gz")));
    assert!(!should_index_file(Path::new("Makefile")));
    assert!(!should_index_file(Path::new("binary.exe")));
}
