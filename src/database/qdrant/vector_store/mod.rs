
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use super::{ChunkPayload, ChunkPoint, CollectionInfo, ScoredChunk};
use crate::DeckError;
use crate::config::QdrantConfig;

const SCROLL_PAGE_SIZE: usize = 256;

/// Vector store backed by a Qdrant server's REST API
#[derive(Debug, Clone)]
pub struct VectorStore {
    base_url: Url,
    collection: String,
    api_key: Option<String>,
    agent: ureq::Agent,
}

#[derive(Debug, Clone, Copy)]
enum BodyMethod {
    Put,
    Post,
}

#[derive(Debug, Deserialize)]
struct QdrantResponse<T> {
    result: T,
}

#[derive(Debug, Deserialize)]
struct ServerInfo {
    #[serde(default)]
    title: String,
    version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct VectorParams {
    size: u64,
    distance: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum VectorsConfig {
    Single(VectorParams),
    Named(HashMap<String, VectorParams>),
}

#[derive(Debug, Deserialize)]
struct CollectionParams {
    vectors: VectorsConfig,
}

#[derive(Debug, Deserialize)]
struct CollectionConfig {
    params: CollectionParams,
}

#[derive(Debug, Deserialize)]
struct CollectionDescription {
    status: String,
    points_count: Option<u64>,
    config: CollectionConfig,
}

#[derive(Debug, Deserialize)]
struct ScoredPoint {
    score: f32,
    payload: Option<ChunkPayload>,
}

#[derive(Debug, Deserialize)]
struct RecordPoint {
    payload: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ScrollPage {
    points: Vec<RecordPoint>,
    next_page_offset: Option<Value>,
}

impl VectorStore {
    /// Create a store for the configured collection
    #[inline]
    pub fn new(config: &QdrantConfig) -> Result<Self> {
        let base_url = config
            .qdrant_url()
            .context("Failed to generate Qdrant URL from config")?;

        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_seconds)))
            .build()
            .into();

        Ok(Self {
            base_url,
            collection: config.collection.clone(),
            api_key: config.api_key.clone(),
            agent,
        })
    }

    /// Point the store at an arbitrary server, e.g. a mock in tests
    #[inline]
    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = base_url;
        self
    }

    #[inline]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    #[inline]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Server version, which doubles as a reachability check
    #[inline]
    pub fn version(&self) -> Result<String> {
        let url = self.url("/")?;
        let body = self.get(&url)?;
        let info: ServerInfo =
            serde_json::from_str(&body).context("Failed to parse Qdrant server info")?;

        if !info.title.to_lowercase().contains("qdrant") {
            warn!("Unexpected server title at {}: {:?}", self.base_url, info.title);
        }

        Ok(info.version)
    }

    #[inline]
    pub fn health_check(&self) -> Result<()> {
        let version = self.version().context("Qdrant health check failed")?;
        info!("Qdrant {} is reachable at {}", version, self.base_url);
        Ok(())
    }

    /// Describe the collection; a missing collection is `DeckError::NotFound`
    #[inline]
    pub fn get_collection(&self) -> Result<CollectionInfo> {
        let url = self.collection_url("")?;
        let body = self.get(&url)?;
        let response: QdrantResponse<CollectionDescription> =
            serde_json::from_str(&body).context("Failed to parse collection description")?;

        let description = response.result;
        let params = match description.config.params.vectors {
            VectorsConfig::Single(params) => params,
            VectorsConfig::Named(named) => named.into_values().next().ok_or_else(|| {
                DeckError::VectorStore(format!(
                    "Collection '{}' has no vector configuration",
                    self.collection
                ))
            })?,
        };

        Ok(CollectionInfo {
            name: self.collection.clone(),
            status: description.status,
            points_count: description.points_count.unwrap_or(0),
            vector_size: params.size,
            distance: params.distance,
        })
    }

    /// Create the collection with cosine distance
    #[inline]
    pub fn create_collection(&self, vector_size: u64) -> Result<()> {
        info!(
            "Creating collection '{}' ({} dimensions, cosine)",
            self.collection, vector_size
        );

        let url = self.collection_url("")?;
        let body = json!({
            "vectors": VectorParams {
                size: vector_size,
                distance: "Cosine".to_string(),
            }
        });
        self.send_json(BodyMethod::Put, &url, &body)?;
        Ok(())
    }

    /// Look the collection up, creating it when it does not exist yet
    #[inline]
    pub fn ensure_collection(&self, vector_size: u64) -> Result<CollectionInfo> {
        match self.get_collection() {
            Ok(info) => {
                debug!("Collection '{}' exists", self.collection);
                Ok(info)
            }
            Err(e) if is_not_found(&e) => {
                info!("Collection '{}' not found, creating it", self.collection);
                self.create_collection(vector_size)?;
                self.get_collection()
            }
            Err(e) => Err(e),
        }
    }

    #[inline]
    pub fn delete_collection(&self) -> Result<()> {
        info!("Deleting collection '{}'", self.collection);
        let url = self.collection_url("")?;
        self.request_with_status(|| {
            self.authorize_without_body(self.agent.delete(url.as_str()))
                .call()
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })?;
        Ok(())
    }

    /// Upsert points, waiting until they are applied
    #[inline]
    pub fn upsert(&self, points: &[ChunkPoint]) -> Result<()> {
        if points.is_empty() {
            return Ok(());
        }

        debug!(
            "Upserting {} points into '{}'",
            points.len(),
            self.collection
        );
        let url = self.collection_url("/points?wait=true")?;
        self.send_json(BodyMethod::Put, &url, &json!({ "points": points }))?;
        Ok(())
    }

    /// Nearest neighbours of `vector` scoring at least `score_threshold`
    #[inline]
    pub fn search(
        &self,
        vector: &[f32],
        limit: usize,
        score_threshold: f32,
    ) -> Result<Vec<ScoredChunk>> {
        let url = self.collection_url("/points/search")?;
        let body = json!({
            "vector": vector,
            "limit": limit,
            "score_threshold": score_threshold,
            "with_payload": true,
        });

        let text = self.send_json(BodyMethod::Post, &url, &body)?;
        let response: QdrantResponse<Vec<ScoredPoint>> =
            serde_json::from_str(&text).context("Failed to parse search response")?;

        let hits = response
            .result
            .into_iter()
            .filter_map(|point| {
                point.payload.map(|payload| ScoredChunk {
                    score: point.score,
                    payload,
                })
            })
            .collect::<Vec<_>>();

        debug!("Search returned {} hits", hits.len());
        Ok(hits)
    }

    /// Every payload in the collection, fetched page by page
    #[inline]
    pub fn scroll_payloads(&self) -> Result<Vec<Value>> {
        let url = self.collection_url("/points/scroll")?;
        let mut payloads = Vec::new();
        let mut offset: Option<Value> = None;

        loop {
            let body = json!({
                "limit": SCROLL_PAGE_SIZE,
                "with_payload": true,
                "with_vector": false,
                "offset": offset,
            });
            let text = self.send_json(BodyMethod::Post, &url, &body)?;
            let response: QdrantResponse<ScrollPage> =
                serde_json::from_str(&text).context("Failed to parse scroll response")?;

            payloads.extend(response.result.points.into_iter().filter_map(|p| p.payload));

            match response.result.next_page_offset {
                Some(next) if !next.is_null() => offset = Some(next),
                _ => break,
            }
        }

        debug!(
            "Scrolled {} payloads from '{}'",
            payloads.len(),
            self.collection
        );
        Ok(payloads)
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .with_context(|| format!("Failed to build Qdrant URL for {}", path))
    }

    fn collection_url(&self, suffix: &str) -> Result<Url> {
        self.url(&format!("/collections/{}{}", self.collection, suffix))
    }

    fn get(&self, url: &Url) -> Result<String> {
        self.request_with_status(|| {
            self.authorize_without_body(self.agent.get(url.as_str()))
                .call()
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })
    }

    fn send_json(&self, method: BodyMethod, url: &Url, body: &Value) -> Result<String> {
        let payload = serde_json::to_string(body).context("Failed to serialize Qdrant request")?;

        self.request_with_status(|| {
            let builder = match method {
                BodyMethod::Put => self.agent.put(url.as_str()),
                BodyMethod::Post => self.agent.post(url.as_str()),
            };
            self.authorize_with_body(builder)
                .header("Content-Type", "application/json")
                .send(&payload)
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })
    }

    fn authorize_without_body(
        &self,
        builder: ureq::RequestBuilder<ureq::typestate::WithoutBody>,
    ) -> ureq::RequestBuilder<ureq::typestate::WithoutBody> {
        match &self.api_key {
            Some(key) => builder.header("api-key", key.as_str()),
            None => builder,
        }
    }

    fn authorize_with_body(
        &self,
        builder: ureq::RequestBuilder<ureq::typestate::WithBody>,
    ) -> ureq::RequestBuilder<ureq::typestate::WithBody> {
        match &self.api_key {
            Some(key) => builder.header("api-key", key.as_str()),
            None => builder,
        }
    }

    /// Run a request, mapping failures onto the error taxonomy
    fn request_with_status<F>(&self, request_fn: F) -> Result<String>
    where
        F: FnOnce() -> Result<String, ureq::Error>,
    {
        match request_fn() {
            Ok(text) => Ok(text),
            Err(ureq::Error::StatusCode(404)) => Err(DeckError::NotFound(format!(
                "Qdrant collection '{}' at {}",
                self.collection, self.base_url
            ))
            .into()),
            Err(ureq::Error::StatusCode(status)) => Err(DeckError::VectorStore(format!(
                "Qdrant returned HTTP {} for collection '{}'",
                status, self.collection
            ))
            .into()),
            Err(e) => Err(DeckError::ServiceUnavailable(format!(
                "Cannot reach Qdrant at {}: {}",
                self.base_url, e
            ))
            .into()),
        }
    }
}

/// Whether an error chain carries `DeckError::NotFound`
#[inline]
pub fn is_not_found(error: &anyhow::Error) -> bool {
    error
        .chain()
        .any(|cause| matches!(cause.downcast_ref::<DeckError>(), Some(DeckError::NotFound(_))))
}

/// Deserialize a scrolled payload into a concrete type, skipping foreign points
#[inline]
pub fn payload_as<T: DeserializeOwned>(payload: &Value) -> Option<T> {
    serde_json::from_value(payload.clone()).ok()
}
