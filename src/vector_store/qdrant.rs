//! Qdrant REST client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{
    validate_batch, CollectionSpec, CollectionStatus, RecordPayload, ScoredRecord, VectorRecord,
    VectorStore,
};
use crate::error::{RagError, Result};

/// [`VectorStore`] backed by a Qdrant cluster over its REST API.
///
/// Collections use cosine distance.
#[derive(Clone)]
pub struct QdrantStore {
    client: Client,
    base_url: String,
}

impl QdrantStore {
    /// Builds a new Qdrant client.
    ///
    /// # Arguments
    /// * `base_url` - REST endpoint, e.g. `http://localhost:6333`
    /// * `api_key` - Value for the `api-key` header, if the cluster requires one
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(RagError::Config(
                "Qdrant endpoint must be an http(s) URL".into(),
            ));
        }
        let mut headers = HeaderMap::new();
        if let Some(key) = api_key {
            headers.insert(
                "api-key",
                HeaderValue::from_str(key.trim())
                    .map_err(|_| RagError::Config("invalid Qdrant API key".into()))?,
            );
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn collection_url(&self, name: &str) -> String {
        format!("{}/collections/{}", self.base_url, name)
    }

    async fn exists(&self, name: &str) -> Result<bool> {
        let resp = self
            .client
            .get(format!("{}/exists", self.collection_url(name)))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(RagError::from_response("qdrant", resp).await);
        }
        let body: QdrantResponse<ExistsResult> = resp.json().await?;
        Ok(body.result.exists)
    }

    async fn configured_vectors(&self, name: &str) -> Result<VectorsConfig> {
        let resp = self.client.get(self.collection_url(name)).send().await?;
        if !resp.status().is_success() {
            return Err(RagError::from_response("qdrant", resp).await);
        }
        let body: QdrantResponse<CollectionInfo> = resp.json().await?;
        Ok(body.result.config.params.vectors)
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn ensure_collection(&self, spec: &CollectionSpec) -> Result<CollectionStatus> {
        if self.exists(&spec.name).await? {
            self.configured_vectors(&spec.name)
                .await?
                .check(spec)?;
            debug!(collection = %spec.name, "qdrant collection already exists");
            return Ok(CollectionStatus::Existing);
        }

        let request = CreateCollection {
            vectors: VectorParams {
                size: spec.dimensions,
                distance: "Cosine",
            },
        };
        let resp = self
            .client
            .put(self.collection_url(&spec.name))
            .json(&request)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(RagError::from_response("qdrant", resp).await);
        }
        debug!(collection = %spec.name, dimensions = spec.dimensions, "created qdrant collection");
        Ok(CollectionStatus::Created)
    }

    async fn upsert(&self, spec: &CollectionSpec, records: Vec<VectorRecord>) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        validate_batch(spec, &records)?;
        let count = records.len();
        let points: Vec<PointStruct> = records
            .into_iter()
            .map(|record| PointStruct {
                id: record.id,
                vector: record.vector,
                payload: record.payload,
            })
            .collect();

        let resp = self
            .client
            .put(format!("{}/points?wait=true", self.collection_url(&spec.name)))
            .json(&UpsertPoints { points })
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(RagError::from_response("qdrant", resp).await);
        }
        debug!(collection = %spec.name, count, "upserted points to qdrant");
        Ok(())
    }

    async fn search(
        &self,
        spec: &CollectionSpec,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredRecord>> {
        spec.check_vector(vector)?;
        let request = SearchPoints {
            vector,
            limit,
            with_payload: true,
        };
        let resp = self
            .client
            .post(format!("{}/points/search", self.collection_url(&spec.name)))
            .json(&request)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(RagError::from_response("qdrant", resp).await);
        }
        let body: QdrantResponse<Vec<ScoredPoint>> = resp.json().await?;
        debug!(collection = %spec.name, hits = body.result.len(), "qdrant search complete");

        body.result
            .into_iter()
            .map(|point| {
                let id = match point.id {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                };
                let payload: RecordPayload =
                    serde_json::from_value(point.payload).map_err(|err| {
                        RagError::VectorStore(format!("record {id} has an unknown payload: {err}"))
                    })?;
                if payload.kind() != spec.kind {
                    return Err(RagError::VectorStore(format!(
                        "record {id} does not belong in collection '{}'",
                        spec.name
                    )));
                }
                Ok(ScoredRecord {
                    id,
                    score: point.score,
                    payload,
                })
            })
            .collect()
    }
}

#[derive(Serialize)]
struct CreateCollection {
    vectors: VectorParams,
}

#[derive(Serialize)]
struct VectorParams {
    size: usize,
    distance: &'static str,
}

#[derive(Serialize)]
struct UpsertPoints {
    points: Vec<PointStruct>,
}

#[derive(Serialize)]
struct PointStruct {
    id: String,
    vector: Vec<f32>,
    payload: RecordPayload,
}

#[derive(Serialize)]
struct SearchPoints<'a> {
    vector: &'a [f32],
    limit: usize,
    with_payload: bool,
}

#[derive(Debug, Deserialize)]
struct QdrantResponse<T> {
    result: T,
}

#[derive(Debug, Deserialize)]
struct ExistsResult {
    exists: bool,
}

#[derive(Debug, Deserialize)]
struct CollectionInfo {
    config: CollectionConfig,
}

#[derive(Debug, Deserialize)]
struct CollectionConfig {
    params: CollectionParams,
}

#[derive(Debug, Deserialize)]
struct CollectionParams {
    vectors: VectorsConfig,
}

/// Unnamed vectors report `{size, distance}`; named vectors a map of those.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum VectorsConfig {
    Single { size: usize },
    Named(serde_json::Map<String, serde_json::Value>),
}

impl VectorsConfig {
    /// Existing collections must hold one unnamed vector of the spec's dimension.
    fn check(&self, spec: &CollectionSpec) -> Result<()> {
        match self {
            Self::Single { size } if *size == spec.dimensions => Ok(()),
            Self::Single { size } => Err(RagError::VectorStore(format!(
                "collection '{}' has dimension {size}, expected {}",
                spec.name, spec.dimensions
            ))),
            Self::Named(vectors) => {
                let names: Vec<&str> = vectors.keys().map(String::as_str).collect();
                Err(RagError::VectorStore(format!(
                    "collection '{}' uses named vectors [{}], expected a single unnamed vector of dimension {}",
                    spec.name,
                    names.join(", "),
                    spec.dimensions
                )))
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct ScoredPoint {
    id: serde_json::Value,
    score: f32,
    #[serde(default)]
    payload: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_http_endpoints() {
        let err = QdrantStore::new("localhost:6333", None, Duration::from_secs(1)).err();
        assert!(matches!(err, Some(RagError::Config(_))));
    }

    fn vectors_of(body: &str) -> VectorsConfig {
        let parsed: QdrantResponse<CollectionInfo> = serde_json::from_str(body).unwrap();
        parsed.result.config.params.vectors
    }

    #[test]
    fn accepts_matching_unnamed_vector() {
        let vectors = vectors_of(
            r#"{"result":{"config":{"params":{"vectors":{"size":1536,"distance":"Cosine"}}}},"status":"ok"}"#,
        );
        assert!(vectors.check(&CollectionSpec::documents("documents", 1536)).is_ok());
        let err = vectors
            .check(&CollectionSpec::documents("documents", 768))
            .unwrap_err();
        assert!(err.to_string().contains("dimension 1536"), "{err}");
    }

    #[test]
    fn rejects_named_vector_collections() {
        let vectors = vectors_of(
            r#"{"result":{"config":{"params":{"vectors":{"text":{"size":1536,"distance":"Cosine"}}}}},"status":"ok"}"#,
        );
        let err = vectors
            .check(&CollectionSpec::documents("documents", 1536))
            .unwrap_err();
        match err {
            RagError::VectorStore(message) => {
                assert!(message.contains("named vectors [text]"), "{message}")
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn numeric_point_ids_are_stringified() {
        let body = r#"{"id": 7, "score": 0.9, "payload": {"kind":"document_chunk","filename":"a","text":"b"}}"#;
        let point: ScoredPoint = serde_json::from_str(body).unwrap();
        let id = match point.id {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        };
        assert_eq!(id, "7");
    }
}
