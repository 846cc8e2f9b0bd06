//! Vector store records, collection bootstrap and the store abstraction.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use crate::chunker::DocumentChunk;
use crate::error::{RagError, Result};
use crate::tracking::nlq::NlqParams;

pub mod qdrant;

/// Dimension of the documents collection (OpenAI `text-embedding-3-small`).
pub const DOCUMENTS_DIMENSIONS: usize = 1536;

/// Dimension of the satellite track collection. Tracks are never embedded;
/// the value only satisfies the store's schema.
pub const TRACKS_DIMENSIONS: usize = 32;

/// Which payload shape a collection holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionKind {
    /// Embedded document chunks, searched by similarity.
    Documents,
    /// Satellite tracks, written by id and never searched.
    SatelliteTracks,
}

/// Name, kind and vector dimension of a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSpec {
    /// Collection name in the store.
    pub name: String,
    /// Payload kind stored in the collection.
    pub kind: CollectionKind,
    /// Required vector length.
    pub dimensions: usize,
}

impl CollectionSpec {
    /// Spec for the document chunk collection.
    pub fn documents(name: impl Into<String>, dimensions: usize) -> Self {
        Self {
            name: name.into(),
            kind: CollectionKind::Documents,
            dimensions,
        }
    }

    /// Spec for the satellite track collection.
    pub fn satellite_tracks(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: CollectionKind::SatelliteTracks,
            dimensions: TRACKS_DIMENSIONS,
        }
    }

    /// Rejects vectors whose length differs from the collection dimension.
    pub fn check_vector(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimensions {
            return Err(RagError::VectorStore(format!(
                "vector of length {} does not fit collection '{}' (dimension {})",
                vector.len(),
                self.name,
                self.dimensions
            )));
        }
        Ok(())
    }
}

/// Payload stored next to a document chunk vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunkPayload {
    /// Source filename.
    pub filename: String,
    /// Raw chunk text.
    pub text: String,
}

/// Payload stored for a fetched satellite track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SatelliteTrackPayload {
    /// NORAD catalog id of the satellite.
    pub norad_id: u32,
    /// Satellite name reported by the tracking API.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub satellite_name: Option<String>,
    /// Raw position samples as returned by the tracking API.
    pub positions: Vec<serde_json::Value>,
    /// Parameters parsed from a natural-language request, when there was one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parsed: Option<NlqParams>,
}

/// Known payload shapes, validated whenever a record crosses the store boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecordPayload {
    /// A document chunk.
    DocumentChunk(DocumentChunkPayload),
    /// A satellite track.
    SatelliteTrack(SatelliteTrackPayload),
}

impl RecordPayload {
    fn kind(&self) -> CollectionKind {
        match self {
            Self::DocumentChunk(_) => CollectionKind::Documents,
            Self::SatelliteTrack(_) => CollectionKind::SatelliteTracks,
        }
    }

    /// Returns the document payload, or `None` for other shapes.
    pub fn as_document(&self) -> Option<&DocumentChunkPayload> {
        match self {
            Self::DocumentChunk(doc) => Some(doc),
            Self::SatelliteTrack(_) => None,
        }
    }
}

/// An `(id, vector, payload)` triple written to a collection.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorRecord {
    /// Record identifier (UUID string).
    pub id: String,
    /// Embedding or placeholder vector.
    pub vector: Vec<f32>,
    /// Typed payload.
    pub payload: RecordPayload,
}

impl VectorRecord {
    /// Pairs a chunk with its embedding.
    pub fn from_chunk(chunk: DocumentChunk, vector: Vec<f32>) -> Self {
        Self {
            id: chunk.id.to_string(),
            vector,
            payload: RecordPayload::DocumentChunk(DocumentChunkPayload {
                filename: chunk.filename,
                text: chunk.text,
            }),
        }
    }
}

/// A search hit.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRecord {
    /// Record identifier.
    pub id: String,
    /// Similarity score (higher is closer).
    pub score: f32,
    /// Decoded payload.
    pub payload: RecordPayload,
}

/// Outcome of [`VectorStore::ensure_collection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionStatus {
    /// The collection was already present.
    Existing,
    /// The collection was created by this call.
    Created,
}

/// Storage backend for vectors with similarity search.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Creates the collection with cosine distance unless it already exists.
    async fn ensure_collection(&self, spec: &CollectionSpec) -> Result<CollectionStatus>;

    /// Writes the records and waits for the store to acknowledge them.
    ///
    /// Every vector must match `spec.dimensions` and every payload must match
    /// `spec.kind`; otherwise nothing is written.
    async fn upsert(&self, spec: &CollectionSpec, records: Vec<VectorRecord>) -> Result<()>;

    /// Returns up to `limit` records closest to `vector`, best first.
    ///
    /// Order among equal scores is whatever the store returns and is not
    /// deterministic.
    async fn search(
        &self,
        spec: &CollectionSpec,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredRecord>>;
}

/// Validates a batch against its collection before it is sent anywhere.
pub fn validate_batch(spec: &CollectionSpec, records: &[VectorRecord]) -> Result<()> {
    for record in records {
        spec.check_vector(&record.vector)?;
        if record.payload.kind() != spec.kind {
            return Err(RagError::VectorStore(format!(
                "record {} has a payload that does not belong in collection '{}'",
                record.id, spec.name
            )));
        }
    }
    Ok(())
}

/// Verifies or creates every collection, failing on the first error.
pub async fn bootstrap_collections(
    store: &dyn VectorStore,
    specs: &[&CollectionSpec],
) -> Result<()> {
    for spec in specs {
        match store.ensure_collection(spec).await {
            Ok(status) => info!(
                collection = %spec.name,
                dimensions = spec.dimensions,
                ?status,
                "collection ready"
            ),
            Err(err) => {
                error!(collection = %spec.name, error = %err, "collection bootstrap failed");
                return Err(err);
            }
        }
    }
    Ok(())
}

/// Keyed archive for satellite tracks.
///
/// The backing collection is a plain object store: every record carries the
/// same all-zero placeholder vector and is never searched by similarity.
#[derive(Clone)]
pub struct TrackArchive {
    store: Arc<dyn VectorStore>,
    spec: CollectionSpec,
}

impl TrackArchive {
    /// Wraps a store together with the track collection spec.
    pub fn new(store: Arc<dyn VectorStore>, spec: CollectionSpec) -> Self {
        Self { store, spec }
    }

    /// Writes one track and returns its generated id.
    pub async fn store(&self, payload: SatelliteTrackPayload) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let record = VectorRecord {
            id: id.clone(),
            vector: vec![0.0; self.spec.dimensions],
            payload: RecordPayload::SatelliteTrack(payload),
        };
        self.store.upsert(&self.spec, vec![record]).await?;
        Ok(id)
    }
}
