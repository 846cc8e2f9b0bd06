#![warn(missing_docs)]
//! Core library entry points for the orbitrag document and tracking service.

pub mod api;
pub mod chunker;
pub mod completion;
pub mod config;
pub mod embedder;
pub mod error;
pub mod extract;
pub mod rag;
pub mod tracking;
pub mod vector_store;

pub use api::{router, AppState};
pub use chunker::{chunk_text, DocumentChunk, DEFAULT_CHUNK_CHARS};
pub use completion::{ChatMessage, Completer, CompletionStrategy, OpenAiCompleter, Role};
pub use config::{PipelineSettings, ServiceCli};
pub use embedder::{openai::OpenAiEmbedder, Embedder};
pub use error::{RagError, Result};
pub use rag::{ChatAnswer, Citation, IngestOutcome, RagService, MAX_CONTEXT_RESULTS};
pub use tracking::{N2yoClient, NlqParams, TrackRequest};
pub use vector_store::{
    bootstrap_collections, qdrant::QdrantStore, CollectionSpec, RecordPayload, TrackArchive,
    VectorRecord, VectorStore,
};
