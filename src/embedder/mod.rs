//! Embedding clients.

use async_trait::async_trait;

use crate::error::Result;

pub mod openai;

/// Turns text into fixed-length vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embeds every input, returning one vector per input in input order.
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Length of every vector this embedder produces.
    fn dimensions(&self) -> usize;
}
