// Embeddings module
// Turns chunk text into vectors for the store


pub mod ollama;

use async_trait::async_trait;

use crate::Result;

pub use ollama::{DEFAULT_EMBEDDING_DIMENSION, ModelInfo, OllamaClient};

/// Source of embedding vectors
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed several texts, one vector per input in input order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }
}
