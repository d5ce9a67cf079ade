use crate::error::{LlmError, SearchError};
use crate::models::{Chunk, RetrievedChunk};
use async_trait::async_trait;

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Persist `chunks` alongside their embeddings. The two slices are
    /// parallel.
    async fn add_vectors(
        &self,
        chunks: &[Chunk],
        embeddings: &[Vec<f32>],
    ) -> Result<(), SearchError>;

    /// Return up to `top_k` records in decreasing similarity to `query_vector`.
    async fn search_vector(
        &self,
        query_vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk>, SearchError>;

    fn backend(&self) -> &str;
}

#[async_trait]
pub trait ChatModel: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, prompt: &str) -> Result<String, LlmError>;
}
