use crate::embeddings::Embedder;
use crate::error::SearchError;
use crate::models::{Chunk, RetrievedChunk};
use crate::traits::VectorIndex;
use std::sync::Arc;
use tracing::{error, info};

/// Embeds text on the way in and on the way out of a [`VectorIndex`].
#[derive(Clone)]
pub struct VectorStore {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
}

impl VectorStore {
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<dyn VectorIndex>) -> Self {
        Self { embedder, index }
    }

    pub async fn add(&self, chunks: &[Chunk]) -> Result<(), SearchError> {
        if chunks.is_empty() {
            return Ok(());
        }

        info!(
            chunk_count = chunks.len(),
            backend = self.index.backend(),
            "adding chunks to vector store"
        );

        let texts = chunks
            .iter()
            .map(|chunk| chunk.text.clone())
            .collect::<Vec<_>>();

        let embeddings = self
            .embedder
            .embed_documents(&texts)
            .await
            .inspect_err(|err| error!(embedder = self.embedder.name(), error = %err, "embedding chunks failed"))?;

        if embeddings.len() != chunks.len() {
            let err = SearchError::Embedding(format!(
                "embedding count {} doesn't match chunk count {}",
                embeddings.len(),
                chunks.len()
            ));
            error!(error = %err, "embedding batch is incomplete");
            return Err(err);
        }

        self.index
            .add_vectors(chunks, &embeddings)
            .await
            .inspect_err(|err| error!(backend = self.index.backend(), error = %err, "failed to add texts to vector store"))?;

        info!(chunk_count = chunks.len(), "chunks persisted");
        Ok(())
    }

    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<RetrievedChunk>, SearchError> {
        info!(query = %query, k, "semantic search");

        let query_vector = self
            .embedder
            .embed_query(query)
            .await
            .inspect_err(|err| error!(embedder = self.embedder.name(), error = %err, "embedding query failed"))?;

        self.index
            .search_vector(&query_vector, k)
            .await
            .inspect_err(|err| error!(backend = self.index.backend(), error = %err, "similarity search failed"))
    }
}
