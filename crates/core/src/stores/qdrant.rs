use crate::models::{Chunk, RetrievedChunk};
use crate::traits::VectorIndex;
use crate::SearchError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tokio::sync::OnceCell;
use tracing::info;
use uuid::Uuid;

pub struct QdrantStore {
    endpoint: String,
    collection: String,
    client: Client,
    vector_size: OnceCell<usize>,
}

impl QdrantStore {
    pub fn new(endpoint: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            collection: collection.into(),
            client: Client::new(),
            vector_size: OnceCell::new(),
        }
    }

    fn collection_url(&self) -> String {
        format!("{}/collections/{}", self.endpoint, self.collection)
    }

    /// Create the collection with cosine distance unless it already exists.
    /// Runs at most once per process.
    pub async fn ensure_collection(&self, vector_size: usize) -> Result<(), SearchError> {
        let created = self
            .vector_size
            .get_or_try_init(|| async {
                let existing = self.client.get(self.collection_url()).send().await?;
                if existing.status().is_success() {
                    return Ok(vector_size);
                }
                if existing.status() != StatusCode::NOT_FOUND {
                    return Err(backend_error(existing.status()));
                }

                let response = self
                    .client
                    .put(self.collection_url())
                    .json(&json!({
                        "vectors": { "size": vector_size, "distance": "Cosine" },
                    }))
                    .send()
                    .await?;
                if !response.status().is_success() {
                    return Err(backend_error(response.status()));
                }

                info!(collection = %self.collection, vector_size, "qdrant collection created");
                Ok::<usize, SearchError>(vector_size)
            })
            .await?;

        if *created != vector_size {
            return Err(SearchError::Request(format!(
                "configured vector size {} does not match requested {}",
                created, vector_size
            )));
        }
        Ok(())
    }
}

fn backend_error(status: StatusCode) -> SearchError {
    SearchError::BackendResponse {
        backend: "qdrant".to_string(),
        details: status.to_string(),
    }
}

#[async_trait]
impl VectorIndex for QdrantStore {
    async fn add_vectors(
        &self,
        chunks: &[Chunk],
        embeddings: &[Vec<f32>],
    ) -> Result<(), SearchError> {
        if chunks.len() != embeddings.len() {
            return Err(SearchError::Request(format!(
                "embedding count {} doesn't match chunk count {}",
                embeddings.len(),
                chunks.len()
            )));
        }

        let Some(vector_size) = embeddings.first().map(Vec::len) else {
            return Ok(());
        };
        self.ensure_collection(vector_size).await?;

        let points = chunks
            .iter()
            .zip(embeddings.iter())
            .map(|(chunk, embedding)| {
                if embedding.len() != vector_size {
                    return Err(SearchError::Request(format!(
                        "embedding dimension {} != {}",
                        embedding.len(),
                        vector_size
                    )));
                }

                Ok(json!({
                    "id": Uuid::new_v4().to_string(),
                    "vector": embedding,
                    "payload": {
                        "text": chunk.text,
                        "source": chunk.source,
                    },
                }))
            })
            .collect::<Result<Vec<_>, SearchError>>()?;

        let response = self
            .client
            .put(format!("{}/points?wait=true", self.collection_url()))
            .json(&json!({ "points": points }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::Persistence(format!(
                "qdrant upsert returned {}",
                response.status()
            )));
        }

        Ok(())
    }

    async fn search_vector(
        &self,
        query_vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk>, SearchError> {
        let response = self
            .client
            .post(format!("{}/points/search", self.collection_url()))
            .json(&json!({
                "vector": query_vector,
                "limit": top_k,
                "with_payload": true,
            }))
            .send()
            .await?;

        // Nothing has been ingested yet.
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            return Err(backend_error(response.status()));
        }

        let parsed: Value = response.json().await?;
        Ok(parse_search_hits(&parsed))
    }

    fn backend(&self) -> &str {
        "qdrant"
    }
}

fn parse_search_hits(parsed: &Value) -> Vec<RetrievedChunk> {
    let hits = parsed
        .pointer("/result")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    hits.iter()
        .map(|hit| RetrievedChunk {
            text: hit
                .pointer("/payload/text")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            source: hit
                .pointer("/payload/source")
                .and_then(Value::as_str)
                .map(str::to_string),
            score: hit.pointer("/score").and_then(Value::as_f64).unwrap_or(0.0),
        })
        .collect()
}
