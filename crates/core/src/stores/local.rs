use crate::embeddings::cosine_similarity;
use crate::models::{Chunk, DocumentRecord, RetrievedChunk};
use crate::traits::VectorIndex;
use crate::SearchError;
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

/// A flat collection of records kept in memory and, when opened from a
/// directory, mirrored to `<dir>/<collection>.json` after every write.
///
/// Search is an exhaustive cosine scan. Ties keep insertion order.
pub struct LocalStore {
    collection: String,
    path: Option<PathBuf>,
    records: RwLock<Vec<DocumentRecord>>,
}

#[derive(Serialize, Deserialize)]
struct CollectionFile {
    collection: String,
    records: Vec<DocumentRecord>,
}

impl LocalStore {
    pub fn in_memory() -> Self {
        Self {
            collection: "memory".to_string(),
            path: None,
            records: RwLock::new(Vec::new()),
        }
    }

    pub async fn open(persist_dir: impl AsRef<Path>, collection: &str) -> Result<Self, SearchError> {
        let persist_dir = persist_dir.as_ref();
        tokio::fs::create_dir_all(persist_dir).await?;
        let path = persist_dir.join(format!("{collection}.json"));

        let records = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice::<CollectionFile>(&bytes)?.records,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(error) => return Err(error.into()),
        };

        info!(
            path = %path.display(),
            record_count = records.len(),
            "local vector store opened"
        );

        Ok(Self {
            collection: collection.to_string(),
            path: Some(path),
            records: RwLock::new(records),
        })
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn persist(&self, records: &[DocumentRecord]) -> Result<(), SearchError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let file = CollectionFile {
            collection: self.collection.clone(),
            records: records.to_vec(),
        };
        let bytes = serde_json::to_vec(&file)?;
        let staging = path.with_extension("json.tmp");

        tokio::fs::write(&staging, bytes)
            .await
            .map_err(|error| SearchError::Persistence(format!("{}: {error}", staging.display())))?;
        tokio::fs::rename(&staging, path)
            .await
            .map_err(|error| SearchError::Persistence(format!("{}: {error}", path.display())))?;

        debug!(path = %path.display(), record_count = records.len(), "collection written");
        Ok(())
    }
}

#[async_trait]
impl VectorIndex for LocalStore {
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

        let mut records = self.records.write().await;

        if let Some(expected) = records.first().map(|record| record.embedding.len()) {
            if let Some(bad) = embeddings.iter().find(|embedding| embedding.len() != expected) {
                return Err(SearchError::Request(format!(
                    "embedding dimension {} != {}",
                    bad.len(),
                    expected
                )));
            }
        }

        let ingested_at = Utc::now();
        let before = records.len();
        records.extend(chunks.iter().zip(embeddings).map(|(chunk, embedding)| {
            DocumentRecord {
                id: Uuid::new_v4().to_string(),
                text: chunk.text.clone(),
                source: Some(chunk.source.clone()),
                embedding: embedding.clone(),
                ingested_at,
            }
        }));

        if let Err(error) = self.persist(&records).await {
            records.truncate(before);
            return Err(error);
        }

        Ok(())
    }

    async fn search_vector(
        &self,
        query_vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk>, SearchError> {
        let records = self.records.read().await;

        let mut scored = records
            .iter()
            .map(|record| (record, cosine_similarity(query_vector, &record.embedding)))
            .collect::<Vec<_>>();
        scored.sort_by(|left, right| right.1.total_cmp(&left.1));

        Ok(scored
            .into_iter()
            .take(top_k)
            .map(|(record, score)| RetrievedChunk {
                text: record.text.clone(),
                source: record.source.clone(),
                score,
            })
            .collect())
    }

    fn backend(&self) -> &str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn chunk(text: &str) -> Chunk {
        Chunk::new(text, "doc.pdf")
    }

    #[tokio::test]
    async fn search_orders_by_similarity() {
        let store = LocalStore::in_memory();
        store
            .add_vectors(
                &[chunk("far"), chunk("near"), chunk("middle")],
                &[vec![0.0, 1.0], vec![1.0, 0.0], vec![1.0, 1.0]],
            )
            .await
            .unwrap();

        let hits = store.search_vector(&[1.0, 0.0], 3).await.unwrap();

        let texts = hits.iter().map(|hit| hit.text.as_str()).collect::<Vec<_>>();
        assert_eq!(texts, vec!["near", "middle", "far"]);
    }

    #[tokio::test]
    async fn ties_keep_insertion_order() {
        let store = LocalStore::in_memory();
        store
            .add_vectors(
                &[chunk("first"), chunk("second")],
                &[vec![1.0, 0.0], vec![1.0, 0.0]],
            )
            .await
            .unwrap();

        let hits = store.search_vector(&[1.0, 0.0], 1).await.unwrap();
        assert_eq!(hits[0].text, "first");
    }

    #[tokio::test]
    async fn dimension_mismatch_is_rejected() {
        let store = LocalStore::in_memory();
        store
            .add_vectors(&[chunk("a")], &[vec![1.0, 0.0]])
            .await
            .unwrap();

        let result = store.add_vectors(&[chunk("b")], &[vec![1.0]]).await;

        assert!(matches!(result, Err(SearchError::Request(_))));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn records_survive_reopen() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;

        {
            let store = LocalStore::open(dir.path(), "manuals").await?;
            assert!(store.is_empty().await);
            store
                .add_vectors(&[chunk("persisted text")], &[vec![0.5, 0.5]])
                .await?;
        }

        assert!(dir.path().join("manuals.json").exists());

        let reopened = LocalStore::open(dir.path(), "manuals").await?;
        assert_eq!(reopened.len().await, 1);
        let hits = reopened.search_vector(&[0.5, 0.5], 1).await?;
        assert_eq!(hits[0].text, "persisted text");
        assert_eq!(hits[0].source.as_deref(), Some("doc.pdf"));
        Ok(())
    }

    #[tokio::test]
    async fn failed_write_rolls_back_memory() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let store = LocalStore::open(dir.path(), "manuals").await?;
        let staging = dir.path().join("manuals.json.tmp");
        std::fs::create_dir(&staging)?;

        let result = store
            .add_vectors(&[chunk("lost text")], &[vec![1.0, 0.0]])
            .await;

        assert!(matches!(result, Err(SearchError::Persistence(_))));
        assert!(store.is_empty().await);

        std::fs::remove_dir(&staging)?;
        store
            .add_vectors(&[chunk("kept text")], &[vec![1.0, 0.0]])
            .await?;
        let reopened = LocalStore::open(dir.path(), "manuals").await?;
        assert_eq!(reopened.len().await, 1);
        Ok(())
    }

    #[tokio::test]
    async fn corrupt_collection_file_fails_to_open() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        std::fs::write(dir.path().join("broken.json"), b"{not json")?;

        let result = LocalStore::open(dir.path(), "broken").await;

        assert!(matches!(result, Err(SearchError::Serialization(_))));
        Ok(())
    }
}
