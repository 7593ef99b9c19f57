use crate::embeddings::{cosine_distance, Embedder};
use crate::traits::VectorIndex;
use crate::{ChunkMetadata, IndexBatch, IndexHits, SearchError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::debug;

pub const LOCAL_INDEX_FILE: &str = "local_index.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LocalEntry {
    id: String,
    document: String,
    metadata: ChunkMetadata,
    embedding: Vec<f32>,
}

/// On-disk layout of `local_index.json`, borrowed when writing.
#[derive(Debug, Serialize, Deserialize)]
struct LocalSnapshot<'a> {
    dimensions: usize,
    entries: Cow<'a, [LocalEntry]>,
}

/// Insertion-ordered entries plus an id lookup kept in step with them.
#[derive(Debug, Default)]
struct EntryTable {
    entries: Vec<LocalEntry>,
    positions: HashMap<String, usize>,
}

impl EntryTable {
    fn from_entries(entries: Vec<LocalEntry>) -> Self {
        let mut table = Self::default();
        for entry in entries {
            table.upsert(entry);
        }
        table
    }

    fn upsert(&mut self, entry: LocalEntry) {
        match self.positions.get(&entry.id) {
            Some(&position) => self.entries[position] = entry,
            None => {
                self.positions.insert(entry.id.clone(), self.entries.len());
                self.entries.push(entry);
            }
        }
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.positions.clear();
    }
}

/// In-process index with brute-force cosine search. Optionally mirrored to a
/// JSON file after every write so separate processes can build and query.
pub struct LocalIndex<E> {
    embedder: E,
    table: RwLock<EntryTable>,
    path: Option<PathBuf>,
}

impl<E: Embedder> LocalIndex<E> {
    pub fn in_memory(embedder: E) -> Self {
        Self {
            embedder,
            table: RwLock::new(EntryTable::default()),
            path: None,
        }
    }

    /// Loads `<storage_root>/local_index.json` when present, otherwise starts empty.
    pub async fn open(storage_root: &Path, embedder: E) -> Result<Self, SearchError> {
        let path = storage_root.join(LOCAL_INDEX_FILE);
        let entries = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let snapshot: LocalSnapshot = serde_json::from_slice(&bytes)?;
                if !snapshot.entries.is_empty() && snapshot.dimensions != embedder.dimensions() {
                    return Err(SearchError::Request(format!(
                        "{} was built with {} dimensions, embedder produces {}",
                        path.display(),
                        snapshot.dimensions,
                        embedder.dimensions()
                    )));
                }
                snapshot.entries.into_owned()
            }
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(error) => return Err(error.into()),
        };

        debug!(path = %path.display(), entries = entries.len(), "local index opened");

        Ok(Self {
            embedder,
            table: RwLock::new(EntryTable::from_entries(entries)),
            path: Some(path),
        })
    }

    async fn persist(&self, entries: &[LocalEntry]) -> Result<(), SearchError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let snapshot = LocalSnapshot {
            dimensions: self.embedder.dimensions(),
            entries: Cow::Borrowed(entries),
        };
        tokio::fs::write(path, serde_json::to_vec(&snapshot)?).await?;
        Ok(())
    }
}

#[async_trait]
impl<E> VectorIndex for LocalIndex<E>
where
    E: Embedder + Send + Sync,
{
    async fn upsert(&self, batch: IndexBatch) -> Result<(), SearchError> {
        let embeddings = self.embedder.embed_batch(batch.documents());
        let mut table = self.table.write().await;

        for ((id, document, metadata), embedding) in batch.iter().zip(embeddings) {
            table.upsert(LocalEntry {
                id: id.clone(),
                document: document.clone(),
                metadata: metadata.clone(),
                embedding,
            });
        }

        self.persist(&table.entries).await
    }

    async fn query(&self, text: &str, k: usize) -> Result<IndexHits, SearchError> {
        let query_vector = self.embedder.embed(text);
        let table = self.table.read().await;

        let mut scored = table
            .entries
            .iter()
            .map(|entry| (cosine_distance(&query_vector, &entry.embedding), entry))
            .collect::<Vec<_>>();
        // stable: ties keep insertion order
        scored.sort_by(|left, right| left.0.total_cmp(&right.0));
        scored.truncate(k);

        let mut hits = IndexHits {
            documents: Vec::with_capacity(scored.len()),
            metadatas: Vec::with_capacity(scored.len()),
            distances: Some(Vec::with_capacity(scored.len())),
        };
        for (distance, entry) in scored {
            hits.documents.push(entry.document.clone());
            hits.metadatas.push(entry.metadata.clone());
            if let Some(distances) = hits.distances.as_mut() {
                distances.push(distance);
            }
        }

        Ok(hits)
    }

    async fn count(&self) -> Result<usize, SearchError> {
        Ok(self.table.read().await.entries.len())
    }

    async fn reset(&self) -> Result<(), SearchError> {
        let mut table = self.table.write().await;
        table.clear();
        self.persist(&table.entries).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::CharacterNgramEmbedder;
    use crate::{DocumentChunk, DocumentType};

    fn chunk(source: &str, chunk_id: usize, content: &str) -> DocumentChunk {
        DocumentChunk {
            content: content.to_string(),
            metadata: ChunkMetadata {
                source: source.to_string(),
                chunk_id,
                total_chunks: 1,
                document_type: DocumentType::CorpusDocument,
                file_path: source.to_string(),
                file_size: None,
                processing_method: None,
            },
        }
    }

    #[tokio::test]
    async fn upsert_replaces_entries_with_the_same_id() -> Result<(), SearchError> {
        let index = LocalIndex::in_memory(CharacterNgramEmbedder::default());

        index
            .upsert(IndexBatch::from_chunks(&[chunk("a.md", 0, "old"), chunk("a.md", 1, "keep")]))
            .await?;
        index
            .upsert(IndexBatch::from_chunks(&[chunk("a.md", 0, "new content")]))
            .await?;

        assert_eq!(index.count().await?, 2);
        let hits = index.query("new content", 1).await?;
        assert_eq!(hits.documents, vec!["new content".to_string()]);
        Ok(())
    }

    #[tokio::test]
    async fn query_orders_by_ascending_distance_and_honours_k() -> Result<(), SearchError> {
        let index = LocalIndex::in_memory(CharacterNgramEmbedder::default());
        index
            .upsert(IndexBatch::from_chunks(&[
                chunk("b.md", 0, "Step one. Step two."),
                chunk("a.md", 0, "Principle one. Principle two."),
                chunk("c.md", 0, "Roadmap governance"),
            ]))
            .await?;

        let hits = index.query("principle", 2).await?;
        let distances = hits.distances.expect("local index reports distances");

        assert_eq!(hits.documents.len(), 2);
        assert_eq!(hits.metadatas[0].source, "a.md");
        assert!(distances[0] <= distances[1]);
        Ok(())
    }

    #[tokio::test]
    async fn snapshot_survives_reopen_and_reset() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;

        let index = LocalIndex::open(dir.path(), CharacterNgramEmbedder::default()).await?;
        index
            .upsert(IndexBatch::from_chunks(&[chunk("a.md", 0, "persisted")]))
            .await?;

        let reopened = LocalIndex::open(dir.path(), CharacterNgramEmbedder::default()).await?;
        assert_eq!(reopened.count().await?, 1);

        reopened.reset().await?;
        let emptied = LocalIndex::open(dir.path(), CharacterNgramEmbedder::default()).await?;
        assert_eq!(emptied.count().await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn repeated_ids_in_one_batch_keep_the_last_entry_in_first_position() -> Result<(), SearchError> {
        let index = LocalIndex::in_memory(CharacterNgramEmbedder::default());
        index
            .upsert(IndexBatch::from_chunks(&[
                chunk("a.md", 0, "first draft"),
                chunk("b.md", 0, "other"),
                chunk("a.md", 0, "final draft"),
            ]))
            .await?;

        assert_eq!(index.count().await?, 2);
        let table = index.table.read().await;
        assert_eq!(table.entries[0].document, "final draft");
        assert_eq!(table.positions["b.md_0"], 1);
        Ok(())
    }

    #[tokio::test]
    async fn snapshot_file_uses_the_snapshot_schema() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let index = LocalIndex::open(dir.path(), CharacterNgramEmbedder { dimensions: 32 }).await?;
        index
            .upsert(IndexBatch::from_chunks(&[chunk("a.md", 0, "persisted")]))
            .await?;

        let bytes = std::fs::read(dir.path().join(LOCAL_INDEX_FILE))?;
        let snapshot: LocalSnapshot<'static> = serde_json::from_slice(&bytes)?;
        assert_eq!(snapshot.dimensions, 32);
        assert_eq!(snapshot.entries.len(), 1);
        assert_eq!(snapshot.entries[0].id, "a.md_0");
        Ok(())
    }

    #[tokio::test]
    async fn reopening_with_other_dimensions_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let index = LocalIndex::open(dir.path(), CharacterNgramEmbedder::default()).await?;
        index
            .upsert(IndexBatch::from_chunks(&[chunk("a.md", 0, "persisted")]))
            .await?;

        let mismatched = LocalIndex::open(dir.path(), CharacterNgramEmbedder { dimensions: 16 }).await;
        assert!(mismatched.is_err());
        Ok(())
    }
}
