use crate::{IndexBatch, IndexHits, SearchError};
use async_trait::async_trait;

/// Similarity-searchable store the pipeline writes chunks into and reads
/// passages from. Implementations own embedding and persistence.
#[async_trait]
pub trait VectorIndex {
    /// Inserts or replaces every entry of the batch, keyed by its ids.
    async fn upsert(&self, batch: IndexBatch) -> Result<(), SearchError>;

    /// Returns at most `k` entries in relevance order.
    async fn query(&self, text: &str, k: usize) -> Result<IndexHits, SearchError>;

    async fn count(&self) -> Result<usize, SearchError>;

    /// Drops every entry.
    async fn reset(&self) -> Result<(), SearchError>;
}

#[async_trait]
impl<T> VectorIndex for std::sync::Arc<T>
where
    T: VectorIndex + Send + Sync + ?Sized,
{
    async fn upsert(&self, batch: IndexBatch) -> Result<(), SearchError> {
        (**self).upsert(batch).await
    }

    async fn query(&self, text: &str, k: usize) -> Result<IndexHits, SearchError> {
        (**self).query(text, k).await
    }

    async fn count(&self) -> Result<usize, SearchError> {
        (**self).count().await
    }

    async fn reset(&self) -> Result<(), SearchError> {
        (**self).reset().await
    }
}
