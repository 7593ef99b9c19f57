use crate::traits::VectorIndex;
use crate::{DocumentType, IndexHits, SearchError, SearchResult};
use serde::{Deserialize, Serialize};

/// Results that saturate the count component of [`confidence`].
pub const CONFIDENT_RESULT_COUNT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrievalConfig {
    pub top_k: usize,
    /// Declared for callers; [`Retriever::search`] never filters on it.
    pub similarity_threshold: f32,
    /// Per-passage cap applied by [`build_context`].
    pub max_passage_chars: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            similarity_threshold: 0.7,
            max_passage_chars: 500,
        }
    }
}

/// Read-only view over the vector index.
pub struct Retriever<I> {
    index: I,
}

impl<I> Retriever<I>
where
    I: VectorIndex + Send + Sync,
{
    pub fn new(index: I) -> Self {
        Self { index }
    }

    /// Up to `k` passages in index relevance order. Index failures are
    /// returned as errors, never as an empty result.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchResult>, SearchError> {
        if query.trim().is_empty() {
            return Err(SearchError::Request("query is empty".to_string()));
        }
        if k == 0 {
            return Err(SearchError::Request("k must be at least 1".to_string()));
        }

        let hits = self.index.query(query, k).await?;
        into_results(hits)
    }
}

fn into_results(hits: IndexHits) -> Result<Vec<SearchResult>, SearchError> {
    let IndexHits {
        documents,
        metadatas,
        distances,
    } = hits;

    let misaligned = metadatas.len() != documents.len()
        || distances
            .as_ref()
            .is_some_and(|distances| distances.len() != documents.len());
    if misaligned {
        return Err(SearchError::BackendResponse {
            backend: "index".to_string(),
            details: "documents, metadatas and distances differ in length".to_string(),
        });
    }

    let mut distances = distances.map(Vec::into_iter);
    Ok(documents
        .into_iter()
        .zip(metadatas)
        .map(|(content, metadata)| SearchResult {
            content,
            metadata,
            distance: distances.as_mut().and_then(|remaining| remaining.next()),
        })
        .collect())
}

/// Heuristic `[0, 1]` summary of result quality: more results and smaller
/// mean distance both raise it. Not a calibrated probability.
pub fn confidence(results: &[SearchResult]) -> f64 {
    if results.is_empty() {
        return 0.0;
    }

    let count_component = (results.len() as f64 / CONFIDENT_RESULT_COUNT as f64).min(1.0);
    let distances: Vec<f64> = results
        .iter()
        .filter_map(|result| result.distance.map(f64::from))
        .collect();

    if distances.is_empty() {
        return round2(count_component);
    }

    let mean_distance = distances.iter().sum::<f64>() / distances.len() as f64;
    let distance_component = (1.0 - mean_distance).max(0.0);
    round2((count_component + distance_component) / 2.0)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Keeps results whose distance is known and at most `max_distance`.
pub fn retain_within_distance(results: Vec<SearchResult>, max_distance: f32) -> Vec<SearchResult> {
    results
        .into_iter()
        .filter(|result| result.distance.is_some_and(|distance| distance <= max_distance))
        .collect()
}

/// One passage handed to the answer-synthesis service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContextPassage {
    pub source: String,
    pub document_type: DocumentType,
    pub content: String,
}

pub fn build_context(results: &[SearchResult], max_chars: usize) -> Vec<ContextPassage> {
    results
        .iter()
        .map(|result| ContextPassage {
            source: result.metadata.source.clone(),
            document_type: result.metadata.document_type,
            content: result.content.chars().take(max_chars).collect(),
        })
        .collect()
}

pub fn render_context(passages: &[ContextPassage]) -> String {
    passages
        .iter()
        .enumerate()
        .map(|(position, passage)| {
            format!(
                "Source {}: {} ({})\nContent: {}",
                position + 1,
                passage.source,
                passage.document_type,
                passage.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
