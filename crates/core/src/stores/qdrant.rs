use crate::embeddings::Embedder;
use crate::traits::VectorIndex;
use crate::{ChunkMetadata, IndexBatch, IndexHits, SearchError};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tracing::info;
use url::Url;
use uuid::Uuid;

const BACKEND: &str = "qdrant";

/// Qdrant collection accessed over its HTTP API. Documents are embedded
/// client side with the configured [`Embedder`].
pub struct QdrantStore<E> {
    endpoint: Url,
    collection: String,
    client: Client,
    embedder: E,
}

impl<E: Embedder> QdrantStore<E> {
    pub fn new(endpoint: &str, collection: impl Into<String>, embedder: E) -> Result<Self, SearchError> {
        // trailing slash so `join` appends instead of replacing the last segment
        let endpoint = if endpoint.ends_with('/') {
            Url::parse(endpoint)?
        } else {
            Url::parse(&format!("{endpoint}/"))?
        };

        Ok(Self {
            endpoint,
            collection: collection.into(),
            client: Client::new(),
            embedder,
        })
    }

    fn collection_url(&self, suffix: &str) -> Result<Url, SearchError> {
        Ok(self
            .endpoint
            .join(&format!("collections/{}{}", self.collection, suffix))?)
    }

    /// Creates the collection (cosine distance) when it does not exist yet.
    pub async fn ensure_collection(&self) -> Result<(), SearchError> {
        let response = self.client.get(self.collection_url("")?).send().await?;

        if response.status() == StatusCode::OK {
            return Ok(());
        }
        if response.status() != StatusCode::NOT_FOUND {
            return Err(backend_error(response.status()));
        }

        let response = self
            .client
            .put(self.collection_url("")?)
            .json(&json!({
                "vectors": {
                    "size": self.embedder.dimensions(),
                    "distance": "Cosine",
                }
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(backend_error(response.status()));
        }

        info!(collection = %self.collection, dimensions = self.embedder.dimensions(), "qdrant collection created");
        Ok(())
    }
}

#[async_trait]
impl<E> VectorIndex for QdrantStore<E>
where
    E: Embedder + Send + Sync,
{
    async fn upsert(&self, batch: IndexBatch) -> Result<(), SearchError> {
        if batch.is_empty() {
            return Ok(());
        }

        let embeddings = self.embedder.embed_batch(batch.documents());
        let points = batch
            .iter()
            .zip(embeddings)
            .map(|((id, document, metadata), vector)| {
                Ok(json!({
                    "id": point_id(id),
                    "vector": vector,
                    "payload": {
                        "index_id": id,
                        "content": document,
                        "metadata": serde_json::to_value(metadata)?,
                    },
                }))
            })
            .collect::<Result<Vec<_>, SearchError>>()?;

        let response = self
            .client
            .put(self.collection_url("/points")?)
            .query(&[("wait", "true")])
            .json(&json!({ "points": points }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(backend_error(response.status()));
        }

        Ok(())
    }

    async fn query(&self, text: &str, k: usize) -> Result<IndexHits, SearchError> {
        let vector = self.embedder.embed(text);

        let response = self
            .client
            .post(self.collection_url("/points/search")?)
            .json(&json!({
                "vector": vector,
                "limit": k,
                "with_payload": true,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(backend_error(response.status()));
        }

        let parsed: Value = response.json().await?;
        hits_from_response(&parsed)
    }

    async fn count(&self) -> Result<usize, SearchError> {
        let response = self
            .client
            .post(self.collection_url("/points/count")?)
            .json(&json!({ "exact": true }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(backend_error(response.status()));
        }

        let parsed: Value = response.json().await?;
        parsed
            .pointer("/result/count")
            .and_then(Value::as_u64)
            .map(|count| count as usize)
            .ok_or_else(|| SearchError::BackendResponse {
                backend: BACKEND.to_string(),
                details: "count response without result.count".to_string(),
            })
    }

    async fn reset(&self) -> Result<(), SearchError> {
        let response = self.client.delete(self.collection_url("")?).send().await?;

        if !response.status().is_success() && response.status() != StatusCode::NOT_FOUND {
            return Err(backend_error(response.status()));
        }

        self.ensure_collection().await
    }
}

fn backend_error(status: StatusCode) -> SearchError {
    SearchError::BackendResponse {
        backend: BACKEND.to_string(),
        details: status.to_string(),
    }
}

/// Qdrant only accepts integer or UUID point ids; derive a stable UUID from
/// the `"{source}_{chunk_id}"` key.
fn point_id(index_id: &str) -> String {
    let digest = Sha256::digest(index_id.as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    Uuid::from_bytes(bytes).to_string()
}

fn hits_from_response(parsed: &Value) -> Result<IndexHits, SearchError> {
    let hits = parsed
        .pointer("/result")
        .and_then(Value::as_array)
        .ok_or_else(|| SearchError::BackendResponse {
            backend: BACKEND.to_string(),
            details: "search response without result array".to_string(),
        })?;

    let mut result = IndexHits {
        documents: Vec::with_capacity(hits.len()),
        metadatas: Vec::with_capacity(hits.len()),
        distances: Some(Vec::with_capacity(hits.len())),
    };

    for hit in hits {
        let content = hit
            .pointer("/payload/content")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let metadata: ChunkMetadata = serde_json::from_value(
            hit.pointer("/payload/metadata").cloned().unwrap_or(Value::Null),
        )?;
        let score = hit.pointer("/score").and_then(Value::as_f64).unwrap_or(0.0);

        result.documents.push(content);
        result.metadatas.push(metadata);
        if let Some(distances) = result.distances.as_mut() {
            distances.push((1.0 - score) as f32);
        }
    }

    Ok(result)
}
