use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    CorpusDocument,
    PdfDocument,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::CorpusDocument => "corpus_document",
            DocumentType::PdfDocument => "pdf_document",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which extraction strategy produced the text of a PDF.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingMethod {
    Lopdf,
    PdfExtract,
    Ocr,
}

impl ProcessingMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingMethod::Lopdf => "lopdf",
            ProcessingMethod::PdfExtract => "pdf_extract",
            ProcessingMethod::Ocr => "ocr",
        }
    }
}

impl fmt::Display for ProcessingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkMetadata {
    pub source: String,
    pub chunk_id: usize,
    pub total_chunks: usize,
    pub document_type: DocumentType,
    pub file_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_method: Option<ProcessingMethod>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentChunk {
    pub content: String,
    pub metadata: ChunkMetadata,
}

impl DocumentChunk {
    /// Stable key of the chunk inside the vector index.
    pub fn index_id(&self) -> String {
        format!("{}_{}", self.metadata.source, self.metadata.chunk_id)
    }
}

/// Parallel `ids` / `documents` / `metadatas` views handed to the index in one
/// upsert. Only constructible from an ordered chunk slice, so position `i` of
/// each view always describes the same chunk.
#[derive(Debug, Clone, Default)]
pub struct IndexBatch {
    ids: Vec<String>,
    documents: Vec<String>,
    metadatas: Vec<ChunkMetadata>,
}

impl IndexBatch {
    pub fn from_chunks(chunks: &[DocumentChunk]) -> Self {
        let mut batch = Self {
            ids: Vec::with_capacity(chunks.len()),
            documents: Vec::with_capacity(chunks.len()),
            metadatas: Vec::with_capacity(chunks.len()),
        };
        for chunk in chunks {
            batch.ids.push(chunk.index_id());
            batch.documents.push(chunk.content.clone());
            batch.metadatas.push(chunk.metadata.clone());
        }
        batch
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn documents(&self) -> &[String] {
        &self.documents
    }

    pub fn metadatas(&self) -> &[ChunkMetadata] {
        &self.metadatas
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String, &ChunkMetadata)> {
        self.ids
            .iter()
            .zip(self.documents.iter())
            .zip(self.metadatas.iter())
            .map(|((id, document), metadata)| (id, document, metadata))
    }
}

/// Raw answer of an index query, in index relevance order.
#[derive(Debug, Clone, Default)]
pub struct IndexHits {
    pub documents: Vec<String>,
    pub metadatas: Vec<ChunkMetadata>,
    pub distances: Option<Vec<f32>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    pub content: String,
    pub metadata: ChunkMetadata,
    pub distance: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexSummary {
    pub total_chunks: usize,
    pub chunks_by_type: BTreeMap<DocumentType, usize>,
    pub sources: Vec<String>,
    pub total_characters: usize,
    pub average_chunk_size: f64,
    pub build_timestamp: DateTime<Utc>,
}

impl IndexSummary {
    pub fn from_chunks(chunks: &[DocumentChunk], build_timestamp: DateTime<Utc>) -> Self {
        let mut chunks_by_type = BTreeMap::new();
        let mut sources = Vec::new();
        let mut total_characters = 0usize;

        for chunk in chunks {
            *chunks_by_type.entry(chunk.metadata.document_type).or_insert(0) += 1;
            sources.push(chunk.metadata.source.clone());
            total_characters += chunk.content.chars().count();
        }
        sources.sort_unstable();
        sources.dedup();

        let average_chunk_size = if chunks.is_empty() {
            0.0
        } else {
            total_characters as f64 / chunks.len() as f64
        };

        Self {
            total_chunks: chunks.len(),
            chunks_by_type,
            sources,
            total_characters,
            average_chunk_size,
            build_timestamp,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SkippedSource {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct BuildReport {
    pub summary: IndexSummary,
    pub skipped: Vec<SkippedSource>,
}
