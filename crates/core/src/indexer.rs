use crate::chunking::ChunkingConfig;
use crate::extractor::PdfExtractionPipeline;
use crate::ingest::{corpus_chunks, discover_files, discover_pdf_files, pdf_chunks, PdfProvenance};
use crate::normalize::TextNormalizer;
use crate::traits::VectorIndex;
use crate::{BuildReport, DocumentChunk, IndexBatch, IndexSummary, IngestError, SkippedSource};
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const SUMMARY_FILE: &str = "vector_store_summary.json";

#[derive(Debug, Clone)]
pub struct IndexerConfig {
    pub corpus_dir: PathBuf,
    pub pdf_dir: PathBuf,
    /// Where the index summary is written.
    pub storage_root: PathBuf,
    pub corpus_extensions: Vec<String>,
    pub corpus_chunking: ChunkingConfig,
    pub pdf_chunking: ChunkingConfig,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            corpus_dir: PathBuf::from("./rag_corpus"),
            pdf_dir: PathBuf::from("./pdf_documents"),
            storage_root: PathBuf::from("./vector_db"),
            corpus_extensions: vec!["md".to_string(), "txt".to_string()],
            corpus_chunking: ChunkingConfig::CORPUS_DEFAULT,
            pdf_chunking: ChunkingConfig::PDF_DEFAULT,
        }
    }
}

/// Owns the write path into the vector index. Every build is a full rebuild
/// from the source folders followed by one bulk upsert.
pub struct CorpusIndexer<I> {
    index: I,
    pipeline: Arc<PdfExtractionPipeline>,
    normalizer: TextNormalizer,
    config: IndexerConfig,
}

impl<I> CorpusIndexer<I>
where
    I: VectorIndex + Send + Sync,
{
    pub fn new(
        index: I,
        pipeline: PdfExtractionPipeline,
        config: IndexerConfig,
    ) -> Result<Self, IngestError> {
        Ok(Self {
            index,
            pipeline: Arc::new(pipeline),
            normalizer: TextNormalizer::new()?,
            config,
        })
    }

    pub fn config(&self) -> &IndexerConfig {
        &self.config
    }

    pub fn index(&self) -> &I {
        &self.index
    }

    pub async fn build(&self, include_pdfs: bool) -> Result<BuildReport, IngestError> {
        let mut chunks = Vec::new();
        let mut skipped = Vec::new();

        let corpus_files = discover_sources(&self.config.corpus_dir, |dir| {
            discover_files(dir, &self.config.corpus_extensions)
        });
        info!(count = corpus_files.len(), dir = %self.config.corpus_dir.display(), "corpus sources discovered");

        for path in corpus_files {
            match self.corpus_source(&path).await {
                Ok(source_chunks) => chunks.extend(source_chunks),
                Err(error) => skip(&mut skipped, path, error),
            }
        }

        if include_pdfs {
            let pdf_files = discover_sources(&self.config.pdf_dir, discover_pdf_files);
            info!(count = pdf_files.len(), dir = %self.config.pdf_dir.display(), "pdf sources discovered");

            for path in pdf_files {
                match self.pdf_source(&path).await {
                    Ok(source_chunks) => chunks.extend(source_chunks),
                    Err(error) => skip(&mut skipped, path, error),
                }
            }
        }

        if chunks.is_empty() {
            warn!(skipped = skipped.len(), "no chunks produced, index left untouched");
            return Err(IngestError::EmptyBuild { skipped });
        }

        info!(chunk_count = chunks.len(), "upserting chunks");
        self.index.upsert(IndexBatch::from_chunks(&chunks)).await?;

        let summary = IndexSummary::from_chunks(&chunks, Utc::now());
        let summary_path = write_summary(&self.config.storage_root, &summary).await?;
        info!(
            path = %summary_path.display(),
            total_chunks = summary.total_chunks,
            sources = summary.sources.len(),
            skipped = skipped.len(),
            "index build complete"
        );

        Ok(BuildReport { summary, skipped })
    }

    async fn corpus_source(&self, path: &Path) -> Result<Vec<DocumentChunk>, IngestError> {
        let raw = tokio::fs::read_to_string(path).await?;
        let chunks = corpus_chunks(path, &raw, &self.normalizer, &self.config.corpus_chunking)?;
        ensure_content(path, chunks)
    }

    async fn pdf_source(&self, path: &Path) -> Result<Vec<DocumentChunk>, IngestError> {
        let file_size = tokio::fs::metadata(path).await?.len();

        // extraction strategies block (file parsing, subprocesses, blocking HTTP)
        let pipeline = Arc::clone(&self.pipeline);
        let owned_path = path.to_path_buf();
        let extraction = tokio::task::spawn_blocking(move || pipeline.extract(&owned_path))
            .await
            .map_err(|error| IngestError::PdfParse(format!("extraction task failed: {error}")))?;

        let Some(processing_method) = extraction.method else {
            return Err(IngestError::PdfParse(
                "no extractable text from any strategy".to_string(),
            ));
        };
        debug!(path = %path.display(), %processing_method, "pdf extracted");

        let provenance = PdfProvenance {
            file_size,
            processing_method,
        };
        let chunks = pdf_chunks(
            path,
            &extraction.text,
            provenance,
            &self.normalizer,
            &self.config.pdf_chunking,
        )?;
        ensure_content(path, chunks)
    }
}

fn discover_sources(dir: &Path, discover: impl FnOnce(&Path) -> Vec<PathBuf>) -> Vec<PathBuf> {
    if !dir.is_dir() {
        warn!(dir = %dir.display(), "source directory missing");
        return Vec::new();
    }
    discover(dir)
}

fn ensure_content(path: &Path, chunks: Vec<DocumentChunk>) -> Result<Vec<DocumentChunk>, IngestError> {
    if chunks.is_empty() {
        return Err(IngestError::InvalidArgument(format!(
            "{} has no content after normalization",
            path.display()
        )));
    }
    Ok(chunks)
}

fn skip(skipped: &mut Vec<SkippedSource>, path: PathBuf, error: IngestError) {
    warn!(path = %path.display(), reason = %error, "skipped source");
    skipped.push(SkippedSource {
        path,
        reason: error.to_string(),
    });
}

/// Overwrites `<storage_root>/vector_store_summary.json`.
pub async fn write_summary(storage_root: &Path, summary: &IndexSummary) -> Result<PathBuf, IngestError> {
    tokio::fs::create_dir_all(storage_root).await?;
    let path = storage_root.join(SUMMARY_FILE);
    tokio::fs::write(&path, serde_json::to_vec_pretty(summary)?).await?;
    Ok(path)
}

/// Last persisted summary, if a build ever completed under `storage_root`.
pub async fn read_summary(storage_root: &Path) -> Result<Option<IndexSummary>, IngestError> {
    match tokio::fs::read(storage_root.join(SUMMARY_FILE)).await {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(error) => Err(error.into()),
    }
}
