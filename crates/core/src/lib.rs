pub mod chunking;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod indexer;
pub mod ingest;
pub mod models;
pub mod normalize;
pub mod ocr;
pub mod retriever;
pub mod stores;
pub mod traits;

pub use chunking::{chunk_text, ChunkingConfig};
pub use embeddings::{cosine_distance, CharacterNgramEmbedder, Embedder, DEFAULT_EMBEDDING_DIMENSIONS};
pub use error::{IngestError, SearchError};
pub use extractor::{
    ExtractionStrategy, LopdfExtractor, PdfExtractExtractor, PdfExtraction, PdfExtractionPipeline,
};
pub use indexer::{read_summary, write_summary, CorpusIndexer, IndexerConfig, SUMMARY_FILE};
pub use ingest::{discover_files, discover_pdf_files};
pub use models::{
    BuildReport, ChunkMetadata, DocumentChunk, DocumentType, IndexBatch, IndexHits, IndexSummary,
    ProcessingMethod, SearchResult, SkippedSource,
};
pub use normalize::TextNormalizer;
pub use ocr::{
    HttpOcrEngine, OcrEndpointConfig, OcrEngine, OcrExtractor, PageRasterizer, PdftoppmRasterizer,
    TesseractEngine,
};
pub use retriever::{
    build_context, confidence, render_context, retain_within_distance, ContextPassage,
    RetrievalConfig, Retriever,
};
pub use stores::{LocalIndex, QdrantStore};
pub use traits::VectorIndex;
