use anyhow::{anyhow, Context};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use rag_ingest_core::{
    build_context, confidence, read_summary, render_context, CharacterNgramEmbedder,
    ChunkingConfig, CorpusIndexer, HttpOcrEngine, IndexerConfig, IngestError, LocalIndex,
    OcrEndpointConfig, PdfExtractionPipeline, PdftoppmRasterizer, QdrantStore, RetrievalConfig,
    Retriever, TesseractEngine, VectorIndex,
};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "rag-ingest", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Folder with Markdown / plain-text knowledge-base documents
    #[arg(long, env = "RAG_CORPUS_DIR", default_value = "./rag_corpus")]
    corpus_dir: PathBuf,

    /// Folder with PDF documents
    #[arg(long, env = "RAG_PDF_DIR", default_value = "./pdf_documents")]
    pdf_dir: PathBuf,

    /// Index storage root; the build summary is written here
    #[arg(long, env = "RAG_STORAGE_ROOT", default_value = "./vector_db")]
    storage_root: PathBuf,

    /// Use the file-backed local index under the storage root instead of Qdrant
    #[arg(long, default_value_t = false)]
    local: bool,

    /// Qdrant base URL
    #[arg(long, env = "QDRANT_URL", default_value = "http://localhost:6333")]
    qdrant_url: String,

    /// Qdrant collection
    #[arg(long, env = "QDRANT_COLLECTION", default_value = "ea_corpus")]
    qdrant_collection: String,
}

#[derive(Subcommand)]
enum Command {
    /// Rebuild the index from the corpus (and optionally PDF) folders.
    Build {
        /// Also ingest PDFs from the PDF folder.
        #[arg(long, default_value_t = false)]
        include_pdfs: bool,
        #[arg(long, default_value = "500")]
        corpus_chunk_size: usize,
        #[arg(long, default_value = "50")]
        corpus_chunk_overlap: usize,
        #[arg(long, default_value = "800")]
        pdf_chunk_size: usize,
        #[arg(long, default_value = "100")]
        pdf_chunk_overlap: usize,
        /// Last-resort OCR for PDFs without a text layer.
        #[arg(long, value_enum, default_value = "tesseract")]
        ocr_engine: OcrChoice,
        /// Render resolution for OCR.
        #[arg(long, default_value = "300")]
        ocr_dpi: u32,
    },
    /// Retrieve ranked passages with a confidence estimate.
    Search {
        #[arg(long)]
        query: String,
        /// Number of passages to return.
        #[arg(long, default_value = "5")]
        top_k: usize,
        /// Print the capped context block handed to answer synthesis.
        #[arg(long, default_value_t = false)]
        show_context: bool,
        /// Per-passage character cap for the context block.
        #[arg(long, default_value = "500")]
        max_passage_chars: usize,
    },
    /// Show entry count and the last build summary.
    Info,
    /// Remove every entry from the index.
    Reset,
}

#[derive(Clone, Copy, ValueEnum)]
enum OcrChoice {
    None,
    Tesseract,
    Http,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "rag-ingest boot"
    );

    let embedder = CharacterNgramEmbedder::default();
    if cli.local {
        let index = LocalIndex::open(&cli.storage_root, embedder)
            .await
            .context("opening local index")?;
        run(index, &cli).await
    } else {
        let store = QdrantStore::new(&cli.qdrant_url, &cli.qdrant_collection, embedder)?;
        store
            .ensure_collection()
            .await
            .with_context(|| format!("preparing qdrant collection {}", cli.qdrant_collection))?;
        run(store, &cli).await
    }
}

async fn run<I>(index: I, cli: &Cli) -> anyhow::Result<()>
where
    I: VectorIndex + Send + Sync,
{
    match &cli.command {
        Command::Build {
            include_pdfs,
            corpus_chunk_size,
            corpus_chunk_overlap,
            pdf_chunk_size,
            pdf_chunk_overlap,
            ocr_engine,
            ocr_dpi,
        } => {
            let config = IndexerConfig {
                corpus_dir: cli.corpus_dir.clone(),
                pdf_dir: cli.pdf_dir.clone(),
                storage_root: cli.storage_root.clone(),
                corpus_chunking: ChunkingConfig::new(*corpus_chunk_size, *corpus_chunk_overlap)?,
                pdf_chunking: ChunkingConfig::new(*pdf_chunk_size, *pdf_chunk_overlap)?,
                ..IndexerConfig::default()
            };
            let pipeline = extraction_pipeline(*ocr_engine, *ocr_dpi)?;
            let indexer = CorpusIndexer::new(index, pipeline, config)?;

            match indexer.build(*include_pdfs).await {
                Ok(report) => {
                    for skipped in &report.skipped {
                        warn!(path = %skipped.path.display(), reason = %skipped.reason, "skipped source");
                    }
                    let summary = &report.summary;
                    println!(
                        "{} chunks from {} sources indexed at {}",
                        summary.total_chunks,
                        summary.sources.len(),
                        summary.build_timestamp.to_rfc3339()
                    );
                    for (document_type, count) in &summary.chunks_by_type {
                        println!("  {document_type}: {count}");
                    }
                    println!(
                        "  characters={} average_chunk_size={:.1} skipped={}",
                        summary.total_characters,
                        summary.average_chunk_size,
                        report.skipped.len()
                    );
                }
                Err(IngestError::EmptyBuild { skipped }) => {
                    for source in &skipped {
                        println!("skipped {}: {}", source.path.display(), source.reason);
                    }
                    return Err(anyhow!(
                        "no chunks produced ({} sources skipped); index left untouched",
                        skipped.len()
                    ));
                }
                Err(error) => return Err(error.into()),
            }
        }
        Command::Search {
            query,
            top_k,
            show_context,
            max_passage_chars,
        } => {
            let retrieval = RetrievalConfig {
                top_k: *top_k,
                max_passage_chars: *max_passage_chars,
                ..RetrievalConfig::default()
            };
            let retriever = Retriever::new(index);
            let results = retriever
                .search(query, retrieval.top_k)
                .await
                .context("retrieval failed")?;

            println!("query: {query}");
            if results.is_empty() {
                println!("no matching passages");
            }
            for (position, result) in results.iter().enumerate() {
                let distance = result
                    .distance
                    .map(|distance| format!("{distance:.4}"))
                    .unwrap_or_else(|| "n/a".to_string());
                println!(
                    "[{}] {} ({}) chunk={}/{} distance={}",
                    position + 1,
                    result.metadata.source,
                    result.metadata.document_type,
                    result.metadata.chunk_id,
                    result.metadata.total_chunks,
                    distance
                );
                println!("  {}", result.content);
            }
            println!("confidence: {:.2}", confidence(&results));

            if *show_context {
                let passages = build_context(&results, retrieval.max_passage_chars);
                println!("\n{}", render_context(&passages));
            }
        }
        Command::Info => {
            println!("entries: {}", index.count().await?);
            match read_summary(&cli.storage_root).await? {
                Some(summary) => println!("{}", serde_json::to_string_pretty(&summary)?),
                None => println!("no build summary under {}", cli.storage_root.display()),
            }
        }
        Command::Reset => {
            index.reset().await?;
            println!("index reset at {}", Utc::now().to_rfc3339());
        }
    }

    Ok(())
}

fn extraction_pipeline(choice: OcrChoice, dpi: u32) -> anyhow::Result<PdfExtractionPipeline> {
    let rasterizer = PdftoppmRasterizer { dpi };
    Ok(match choice {
        OcrChoice::None => PdfExtractionPipeline::text_layers_only(),
        OcrChoice::Tesseract => {
            PdfExtractionPipeline::with_ocr(rasterizer, TesseractEngine::default())
        }
        OcrChoice::Http => {
            let endpoint = OcrEndpointConfig::from_env()
                .ok_or_else(|| anyhow!("--ocr-engine http needs LLM_OCR_ENDPOINT"))?;
            PdfExtractionPipeline::with_ocr(rasterizer, HttpOcrEngine::new(endpoint))
        }
    })
}
