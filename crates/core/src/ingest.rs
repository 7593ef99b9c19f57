use crate::chunking::{chunk_text, ChunkingConfig};
use crate::normalize::TextNormalizer;
use crate::{ChunkMetadata, DocumentChunk, DocumentType, IngestError, ProcessingMethod};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Files directly inside `folder` whose extension matches one of
/// `extensions`, case-insensitively. Sorted so builds are reproducible.
///
/// Subfolders are not scanned: chunk ids are keyed by file name, so two
/// nested files sharing a name would overwrite each other in the index.
pub fn discover_files(folder: &Path, extensions: &[String]) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .max_depth(1)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let matches = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| extensions.iter().any(|wanted| wanted.eq_ignore_ascii_case(ext)));

        if matches {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

pub fn discover_pdf_files(folder: &Path) -> Vec<PathBuf> {
    discover_files(folder, &["pdf".to_string()])
}

pub fn source_name(path: &Path) -> Result<String, IngestError> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| IngestError::MissingFileName(path.display().to_string()))
}

/// PDF-only provenance attached to every chunk of the file.
#[derive(Debug, Clone, Copy)]
pub struct PdfProvenance {
    pub file_size: u64,
    pub processing_method: ProcessingMethod,
}

/// Normalizes and chunks a plain-text corpus document.
pub fn corpus_chunks(
    path: &Path,
    raw: &str,
    normalizer: &TextNormalizer,
    config: &ChunkingConfig,
) -> Result<Vec<DocumentChunk>, IngestError> {
    let normalized = normalizer.normalize(raw);
    let pieces = chunk_text(&normalized, config);
    label_chunks(path, pieces, DocumentType::CorpusDocument, None)
}

/// Normalizes (PDF mode) and chunks the text extracted from a PDF.
pub fn pdf_chunks(
    path: &Path,
    extracted: &str,
    provenance: PdfProvenance,
    normalizer: &TextNormalizer,
    config: &ChunkingConfig,
) -> Result<Vec<DocumentChunk>, IngestError> {
    let normalized = normalizer.normalize_pdf(extracted);
    let pieces = chunk_text(&normalized, config);
    label_chunks(path, pieces, DocumentType::PdfDocument, Some(provenance))
}

fn label_chunks(
    path: &Path,
    pieces: Vec<String>,
    document_type: DocumentType,
    provenance: Option<PdfProvenance>,
) -> Result<Vec<DocumentChunk>, IngestError> {
    let source = source_name(path)?;
    let total_chunks = pieces.len();
    let file_path = path.to_string_lossy().to_string();

    Ok(pieces
        .into_iter()
        .enumerate()
        .map(|(chunk_id, content)| DocumentChunk {
            content,
            metadata: ChunkMetadata {
                source: source.clone(),
                chunk_id,
                total_chunks,
                document_type,
                file_path: file_path.clone(),
                file_size: provenance.map(|pdf| pdf.file_size),
                processing_method: provenance.map(|pdf| pdf.processing_method),
            },
        })
        .collect())
}
