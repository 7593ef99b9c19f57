use crate::error::IngestError;
use crate::models::ProcessingMethod;
use crate::ocr::{OcrEngine, OcrExtractor, PageRasterizer};
use lopdf::Document;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use tracing::{debug, warn};

/// One way of turning a PDF into text.
pub trait ExtractionStrategy {
    fn method(&self) -> ProcessingMethod;
    fn extract_text(&self, path: &Path) -> Result<String, IngestError>;
}

/// Reads the text layer page by page with `lopdf`.
#[derive(Debug, Default)]
pub struct LopdfExtractor;

impl ExtractionStrategy for LopdfExtractor {
    fn method(&self) -> ProcessingMethod {
        ProcessingMethod::Lopdf
    }

    fn extract_text(&self, path: &Path) -> Result<String, IngestError> {
        let document =
            Document::load(path).map_err(|error| IngestError::PdfParse(error.to_string()))?;

        let mut pages = Vec::new();
        for page_no in document.get_pages().into_keys() {
            match document.extract_text(&[page_no]) {
                Ok(text) if !text.trim().is_empty() => pages.push(text),
                Ok(_) => {}
                Err(error) => {
                    debug!(path = %path.display(), page = page_no, %error, "lopdf page unreadable");
                }
            }
        }

        Ok(pages.join("\n\n"))
    }
}

/// Alternate text-layer reader; some encoders are only readable by one of the two.
#[derive(Debug, Default)]
pub struct PdfExtractExtractor;

impl ExtractionStrategy for PdfExtractExtractor {
    fn method(&self) -> ProcessingMethod {
        ProcessingMethod::PdfExtract
    }

    fn extract_text(&self, path: &Path) -> Result<String, IngestError> {
        pdf_extract::extract_text(path).map_err(|error| IngestError::PdfParse(error.to_string()))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PdfExtraction {
    pub text: String,
    pub method: Option<ProcessingMethod>,
}

impl PdfExtraction {
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

pub type BoxedStrategy = Box<dyn ExtractionStrategy + Send + Sync>;

/// Ordered fallback over extraction strategies. The first strategy returning
/// non-blank text wins; failures of a strategy never stop the chain.
pub struct PdfExtractionPipeline {
    strategies: Vec<BoxedStrategy>,
}

impl PdfExtractionPipeline {
    pub fn new(strategies: Vec<BoxedStrategy>) -> Self {
        Self { strategies }
    }

    /// `lopdf`, then `pdf-extract`. Image-only PDFs produce no text.
    pub fn text_layers_only() -> Self {
        Self::new(vec![
            Box::new(LopdfExtractor) as BoxedStrategy,
            Box::new(PdfExtractExtractor),
        ])
    }

    /// Both text-layer readers followed by page-wise OCR.
    pub fn with_ocr<R, E>(rasterizer: R, engine: E) -> Self
    where
        R: PageRasterizer + Send + Sync + 'static,
        E: OcrEngine + Send + Sync + 'static,
    {
        Self::new(vec![
            Box::new(LopdfExtractor) as BoxedStrategy,
            Box::new(PdfExtractExtractor),
            Box::new(OcrExtractor::new(rasterizer, engine)),
        ])
    }

    pub fn methods(&self) -> Vec<ProcessingMethod> {
        self.strategies.iter().map(|strategy| strategy.method()).collect()
    }

    /// Never fails: an empty result means the file yielded no content.
    pub fn extract(&self, path: &Path) -> PdfExtraction {
        for strategy in &self.strategies {
            let method = strategy.method();
            let attempt = panic::catch_unwind(AssertUnwindSafe(|| strategy.extract_text(path)));

            match attempt {
                Ok(Ok(text)) if !text.trim().is_empty() => {
                    debug!(path = %path.display(), %method, chars = text.len(), "pdf text extracted");
                    return PdfExtraction {
                        text: text.trim().to_string(),
                        method: Some(method),
                    };
                }
                Ok(Ok(_)) => {
                    debug!(path = %path.display(), %method, "extraction strategy returned no text");
                }
                Ok(Err(error)) => {
                    warn!(path = %path.display(), %method, %error, "extraction strategy failed");
                }
                Err(_) => {
                    warn!(path = %path.display(), %method, "extraction strategy panicked");
                }
            }
        }

        PdfExtraction::default()
    }
}
