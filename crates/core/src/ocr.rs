//! Page-wise OCR used as the last extraction strategy for image-only PDFs.

use crate::error::IngestError;
use crate::extractor::ExtractionStrategy;
use crate::models::ProcessingMethod;
use base64::{engine::general_purpose::STANDARD, Engine};
use lopdf::Document;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;
use tracing::{debug, warn};

/// Renders single PDF pages to raster images.
pub trait PageRasterizer {
    fn page_count(&self, path: &Path) -> Result<u32, IngestError>;

    /// Renders 1-based `page` into `out_dir` and returns the image path.
    fn render_page(&self, path: &Path, page: u32, out_dir: &Path) -> Result<PathBuf, IngestError>;
}

/// Turns one page image into text.
pub trait OcrEngine {
    fn recognize(&self, image: &Path) -> Result<String, IngestError>;
}

pub struct OcrExtractor<R, E> {
    rasterizer: R,
    engine: E,
}

impl<R, E> OcrExtractor<R, E> {
    pub fn new(rasterizer: R, engine: E) -> Self {
        Self { rasterizer, engine }
    }
}

impl<R, E> ExtractionStrategy for OcrExtractor<R, E>
where
    R: PageRasterizer,
    E: OcrEngine,
{
    fn method(&self) -> ProcessingMethod {
        ProcessingMethod::Ocr
    }

    fn extract_text(&self, path: &Path) -> Result<String, IngestError> {
        let page_count = self.rasterizer.page_count(path)?;
        let workdir = tempfile::tempdir()?;
        let mut pages = Vec::new();

        for page in 1..=page_count {
            let image = match self.rasterizer.render_page(path, page, workdir.path()) {
                Ok(image) => image,
                Err(error) => {
                    warn!(path = %path.display(), page, %error, "page render failed");
                    continue;
                }
            };

            match self.engine.recognize(&image) {
                Ok(text) if !text.trim().is_empty() => pages.push(text.trim().to_string()),
                Ok(_) => debug!(path = %path.display(), page, "OCR found no text on page"),
                Err(error) => warn!(path = %path.display(), page, %error, "page OCR failed"),
            }
        }

        Ok(pages.join("\n\n"))
    }
}

/// Rasterizes with poppler's `pdftoppm`.
#[derive(Debug, Clone, Copy)]
pub struct PdftoppmRasterizer {
    pub dpi: u32,
}

impl Default for PdftoppmRasterizer {
    fn default() -> Self {
        Self { dpi: 300 }
    }
}

impl PageRasterizer for PdftoppmRasterizer {
    fn page_count(&self, path: &Path) -> Result<u32, IngestError> {
        let document =
            Document::load(path).map_err(|error| IngestError::PdfParse(error.to_string()))?;
        Ok(document.get_pages().len() as u32)
    }

    fn render_page(&self, path: &Path, page: u32, out_dir: &Path) -> Result<PathBuf, IngestError> {
        let binary = which::which("pdftoppm")
            .map_err(|_| IngestError::ToolNotFound("pdftoppm".to_string()))?;

        let prefix = out_dir.join(format!("page-{page}"));
        let page_arg = page.to_string();
        let dpi_arg = self.dpi.to_string();
        let output = Command::new(binary)
            .args(["-f", page_arg.as_str(), "-l", page_arg.as_str()])
            .args(["-r", dpi_arg.as_str()])
            .args(["-png", "-singlefile"])
            .arg(path)
            .arg(&prefix)
            .output()?;

        if !output.status.success() {
            return Err(IngestError::OcrFailed(format!(
                "pdftoppm failed on page {page} of {}: {}",
                path.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(prefix.with_extension("png"))
    }
}

/// Local OCR with the `tesseract` CLI.
#[derive(Debug, Clone, Default)]
pub struct TesseractEngine {
    pub language: Option<String>,
}

impl OcrEngine for TesseractEngine {
    fn recognize(&self, image: &Path) -> Result<String, IngestError> {
        let binary = which::which("tesseract")
            .map_err(|_| IngestError::ToolNotFound("tesseract".to_string()))?;

        let mut command = Command::new(binary);
        command
            .arg(image)
            .arg("stdout")
            .args(["--oem", "3"])
            .args(["--psm", "1"]);
        if let Some(language) = &self.language {
            command.args(["-l", language.as_str()]);
        }

        let output = command.output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            // tesseract reports warnings on stderr with a non-zero exit but usable output
            if output.stdout.is_empty() {
                return Err(IngestError::OcrFailed(stderr.trim().to_string()));
            }
            debug!(image = %image.display(), warning = %stderr.trim(), "tesseract warning");
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[derive(Debug, Clone)]
pub struct OcrEndpointConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
}

impl OcrEndpointConfig {
    /// Reads `LLM_OCR_ENDPOINT` and the optional `LLM_OCR_API_KEY`.
    pub fn from_env() -> Option<Self> {
        let endpoint = std::env::var("LLM_OCR_ENDPOINT").ok()?;
        let endpoint = endpoint.trim().to_string();
        if endpoint.is_empty() {
            return None;
        }

        let api_key = std::env::var("LLM_OCR_API_KEY").ok().and_then(|value| {
            let key = value.trim().to_string();
            if key.is_empty() {
                None
            } else {
                Some(key)
            }
        });

        Some(Self { endpoint, api_key })
    }
}

#[derive(Debug, Clone, Serialize)]
struct OcrRequest {
    image_base64: String,
    image_name: String,
}

#[derive(Debug, Clone, Deserialize)]
struct OcrResponse {
    #[serde(default)]
    pages: Option<Vec<OcrPage>>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct OcrPage {
    #[serde(default)]
    text: Option<String>,
}

/// Sends page images to a multimodal OCR HTTP endpoint.
///
/// Uses the blocking reqwest client, so it must run off the async runtime
/// (the indexer extracts PDFs on the blocking pool). The client is created on
/// the first recognition and shared by every later page.
#[derive(Debug, Clone)]
pub struct HttpOcrEngine {
    config: OcrEndpointConfig,
    client: OnceLock<Client>,
}

impl HttpOcrEngine {
    pub fn new(config: OcrEndpointConfig) -> Self {
        Self {
            config,
            client: OnceLock::new(),
        }
    }

    fn client(&self) -> Result<&Client, IngestError> {
        if let Some(client) = self.client.get() {
            return Ok(client);
        }
        let client = Client::builder().build()?;
        Ok(self.client.get_or_init(|| client))
    }
}

impl OcrEngine for HttpOcrEngine {
    fn recognize(&self, image: &Path) -> Result<String, IngestError> {
        let bytes = std::fs::read(image)?;
        let payload = OcrRequest {
            image_base64: STANDARD.encode(bytes),
            image_name: image
                .file_name()
                .map(|name| name.to_string_lossy().to_string())
                .unwrap_or_default(),
        };

        let mut request = self
            .client()?
            .post(&self.config.endpoint)
            .header("content-type", "application/json")
            .json(&payload);

        if let Some(api_key) = &self.config.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send()?;

        if !response.status().is_success() {
            return Err(IngestError::OcrFailed(format!(
                "OCR request to {} returned {}",
                self.config.endpoint,
                response.status()
            )));
        }

        let payload: OcrResponse = response.json()?;
        Ok(payload_to_text(&payload))
    }
}

fn payload_to_text(payload: &OcrResponse) -> String {
    if let Some(listed) = &payload.pages {
        let joined = listed
            .iter()
            .filter_map(|page| page.text.as_deref().map(str::trim))
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n");

        if !joined.is_empty() {
            return joined;
        }
    }

    payload
        .text
        .as_deref()
        .map(str::trim)
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::{
        payload_to_text, HttpOcrEngine, OcrEndpointConfig, OcrPage, OcrResponse, PageRasterizer,
        PdftoppmRasterizer,
    };

    #[test]
    fn ocr_payload_with_pages_keeps_only_nonempty_text() {
        let response = OcrResponse {
            pages: Some(vec![
                OcrPage {
                    text: Some("  ".to_string()),
                },
                OcrPage {
                    text: Some("Scanned line".to_string()),
                },
            ]),
            text: Some("ignored".to_string()),
        };

        assert_eq!(payload_to_text(&response), "Scanned line");
    }

    #[test]
    fn ocr_payload_falls_back_to_plain_text() {
        let response = OcrResponse {
            pages: Some(Vec::new()),
            text: Some("  Whole page\n".to_string()),
        };

        assert_eq!(payload_to_text(&response), "Whole page");
    }

    #[test]
    fn ocr_payload_without_text_is_empty() {
        let response: OcrResponse =
            serde_json::from_str("{}").expect("empty object should deserialize");
        assert_eq!(payload_to_text(&response), "");
    }

    #[test]
    fn http_engine_reuses_one_client_across_pages() -> Result<(), crate::IngestError> {
        let engine = HttpOcrEngine::new(OcrEndpointConfig {
            endpoint: "http://localhost:9/ocr".to_string(),
            api_key: None,
        });

        let first = engine.client()?;
        let second = engine.client()?;
        assert!(std::ptr::eq(first, second));
        Ok(())
    }

    #[test]
    fn page_count_of_unparseable_pdf_is_an_error() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"not a pdf")?;

        assert!(PdftoppmRasterizer::default().page_count(&path).is_err());
        Ok(())
    }
}
