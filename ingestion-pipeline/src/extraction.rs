use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, warn};

use common::error::AppError;

/// Extracted document text plus whatever structure the extractor surfaced.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedText {
    pub text: String,
    pub page_count: Option<u32>,
}

/// OCR collaborator used for image MIME types. Absent in most deployments;
/// extraction falls through to the byte-level fallback without it.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    async fn extract(&self, bytes: &[u8]) -> Result<String, AppError>;
}

/// Extract text from document bytes. Dispatches on MIME type with a chain
/// of fallbacks; the final fallback treats the raw bytes as UTF-8, so this
/// never fails outright.
pub async fn extract_text(
    bytes: &Bytes,
    content_type: &str,
    ocr: Option<&dyn OcrEngine>,
) -> ExtractedText {
    let normalized = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_lowercase();

    if normalized == "application/pdf" {
        match extract_pdf(bytes) {
            Ok(extracted) => return extracted,
            Err(err) => {
                warn!(error = %err, "pdf extraction failed; falling back to raw text");
            }
        }
    }

    if normalized.starts_with("image/") {
        if let Some(engine) = ocr {
            match engine.extract(bytes).await {
                Ok(text) => {
                    return ExtractedText {
                        text,
                        page_count: None,
                    }
                }
                Err(err) => {
                    warn!(error = %err, "ocr extraction failed; falling back to raw text");
                }
            }
        }
    }

    lossy_text(bytes)
}

fn extract_pdf(bytes: &Bytes) -> Result<ExtractedText, AppError> {
    let text = pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| AppError::Processing(format!("pdf text extraction: {e}")))?;

    let page_count = match lopdf::Document::load_mem(bytes) {
        Ok(document) => Some(document.get_pages().len() as u32),
        Err(err) => {
            debug!(error = %err, "could not read pdf page count");
            None
        }
    };

    Ok(ExtractedText { text, page_count })
}

fn lossy_text(bytes: &Bytes) -> ExtractedText {
    ExtractedText {
        text: String::from_utf8_lossy(bytes).into_owned(),
        page_count: None,
    }
}
