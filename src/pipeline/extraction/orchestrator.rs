use std::path::Path;

use super::types::{
    ExtractionMethod, ExtractionResult, OcrEngine, PdfExtractor, SupportedFormat, TextExtractor,
};
use super::ExtractionError;

/// Concrete text extractor: reads the stored document and dispatches on
/// the declared file type. Uses trait objects for OCR and PDF extraction,
/// enabling dependency injection.
pub struct DocumentTextExtractor {
    ocr_engine: Box<dyn OcrEngine>,
    pdf_extractor: Box<dyn PdfExtractor>,
}

impl DocumentTextExtractor {
    pub fn new(ocr_engine: Box<dyn OcrEngine>, pdf_extractor: Box<dyn PdfExtractor>) -> Self {
        Self {
            ocr_engine,
            pdf_extractor,
        }
    }
}

impl TextExtractor for DocumentTextExtractor {
    fn extract(
        &self,
        file_path: &Path,
        declared_type: &str,
    ) -> Result<ExtractionResult, ExtractionError> {
        let format = SupportedFormat::from_declared(declared_type)
            .ok_or_else(|| ExtractionError::UnsupportedFormat(declared_type.to_string()))?;

        tracing::info!(
            path = %file_path.display(),
            declared_type,
            "Starting text extraction"
        );

        let bytes = std::fs::read(file_path)?;

        let result = match format {
            SupportedFormat::Pdf => {
                let pages = self.pdf_extractor.extract_text(&bytes)?;
                ExtractionResult {
                    method: ExtractionMethod::PdfDirect,
                    page_count: pages.len(),
                    full_text: pages.join("\n"),
                }
            }
            SupportedFormat::Jpeg | SupportedFormat::Png | SupportedFormat::Tiff => {
                let ocr = self.ocr_engine.ocr_image(&bytes)?;
                tracing::debug!(confidence = ocr.confidence, "OCR completed");
                ExtractionResult {
                    method: ExtractionMethod::Ocr,
                    page_count: 1,
                    full_text: ocr.text,
                }
            }
        };

        tracing::info!(
            method = ?result.method,
            pages = result.page_count,
            text_length = result.full_text.len(),
            "Extraction complete"
        );
        Ok(result)
    }
}
