use serde::{Deserialize, Serialize};

use super::ExtractionError;

/// File types the extractor knows how to turn into text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupportedFormat {
    Pdf,
    Jpeg,
    Png,
    Tiff,
}

impl SupportedFormat {
    /// Resolve the uploader-declared file type. Anything unknown is an
    /// `UnsupportedFormat` at extraction time, not at upload time.
    pub fn from_declared(declared: &str) -> Option<Self> {
        match declared.trim().to_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "jpeg" | "jpg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "tiff" | "tif" => Some(Self::Tiff),
            _ => None,
        }
    }

    pub fn is_image(&self) -> bool {
        !matches!(self, Self::Pdf)
    }
}

/// How text was extracted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExtractionMethod {
    PdfDirect,
    Ocr,
}

/// Result of text extraction from a single document.
/// Either the best-effort full text or an error — never partial text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub method: ExtractionMethod,
    pub full_text: String,
    pub page_count: usize,
}

/// Raw OCR result for one image
#[derive(Debug, Clone)]
pub struct OcrResult {
    pub text: String,
    /// Engine-reported mean confidence, 0.0-1.0.
    pub confidence: f32,
}

/// OCR engine abstraction (allows mocking for tests)
pub trait OcrEngine: Send + Sync {
    fn ocr_image(&self, image_bytes: &[u8]) -> Result<OcrResult, ExtractionError>;
}

/// PDF text-layer extraction abstraction
pub trait PdfExtractor: Send + Sync {
    /// Extract per-page text from an in-memory PDF.
    fn extract_text(&self, pdf_bytes: &[u8]) -> Result<Vec<String>, ExtractionError>;
}

/// Main extraction entry point, implemented by the format dispatcher
pub trait TextExtractor: Send + Sync {
    fn extract(
        &self,
        file_path: &std::path::Path,
        declared_type: &str,
    ) -> Result<ExtractionResult, ExtractionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declared_type_resolution() {
        assert_eq!(SupportedFormat::from_declared("pdf"), Some(SupportedFormat::Pdf));
        assert_eq!(SupportedFormat::from_declared("JPEG"), Some(SupportedFormat::Jpeg));
        assert_eq!(SupportedFormat::from_declared(" jpg "), Some(SupportedFormat::Jpeg));
        assert_eq!(SupportedFormat::from_declared("tif"), Some(SupportedFormat::Tiff));
        assert_eq!(SupportedFormat::from_declared("docx"), None);
        assert_eq!(SupportedFormat::from_declared(""), None);
    }

    #[test]
    fn image_formats_flagged() {
        assert!(!SupportedFormat::Pdf.is_image());
        assert!(SupportedFormat::Png.is_image());
        assert!(SupportedFormat::Tiff.is_image());
    }
}
