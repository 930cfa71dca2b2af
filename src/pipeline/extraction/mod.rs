pub mod types;
pub mod pdf;
pub mod ocr;
pub mod orchestrator;

pub use types::*;
pub use pdf::*;
pub use ocr::*;
pub use orchestrator::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported file type for extraction: {0}")]
    UnsupportedFormat(String),

    #[error("PDF parsing failed: {0}")]
    PdfParsing(String),

    #[error("OCR engine initialization failed: {0}")]
    OcrInit(String),

    #[error("OCR processing failed: {0}")]
    OcrProcessing(String),
}
