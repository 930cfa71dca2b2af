use super::types::{OcrEngine, OcrResult};
use super::ExtractionError;

/// Tesseract OCR engine.
/// Only available when compiled with the `ocr` feature flag.
#[cfg(feature = "ocr")]
pub struct TesseractOcr {
    tessdata_dir: std::path::PathBuf,
    lang: String,
}

#[cfg(feature = "ocr")]
impl TesseractOcr {
    /// Initialize with a tessdata directory.
    pub fn new(tessdata_dir: &std::path::Path) -> Result<Self, ExtractionError> {
        if !tessdata_dir.join("eng.traineddata").exists() {
            return Err(ExtractionError::OcrInit(format!(
                "Tessdata not found at: {}",
                tessdata_dir.display()
            )));
        }

        Ok(Self {
            tessdata_dir: tessdata_dir.to_path_buf(),
            lang: "eng".to_string(),
        })
    }

    /// Set language(s) for OCR (e.g., "eng", "eng+fra")
    pub fn with_languages(mut self, langs: &str) -> Self {
        self.lang = langs.to_string();
        self
    }
}

#[cfg(feature = "ocr")]
impl OcrEngine for TesseractOcr {
    fn ocr_image(&self, image_bytes: &[u8]) -> Result<OcrResult, ExtractionError> {
        let tessdata_str = self
            .tessdata_dir
            .to_str()
            .ok_or_else(|| ExtractionError::OcrInit("Invalid tessdata path".into()))?;

        let tess = tesseract::Tesseract::new(Some(tessdata_str), Some(&self.lang))
            .map_err(|e| ExtractionError::OcrInit(format!("{e:?}")))?;

        let mut tess = tess
            .set_image_from_mem(image_bytes)
            .map_err(|e| ExtractionError::OcrProcessing(format!("{e:?}")))?;

        let text = tess
            .get_text()
            .map_err(|e| ExtractionError::OcrProcessing(format!("{e:?}")))?;

        let confidence = tess.mean_text_conf().max(0) as f32 / 100.0;

        Ok(OcrResult { text, confidence })
    }
}

/// Stand-in engine for builds without the `ocr` feature. Image reports
/// fail extraction outright (full text or nothing — no placeholder text
/// that parsing would silently treat as an empty document).
pub struct DisabledOcr;

impl OcrEngine for DisabledOcr {
    fn ocr_image(&self, _image_bytes: &[u8]) -> Result<OcrResult, ExtractionError> {
        Err(ExtractionError::OcrInit(
            "built without the `ocr` feature; image extraction unavailable".into(),
        ))
    }
}

/// Mock OCR engine for testing — returns a configurable result.
pub struct MockOcrEngine {
    pub text: String,
    pub confidence: f32,
}

impl MockOcrEngine {
    pub fn new(text: &str, confidence: f32) -> Self {
        Self {
            text: text.to_string(),
            confidence,
        }
    }
}

impl OcrEngine for MockOcrEngine {
    fn ocr_image(&self, _image_bytes: &[u8]) -> Result<OcrResult, ExtractionError> {
        Ok(OcrResult {
            text: self.text.clone(),
            confidence: self.confidence,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_engine_echoes_configured_text() {
        let engine = MockOcrEngine::new("Glucose: 110 mg/dL", 0.92);
        let result = engine.ocr_image(b"fake_image_bytes").unwrap();
        assert_eq!(result.text, "Glucose: 110 mg/dL");
        assert!((result.confidence - 0.92).abs() < f32::EPSILON);
    }

    #[test]
    fn disabled_engine_fails_closed() {
        let result = DisabledOcr.ocr_image(b"scan");
        assert!(matches!(result, Err(ExtractionError::OcrInit(_))));
    }
}
