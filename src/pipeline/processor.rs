//! Analysis orchestrator.
//!
//! Single entry point that drives the full pipeline for one report:
//! extract → parse → evaluate → summarize → persist, with the status
//! column as the persisted state machine. Uses trait-based DI for the
//! extraction engines and the LLM so every stage is testable with mocks.

use std::path::Path;
use std::time::Instant;

use chrono::Utc;
use rusqlite::Connection;
use uuid::Uuid;

use crate::config::{AnalysisConfig, ANALYSIS_VERSION};
use crate::db::repository;
use crate::db::DatabaseError;
use crate::models::analysis::ReportAnalysis;
use crate::models::enums::ReportStatus;
use crate::models::Report;
use crate::pipeline::evaluation::{evaluate, ReferenceRangeTable};
use crate::pipeline::extraction::{
    DisabledOcr, DocumentTextExtractor, ExtractionError, OcrEngine, PdfTextExtractor,
    TextExtractor,
};
use crate::pipeline::parser::MeasurementParser;
use crate::pipeline::summary::{OllamaClient, ReportSummarizer};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that abort an analysis run.
///
/// Summarization faults are deliberately absent: they degrade inside the
/// summarizer and never abort a run.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("Extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Report {id} not claimable (status: {status})")]
    NotClaimable { id: Uuid, status: ReportStatus },
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Drives the extract → parse → evaluate → summarize pipeline and owns
/// every status transition for the reports it runs.
pub struct ReportAnalyzer {
    extractor: Box<dyn TextExtractor>,
    summarizer: ReportSummarizer,
    parser: MeasurementParser,
    table: ReferenceRangeTable,
    version: String,
}

impl ReportAnalyzer {
    pub fn new(
        extractor: Box<dyn TextExtractor>,
        summarizer: ReportSummarizer,
        table: ReferenceRangeTable,
    ) -> Self {
        Self {
            extractor,
            summarizer,
            parser: MeasurementParser::new(),
            table,
            version: ANALYSIS_VERSION.to_string(),
        }
    }

    /// Run one full analysis for the given report.
    ///
    /// Claims `pending → analyzing` atomically before any work; if the
    /// claim is lost the run stops with `NotClaimable` and touches
    /// nothing. The claim is persisted first so a crash mid-run shows up
    /// as stuck-in-`analyzing`, never as silently `pending`.
    ///
    /// On stage failure the report flips to `error` with no partial
    /// result — an incomplete interpreted mapping could be mistaken for
    /// a complete one.
    pub fn analyze_report(
        &self,
        conn: &Connection,
        report_id: &Uuid,
    ) -> Result<ReportAnalysis, AnalysisError> {
        let report =
            repository::get_report(conn, report_id)?.ok_or_else(|| DatabaseError::NotFound {
                entity_type: "Report".into(),
                id: report_id.to_string(),
            })?;

        if !repository::claim_status(
            conn,
            report_id,
            &ReportStatus::Pending,
            &ReportStatus::Analyzing,
        )? {
            return Err(AnalysisError::NotClaimable {
                id: *report_id,
                status: current_status(conn, report_id)?,
            });
        }

        tracing::info!(
            report_id = %report_id,
            report_number = %report.report_number,
            "Analysis started"
        );
        let started = Instant::now();

        match self.run_stages(&report) {
            Ok(mut analysis) => {
                analysis.duration_ms = started.elapsed().as_millis() as u64;
                repository::save_analysis(conn, report_id, &analysis)?;
                tracing::info!(
                    report_id = %report_id,
                    parameters = analysis.raw_values.len(),
                    findings = analysis.findings.len(),
                    duration_ms = analysis.duration_ms,
                    "Analysis complete"
                );
                Ok(analysis)
            }
            Err(e) => {
                tracing::error!(report_id = %report_id, error = %e, "Analysis failed");
                if let Err(persist_err) =
                    repository::update_status(conn, report_id, &ReportStatus::Error)
                {
                    tracing::error!(
                        report_id = %report_id,
                        error = %persist_err,
                        "Failed to persist error status"
                    );
                }
                Err(e)
            }
        }
    }

    fn run_stages(&self, report: &Report) -> Result<ReportAnalysis, AnalysisError> {
        let extraction = self
            .extractor
            .extract(Path::new(&report.file_path), &report.file_type)?;

        let raw_values = self.parser.parse(&extraction.full_text);
        let evaluation = evaluate(&self.table, &raw_values);
        let summary = self
            .summarizer
            .summarize(&evaluation.interpreted, &evaluation.findings);

        Ok(ReportAnalysis {
            raw_values,
            interpreted: evaluation.interpreted,
            summary,
            findings: evaluation.findings,
            analyzed_at: Utc::now().naive_utc(),
            analysis_version: self.version.clone(),
            duration_ms: 0,
        })
    }
}

/// Reset a report for re-analysis, subject to the single-writer rule:
/// allowed from `error` and `analyzed`, rejected while `analyzing`.
/// The next run starts from scratch and overwrites the prior result.
pub fn retry_report(conn: &Connection, report_id: &Uuid) -> Result<(), AnalysisError> {
    if !repository::reset_for_retry(conn, report_id)? {
        return Err(AnalysisError::NotClaimable {
            id: *report_id,
            status: current_status(conn, report_id)?,
        });
    }
    tracing::info!(report_id = %report_id, "Report reset for re-analysis");
    Ok(())
}

fn current_status(conn: &Connection, report_id: &Uuid) -> Result<ReportStatus, AnalysisError> {
    let report =
        repository::get_report(conn, report_id)?.ok_or_else(|| DatabaseError::NotFound {
            entity_type: "Report".into(),
            id: report_id.to_string(),
        })?;
    Ok(report.status)
}

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

/// Build a `ReportAnalyzer` with production implementations:
/// pdf-extract for PDFs, Tesseract for images (feature-gated), Ollama
/// for summaries, and the bundled reference table.
pub fn build_analyzer(config: &AnalysisConfig) -> ReportAnalyzer {
    let extractor = Box::new(DocumentTextExtractor::new(
        build_ocr_engine(),
        Box::new(PdfTextExtractor),
    ));

    let llm = OllamaClient::new(&config.llm_base_url, config.llm_timeout_secs);
    let summarizer = ReportSummarizer::new(Box::new(llm), &config.llm_model);

    ReportAnalyzer::new(extractor, summarizer, ReferenceRangeTable::bundled())
}

/// Build the OCR engine, respecting feature flags. Without a working
/// engine, image reports fail extraction and land in `error` — PDFs
/// still analyze fine.
fn build_ocr_engine() -> Box<dyn OcrEngine> {
    #[cfg(feature = "ocr")]
    {
        if let Ok(tessdata) = find_tessdata_dir() {
            match crate::pipeline::extraction::TesseractOcr::new(&tessdata) {
                Ok(engine) => {
                    tracing::info!(tessdata = %tessdata.display(), "Tesseract OCR initialized");
                    return Box::new(engine);
                }
                Err(e) => tracing::warn!(error = %e, "Tesseract init failed"),
            }
        } else {
            tracing::warn!("Tesseract data not found — image reports will fail extraction");
        }
    }

    Box::new(DisabledOcr)
}

/// Locate tessdata directory from environment or system paths.
#[cfg(feature = "ocr")]
fn find_tessdata_dir() -> Result<std::path::PathBuf, ExtractionError> {
    if let Ok(path) = std::env::var("TESSDATA_PREFIX") {
        let p = std::path::PathBuf::from(&path);
        if p.join("eng.traineddata").exists() {
            return Ok(p);
        }
    }

    let candidates = [
        "/usr/share/tesseract-ocr/5/tessdata",
        "/usr/share/tesseract-ocr/4.00/tessdata",
        "/usr/share/tessdata",
        "/usr/local/share/tessdata",
        "/opt/homebrew/share/tessdata",
    ];

    for path in &candidates {
        let p = std::path::PathBuf::from(path);
        if p.join("eng.traineddata").exists() {
            return Ok(p);
        }
    }

    Err(ExtractionError::OcrInit(
        "Tesseract data directory not found. Set TESSDATA_PREFIX or install tesseract-ocr-eng"
            .into(),
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;
    use crate::models::enums::{MeasurementStatus, TestType};
    use crate::models::NewReport;
    use crate::pipeline::extraction::{ExtractionMethod, ExtractionResult, MockOcrEngine};
    use crate::pipeline::summary::{FailingLlmClient, MockLlmClient, SUMMARY_UNAVAILABLE};

    // -- Mock extractors -----------------------------------------------------

    struct FixedTextExtractor(String);

    impl TextExtractor for FixedTextExtractor {
        fn extract(
            &self,
            _file_path: &Path,
            _declared_type: &str,
        ) -> Result<ExtractionResult, ExtractionError> {
            Ok(ExtractionResult {
                method: ExtractionMethod::PdfDirect,
                full_text: self.0.clone(),
                page_count: 1,
            })
        }
    }

    struct BrokenExtractor;

    impl TextExtractor for BrokenExtractor {
        fn extract(
            &self,
            _file_path: &Path,
            _declared_type: &str,
        ) -> Result<ExtractionResult, ExtractionError> {
            Err(ExtractionError::PdfParsing("corrupt file".into()))
        }
    }

    // -- Helpers -------------------------------------------------------------

    fn analyzer_with(text: &str, llm: Box<dyn crate::pipeline::summary::LlmClient>) -> ReportAnalyzer {
        ReportAnalyzer::new(
            Box::new(FixedTextExtractor(text.to_string())),
            ReportSummarizer::new(llm, "medgemma:4b"),
            ReferenceRangeTable::load_test(),
        )
    }

    fn create_pending(conn: &Connection, file_type: &str) -> Report {
        repository::create_report(
            conn,
            &NewReport {
                patient_id: Uuid::new_v4(),
                doctor_id: Uuid::new_v4(),
                appointment_id: None,
                lab_name: "Central Diagnostics".into(),
                test_date: chrono::NaiveDate::from_ymd_opt(2026, 8, 7).unwrap(),
                report_date: chrono::NaiveDate::from_ymd_opt(2026, 8, 7).unwrap(),
                test_type: TestType::BloodTest,
                file_path: "/files/report.pdf".into(),
                file_type: file_type.into(),
                file_size: 1024,
                is_private: false,
            },
        )
        .unwrap()
    }

    fn status_of(conn: &Connection, id: &Uuid) -> ReportStatus {
        repository::get_report(conn, id).unwrap().unwrap().status
    }

    // -- Tests ---------------------------------------------------------------

    #[test]
    fn end_to_end_two_line_report() {
        let conn = open_memory_database().unwrap();
        let report = create_pending(&conn, "pdf");
        let analyzer = analyzer_with(
            "Glucose: 110 mg/dL\nPotassium: 3.2 mEq/L",
            Box::new(MockLlmClient::new("Two values need attention.")),
        );

        let analysis = analyzer.analyze_report(&conn, &report.id).unwrap();

        assert_eq!(
            analysis.interpreted["glucose"].status,
            Some(MeasurementStatus::High)
        );
        assert_eq!(
            analysis.interpreted["potassium"].status,
            Some(MeasurementStatus::Low)
        );
        assert_eq!(analysis.findings.len(), 2);
        assert_eq!(analysis.summary, "Two values need attention.");
        assert_eq!(analysis.analysis_version, ANALYSIS_VERSION);

        let stored = repository::get_report(&conn, &report.id).unwrap().unwrap();
        assert_eq!(stored.status, ReportStatus::Analyzed);
        assert_eq!(stored.analysis.unwrap().raw_values["glucose"].value, 110.0);
    }

    #[test]
    fn summarizer_failure_does_not_abort_run() {
        let conn = open_memory_database().unwrap();
        let report = create_pending(&conn, "pdf");
        let analyzer = analyzer_with(
            "Glucose: 110 mg/dL",
            Box::new(FailingLlmClient::new("service unreachable")),
        );

        let analysis = analyzer.analyze_report(&conn, &report.id).unwrap();

        assert_eq!(status_of(&conn, &report.id), ReportStatus::Analyzed);
        assert!(!analysis.interpreted.is_empty());
        assert_eq!(analysis.summary, SUMMARY_UNAVAILABLE);
    }

    #[test]
    fn extraction_failure_flips_to_error_without_partial_result() {
        let conn = open_memory_database().unwrap();
        let report = create_pending(&conn, "pdf");
        let analyzer = ReportAnalyzer::new(
            Box::new(BrokenExtractor),
            ReportSummarizer::new(Box::new(MockLlmClient::new("unused")), "medgemma:4b"),
            ReferenceRangeTable::load_test(),
        );

        let result = analyzer.analyze_report(&conn, &report.id);
        assert!(matches!(
            result,
            Err(AnalysisError::Extraction(ExtractionError::PdfParsing(_)))
        ));

        let stored = repository::get_report(&conn, &report.id).unwrap().unwrap();
        assert_eq!(stored.status, ReportStatus::Error);
        assert!(stored.analysis.is_none());
    }

    #[test]
    fn unsupported_declared_type_goes_straight_to_error() {
        let conn = open_memory_database().unwrap();
        let report = create_pending(&conn, "docx");
        // Real dispatcher: the format check precedes any file I/O.
        let analyzer = ReportAnalyzer::new(
            Box::new(DocumentTextExtractor::new(
                Box::new(MockOcrEngine::new("", 0.0)),
                Box::new(PdfTextExtractor),
            )),
            ReportSummarizer::new(Box::new(MockLlmClient::new("unused")), "medgemma:4b"),
            ReferenceRangeTable::load_test(),
        );

        let result = analyzer.analyze_report(&conn, &report.id);
        assert!(matches!(
            result,
            Err(AnalysisError::Extraction(ExtractionError::UnsupportedFormat(_)))
        ));
        assert_eq!(status_of(&conn, &report.id), ReportStatus::Error);
    }

    #[test]
    fn zero_parse_matches_still_analyzes() {
        let conn = open_memory_database().unwrap();
        let report = create_pending(&conn, "pdf");
        let analyzer = analyzer_with(
            "Narrative radiology impression with no tabular values.",
            Box::new(MockLlmClient::new("Nothing measurable.")),
        );

        let analysis = analyzer.analyze_report(&conn, &report.id).unwrap();
        assert!(analysis.raw_values.is_empty());
        assert!(analysis.findings.is_empty());
        assert_eq!(status_of(&conn, &report.id), ReportStatus::Analyzed);
    }

    #[test]
    fn concurrent_claim_is_rejected() {
        let conn = open_memory_database().unwrap();
        let report = create_pending(&conn, "pdf");
        // Simulate another run holding the claim.
        repository::claim_status(
            &conn,
            &report.id,
            &ReportStatus::Pending,
            &ReportStatus::Analyzing,
        )
        .unwrap();

        let analyzer = analyzer_with("Glucose: 92 mg/dL", Box::new(MockLlmClient::new("ok")));
        let result = analyzer.analyze_report(&conn, &report.id);

        assert!(matches!(
            result,
            Err(AnalysisError::NotClaimable {
                status: ReportStatus::Analyzing,
                ..
            })
        ));
        // The in-flight run's claim is untouched.
        assert_eq!(status_of(&conn, &report.id), ReportStatus::Analyzing);
    }

    #[test]
    fn retry_reruns_from_scratch_and_overwrites() {
        let conn = open_memory_database().unwrap();
        let report = create_pending(&conn, "pdf");

        // First attempt fails.
        let broken = ReportAnalyzer::new(
            Box::new(BrokenExtractor),
            ReportSummarizer::new(Box::new(MockLlmClient::new("unused")), "medgemma:4b"),
            ReferenceRangeTable::load_test(),
        );
        assert!(broken.analyze_report(&conn, &report.id).is_err());
        assert_eq!(status_of(&conn, &report.id), ReportStatus::Error);

        // Retry resets to pending; the next run succeeds.
        retry_report(&conn, &report.id).unwrap();
        assert_eq!(status_of(&conn, &report.id), ReportStatus::Pending);

        let working = analyzer_with("Glucose: 92 mg/dL", Box::new(MockLlmClient::new("Fine.")));
        working.analyze_report(&conn, &report.id).unwrap();
        assert_eq!(status_of(&conn, &report.id), ReportStatus::Analyzed);

        // Recompute from analyzed overwrites the prior result wholesale.
        retry_report(&conn, &report.id).unwrap();
        let recompute = analyzer_with(
            "Glucose: 110 mg/dL",
            Box::new(MockLlmClient::new("Changed.")),
        );
        recompute.analyze_report(&conn, &report.id).unwrap();

        let stored = repository::get_report(&conn, &report.id).unwrap().unwrap();
        let analysis = stored.analysis.unwrap();
        assert_eq!(analysis.raw_values["glucose"].value, 110.0);
        assert_eq!(analysis.summary, "Changed.");
    }

    #[test]
    fn retry_while_analyzing_is_rejected() {
        let conn = open_memory_database().unwrap();
        let report = create_pending(&conn, "pdf");
        repository::claim_status(
            &conn,
            &report.id,
            &ReportStatus::Pending,
            &ReportStatus::Analyzing,
        )
        .unwrap();

        let result = retry_report(&conn, &report.id);
        assert!(matches!(result, Err(AnalysisError::NotClaimable { .. })));
    }

    #[test]
    fn analyze_unknown_report_is_not_found() {
        let conn = open_memory_database().unwrap();
        let analyzer = analyzer_with("", Box::new(MockLlmClient::new("unused")));

        let result = analyzer.analyze_report(&conn, &Uuid::new_v4());
        assert!(matches!(
            result,
            Err(AnalysisError::Database(DatabaseError::NotFound { .. }))
        ));
    }
}
