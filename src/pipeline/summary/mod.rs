//! Narrative summary generation.
//!
//! The structured findings are the load-bearing output of a run; prose is
//! cosmetic. So unlike the upstream stages, this one never fails: any LLM
//! fault degrades to a fixed placeholder and the run completes.

pub mod prompt;
pub mod ollama;

pub use ollama::*;

use std::collections::BTreeMap;

use thiserror::Error;

use crate::models::analysis::{Finding, InterpretedMeasurement};

/// Placeholder returned whenever the language model cannot produce text.
pub const SUMMARY_UNAVAILABLE: &str = "summary unavailable";

#[derive(Error, Debug)]
pub enum SummaryError {
    #[error("Cannot connect to LLM service at {0}")]
    Connection(String),

    #[error("LLM request timed out after {0}s")]
    Timeout(u64),

    #[error("HTTP client error: {0}")]
    Http(String),

    #[error("LLM service returned {status}: {body}")]
    ServiceStatus { status: u16, body: String },

    #[error("Failed to parse LLM response: {0}")]
    ResponseParsing(String),
}

/// LLM client abstraction (allows mocking)
pub trait LlmClient: Send + Sync {
    fn generate(&self, model: &str, prompt: &str, system: &str) -> Result<String, SummaryError>;
}

/// Turns an evaluated report into a short narrative.
pub struct ReportSummarizer {
    llm: Box<dyn LlmClient>,
    model: String,
}

impl ReportSummarizer {
    pub fn new(llm: Box<dyn LlmClient>, model: &str) -> Self {
        Self {
            llm,
            model: model.to_string(),
        }
    }

    /// Ask the model for a narrative; degrade to the placeholder on any
    /// failure, including an empty or whitespace-only response.
    pub fn summarize(
        &self,
        interpreted: &BTreeMap<String, InterpretedMeasurement>,
        findings: &[Finding],
    ) -> String {
        let prompt = prompt::build_summary_prompt(interpreted, findings);

        match self
            .llm
            .generate(&self.model, &prompt, prompt::SUMMARY_SYSTEM_PROMPT)
        {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => {
                tracing::warn!(model = %self.model, "LLM returned empty summary, using placeholder");
                SUMMARY_UNAVAILABLE.to_string()
            }
            Err(e) => {
                tracing::warn!(model = %self.model, error = %e, "Summary generation degraded");
                SUMMARY_UNAVAILABLE.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::MeasurementStatus;

    fn interpreted_fixture() -> BTreeMap<String, InterpretedMeasurement> {
        let mut map = BTreeMap::new();
        map.insert(
            "glucose".to_string(),
            InterpretedMeasurement {
                value: 110.0,
                unit: "mg/dL".into(),
                status: Some(MeasurementStatus::High),
                reference_range: Some("70-100".into()),
            },
        );
        map
    }

    fn findings_fixture() -> Vec<Finding> {
        vec![Finding {
            parameter: "glucose".into(),
            value: 110.0,
            unit: "mg/dL".into(),
            reference_range: "70-100".into(),
            status: MeasurementStatus::High,
        }]
    }

    #[test]
    fn returns_model_text_verbatim_trimmed() {
        let summarizer = ReportSummarizer::new(
            Box::new(MockLlmClient::new("  Glucose is mildly elevated.\n")),
            "medgemma:4b",
        );
        let summary = summarizer.summarize(&interpreted_fixture(), &findings_fixture());
        assert_eq!(summary, "Glucose is mildly elevated.");
    }

    #[test]
    fn llm_error_degrades_to_placeholder() {
        let summarizer = ReportSummarizer::new(
            Box::new(FailingLlmClient::new("connection refused")),
            "medgemma:4b",
        );
        let summary = summarizer.summarize(&interpreted_fixture(), &findings_fixture());
        assert_eq!(summary, SUMMARY_UNAVAILABLE);
    }

    #[test]
    fn empty_response_degrades_to_placeholder() {
        let summarizer =
            ReportSummarizer::new(Box::new(MockLlmClient::new("   \n  ")), "medgemma:4b");
        let summary = summarizer.summarize(&interpreted_fixture(), &findings_fixture());
        assert_eq!(summary, SUMMARY_UNAVAILABLE);
    }
}
