//! Analysis payload types — everything the pipeline persists onto a report.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::enums::MeasurementStatus;

/// A single value parsed off the document text, keyed by its normalized
/// (trimmed, lower-cased) parameter name in the raw mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub value: f64,
    pub unit: String,
    /// Reference range as printed on the source document. Display
    /// metadata only — evaluation always uses our own table.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reported_range: Option<String>,
}

/// A measurement after range evaluation.
///
/// Entries with a table match carry the table's unit and range string;
/// parameters unknown to the table pass through with the document's unit
/// and no status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterpretedMeasurement {
    pub value: f64,
    pub unit: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<MeasurementStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_range: Option<String>,
}

/// An out-of-range measurement, retained in the findings list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub parameter: String,
    pub value: f64,
    pub unit: String,
    /// The range the value was evaluated against (our table's, not the
    /// document's printed one).
    pub reference_range: String,
    pub status: MeasurementStatus,
}

/// Complete result of one analysis run, stored as a JSON column on the
/// report row. Overwritten wholesale on re-analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportAnalysis {
    pub raw_values: BTreeMap<String, Measurement>,
    pub interpreted: BTreeMap<String, InterpretedMeasurement>,
    pub summary: String,
    pub findings: Vec<Finding>,
    pub analyzed_at: NaiveDateTime,
    pub analysis_version: String,
    pub duration_ms: u64,
}
