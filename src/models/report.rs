use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::analysis::{Finding, ReportAnalysis};
use super::enums::{ReportStatus, TestType};

/// The unit of work: one uploaded lab report and its analysis state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub id: Uuid,
    /// Human-readable number assigned at creation, e.g. `LAB26080042`.
    pub report_number: String,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub appointment_id: Option<Uuid>,
    pub lab_name: String,
    pub test_date: NaiveDate,
    pub report_date: NaiveDate,
    pub test_type: TestType,
    /// Path or URL of the stored document; storage lifecycle is owned by
    /// the uploading collaborator.
    pub file_path: String,
    /// Declared file type as uploaded (`pdf`, `jpeg`, `png`, `tiff`).
    /// Validated by the extractor, not at creation.
    pub file_type: String,
    pub file_size: u64,
    pub is_private: bool,
    pub status: ReportStatus,
    pub analysis: Option<ReportAnalysis>,
    pub created_at: NaiveDateTime,
}

/// Fields supplied by the uploading collaborator when registering a report.
/// Identity, report number, status, and timestamps are assigned on insert.
#[derive(Debug, Clone)]
pub struct NewReport {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub appointment_id: Option<Uuid>,
    pub lab_name: String,
    pub test_date: NaiveDate,
    pub report_date: NaiveDate,
    pub test_type: TestType,
    pub file_path: String,
    pub file_type: String,
    pub file_size: u64,
    pub is_private: bool,
}

/// Optional filters for the by-patient report query.
#[derive(Debug, Clone, Default)]
pub struct ReportFilter {
    pub test_type: Option<TestType>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    pub status: Option<ReportStatus>,
}

/// One analyzed report's abnormal findings, for the critical-values query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CriticalValues {
    pub report_id: Uuid,
    pub report_number: String,
    pub test_date: NaiveDate,
    pub test_type: TestType,
    pub findings: Vec<Finding>,
}

/// A single (date, value) observation in a parameter trend series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub value: f64,
}
