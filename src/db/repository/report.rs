use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime, Utc};
use rusqlite::{params, params_from_iter, Connection};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::enums::*;
use crate::models::*;

const REPORT_COLUMNS: &str = "id, report_number, patient_id, doctor_id, appointment_id,
     lab_name, test_date, report_date, test_type, file_path, file_type, file_size,
     is_private, status, analysis, created_at";

const DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S";

/// Generate the next human-readable report number for the given date.
///
/// Format: `LAB` + 2-digit year + 2-digit month + 4-digit sequence. The
/// sequence is the total report count + 1, not a per-month counter — a
/// deliberate carry-over from the system this replaces, so numbers stay
/// comparable across the migration.
pub fn next_report_number(conn: &Connection, date: NaiveDate) -> Result<String, DatabaseError> {
    use chrono::Datelike;

    let count: i64 = conn.query_row("SELECT COUNT(*) FROM reports", [], |row| row.get(0))?;
    Ok(format!(
        "LAB{:02}{:02}{:04}",
        date.year() % 100,
        date.month(),
        count + 1
    ))
}

/// Register a new report in `pending`, assigning identity and number.
/// Called by the upload collaborator before dispatching analysis.
pub fn create_report(conn: &Connection, new: &NewReport) -> Result<Report, DatabaseError> {
    let now = Utc::now().naive_utc();
    let report = Report {
        id: Uuid::new_v4(),
        report_number: next_report_number(conn, new.report_date)?,
        patient_id: new.patient_id,
        doctor_id: new.doctor_id,
        appointment_id: new.appointment_id,
        lab_name: new.lab_name.clone(),
        test_date: new.test_date,
        report_date: new.report_date,
        test_type: new.test_type,
        file_path: new.file_path.clone(),
        file_type: new.file_type.clone(),
        file_size: new.file_size,
        is_private: new.is_private,
        status: ReportStatus::Pending,
        analysis: None,
        created_at: now,
    };
    insert_report(conn, &report)?;
    Ok(report)
}

pub fn insert_report(conn: &Connection, report: &Report) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO reports (id, report_number, patient_id, doctor_id, appointment_id,
         lab_name, test_date, report_date, test_type, file_path, file_type, file_size,
         is_private, status, analysis, status_changed_at, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?16)",
        params![
            report.id.to_string(),
            report.report_number,
            report.patient_id.to_string(),
            report.doctor_id.to_string(),
            report.appointment_id.map(|id| id.to_string()),
            report.lab_name,
            report.test_date.to_string(),
            report.report_date.to_string(),
            report.test_type.as_str(),
            report.file_path,
            report.file_type,
            report.file_size as i64,
            report.is_private as i32,
            report.status.as_str(),
            report
                .analysis
                .as_ref()
                .map(|a| serde_json::to_string(a))
                .transpose()
                .map_err(|e| DatabaseError::Serialization(e.to_string()))?,
            report.created_at.format(DATETIME_FMT).to_string(),
        ],
    )?;
    Ok(())
}

pub fn get_report(conn: &Connection, id: &Uuid) -> Result<Option<Report>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {REPORT_COLUMNS} FROM reports WHERE id = ?1"
    ))?;

    let result = stmt.query_row(params![id.to_string()], report_row_from_rusqlite);

    match result {
        Ok(row) => Ok(Some(report_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Unconditionally set a report's status. Used for the `error` transition,
/// where the run already holds the single-writer claim.
pub fn update_status(
    conn: &Connection,
    id: &Uuid,
    status: &ReportStatus,
) -> Result<(), DatabaseError> {
    let rows = conn.execute(
        "UPDATE reports SET status = ?2, status_changed_at = datetime('now') WHERE id = ?1",
        params![id.to_string(), status.as_str()],
    )?;
    if rows == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Report".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

/// Atomically transition `from → to`, returning whether this caller won
/// the transition. The status column is the single-writer gate: a run
/// only proceeds past `pending → analyzing` if this returns true.
pub fn claim_status(
    conn: &Connection,
    id: &Uuid,
    from: &ReportStatus,
    to: &ReportStatus,
) -> Result<bool, DatabaseError> {
    let rows = conn.execute(
        "UPDATE reports SET status = ?2, status_changed_at = datetime('now')
         WHERE id = ?1 AND status = ?3",
        params![id.to_string(), to.as_str(), from.as_str()],
    )?;
    Ok(rows == 1)
}

/// Reset a finished report to `pending` for re-analysis. Allowed from
/// `error` (retry) and `analyzed` (explicit recompute); rejected while a
/// run is still `analyzing`.
pub fn reset_for_retry(conn: &Connection, id: &Uuid) -> Result<bool, DatabaseError> {
    let rows = conn.execute(
        "UPDATE reports SET status = 'pending', status_changed_at = datetime('now')
         WHERE id = ?1 AND status IN ('error', 'analyzed')",
        params![id.to_string()],
    )?;
    Ok(rows == 1)
}

/// Requeue reports stranded in `analyzing` (e.g. by a crash mid-run).
/// Only rows whose last transition is older than the threshold are
/// touched, so live runs are never yanked. Returns how many were reset.
pub fn requeue_stuck(conn: &Connection, older_than_minutes: i64) -> Result<usize, DatabaseError> {
    let cutoff = format!("-{older_than_minutes} minutes");
    let rows = conn.execute(
        "UPDATE reports SET status = 'pending', status_changed_at = datetime('now')
         WHERE status = 'analyzing' AND status_changed_at < datetime('now', ?1)",
        params![cutoff],
    )?;
    if rows > 0 {
        tracing::warn!(requeued = rows, "Requeued reports stranded in analyzing");
    }
    Ok(rows)
}

/// Persist a completed analysis and flip the report to `analyzed`.
/// Guarded on `analyzing` so a requeued-and-reclaimed report cannot be
/// clobbered by a stale run finishing late.
pub fn save_analysis(
    conn: &Connection,
    id: &Uuid,
    analysis: &ReportAnalysis,
) -> Result<(), DatabaseError> {
    let json = serde_json::to_string(analysis)
        .map_err(|e| DatabaseError::Serialization(e.to_string()))?;

    let rows = conn.execute(
        "UPDATE reports SET status = 'analyzed', analysis = ?2, status_changed_at = datetime('now')
         WHERE id = ?1 AND status = 'analyzing'",
        params![id.to_string(), json],
    )?;
    if rows == 0 {
        return Err(DatabaseError::ConstraintViolation(format!(
            "report {id} is not in 'analyzing'; refusing to persist analysis"
        )));
    }
    Ok(())
}

/// Report ids awaiting analysis, oldest first.
pub fn get_pending_report_ids(conn: &Connection) -> Result<Vec<Uuid>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id FROM reports WHERE status = 'pending' ORDER BY created_at ASC, id ASC",
    )?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

    let mut ids = Vec::new();
    for row in rows {
        let id = row?;
        ids.push(
            Uuid::parse_str(&id).map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
        );
    }
    Ok(ids)
}

/// All reports for a patient, newest first, with optional test type /
/// date range / status filters.
pub fn get_reports_by_patient(
    conn: &Connection,
    patient_id: &Uuid,
    filter: &ReportFilter,
) -> Result<Vec<Report>, DatabaseError> {
    let mut sql = format!("SELECT {REPORT_COLUMNS} FROM reports WHERE patient_id = ?1");
    let mut args: Vec<String> = vec![patient_id.to_string()];

    if let Some(test_type) = &filter.test_type {
        args.push(test_type.as_str().to_string());
        sql.push_str(&format!(" AND test_type = ?{}", args.len()));
    }
    if let Some(from) = &filter.from_date {
        args.push(from.to_string());
        sql.push_str(&format!(" AND test_date >= ?{}", args.len()));
    }
    if let Some(to) = &filter.to_date {
        args.push(to.to_string());
        sql.push_str(&format!(" AND test_date <= ?{}", args.len()));
    }
    if let Some(status) = &filter.status {
        args.push(status.as_str().to_string());
        sql.push_str(&format!(" AND status = ?{}", args.len()));
    }
    sql.push_str(" ORDER BY test_date DESC, created_at DESC");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(args.iter()), report_row_from_rusqlite)?;

    let mut reports = Vec::new();
    for row in rows {
        reports.push(report_from_row(row?)?);
    }
    Ok(reports)
}

/// Abnormal findings across a patient's analyzed reports, newest first.
/// Reports with no findings are omitted entirely.
pub fn get_critical_values(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<CriticalValues>, DatabaseError> {
    let analyzed = get_reports_by_patient(
        conn,
        patient_id,
        &ReportFilter {
            status: Some(ReportStatus::Analyzed),
            ..Default::default()
        },
    )?;

    Ok(analyzed
        .into_iter()
        .filter_map(|report| {
            let analysis = report.analysis?;
            if analysis.findings.is_empty() {
                return None;
            }
            Some(CriticalValues {
                report_id: report.id,
                report_number: report.report_number,
                test_date: report.test_date,
                test_type: report.test_type,
                findings: analysis.findings,
            })
        })
        .collect())
}

/// Time-ordered series of raw values for a single analyte, for charting.
/// Drawn from the raw parsed mapping, so the series reflects what the
/// documents reported, not the evaluated interpretation.
pub fn get_parameter_trend(
    conn: &Connection,
    patient_id: &Uuid,
    test_type: &TestType,
    parameter: &str,
) -> Result<Vec<TrendPoint>, DatabaseError> {
    let reports = get_reports_by_patient(
        conn,
        patient_id,
        &ReportFilter {
            test_type: Some(*test_type),
            status: Some(ReportStatus::Analyzed),
            ..Default::default()
        },
    )?;

    let key = parameter.trim().to_lowercase();
    let mut points: Vec<TrendPoint> = reports
        .into_iter()
        .filter_map(|report| {
            let analysis = report.analysis?;
            let measurement = analysis.raw_values.get(&key)?;
            Some(TrendPoint {
                date: report.test_date,
                value: measurement.value,
            })
        })
        .collect();
    points.sort_by_key(|p| p.date);
    Ok(points)
}

/// Delete a report row. The referenced file is the owning collaborator's
/// to clean up.
pub fn delete_report(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let rows = conn.execute("DELETE FROM reports WHERE id = ?1", params![id.to_string()])?;
    if rows == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Report".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

// Internal row type for Report mapping
struct ReportRow {
    id: String,
    report_number: String,
    patient_id: String,
    doctor_id: String,
    appointment_id: Option<String>,
    lab_name: String,
    test_date: String,
    report_date: String,
    test_type: String,
    file_path: String,
    file_type: String,
    file_size: i64,
    is_private: i32,
    status: String,
    analysis: Option<String>,
    created_at: String,
}

fn report_row_from_rusqlite(row: &rusqlite::Row<'_>) -> Result<ReportRow, rusqlite::Error> {
    Ok(ReportRow {
        id: row.get(0)?,
        report_number: row.get(1)?,
        patient_id: row.get(2)?,
        doctor_id: row.get(3)?,
        appointment_id: row.get(4)?,
        lab_name: row.get(5)?,
        test_date: row.get(6)?,
        report_date: row.get(7)?,
        test_type: row.get(8)?,
        file_path: row.get(9)?,
        file_type: row.get(10)?,
        file_size: row.get(11)?,
        is_private: row.get(12)?,
        status: row.get(13)?,
        analysis: row.get(14)?,
        created_at: row.get(15)?,
    })
}

fn report_from_row(row: ReportRow) -> Result<Report, DatabaseError> {
    let analysis = row
        .analysis
        .as_deref()
        .map(serde_json::from_str::<ReportAnalysis>)
        .transpose()
        .map_err(|e| DatabaseError::Serialization(e.to_string()))?;

    Ok(Report {
        id: parse_uuid(&row.id)?,
        report_number: row.report_number,
        patient_id: parse_uuid(&row.patient_id)?,
        doctor_id: parse_uuid(&row.doctor_id)?,
        appointment_id: row.appointment_id.and_then(|s| Uuid::parse_str(&s).ok()),
        lab_name: row.lab_name,
        test_date: parse_date(&row.test_date),
        report_date: parse_date(&row.report_date),
        test_type: TestType::from_str(&row.test_type)?,
        file_path: row.file_path,
        file_type: row.file_type,
        file_size: row.file_size.max(0) as u64,
        is_private: row.is_private != 0,
        status: ReportStatus::from_str(&row.status)?,
        analysis,
        created_at: NaiveDateTime::parse_from_str(&row.created_at, DATETIME_FMT)
            .or_else(|_| NaiveDateTime::parse_from_str(&row.created_at, "%Y-%m-%dT%H:%M:%S"))
            .unwrap_or_default(),
    })
}

fn parse_uuid(s: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(s).map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))
}

fn parse_date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap_or_default()
}
