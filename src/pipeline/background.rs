//! Background execution — detached dispatch plus a durable poll worker.
//!
//! The status column is the queue: `pending` rows are claimable work,
//! the CAS claim in the orchestrator is the delivery gate, and a re-run
//! simply overwrites the prior result. That gives at-least-once handling
//! without a separate queue table, and a process crash mid-run is
//! recovered by requeueing stale `analyzing` rows on each pass.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rusqlite::Connection;
use uuid::Uuid;

use crate::config::AnalysisConfig;
use crate::db::repository;
use crate::db::sqlite::open_database;
use crate::models::enums::ReportStatus;
use crate::pipeline::processor::{AnalysisError, ReportAnalyzer};

/// Sleep granularity for shutdown responsiveness.
const SLEEP_GRANULARITY_SECS: u64 = 1;

/// Run one report's analysis on a detached thread, immediately after
/// upload. The caller returns to its client right away; the report is
/// observable as `pending`/`analyzing` until the run lands.
///
/// A failure to start the thread flips the report to `error` so it never
/// sits silently `pending` with nobody working on it. (With the poll
/// worker running this is belt-and-braces, but uploads must not depend
/// on the worker being up.)
pub fn dispatch_analysis(db_path: PathBuf, analyzer: Arc<ReportAnalyzer>, report_id: Uuid) {
    let spawn_result = std::thread::Builder::new()
        .name(format!("labflow-analysis-{report_id}"))
        .spawn({
            let db_path = db_path.clone();
            move || match open_database(&db_path) {
                Ok(conn) => {
                    // Stage failures already persisted their own status.
                    if let Err(e) = analyzer.analyze_report(&conn, &report_id) {
                        tracing::warn!(report_id = %report_id, error = %e, "Dispatched analysis failed");
                    }
                }
                Err(e) => {
                    tracing::error!(
                        report_id = %report_id,
                        error = %e,
                        "Cannot open database for dispatched analysis; leaving report for the worker"
                    );
                }
            }
        });

    if let Err(e) = spawn_result {
        tracing::error!(report_id = %report_id, error = %e, "Failed to start analysis thread");
        mark_error_best_effort(&db_path, &report_id);
    }
}

fn mark_error_best_effort(db_path: &Path, report_id: &Uuid) {
    match open_database(db_path) {
        Ok(conn) => {
            if let Err(e) = repository::update_status(&conn, report_id, &ReportStatus::Error) {
                tracing::error!(report_id = %report_id, error = %e, "Failed to mark report as error");
            }
        }
        Err(e) => {
            tracing::error!(report_id = %report_id, error = %e, "Failed to open database to mark error");
        }
    }
}

/// Counters from one worker pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerPassStats {
    pub requeued: usize,
    pub analyzed: u32,
    pub failed: u32,
}

/// One pass of the durable worker: recover stranded runs, then drain the
/// pending queue oldest-first. Reports another run claims in the
/// meantime are skipped, not errors.
pub fn run_worker_pass(
    conn: &Connection,
    analyzer: &ReportAnalyzer,
    stuck_after_minutes: i64,
) -> Result<WorkerPassStats, AnalysisError> {
    let requeued = repository::requeue_stuck(conn, stuck_after_minutes)?;

    let mut stats = WorkerPassStats {
        requeued,
        analyzed: 0,
        failed: 0,
    };

    for report_id in repository::get_pending_report_ids(conn)? {
        match analyzer.analyze_report(conn, &report_id) {
            Ok(_) => stats.analyzed += 1,
            // Lost the claim to a dispatched run — that run owns it now.
            Err(AnalysisError::NotClaimable { .. }) => {}
            Err(e) => {
                stats.failed += 1;
                tracing::warn!(report_id = %report_id, error = %e, "Worker analysis failed");
            }
        }
    }

    Ok(stats)
}

/// Handle for the background worker thread.
///
/// Supports graceful shutdown via `shutdown()` or automatic cleanup on
/// `Drop`. Keep it alive for the lifetime of the embedding process.
pub struct AnalysisWorkerHandle {
    shutdown: Arc<AtomicBool>,
    handle: Option<std::thread::JoinHandle<()>>,
}

impl AnalysisWorkerHandle {
    /// Request graceful shutdown. A pass in flight completes, but no new
    /// pass is started.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }
}

impl Drop for AnalysisWorkerHandle {
    fn drop(&mut self) {
        self.shutdown();
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}

/// Start the durable analysis worker on a separate thread.
pub fn start_background_worker(
    db_path: PathBuf,
    analyzer: Arc<ReportAnalyzer>,
    config: &AnalysisConfig,
) -> AnalysisWorkerHandle {
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = shutdown.clone();
    let poll_secs = config.poll_interval_secs.max(SLEEP_GRANULARITY_SECS);
    let stuck_after = config.stuck_after_minutes;

    let handle = std::thread::spawn(move || {
        tracing::info!(poll_interval_secs = poll_secs, "Analysis worker started");
        worker_loop(&db_path, &analyzer, poll_secs, stuck_after, &flag);
    });

    AnalysisWorkerHandle {
        shutdown,
        handle: Some(handle),
    }
}

fn worker_loop(
    db_path: &Path,
    analyzer: &ReportAnalyzer,
    poll_secs: u64,
    stuck_after_minutes: i64,
    shutdown: &AtomicBool,
) {
    while !shutdown.load(Ordering::Relaxed) {
        match open_database(db_path) {
            Ok(conn) => {
                if let Err(e) = run_worker_pass(&conn, analyzer, stuck_after_minutes) {
                    tracing::warn!(error = %e, "Worker pass failed");
                }
            }
            Err(e) => tracing::warn!(error = %e, "Worker cannot open database"),
        }

        // Sleep in small increments for responsive shutdown
        for _ in 0..(poll_secs / SLEEP_GRANULARITY_SECS) {
            if shutdown.load(Ordering::Relaxed) {
                break;
            }
            std::thread::sleep(Duration::from_secs(SLEEP_GRANULARITY_SECS));
        }
    }
    tracing::info!("Analysis worker shutting down");
}
