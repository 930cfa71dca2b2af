use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "Labflow";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Version tag stamped onto every analysis result. Bump when the parser,
/// reference table, or evaluation semantics change in a way that makes
/// previously stored results incomparable.
pub const ANALYSIS_VERSION: &str = "v2";

/// Default tracing filter when RUST_LOG is not set
pub fn default_log_filter() -> String {
    format!("{}=info", env!("CARGO_PKG_NAME"))
}

/// Get the application data directory
/// ~/Labflow/ on all platforms (user-visible, per design requirement)
pub fn app_data_dir() -> PathBuf {
    let home = dirs::home_dir().expect("Cannot determine home directory");
    home.join("Labflow")
}

/// Get the default database path
pub fn database_path() -> PathBuf {
    app_data_dir().join("labflow.db")
}

/// Runtime knobs for the analysis pipeline.
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    /// Base URL of the local Ollama instance used for summaries.
    pub llm_base_url: String,
    /// Model used for narrative summaries.
    pub llm_model: String,
    /// HTTP timeout for a single summary request.
    pub llm_timeout_secs: u64,
    /// How often the background worker scans for pending reports.
    pub poll_interval_secs: u64,
    /// Minutes a report may sit in `analyzing` before the worker
    /// requeues it as stranded (crash recovery).
    pub stuck_after_minutes: i64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            llm_base_url: "http://localhost:11434".to_string(),
            llm_model: "medgemma:4b".to_string(),
            llm_timeout_secs: 120,
            poll_interval_secs: 30,
            stuck_after_minutes: 30,
        }
    }
}
