use std::collections::BTreeMap;

use crate::models::analysis::{Finding, InterpretedMeasurement};

pub const SUMMARY_SYSTEM_PROMPT: &str = r#"
You are a clinical lab report summarizer. You receive measurements that
have already been evaluated against reference ranges.

RULES — ABSOLUTE, NO EXCEPTIONS:
1. Summarize ONLY the values and statuses provided. Never invent values.
2. Plain language, 3-5 sentences, understandable by a patient.
3. Mention every abnormal finding; do not editorialize about normal ones.
4. NEVER give a diagnosis, treatment advice, or urgency judgment.
5. Close by advising the reader to discuss results with their doctor.
"#;

/// Serialize the evaluated report into the summary prompt.
pub fn build_summary_prompt(
    interpreted: &BTreeMap<String, InterpretedMeasurement>,
    findings: &[Finding],
) -> String {
    let mut lines = String::new();
    for (parameter, m) in interpreted {
        let annotation = match (&m.status, &m.reference_range) {
            (Some(status), Some(range)) => format!(" [{status}, expected {range}]"),
            _ => String::new(),
        };
        lines.push_str(&format!("{parameter}: {} {}{annotation}\n", m.value, m.unit));
    }

    let findings_line = if findings.is_empty() {
        "No values fell outside their reference ranges.".to_string()
    } else {
        let flagged: Vec<String> = findings
            .iter()
            .map(|f| format!("{} is {} at {} {}", f.parameter, f.status, f.value, f.unit))
            .collect();
        format!("Out-of-range: {}.", flagged.join("; "))
    };

    format!(
        "<results>\n{lines}</results>\n\n{findings_line}\n\nWrite the patient-facing summary now."
    )
}
