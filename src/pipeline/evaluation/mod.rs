//! Range evaluation: annotate parsed measurements against the reference
//! table and collect out-of-range findings.

pub mod reference;

pub use reference::*;

use std::collections::BTreeMap;

use thiserror::Error;

use crate::models::analysis::{Finding, InterpretedMeasurement, Measurement};
use crate::models::enums::MeasurementStatus;

#[derive(Error, Debug)]
pub enum ReferenceTableError {
    #[error("Failed to read reference ranges from {0}: {1}")]
    Load(String, String),

    #[error("Failed to parse reference ranges from {0}: {1}")]
    Parse(String, String),
}

/// Output of one evaluation pass.
#[derive(Debug, Clone, Default)]
pub struct Evaluation {
    pub interpreted: BTreeMap<String, InterpretedMeasurement>,
    pub findings: Vec<Finding>,
}

/// Evaluate parsed measurements against the reference table.
///
/// Pure and deterministic: same inputs, same outputs, no I/O. Bounds are
/// inclusive — a value equal to min or max is normal. Parameters the
/// table does not know pass through unannotated and are never flagged.
///
/// The evaluator never emits `critical`; that status is reserved until a
/// second threshold band is specified.
pub fn evaluate(
    table: &ReferenceRangeTable,
    parsed: &BTreeMap<String, Measurement>,
) -> Evaluation {
    let mut evaluation = Evaluation::default();

    for (parameter, measurement) in parsed {
        let Some(range) = table.get(parameter) else {
            evaluation.interpreted.insert(
                parameter.clone(),
                InterpretedMeasurement {
                    value: measurement.value,
                    unit: measurement.unit.clone(),
                    status: None,
                    reference_range: None,
                },
            );
            continue;
        };

        let status = if measurement.value < range.min {
            MeasurementStatus::Low
        } else if measurement.value > range.max {
            MeasurementStatus::High
        } else {
            MeasurementStatus::Normal
        };

        evaluation.interpreted.insert(
            parameter.clone(),
            InterpretedMeasurement {
                value: measurement.value,
                unit: range.unit.clone(),
                status: Some(status),
                reference_range: Some(range.display()),
            },
        );

        if status != MeasurementStatus::Normal {
            evaluation.findings.push(Finding {
                parameter: parameter.clone(),
                value: measurement.value,
                unit: range.unit.clone(),
                reference_range: range.display(),
                status,
            });
        }
    }

    evaluation
}
