//! Line-oriented value parser.
//!
//! Best-effort by design: lab layouts vary wildly, so anything that does
//! not look like `<label>: <number> <unit> [(<min>-<max>)]` is skipped
//! rather than rejected. A document yielding zero matches is a valid
//! (empty) result, not an error.

use std::collections::BTreeMap;

use regex::Regex;

use crate::models::analysis::Measurement;

/// `<label>: <number> <unit> [(<min>-<max>)]` — labels are letters and
/// spaces, numbers are optionally negative decimals.
const LINE_PATTERN: &str = r"^\s*([A-Za-z][A-Za-z ]*?)\s*:\s*(-?\d+(?:\.\d+)?)\s*([^\s()]+)(?:\s*\(\s*(-?\d+(?:\.\d+)?)\s*-\s*(-?\d+(?:\.\d+)?)\s*\))?\s*$";

/// Stateless measurement parser. Construct once and share by reference;
/// concurrent runs never contend on it.
pub struct MeasurementParser {
    line: Regex,
}

impl Default for MeasurementParser {
    fn default() -> Self {
        Self::new()
    }
}

impl MeasurementParser {
    pub fn new() -> Self {
        Self {
            line: Regex::new(LINE_PATTERN).expect("measurement line pattern is valid"),
        }
    }

    /// Parse extracted text into normalized parameter → measurement.
    ///
    /// Keys are trimmed and lower-cased. A label repeated on a later
    /// line overwrites the earlier value — multi-page reports restate
    /// values, and the last statement wins.
    pub fn parse(&self, text: &str) -> BTreeMap<String, Measurement> {
        let mut measurements = BTreeMap::new();

        for line in text.lines() {
            let Some(captures) = self.line.captures(line) else {
                continue;
            };

            let label = captures[1].trim().to_lowercase();
            let Ok(value) = captures[2].parse::<f64>() else {
                continue;
            };
            let unit = captures[3].to_string();
            let reported_range = match (captures.get(4), captures.get(5)) {
                (Some(min), Some(max)) => Some(format!("{}-{}", min.as_str(), max.as_str())),
                _ => None,
            };

            measurements.insert(
                label,
                Measurement {
                    value,
                    unit,
                    reported_range,
                },
            );
        }

        measurements
    }
}
