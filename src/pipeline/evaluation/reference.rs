use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::ReferenceTableError;

/// Clinically accepted normal interval for one parameter. Always used in
/// preference to whatever range the source document printed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceRange {
    pub min: f64,
    pub max: f64,
    pub unit: String,
}

impl ReferenceRange {
    /// Display string stored on interpreted entries, e.g. `13.5-17.5`.
    pub fn display(&self) -> String {
        format!("{}-{}", self.min, self.max)
    }
}

/// On-disk entry shape (flat array in reference_ranges.json).
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RangeFileEntry {
    parameter: String,
    min: f64,
    max: f64,
    unit: String,
}

/// Static parameter → range table. Immutable after construction and
/// shared read-only across concurrent runs.
#[derive(Debug, Clone)]
pub struct ReferenceRangeTable {
    ranges: BTreeMap<String, ReferenceRange>,
}

impl ReferenceRangeTable {
    /// Load a table from a JSON file.
    pub fn load(path: &std::path::Path) -> Result<Self, ReferenceTableError> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| ReferenceTableError::Load(path.display().to_string(), e.to_string()))?;
        Self::from_json(&json)
            .map_err(|e| ReferenceTableError::Parse(path.display().to_string(), e))
    }

    /// The table bundled with the crate.
    pub fn bundled() -> Self {
        Self::from_json(include_str!("../../../resources/reference_ranges.json"))
            .expect("bundled reference ranges are valid JSON")
    }

    fn from_json(json: &str) -> Result<Self, String> {
        let entries: Vec<RangeFileEntry> =
            serde_json::from_str(json).map_err(|e| e.to_string())?;

        let ranges = entries
            .into_iter()
            .map(|e| {
                (
                    e.parameter.trim().to_lowercase(),
                    ReferenceRange {
                        min: e.min,
                        max: e.max,
                        unit: e.unit,
                    },
                )
            })
            .collect();

        Ok(Self { ranges })
    }

    /// Create a small table for tests (no file I/O).
    pub fn load_test() -> Self {
        let mut ranges = BTreeMap::new();
        ranges.insert(
            "hemoglobin".to_string(),
            ReferenceRange { min: 13.5, max: 17.5, unit: "g/dL".into() },
        );
        ranges.insert(
            "glucose".to_string(),
            ReferenceRange { min: 70.0, max: 100.0, unit: "mg/dL".into() },
        );
        ranges.insert(
            "potassium".to_string(),
            ReferenceRange { min: 3.5, max: 5.1, unit: "mEq/L".into() },
        );
        Self { ranges }
    }

    /// Case-insensitive lookup by normalized parameter name.
    pub fn get(&self, parameter: &str) -> Option<&ReferenceRange> {
        self.ranges.get(&parameter.trim().to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}
