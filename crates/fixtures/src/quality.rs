//! Data-quality measurement of record sets against configured thresholds

use pipetest_common::{GenerationRequest, QualityThresholds, Record, ValidationOutcome};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::generate::GeneratorRegistry;

/// Completeness, validity and consistency of a record set, in percent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub total_cells: usize,
    pub null_cells: usize,
    pub invalid_cells: usize,
    pub total_rows: usize,
    pub inconsistent_rows: usize,

    /// Share of non-null cells (0.0 - 100.0)
    pub completeness: f64,

    /// Share of non-null cells that their field's generator accepts (0.0 - 100.0)
    pub validity: f64,

    /// Share of rows whose keys are exactly the requested fields (0.0 - 100.0)
    pub consistency: f64,
}

impl QualityReport {
    /// Compare against thresholds; the diagnostic lists every shortfall.
    ///
    /// Accuracy needs expected output to compare with and is not checked here.
    pub fn check(&self, thresholds: &QualityThresholds) -> ValidationOutcome {
        let mut problems = Vec::new();
        if self.completeness < thresholds.completeness {
            problems.push(format!(
                "completeness {:.2}% below {:.2}%",
                self.completeness, thresholds.completeness
            ));
        }
        if self.validity < thresholds.validity {
            problems.push(format!(
                "validity {:.2}% below {:.2}%",
                self.validity, thresholds.validity
            ));
        }

        if self.consistency < thresholds.consistency {
            problems.push(format!(
                "consistency {:.2}% below {:.2}%",
                self.consistency, thresholds.consistency
            ));
        }

        if problems.is_empty() {
            ValidationOutcome::pass(format!(
                "completeness {:.2}%, validity {:.2}%, consistency {:.2}%",
                self.completeness, self.validity, self.consistency
            ))
        } else {
            ValidationOutcome::fail(problems.join("; "))
        }
    }
}

/// Measure `rows` against the generators named in `request`.
///
/// Only fields listed in the request are counted; a cell that is missing or
/// an empty string counts as null, so rows read back from CSV measure the
/// same as the rows that were written.
pub fn assess_quality(
    rows: &[Record],
    request: &GenerationRequest,
    registry: &GeneratorRegistry,
) -> QualityReport {
    let mut total_cells = 0;
    let mut null_cells = 0;
    let mut invalid_cells = 0;
    let mut inconsistent_rows = 0;

    for row in rows {
        let consistent = row.len() == request.fields.len()
            && request.fields.iter().all(|f| row.contains_key(&f.name));
        if !consistent {
            inconsistent_rows += 1;
        }

        for field in &request.fields {
            total_cells += 1;
            let value = row.get(&field.name);
            let is_null = match value {
                None | Some(Value::Null) => true,
                Some(Value::String(s)) => s.is_empty(),
                Some(_) => false,
            };
            if is_null {
                null_cells += 1;
                continue;
            }
            let valid = match (registry.get(&field.kind), value) {
                (Some(generator), Some(value)) => generator.is_valid(value),
                _ => false,
            };
            if !valid {
                invalid_cells += 1;
            }
        }
    }

    let present = total_cells - null_cells;
    QualityReport {
        total_cells,
        null_cells,
        invalid_cells,
        total_rows: rows.len(),
        inconsistent_rows,
        completeness: percent(present, total_cells),
        validity: percent(present - invalid_cells, present),
        consistency: percent(rows.len() - inconsistent_rows, rows.len()),
    }
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        100.0
    } else {
        part as f64 * 100.0 / whole as f64
    }
}
