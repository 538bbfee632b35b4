//! Advisory syntax and shape checks
//!
//! These never return errors: problems are reported in the
//! [`ValidationOutcome`] so callers can assert on them mid-scenario.

use pipetest_common::ValidationOutcome;
use serde::de::IgnoredAny;
use tracing::debug;

use crate::csv_codec::first_interior_blank_line;

/// Check that `text` is well-formed JSON. No schema comparison is done.
pub fn validate_json_syntax(text: &str) -> ValidationOutcome {
    match serde_json::from_str::<IgnoredAny>(text) {
        Ok(_) => ValidationOutcome::pass("well-formed JSON"),
        Err(e) => {
            debug!("JSON syntax check failed: {}", e);
            ValidationOutcome::fail(format!(
                "invalid JSON at line {}, column {}: {}",
                e.line(),
                e.column(),
                e
            ))
        }
    }
}

/// Check that every CSV record has as many fields as the header (or first line).
///
/// Quoted fields may contain the delimiter or line breaks. A blank line
/// followed by more data counts as a line with one field. With
/// `has_header`, duplicate column names also fail the check.
pub fn validate_csv_shape(text: &str, delimiter: char, has_header: bool) -> ValidationOutcome {
    if !delimiter.is_ascii() {
        return ValidationOutcome::fail(format!(
            "unsupported delimiter {:?}: must be a single ASCII character",
            delimiter
        ));
    }
    if text.trim().is_empty() {
        return ValidationOutcome::fail("no lines to validate");
    }

    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let reference = if has_header { "header" } else { "first line" };
    let blank = first_interior_blank_line(text.as_bytes());
    let blank_failure = |expected: usize| {
        blank.filter(|_| expected != 1).map(|b| {
            ValidationOutcome::fail(format!(
                "line {} has 1 field(s), expected {} from the {}",
                b.line, expected, reference
            ))
        })
    };
    let mut width: Option<usize> = None;
    let mut lines = 0usize;

    for result in rdr.records() {
        let record = match result {
            Ok(record) => record,
            Err(e) => return ValidationOutcome::fail(format!("unparsable CSV: {}", e)),
        };
        let line = record.position().map(|p| p.line()).unwrap_or(lines as u64 + 1);

        match width {
            None => {
                if has_header {
                    for (i, name) in record.iter().enumerate() {
                        if record.iter().take(i).any(|earlier| earlier == name) {
                            return ValidationOutcome::fail(format!(
                                "duplicate column '{}' in header",
                                name
                            ));
                        }
                    }
                }
                width = Some(record.len());
            }
            Some(expected) if record.len() != expected => {
                let earlier_blank = blank
                    .filter(|b| b.records_before <= lines)
                    .and_then(|_| blank_failure(expected));
                return earlier_blank.unwrap_or_else(|| {
                    ValidationOutcome::fail(format!(
                        "line {} has {} field(s), expected {} from the {}",
                        line,
                        record.len(),
                        expected,
                        reference
                    ))
                });
            }
            Some(_) => {}
        }
        lines += 1;
    }

    if let Some(outcome) = width.and_then(|w| blank_failure(w)) {
        return outcome;
    }

    ValidationOutcome::pass(format!(
        "{} line(s) with {} field(s) each",
        lines,
        width.unwrap_or(0)
    ))
}
