//! CSV encoding and decoding of record sets

use std::io::{Read, Write};

use pipetest_common::{CsvOptions, Error, Record, Result};
use serde_json::Value;

/// Write `rows` as CSV.
///
/// The header comes from the first row's keys in iteration order; every
/// other row must carry exactly the same key set. Nothing is written when
/// the rows are rejected.
pub fn write_records<W: Write>(writer: W, rows: &[Record], options: CsvOptions) -> Result<()> {
    let first = rows
        .first()
        .ok_or_else(|| Error::EmptyDataset("CSV fixtures need at least one row".to_string()))?;
    check_key_sets(first, rows)?;

    let header: Vec<&str> = first.keys().map(String::as_str).collect();
    let mut wtr = csv::WriterBuilder::new()
        .delimiter(options.delimiter)
        .has_headers(false)
        .quote_style(csv::QuoteStyle::Necessary)
        .from_writer(writer);

    if options.has_header {
        wtr.write_record(&header).map_err(csv_error)?;
    }

    for row in rows {
        let fields: Vec<String> = header
            .iter()
            .map(|key| row.get(*key).map(render_value).unwrap_or_default())
            .collect();
        wtr.write_record(&fields).map_err(csv_error)?;
    }

    wtr.flush()?;
    Ok(())
}

/// Parse CSV into records whose values are all strings.
///
/// Without a header row, columns are named `column_1..column_n` after the
/// first record's width. A record of any other width is a schema mismatch,
/// and so is a blank line between records unless there is a single column.
pub fn read_records<R: Read>(mut reader: R, options: CsvOptions) -> Result<Vec<Record>> {
    let mut input = Vec::new();
    reader.read_to_end(&mut input)?;
    let blank = first_interior_blank_line(&input);

    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(options.delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(input.as_slice());

    let mut raw = Vec::new();
    for record in rdr.records() {
        raw.push(record.map_err(csv_error)?);
    }

    let mut rows = raw.into_iter();
    let header: Vec<String> = if options.has_header {
        match rows.next() {
            Some(record) => record.iter().map(str::to_string).collect(),
            None => return Ok(Vec::new()),
        }
    } else {
        match rows.as_slice().first() {
            Some(record) => (1..=record.len()).map(|n| format!("column_{}", n)).collect(),
            None => return Ok(Vec::new()),
        }
    };

    for (i, name) in header.iter().enumerate() {
        if header[..i].contains(name) {
            return Err(Error::invalid_format(
                "CSV",
                format!("duplicate column '{}' in header", name),
            ));
        }
    }

    let header_records = usize::from(options.has_header);
    let blank_row = blank
        .filter(|_| header.len() != 1)
        .map(|b| b.records_before.saturating_sub(header_records));

    let mut records = Vec::new();
    for (index, record) in rows.enumerate() {
        if blank_row.map_or(false, |row| row <= index) {
            return Err(Error::SchemaMismatch {
                row: index,
                missing: header.iter().skip(1).cloned().collect(),
                unexpected: Vec::new(),
            });
        }
        if record.len() != header.len() {
            return Err(Error::SchemaMismatch {
                row: index,
                missing: header.iter().skip(record.len()).cloned().collect(),
                unexpected: (header.len() + 1..=record.len())
                    .map(|n| format!("#{}", n))
                    .collect(),
            });
        }

        let mut row = Record::new();
        for (name, field) in header.iter().zip(record.iter()) {
            row.insert(name.clone(), Value::String(field.to_string()));
        }
        records.push(row);
    }

    Ok(records)
}

/// A blank physical line that has more data after it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BlankLine {
    /// 1-based line number
    pub line: u64,
    /// Records (header included) that end before this line
    pub records_before: usize,
}

/// Find the first empty line outside quoted fields that is followed by data.
///
/// The `csv` reader skips such lines silently; callers treat them as a
/// record with one empty field. Trailing blank lines are ignored.
pub(crate) fn first_interior_blank_line(input: &[u8]) -> Option<BlankLine> {
    let mut in_quotes = false;
    let mut line = 1u64;
    let mut line_has_content = false;
    let mut records = 0usize;
    let mut pending: Option<BlankLine> = None;

    for &byte in input {
        if in_quotes {
            match byte {
                b'"' => in_quotes = false,
                b'\n' => line += 1,
                _ => {}
            }
            continue;
        }
        match byte {
            b'\n' => {
                if line_has_content {
                    records += 1;
                } else if pending.is_none() {
                    pending = Some(BlankLine {
                        line,
                        records_before: records,
                    });
                }
                line += 1;
                line_has_content = false;
            }
            b'\r' => {}
            _ => {
                if pending.is_some() {
                    return pending;
                }
                line_has_content = true;
                if byte == b'"' {
                    in_quotes = true;
                }
            }
        }
    }
    None
}

/// Text form of a value inside a CSV field
pub fn render_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn check_key_sets(first: &Record, rows: &[Record]) -> Result<()> {
    for (index, row) in rows.iter().enumerate().skip(1) {
        let missing: Vec<String> = first
            .keys()
            .filter(|key| !row.contains_key(key.as_str()))
            .cloned()
            .collect();
        let unexpected: Vec<String> = row
            .keys()
            .filter(|key| !first.contains_key(key.as_str()))
            .cloned()
            .collect();

        if !missing.is_empty() || !unexpected.is_empty() {
            return Err(Error::SchemaMismatch {
                row: index,
                missing,
                unexpected,
            });
        }
    }
    Ok(())
}

fn csv_error(err: csv::Error) -> Error {
    let reason = err.to_string();
    match err.into_kind() {
        csv::ErrorKind::Io(io) => Error::Io(io),
        _ => Error::invalid_format("CSV", reason),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn write_to_string(rows: &[Record], options: CsvOptions) -> Result<String> {
        let mut out = Vec::new();
        write_records(&mut out, rows, options)?;
        Ok(String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_header_follows_first_row_order() {
        let rows = vec![
            record(json!({"name": "Ada", "city": "London", "age": 36})),
            record(json!({"age": 41, "city": "Paris", "name": "Marie"})),
        ];
        let csv = write_to_string(&rows, CsvOptions::default()).unwrap();
        assert_eq!(csv, "name,city,age\nAda,London,36\nMarie,Paris,41\n");
    }

    #[test]
    fn test_special_characters_are_quoted() {
        let rows = vec![record(json!({
            "note": "says \"hi\"",
            "list": "a,b",
            "multi": "line1\nline2",
            "missing": null
        }))];
        let csv = write_to_string(&rows, CsvOptions::default()).unwrap();
        assert_eq!(
            csv,
            "note,list,multi,missing\n\"says \"\"hi\"\"\",\"a,b\",\"line1\nline2\",\n"
        );

        let back = read_records(csv.as_bytes(), CsvOptions::default()).unwrap();
        assert_eq!(back[0]["multi"], json!("line1\nline2"));
        assert_eq!(back[0]["note"], json!("says \"hi\""));
        assert_eq!(back[0]["missing"], json!(""));
    }

    #[test]
    fn test_empty_rows_rejected() {
        let err = write_to_string(&[], CsvOptions::default()).unwrap_err();
        assert!(matches!(err, Error::EmptyDataset(_)));
    }

    #[test]
    fn test_key_mismatch_reports_symmetric_difference() {
        let rows = vec![
            record(json!({"a": 1, "b": 2})),
            record(json!({"a": 3, "c": 4})),
        ];
        match write_to_string(&rows, CsvOptions::default()).unwrap_err() {
            Error::SchemaMismatch {
                row,
                missing,
                unexpected,
            } => {
                assert_eq!(row, 1);
                assert_eq!(missing, vec!["b".to_string()]);
                assert_eq!(unexpected, vec!["c".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_semicolon_without_header() {
        let options = CsvOptions {
            delimiter: b';',
            has_header: false,
        };
        let rows = vec![record(json!({"x": "1;2", "y": true}))];
        let csv = write_to_string(&rows, options).unwrap();
        assert_eq!(csv, "\"1;2\";true\n");

        let back = read_records(csv.as_bytes(), options).unwrap();
        assert_eq!(back[0]["column_1"], json!("1;2"));
        assert_eq!(back[0]["column_2"], json!("true"));
    }

    #[test]
    fn test_ragged_read_is_schema_mismatch() {
        let err = read_records("a,b\n1,2\n3\n".as_bytes(), CsvOptions::default()).unwrap_err();
        match err {
            Error::SchemaMismatch {
                row,
                missing,
                unexpected,
            } => {
                assert_eq!(row, 1);
                assert_eq!(missing, vec!["b".to_string()]);
                assert!(unexpected.is_empty());
            }
            other => panic!("unexpected error: {other}"),
        }

        let err = read_records("a,b\n1,2,3\n".as_bytes(), CsvOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            Error::SchemaMismatch { row: 0, ref unexpected, .. } if unexpected == &vec!["#3".to_string()]
        ));
    }

    #[test]
    fn test_blank_line_between_rows_is_schema_mismatch() {
        let err = read_records("a,b\n1,2\n\n3,4\n".as_bytes(), CsvOptions::default()).unwrap_err();
        match err {
            Error::SchemaMismatch {
                row,
                missing,
                unexpected,
            } => {
                assert_eq!(row, 1);
                assert_eq!(missing, vec!["b".to_string()]);
                assert!(unexpected.is_empty());
            }
            other => panic!("unexpected error: {other}"),
        }

        let headerless = CsvOptions {
            delimiter: b',',
            has_header: false,
        };
        let err = read_records("1,2\r\n\r\n3,4\r\n".as_bytes(), headerless).unwrap_err();
        assert!(matches!(err, Error::SchemaMismatch { row: 1, .. }));
    }

    #[test]
    fn test_trailing_and_quoted_blank_lines_accepted() {
        let rows = read_records("a,b\n1,2\n\n\n".as_bytes(), CsvOptions::default()).unwrap();
        assert_eq!(rows.len(), 1);

        let rows = read_records("a,b\n\"x\n\ny\",2\n".as_bytes(), CsvOptions::default()).unwrap();
        assert_eq!(rows[0]["a"], json!("x\n\ny"));
    }

    #[test]
    fn test_blank_line_detection() {
        assert_eq!(first_interior_blank_line(b"a,b\n1,2\n"), None);
        assert_eq!(first_interior_blank_line(b"a,b\n1,2\n\n"), None);
        assert_eq!(
            first_interior_blank_line(b"a,b\n\n1,2"),
            Some(BlankLine {
                line: 2,
                records_before: 1
            })
        );
        assert_eq!(
            first_interior_blank_line(b"a,b\n\"1\n\n\",2\n\n3,4"),
            Some(BlankLine {
                line: 5,
                records_before: 2
            })
        );
    }

    #[test]
    fn test_duplicate_header_rejected() {
        let err = read_records("a,a\n1,2\n".as_bytes(), CsvOptions::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidDataFormat { .. }));
    }

    #[test]
    fn test_header_only_is_empty() {
        let rows = read_records("a,b\n".as_bytes(), CsvOptions::default()).unwrap();
        assert!(rows.is_empty());
    }
}
