use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;

use crate::error::TimetableError;

pub type Record = HashMap<String, String>;

/// reads a CSV file with header row into one map (column -> value) per row
pub fn read_to_maps(filepath: &str) -> Result<Vec<Record>, TimetableError> {
    let f = File::open(filepath).map_err(|e| TimetableError::io(filepath, e))?;
    let reader = BufReader::new(f);

    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut rows = Vec::new();
    for result in rdr.deserialize() {
        let row: Record = result.map_err(|e| TimetableError::csv(filepath, e))?;
        rows.push(row);
    }

    Ok(rows)
}

/// returns the (trimmed) value of `column`, rows are numbered starting with 1 (header excluded)
pub fn required<'a>(
    record: &'a Record,
    row: usize,
    column: &'static str,
) -> Result<&'a str, TimetableError> {
    record
        .get(column)
        .map(|value| value.as_str())
        .ok_or(TimetableError::MissingColumn { row, column })
}

/// like `required`, but an absent column and an empty cell both yield `None`
pub fn optional<'a>(record: &'a Record, column: &str) -> Option<&'a str> {
    record
        .get(column)
        .map(|value| value.as_str())
        .filter(|value| !value.is_empty())
}

pub fn parse_required<T: std::str::FromStr>(
    record: &Record,
    row: usize,
    column: &'static str,
) -> Result<T, TimetableError> {
    let value = required(record, row, column)?;
    value.parse().map_err(|_| TimetableError::InvalidValue {
        row,
        column,
        value: value.to_string(),
    })
}
