//! Column type inference shared by the workbook and CSV readers.
//!
//! Readers turn raw cells into [`Cell`]s; [`build_dataset`] names the columns, infers one
//! [`DataType`] per column and converts every cell into a [`Value`] of that type.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use tracing::debug;

use crate::types::{DataSet, DataType, Field, Schema, Value};

/// A source cell after format-specific decoding, before the column type is known.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Int(i64),
    Float(f64),
    Bool(bool),
    Timestamp(NaiveDateTime),
    Text(String),
}

impl Cell {
    fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    /// Integer value if the cell holds a whole number that fits in `i64`.
    fn as_integral(&self) -> Option<i64> {
        match self {
            Cell::Int(i) => Some(*i),
            Cell::Float(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < 9.2e18 => {
                Some(*f as i64)
            }
            _ => None,
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Int(i) => Some(*i as f64),
            Cell::Float(f) => Some(*f),
            _ => None,
        }
    }

    fn render(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Int(i) => i.to_string(),
            Cell::Float(f) => f.to_string(),
            Cell::Bool(b) => b.to_string(),
            Cell::Timestamp(ts) => format_timestamp(ts),
            Cell::Text(s) => s.clone(),
        }
    }
}

/// Classify a CSV field from its text.
///
/// Surrounding whitespace is ignored when recognising numbers, booleans and timestamps.
/// Only a zero-length field is empty; anything else that is not recognised stays text as written.
pub fn classify_text(raw: &str) -> Cell {
    if raw.is_empty() {
        return Cell::Empty;
    }
    let s = raw.trim();
    if s.is_empty() {
        return Cell::Text(raw.to_string());
    }
    if let Ok(i) = s.parse::<i64>() {
        return Cell::Int(i);
    }
    if let Ok(f) = s.parse::<f64>() {
        return Cell::Float(f);
    }
    if s.eq_ignore_ascii_case("true") {
        return Cell::Bool(true);
    }
    if s.eq_ignore_ascii_case("false") {
        return Cell::Bool(false);
    }
    match parse_timestamp(s) {
        Some(ts) => Cell::Timestamp(ts),
        None => Cell::Text(raw.to_string()),
    }
}

/// Parse an ISO-8601-like timestamp or date.
///
/// Offsets are normalised to UTC.
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Format a timestamp the way the warehouse expects it in text payloads.
pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format("%Y-%m-%d %H:%M:%S%.6f").to_string()
}

/// Infer the type of one column from its cells.
pub fn infer_column_type(cells: &[&Cell]) -> DataType {
    let non_empty: Vec<&Cell> = cells.iter().copied().filter(|c| !c.is_empty()).collect();
    let has_gaps = non_empty.len() < cells.len();

    if non_empty.is_empty() {
        // An all-blank column is numeric NaN throughout.
        return DataType::Float64;
    }
    if non_empty.iter().all(|c| c.as_integral().is_some()) {
        return if has_gaps {
            DataType::Float64
        } else {
            DataType::Int64
        };
    }
    if non_empty.iter().all(|c| c.as_f64().is_some()) {
        return DataType::Float64;
    }
    if non_empty.iter().all(|c| matches!(c, Cell::Timestamp(_))) {
        return DataType::Timestamp;
    }
    if !has_gaps && non_empty.iter().all(|c| matches!(c, Cell::Bool(_))) {
        return DataType::Bool;
    }
    DataType::Utf8
}

fn convert(cell: Cell, raw: Option<String>, data_type: DataType) -> Value {
    if cell.is_empty() {
        return Value::Null;
    }
    match data_type {
        DataType::Int64 => cell.as_integral().map(Value::Int64).unwrap_or(Value::Null),
        DataType::Float64 => cell.as_f64().map(Value::Float64).unwrap_or(Value::Null),
        DataType::Bool => match cell {
            Cell::Bool(b) => Value::Bool(b),
            _ => Value::Null,
        },
        DataType::Timestamp => match cell {
            Cell::Timestamp(ts) => Value::Timestamp(ts),
            _ => Value::Null,
        },
        DataType::Utf8 => match (cell, raw) {
            (_, Some(text)) => Value::Utf8(text),
            (Cell::Text(s), None) => Value::Utf8(s),
            (other, None) => Value::Utf8(other.render()),
        },
    }
}

/// Make header names usable as column names.
///
/// Blank headers become `Unnamed: {index}`; repeated names get `.1`, `.2`, ... suffixes.
pub fn normalize_headers(raw: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(raw.len());
    for (idx, h) in raw.iter().enumerate() {
        let base = match h.trim() {
            "" => format!("Unnamed: {idx}"),
            name => name.to_string(),
        };
        let mut candidate = base.clone();
        let mut n = 0usize;
        while out.contains(&candidate) {
            n += 1;
            candidate = format!("{base}.{n}");
        }
        out.push(candidate);
    }
    out
}

/// Build a typed [`DataSet`] from a header row and decoded data rows.
///
/// Rows shorter than the header are padded with empty cells; cells beyond the header are
/// dropped. Rows with no non-empty cell are skipped.
pub fn build_dataset(headers: &[String], rows: Vec<Vec<Cell>>) -> DataSet {
    let rows = rows
        .into_iter()
        .map(|row| row.into_iter().map(|c| (c, None)).collect())
        .collect();
    assemble(headers, rows)
}

/// Build a typed [`DataSet`] from a header row and text fields.
///
/// Fields are classified with [`classify_text`]. Columns that end up as text keep every field
/// exactly as written.
pub fn build_dataset_from_text(headers: &[String], rows: Vec<Vec<String>>) -> DataSet {
    let rows = rows
        .into_iter()
        .map(|row| {
            row.into_iter()
                .map(|field| (classify_text(&field), Some(field)))
                .collect()
        })
        .collect();
    assemble(headers, rows)
}

fn assemble(headers: &[String], rows: Vec<Vec<(Cell, Option<String>)>>) -> DataSet {
    let names = normalize_headers(headers);
    let width = names.len();

    let rows: Vec<Vec<(Cell, Option<String>)>> = rows
        .into_iter()
        .filter(|row| row.iter().any(|(c, _)| !c.is_empty()))
        .map(|mut row| {
            row.resize(width, (Cell::Empty, None));
            row
        })
        .collect();

    let types: Vec<DataType> = (0..width)
        .map(|col| {
            let cells: Vec<&Cell> = rows.iter().map(|row| &row[col].0).collect();
            infer_column_type(&cells)
        })
        .collect();

    for (name, dt) in names.iter().zip(types.iter()) {
        debug!(column = %name, data_type = ?dt, "inferred column type");
    }

    let values = rows
        .into_iter()
        .map(|row| {
            row.into_iter()
                .zip(types.iter())
                .map(|((cell, raw), dt)| convert(cell, raw, *dt))
                .collect()
        })
        .collect();

    let fields = names
        .into_iter()
        .zip(types)
        .map(|(name, dt)| Field::new(name, dt))
        .collect();

    DataSet::new(Schema::new(fields), values)
}
