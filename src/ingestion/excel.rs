use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use tracing::debug;

use crate::error::{ReadError, ReadResult};
use crate::types::DataSet;

use super::infer::{build_dataset, parse_timestamp, Cell};

/// Read one sheet of a workbook (`.xlsx`, `.xls`, `.ods`, etc.) into an in-memory `DataSet`.
///
/// Behavior:
/// - Picks `sheet_name` if provided; otherwise uses the first sheet in the workbook
/// - Detects the first non-empty row as the header row
/// - Reads remaining rows and infers one type per column
/// - A sheet without any non-empty cell yields a dataset with no columns and no rows
pub fn read_excel_from_path(path: impl AsRef<Path>, sheet_name: Option<&str>) -> ReadResult<DataSet> {
    let mut workbook = open_workbook_auto(path)?;

    let names = workbook.sheet_names().to_vec();
    let sheet = match sheet_name {
        Some(name) => names
            .iter()
            .find(|s| s.as_str() == name)
            .cloned()
            .ok_or_else(|| ReadError::SheetNotFound {
                sheet: name.to_string(),
                available: names.clone(),
            })?,
        None => names.first().cloned().ok_or_else(|| ReadError::Malformed {
            message: "workbook has no sheets".to_string(),
        })?,
    };

    let range = workbook.worksheet_range(&sheet)?;
    Ok(read_sheet_range(&sheet, &range))
}

fn read_sheet_range(sheet: &str, range: &calamine::Range<Data>) -> DataSet {
    let mut rows = range.rows().enumerate();

    let header = rows.find(|(_, row)| row.iter().any(|c| !matches!(c, Data::Empty)));
    let Some((header_row_idx, header_cells)) = header else {
        debug!(sheet, "sheet has no non-empty rows");
        return build_dataset(&[], Vec::new());
    };

    let headers: Vec<String> = header_cells.iter().map(cell_to_header_string).collect();
    debug!(sheet, header_row = header_row_idx + 1, headers = ?headers, "detected header row");

    let data: Vec<Vec<Cell>> = rows
        .map(|(_, row)| row.iter().map(convert_cell).collect())
        .collect();

    build_dataset(&headers, data)
}

fn cell_to_header_string(c: &Data) -> String {
    match c {
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => {
            if f.fract() == 0.0 {
                (*f as i64).to_string()
            } else {
                f.to_string()
            }
        }
        Data::Bool(b) => b.to_string(),
        Data::DateTime(f) => f.to_string(),
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
        Data::Error(e) => format!("{e:?}"),
        Data::Empty => "".to_string(),
    }
}

fn convert_cell(c: &Data) -> Cell {
    match c {
        Data::Empty => Cell::Empty,
        Data::Int(i) => Cell::Int(*i),
        Data::Float(f) => Cell::Float(*f),
        Data::Bool(b) => Cell::Bool(*b),
        Data::String(s) if s.trim().is_empty() => Cell::Empty,
        Data::String(s) => Cell::Text(s.clone()),
        Data::DateTime(dt) if dt.is_duration() => Cell::Text(dt.to_string()),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(ts) => Cell::Timestamp(ts),
            None => Cell::Text(dt.to_string()),
        },
        Data::DateTimeIso(s) => match parse_timestamp(s) {
            Some(ts) => Cell::Timestamp(ts),
            None => Cell::Text(s.clone()),
        },
        Data::DurationIso(s) => Cell::Text(s.clone()),
        Data::Error(e) => Cell::Text(format!("{e:?}")),
    }
}
