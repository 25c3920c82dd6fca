//! CSV source reader.

use std::path::Path;

use crate::error::ReadResult;
use crate::types::DataSet;

use super::infer::build_dataset_from_text;

/// Read a CSV file into an in-memory [`DataSet`].
///
/// Rules:
///
/// - CSV must have a header row.
/// - Rows may have fewer fields than the header (missing fields are empty).
/// - Each column's type is inferred from the text of its fields.
pub fn read_csv_from_path(path: impl AsRef<Path>) -> ReadResult<DataSet> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;
    read_csv_from_reader(&mut rdr)
}

/// Read CSV data from an existing CSV reader.
pub fn read_csv_from_reader<R: std::io::Read>(rdr: &mut csv::Reader<R>) -> ReadResult<DataSet> {
    let headers: Vec<String> = rdr.headers()?.iter().map(str::to_owned).collect();

    let mut rows: Vec<Vec<String>> = Vec::new();
    for result in rdr.records() {
        let record = result?;
        rows.push(record.iter().map(str::to_owned).collect());
    }

    Ok(build_dataset_from_text(&headers, rows))
}
