//! Unified source entrypoint.
//!
//! Most callers should use [`read_source`], which reads a file into an in-memory
//! [`crate::types::DataSet`] and rejects sources without data rows.
//!
//! - If [`SourceOptions::format`] is `None`, the format is inferred from the file extension.
//! - [`SourceOptions::sheet`] picks the workbook sheet (the first one by default).

use std::path::Path;

use tracing::{debug, info};

use crate::error::{Error, ReadError, ReadResult, Result};
use crate::types::DataSet;

use super::{csv, excel};

/// Supported source formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    /// Comma-separated values.
    Csv,
    /// Spreadsheet/workbook formats.
    Excel,
}

impl SourceFormat {
    /// Parse a source format from a file extension (case-insensitive).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "csv" => Some(Self::Csv),
            "xlsx" | "xls" | "xlsm" | "xlsb" | "ods" => Some(Self::Excel),
            _ => None,
        }
    }
}

/// Which workbook sheet to read.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SheetSelection {
    /// The first sheet (default).
    #[default]
    First,
    /// A single named sheet.
    Sheet(String),
}

/// Options controlling how a source is read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceOptions {
    /// If `None`, detect format from file extension.
    pub format: Option<SourceFormat>,
    /// Sheet selection for workbooks. Ignored for CSV.
    pub sheet: SheetSelection,
}

/// Read `path` into a dataset, which may have zero rows.
pub fn ingest_from_path(path: impl AsRef<Path>, options: &SourceOptions) -> ReadResult<DataSet> {
    let path = path.as_ref();
    let fmt = match options.format {
        Some(f) => f,
        None => infer_format_from_path(path)?,
    };
    debug!(path = %path.display(), format = ?fmt, "reading source");

    match fmt {
        SourceFormat::Csv => csv::read_csv_from_path(path),
        SourceFormat::Excel => match &options.sheet {
            SheetSelection::First => excel::read_excel_from_path(path, None),
            SheetSelection::Sheet(name) => excel::read_excel_from_path(path, Some(name.as_str())),
        },
    }
}

/// Read `path` for loading.
///
/// Fails with [`Error::Read`] when the file cannot be read and with [`Error::EmptyDataset`]
/// when it holds no data rows.
pub fn read_source(path: impl AsRef<Path>, options: &SourceOptions) -> Result<DataSet> {
    let path = path.as_ref();
    let ds = ingest_from_path(path, options).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })?;

    if ds.is_empty() {
        return Err(Error::EmptyDataset {
            path: path.to_path_buf(),
        });
    }

    info!(
        path = %path.display(),
        rows = ds.row_count(),
        columns = ds.column_count(),
        "source read"
    );
    Ok(ds)
}

fn infer_format_from_path(path: &Path) -> ReadResult<SourceFormat> {
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .ok_or_else(|| ReadError::UnsupportedFormat {
            message: format!("path has no extension ({})", path.display()),
        })?;

    SourceFormat::from_extension(ext).ok_or_else(|| ReadError::UnsupportedFormat {
        message: format!("extension '{ext}' is not supported ({})", path.display()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_formats_case_insensitively() {
        assert_eq!(SourceFormat::from_extension("XLSX"), Some(SourceFormat::Excel));
        assert_eq!(SourceFormat::from_extension("ods"), Some(SourceFormat::Excel));
        assert_eq!(SourceFormat::from_extension("csv"), Some(SourceFormat::Csv));
        assert_eq!(SourceFormat::from_extension("parquet"), None);
    }

    #[test]
    fn unknown_extension_is_a_read_error() {
        let err = read_source("data.txt", &SourceOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            Error::Read {
                source: ReadError::UnsupportedFormat { .. },
                ..
            }
        ));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = read_source("does/not/exist.xlsx", &SourceOptions::default()).unwrap_err();
        assert!(matches!(err, Error::Read { .. }));
        assert!(!err.is_graceful());
    }
}
