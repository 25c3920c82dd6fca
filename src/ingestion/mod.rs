//! Source reading.
//!
//! Most callers should use [`read_source`] (from [`unified`]) which:
//!
//! - auto-detects format by file extension (or you can override via [`SourceOptions`])
//! - reads the chosen sheet into an in-memory [`crate::types::DataSet`], inferring column types
//! - rejects sources without data rows
//!
//! Format-specific functions are also available under:
//! - [`csv`]
//! - [`excel`]

pub mod csv;
pub mod excel;
pub mod infer;
pub mod unified;

pub use unified::{ingest_from_path, read_source, SheetSelection, SourceFormat, SourceOptions};
