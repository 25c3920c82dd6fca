use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::warehouse::WarehouseError;

/// Convenience result type for source reading.
pub type ReadResult<T> = Result<T, ReadError>;

/// Convenience result type for a load run.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Error type returned by the source reader.
///
/// Shared across workbook and CSV sources.
#[derive(Debug, Error)]
pub enum ReadError {
    /// Underlying I/O error (e.g. file not found, permission denied).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Workbook could not be opened or parsed.
    #[error("excel error: {0}")]
    Excel(#[from] calamine::Error),

    /// CSV could not be parsed.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// The file extension does not name a supported source format.
    #[error("unsupported source format: {message}")]
    UnsupportedFormat { message: String },

    /// The requested sheet is not present in the workbook.
    #[error("sheet '{sheet}' not found (available: {available:?})")]
    SheetNotFound { sheet: String, available: Vec<String> },

    /// The file parsed but its structure is unusable.
    #[error("malformed source: {message}")]
    Malformed { message: String },
}

/// Warehouse resource kind, used to label provisioning failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Dataset,
    Table,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Dataset => f.write_str("dataset"),
            Resource::Table => f.write_str("table"),
        }
    }
}

/// Top-level error for a load run.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid configuration (empty identifiers, unusable credentials, ...).
    #[error("invalid configuration: {message}")]
    Config { message: String },

    /// The source file could not be read. Nothing was sent to the warehouse.
    #[error("failed to read '{}': {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: ReadError,
    },

    /// The source parsed but holds no data rows. Nothing was sent to the warehouse.
    #[error("'{}' contains no data rows; nothing to load", .path.display())]
    EmptyDataset { path: PathBuf },

    /// An existence check or a create call failed for a reason other than "not found".
    #[error("failed to provision {resource} '{id}': {source}")]
    Provisioning {
        resource: Resource,
        id: String,
        #[source]
        source: WarehouseError,
    },

    /// The load job could not be submitted or finished with an error.
    #[error("load into '{table}' failed: {source}")]
    Load {
        table: String,
        #[source]
        source: WarehouseError,
    },

    /// The load job did not finish within the configured bound; its outcome is unknown.
    #[error("load job '{job_id}' did not complete within {timeout:?}; its outcome is unknown")]
    Timeout { job_id: String, timeout: Duration },
}

impl Error {
    /// Whether the run should end with a zero exit code despite the error.
    pub fn is_graceful(&self) -> bool {
        matches!(self, Error::EmptyDataset { .. })
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::EmptyDataset { .. } => 0,
            Error::Config { .. } => 2,
            Error::Read { .. } => 3,
            Error::Provisioning { .. } => 4,
            Error::Load { .. } => 5,
            Error::Timeout { .. } => 6,
        }
    }
}
