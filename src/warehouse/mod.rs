//! Warehouse client abstraction.
//!
//! [`Warehouse`] is the seam between the load orchestration and a concrete warehouse. Existence
//! checks return a [`Lookup`], which keeps "does not exist" apart from "could not determine":
//!
//! - [`bigquery::BigQueryClient`]: BigQuery REST API over blocking HTTP
//! - [`memory::MemoryWarehouse`]: in-process warehouse for dry runs and tests

pub mod bigquery;
pub mod memory;

use std::time::Duration;

use thiserror::Error;

use crate::config::WarehouseLocation;
use crate::schema::TableSchema;
use crate::types::DataSet;

pub use bigquery::BigQueryClient;
pub use memory::MemoryWarehouse;

/// Convenience result type for warehouse calls.
pub type WarehouseResult<T> = Result<T, WarehouseError>;

/// Error returned by warehouse clients.
#[derive(Debug, Error)]
pub enum WarehouseError {
    /// The request never produced an HTTP response (DNS, TLS, connection reset, ...).
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The warehouse answered with an error status.
    #[error("api error ({status}{}): {message}", .reason.as_deref().map(|r| format!(", {r}")).unwrap_or_default())]
    Api {
        status: u16,
        reason: Option<String>,
        message: String,
    },

    /// Rows or request metadata could not be serialized.
    #[error("encoding error: {0}")]
    Encode(#[from] serde_json::Error),

    /// The job ran and finished with an error.
    #[error("job '{job_id}' failed{}: {message}", .reason.as_deref().map(|r| format!(" ({r})")).unwrap_or_default())]
    JobFailed {
        job_id: String,
        reason: Option<String>,
        message: String,
    },

    /// The job did not finish within the caller's bound.
    #[error("job '{job_id}' still running after {waited:?}")]
    JobTimedOut { job_id: String, waited: Duration },

    /// No usable credentials.
    #[error("credentials error: {0}")]
    Credentials(String),
}

impl WarehouseError {
    /// Shorthand for an [`WarehouseError::Api`] error without a reason.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        WarehouseError::Api {
            status,
            reason: None,
            message: message.into(),
        }
    }
}

/// Outcome of an existence check.
#[derive(Debug)]
pub enum Lookup<T> {
    /// The resource exists.
    Found(T),
    /// The warehouse reported that the resource does not exist.
    NotFound,
    /// The check itself failed; existence is unknown.
    Error(WarehouseError),
}

impl<T> Lookup<T> {
    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Lookup::NotFound)
    }
}

/// Metadata returned for an existing dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetInfo {
    /// `project.dataset`
    pub id: String,
    /// Storage region, when reported.
    pub location: Option<String>,
}

/// Metadata returned for an existing table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableInfo {
    /// `project.dataset.table`
    pub id: String,
    /// Stored row count, when reported.
    pub num_rows: Option<u64>,
}

/// Whether a load adds to or replaces existing table contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteDisposition {
    /// Add rows to the table.
    Append,
    /// Replace the table contents.
    Truncate,
}

impl WriteDisposition {
    /// Name used by the warehouse API.
    pub fn as_api_str(&self) -> &'static str {
        match self {
            WriteDisposition::Append => "WRITE_APPEND",
            WriteDisposition::Truncate => "WRITE_TRUNCATE",
        }
    }
}

/// Reference to a submitted job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    pub project: String,
    pub job_id: String,
    /// Region the job runs in, needed to poll it.
    pub location: Option<String>,
}

/// Result of a finished job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JobOutcome {
    /// Rows written, when reported.
    pub output_rows: Option<u64>,
}

/// Operations the loader needs from a warehouse.
pub trait Warehouse {
    /// Look up the dataset of `location`.
    fn get_dataset(&self, location: &WarehouseLocation) -> Lookup<DatasetInfo>;

    /// Create the dataset of `location` in `region`.
    fn create_dataset(&self, location: &WarehouseLocation, region: &str) -> WarehouseResult<()>;

    /// Look up the table of `location`.
    fn get_table(&self, location: &WarehouseLocation) -> Lookup<TableInfo>;

    /// Create the table of `location` with `schema`.
    fn create_table(&self, location: &WarehouseLocation, schema: &TableSchema) -> WarehouseResult<()>;

    /// Submit a load of every row of `data` into the table of `location`.
    fn submit_load(
        &self,
        location: &WarehouseLocation,
        data: &DataSet,
        disposition: WriteDisposition,
    ) -> WarehouseResult<JobHandle>;

    /// Block until `job` finishes, or until `timeout` elapses.
    ///
    /// A timeout yields [`WarehouseError::JobTimedOut`]; the job keeps running remotely.
    fn await_job(&self, job: &JobHandle, timeout: Option<Duration>) -> WarehouseResult<JobOutcome>;
}

impl<W: Warehouse + ?Sized> Warehouse for &W {
    fn get_dataset(&self, location: &WarehouseLocation) -> Lookup<DatasetInfo> {
        (**self).get_dataset(location)
    }

    fn create_dataset(&self, location: &WarehouseLocation, region: &str) -> WarehouseResult<()> {
        (**self).create_dataset(location, region)
    }

    fn get_table(&self, location: &WarehouseLocation) -> Lookup<TableInfo> {
        (**self).get_table(location)
    }

    fn create_table(&self, location: &WarehouseLocation, schema: &TableSchema) -> WarehouseResult<()> {
        (**self).create_table(location, schema)
    }

    fn submit_load(
        &self,
        location: &WarehouseLocation,
        data: &DataSet,
        disposition: WriteDisposition,
    ) -> WarehouseResult<JobHandle> {
        (**self).submit_load(location, data, disposition)
    }

    fn await_job(&self, job: &JobHandle, timeout: Option<Duration>) -> WarehouseResult<JobOutcome> {
        (**self).await_job(job, timeout)
    }
}

impl<W: Warehouse + ?Sized> Warehouse for Box<W> {
    fn get_dataset(&self, location: &WarehouseLocation) -> Lookup<DatasetInfo> {
        (**self).get_dataset(location)
    }

    fn create_dataset(&self, location: &WarehouseLocation, region: &str) -> WarehouseResult<()> {
        (**self).create_dataset(location, region)
    }

    fn get_table(&self, location: &WarehouseLocation) -> Lookup<TableInfo> {
        (**self).get_table(location)
    }

    fn create_table(&self, location: &WarehouseLocation, schema: &TableSchema) -> WarehouseResult<()> {
        (**self).create_table(location, schema)
    }

    fn submit_load(
        &self,
        location: &WarehouseLocation,
        data: &DataSet,
        disposition: WriteDisposition,
    ) -> WarehouseResult<JobHandle> {
        (**self).submit_load(location, data, disposition)
    }

    fn await_job(&self, job: &JobHandle, timeout: Option<Duration>) -> WarehouseResult<JobOutcome> {
        (**self).await_job(job, timeout)
    }
}
