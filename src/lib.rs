//! `sheetload` loads a spreadsheet into a BigQuery table.
//!
//! A run reads one sheet into an in-memory [`types::DataSet`], inferring a type per column,
//! makes sure the destination dataset and table exist (creating them when the warehouse
//! reports them absent), and appends every row with a single load job.
//!
//! ## What you can load
//!
//! **File formats (auto-detected by extension):**
//!
//! - **Excel/workbooks**: `.xlsx`, `.xls`, `.xlsm`, `.xlsb`, `.ods`
//! - **CSV**: `.csv`
//!
//! **Inferred column types and their warehouse types:**
//!
//! - [`types::DataType::Int64`] → `INTEGER`
//! - [`types::DataType::Float64`] → `FLOAT`
//! - [`types::DataType::Timestamp`] → `TIMESTAMP`
//! - [`types::DataType::Bool`] and [`types::DataType::Utf8`] → `STRING`
//!
//! Empty cells map to [`types::Value::Null`]. A source without data rows is not an error
//! worth failing for: [`Error::EmptyDataset`] ends the run before the warehouse is contacted.
//!
//! ## Quick example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use sheetload::config::{LoadSettings, WarehouseLocation};
//! use sheetload::ingestion::{read_source, SourceOptions};
//! use sheetload::orchestrator::{ConsoleObserver, Loader};
//! use sheetload::warehouse::MemoryWarehouse;
//!
//! # fn main() -> Result<(), sheetload::Error> {
//! let data = read_source("orders.xlsx", &SourceOptions::default())?;
//! let location = WarehouseLocation::new("my-project", "sales", "orders")?;
//!
//! let warehouse = MemoryWarehouse::new();
//! let report = Loader::new(&warehouse, LoadSettings::new(location))
//!     .with_observer(Arc::new(ConsoleObserver))
//!     .run(&data)?;
//! println!("job={} rows={}", report.load.job_id, report.load.rows_submitted);
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`ingestion`]: source reading and column type inference
//! - [`schema`]: mapping inferred types to a warehouse table schema
//! - [`orchestrator`]: idempotent provisioning and the append load
//! - [`warehouse`]: the [`warehouse::Warehouse`] trait, a BigQuery client and an in-memory one
//! - [`config`] and [`cli`]: run configuration
//! - [`types`]: in-memory dataset types
//! - [`error`]: error types and exit codes

pub mod cli;
pub mod config;
pub mod error;
pub mod ingestion;
pub mod orchestrator;
pub mod schema;
pub mod types;
pub mod warehouse;

use std::sync::Arc;

pub use error::{Error, ReadError, Result};

use config::Config;
use orchestrator::{LoadEvent, LoadObserver, LoadReport, Loader};
use types::DataSet;
use warehouse::Warehouse;

/// Read the configured source, reporting its shape to `observer`.
///
/// # Errors
///
/// Fails with [`Error::EmptyDataset`] (graceful) when the source has no data rows, and with
/// [`Error::Read`] when it cannot be read.
pub fn read(config: &Config, observer: Option<&dyn LoadObserver>) -> Result<DataSet> {
    let data = ingestion::read_source(&config.source, &config.source_options)?;
    if let Some(obs) = observer {
        obs.on_event(&LoadEvent::SourceRead {
            path: config.source.clone(),
            rows: data.row_count(),
            columns: data.column_count(),
        });
    }
    Ok(data)
}

/// Provision the configured destination in `warehouse` and append `data` to it.
pub fn load<W: Warehouse>(
    config: &Config,
    data: &DataSet,
    warehouse: W,
    observer: Option<Arc<dyn LoadObserver>>,
) -> Result<LoadReport> {
    let mut loader = Loader::new(warehouse, config.load.clone());
    if let Some(obs) = observer {
        loader = loader.with_observer(obs);
    }
    loader.run(data)
}

/// Read the configured source and load it into `warehouse`.
///
/// # Errors
///
/// Fails with [`Error::EmptyDataset`] (graceful) when the source has no data rows, and with the
/// first read, provisioning or load error otherwise. Nothing reaches the warehouse when the
/// source cannot be read.
pub fn run<W: Warehouse>(
    config: &Config,
    warehouse: W,
    observer: Option<Arc<dyn LoadObserver>>,
) -> Result<LoadReport> {
    let data = read(config, observer.as_deref())?;
    load(config, &data, warehouse, observer)
}
