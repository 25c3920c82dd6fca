//! Provisioning and load orchestration.
//!
//! [`Loader`] drives a [`Warehouse`] through three steps, strictly in order:
//!
//! 1. [`Loader::ensure_dataset`]: create the dataset if the warehouse reports it absent
//! 2. [`Loader::ensure_table`]: create the table from the inferred schema if absent
//! 3. [`Loader::load`]: append every row and wait for the job
//!
//! A lookup that fails for any reason other than "not found" stops the run before anything
//! is created.

pub mod observer;

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::LoadSettings;
use crate::error::{Error, Resource, Result};
use crate::schema::table_schema_for;
use crate::types::DataSet;
use crate::warehouse::{Lookup, Warehouse, WarehouseError, WriteDisposition};

pub use observer::{ConsoleObserver, LoadEvent, LoadObserver};

/// How a resource came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceState {
    Existed,
    Created,
}

/// Result of [`Loader::load`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadSummary {
    pub job_id: String,
    /// Rows sent with the job.
    pub rows_submitted: usize,
    /// Rows the warehouse reports as written, when known.
    pub output_rows: Option<u64>,
}

/// Result of a complete [`Loader::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    pub dataset: ResourceState,
    pub table: ResourceState,
    pub load: LoadSummary,
}

/// Provisions the destination of a [`LoadSettings`] and appends datasets to it.
pub struct Loader<W: Warehouse> {
    warehouse: W,
    settings: LoadSettings,
    observer: Option<Arc<dyn LoadObserver>>,
}

impl<W: Warehouse> Loader<W> {
    pub fn new(warehouse: W, settings: LoadSettings) -> Self {
        Self {
            warehouse,
            settings,
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn LoadObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    fn emit(&self, event: LoadEvent) {
        if let Some(obs) = &self.observer {
            obs.on_event(&event);
        }
    }

    /// Make sure the dataset exists, creating it in the configured region if absent.
    pub fn ensure_dataset(&self) -> Result<ResourceState> {
        let location = &self.settings.location;
        let id = location.dataset_path();

        match self.warehouse.get_dataset(location) {
            Lookup::Found(info) => {
                info!(dataset = %id, region = ?info.location, "dataset exists");
                self.emit(LoadEvent::DatasetExists {
                    dataset: id,
                    region: info.location,
                });
                Ok(ResourceState::Existed)
            }
            Lookup::NotFound => {
                let region = self.settings.region.as_str();
                self.warehouse
                    .create_dataset(location, region)
                    .map_err(|e| provisioning_error(Resource::Dataset, &id, e))?;
                info!(dataset = %id, region, "dataset created");
                self.emit(LoadEvent::DatasetCreated {
                    dataset: id,
                    region: region.to_string(),
                });
                Ok(ResourceState::Created)
            }
            Lookup::Error(e) => Err(provisioning_error(Resource::Dataset, &id, e)),
        }
    }

    /// Make sure the table exists, creating it with the schema inferred from `data` if absent.
    ///
    /// An existing table is used as is, even when its schema differs from `data`.
    pub fn ensure_table(&self, data: &DataSet) -> Result<ResourceState> {
        let location = &self.settings.location;
        let id = location.table_path();

        match self.warehouse.get_table(location) {
            Lookup::Found(info) => {
                info!(table = %id, rows = ?info.num_rows, "table exists");
                self.emit(LoadEvent::TableExists {
                    table: id,
                    rows: info.num_rows,
                });
                Ok(ResourceState::Existed)
            }
            Lookup::NotFound => {
                let schema = table_schema_for(data);
                self.warehouse
                    .create_table(location, &schema)
                    .map_err(|e| provisioning_error(Resource::Table, &id, e))?;
                info!(table = %id, columns = schema.len(), "table created");
                self.emit(LoadEvent::TableCreated {
                    table: id,
                    columns: schema.len(),
                });
                Ok(ResourceState::Created)
            }
            Lookup::Error(e) => Err(provisioning_error(Resource::Table, &id, e)),
        }
    }

    /// Append every row of `data` to the table and wait for the job to finish.
    pub fn load(&self, data: &DataSet) -> Result<LoadSummary> {
        let location = &self.settings.location;
        let table = location.table_path();

        let handle = self
            .warehouse
            .submit_load(location, data, WriteDisposition::Append)
            .map_err(|e| load_error(&table, e))?;
        info!(table = %table, job_id = %handle.job_id, rows = data.row_count(), "load job submitted");
        self.emit(LoadEvent::LoadSubmitted {
            table: table.clone(),
            job_id: handle.job_id.clone(),
        });

        let outcome = match self.warehouse.await_job(&handle, self.settings.job_timeout) {
            Ok(outcome) => outcome,
            Err(WarehouseError::JobTimedOut { job_id, waited }) => {
                warn!(%job_id, ?waited, "load job did not finish in time");
                return Err(Error::Timeout {
                    job_id,
                    timeout: self.settings.job_timeout.unwrap_or(waited),
                });
            }
            Err(e) => return Err(load_error(&table, e)),
        };

        info!(table = %table, job_id = %handle.job_id, output_rows = ?outcome.output_rows, "load job completed");
        self.emit(LoadEvent::LoadCompleted {
            table,
            job_id: handle.job_id.clone(),
            rows: data.row_count(),
        });

        Ok(LoadSummary {
            job_id: handle.job_id,
            rows_submitted: data.row_count(),
            output_rows: outcome.output_rows,
        })
    }

    /// Provision the dataset and table, then load `data`.
    pub fn run(&self, data: &DataSet) -> Result<LoadReport> {
        let dataset = self.ensure_dataset()?;
        let table = self.ensure_table(data)?;
        let load = self.load(data)?;
        Ok(LoadReport {
            dataset,
            table,
            load,
        })
    }
}

fn provisioning_error(resource: Resource, id: &str, source: WarehouseError) -> Error {
    warn!(%resource, id, error = %source, "provisioning failed");
    Error::Provisioning {
        resource,
        id: id.to_string(),
        source,
    }
}

fn load_error(table: &str, source: WarehouseError) -> Error {
    warn!(table, error = %source, "load failed");
    Error::Load {
        table: table.to_string(),
        source,
    }
}
