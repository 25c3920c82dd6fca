//! In-process [`Warehouse`] used for `--dry-run` and tests.
//!
//! Keeps datasets, tables and jobs behind a mutex, records every call, and can be told to fail
//! a given operation or to leave jobs running forever.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tracing::debug;

use crate::config::WarehouseLocation;
use crate::schema::{warehouse_type_for, TableSchema};
use crate::types::{DataSet, Value};

use super::{
    DatasetInfo, JobHandle, JobOutcome, Lookup, TableInfo, Warehouse, WarehouseError, WarehouseResult,
    WriteDisposition,
};

/// Warehouse operations, used to target injected faults and to inspect recorded calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    GetDataset,
    CreateDataset,
    GetTable,
    CreateTable,
    SubmitLoad,
    AwaitJob,
}

/// A call received by a [`MemoryWarehouse`].
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    GetDataset { dataset: String },
    CreateDataset { dataset: String, region: String },
    GetTable { table: String },
    CreateTable { table: String, schema: TableSchema },
    SubmitLoad {
        table: String,
        rows: usize,
        disposition: WriteDisposition,
    },
    AwaitJob { job_id: String },
}

impl Call {
    pub fn operation(&self) -> Operation {
        match self {
            Call::GetDataset { .. } => Operation::GetDataset,
            Call::CreateDataset { .. } => Operation::CreateDataset,
            Call::GetTable { .. } => Operation::GetTable,
            Call::CreateTable { .. } => Operation::CreateTable,
            Call::SubmitLoad { .. } => Operation::SubmitLoad,
            Call::AwaitJob { .. } => Operation::AwaitJob,
        }
    }
}

#[derive(Debug, Clone)]
struct Fault {
    status: u16,
    reason: Option<String>,
    message: String,
}

#[derive(Debug, Clone)]
struct StoredTable {
    schema: TableSchema,
    rows: Vec<Vec<Value>>,
}

#[derive(Debug)]
struct PendingJob {
    table: String,
    data: DataSet,
    disposition: WriteDisposition,
}

#[derive(Debug, Default)]
struct State {
    datasets: HashMap<String, String>,
    tables: HashMap<String, StoredTable>,
    jobs: HashMap<String, PendingJob>,
    next_job: u64,
    calls: Vec<Call>,
    faults: HashMap<Operation, Fault>,
    stall_jobs: bool,
}

/// In-memory warehouse.
#[derive(Debug, Default)]
pub struct MemoryWarehouse {
    state: Mutex<State>,
}

impl MemoryWarehouse {
    /// Create an empty warehouse.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("memory warehouse mutex poisoned")
    }

    /// Make every subsequent `op` call fail with an API error.
    pub fn fail_with(&self, op: Operation, status: u16, reason: Option<&str>, message: &str) {
        self.state().faults.insert(
            op,
            Fault {
                status,
                reason: reason.map(str::to_string),
                message: message.to_string(),
            },
        );
    }

    /// Remove an injected fault.
    pub fn clear_fault(&self, op: Operation) {
        self.state().faults.remove(&op);
    }

    /// Leave submitted jobs running: `await_job` times out instead of applying them.
    ///
    /// The wait is simulated. With a timeout the error reports that timeout as `waited`;
    /// without one `await_job` fails at once with `waited` of zero rather than blocking forever.
    pub fn stall_jobs(&self) {
        self.state().stall_jobs = true;
    }

    /// Register an existing dataset.
    pub fn with_dataset(self, location: &WarehouseLocation, region: &str) -> Self {
        self.state()
            .datasets
            .insert(location.dataset_path(), region.to_string());
        self
    }

    /// Register an existing table (and its dataset) holding `rows`.
    pub fn with_table(self, location: &WarehouseLocation, schema: TableSchema, rows: Vec<Vec<Value>>) -> Self {
        {
            let mut state = self.state();
            state
                .datasets
                .entry(location.dataset_path())
                .or_insert_with(|| crate::config::DEFAULT_REGION.to_string());
            state
                .tables
                .insert(location.table_path(), StoredTable { schema, rows });
        }
        self
    }

    /// Every call received so far, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    /// Number of calls of kind `op` received so far.
    pub fn call_count(&self, op: Operation) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|c| c.operation() == op)
            .count()
    }

    /// Region of an existing dataset.
    pub fn dataset_region(&self, location: &WarehouseLocation) -> Option<String> {
        self.state().datasets.get(&location.dataset_path()).cloned()
    }

    /// Schema of an existing table.
    pub fn table_schema(&self, location: &WarehouseLocation) -> Option<TableSchema> {
        self.state()
            .tables
            .get(&location.table_path())
            .map(|t| t.schema.clone())
    }

    /// Rows stored in an existing table.
    pub fn table_rows(&self, location: &WarehouseLocation) -> Option<Vec<Vec<Value>>> {
        self.state()
            .tables
            .get(&location.table_path())
            .map(|t| t.rows.clone())
    }

    /// Row count of an existing table.
    pub fn row_count(&self, location: &WarehouseLocation) -> Option<usize> {
        self.state()
            .tables
            .get(&location.table_path())
            .map(|t| t.rows.len())
    }
}

impl State {
    fn record(&mut self, call: Call) -> WarehouseResult<()> {
        let op = call.operation();
        self.calls.push(call);
        match self.faults.get(&op) {
            Some(f) => Err(WarehouseError::Api {
                status: f.status,
                reason: f.reason.clone(),
                message: f.message.clone(),
            }),
            None => Ok(()),
        }
    }
}

/// Check that `data` fits `schema` by position, name and type.
fn check_compatible(schema: &TableSchema, data: &DataSet) -> Result<(), String> {
    if schema.len() != data.column_count() {
        return Err(format!(
            "schema mismatch: table has {} columns, data has {}",
            schema.len(),
            data.column_count()
        ));
    }
    for (col, field) in schema.columns.iter().zip(&data.schema.fields) {
        if col.name != field.name {
            return Err(format!(
                "schema mismatch: expected column '{}', got '{}'",
                col.name, field.name
            ));
        }
        let got = warehouse_type_for(&field.data_type);
        if col.field_type != got {
            return Err(format!(
                "schema mismatch: column '{}' is {}, data is {}",
                col.name, col.field_type, got
            ));
        }
    }
    Ok(())
}

impl Warehouse for MemoryWarehouse {
    fn get_dataset(&self, location: &WarehouseLocation) -> Lookup<DatasetInfo> {
        let id = location.dataset_path();
        let mut state = self.state();
        if let Err(e) = state.record(Call::GetDataset { dataset: id.clone() }) {
            return Lookup::Error(e);
        }
        match state.datasets.get(&id) {
            Some(region) => Lookup::Found(DatasetInfo {
                id,
                location: Some(region.clone()),
            }),
            None => Lookup::NotFound,
        }
    }

    fn create_dataset(&self, location: &WarehouseLocation, region: &str) -> WarehouseResult<()> {
        let id = location.dataset_path();
        let mut state = self.state();
        state.record(Call::CreateDataset {
            dataset: id.clone(),
            region: region.to_string(),
        })?;
        if state.datasets.contains_key(&id) {
            return Err(WarehouseError::Api {
                status: 409,
                reason: Some("duplicate".to_string()),
                message: format!("Already Exists: Dataset {id}"),
            });
        }
        debug!(dataset = %id, region, "memory warehouse: dataset created");
        state.datasets.insert(id, region.to_string());
        Ok(())
    }

    fn get_table(&self, location: &WarehouseLocation) -> Lookup<TableInfo> {
        let id = location.table_path();
        let mut state = self.state();
        if let Err(e) = state.record(Call::GetTable { table: id.clone() }) {
            return Lookup::Error(e);
        }
        match state.tables.get(&id) {
            Some(t) => Lookup::Found(TableInfo {
                num_rows: Some(t.rows.len() as u64),
                id,
            }),
            None => Lookup::NotFound,
        }
    }

    fn create_table(&self, location: &WarehouseLocation, schema: &TableSchema) -> WarehouseResult<()> {
        let id = location.table_path();
        let mut state = self.state();
        state.record(Call::CreateTable {
            table: id.clone(),
            schema: schema.clone(),
        })?;
        if !state.datasets.contains_key(&location.dataset_path()) {
            return Err(WarehouseError::Api {
                status: 404,
                reason: Some("notFound".to_string()),
                message: format!("Not found: Dataset {}", location.dataset_path()),
            });
        }
        if state.tables.contains_key(&id) {
            return Err(WarehouseError::Api {
                status: 409,
                reason: Some("duplicate".to_string()),
                message: format!("Already Exists: Table {id}"),
            });
        }
        if let Some(dup) = schema.duplicate_column() {
            return Err(WarehouseError::Api {
                status: 400,
                reason: Some("invalid".to_string()),
                message: format!("Field {dup} already defined"),
            });
        }
        debug!(table = %id, columns = schema.len(), "memory warehouse: table created");
        state.tables.insert(
            id,
            StoredTable {
                schema: schema.clone(),
                rows: Vec::new(),
            },
        );
        Ok(())
    }

    fn submit_load(
        &self,
        location: &WarehouseLocation,
        data: &DataSet,
        disposition: WriteDisposition,
    ) -> WarehouseResult<JobHandle> {
        let table = location.table_path();
        let mut state = self.state();
        state.record(Call::SubmitLoad {
            table: table.clone(),
            rows: data.row_count(),
            disposition,
        })?;

        state.next_job += 1;
        let job_id = format!("memory_job_{}", state.next_job);
        let project = location.project().to_string();
        let location = state.datasets.get(&location.dataset_path()).cloned();
        state.jobs.insert(
            job_id.clone(),
            PendingJob {
                table,
                data: data.clone(),
                disposition,
            },
        );
        Ok(JobHandle {
            project,
            job_id,
            location,
        })
    }

    fn await_job(&self, job: &JobHandle, timeout: Option<Duration>) -> WarehouseResult<JobOutcome> {
        let mut state = self.state();
        state.record(Call::AwaitJob {
            job_id: job.job_id.clone(),
        })?;

        if state.stall_jobs {
            return Err(WarehouseError::JobTimedOut {
                job_id: job.job_id.clone(),
                waited: timeout.unwrap_or(Duration::ZERO),
            });
        }

        let pending = state.jobs.remove(&job.job_id).ok_or_else(|| WarehouseError::Api {
            status: 404,
            reason: Some("notFound".to_string()),
            message: format!("Not found: Job {}", job.job_id),
        })?;

        let failed = |message: String| WarehouseError::JobFailed {
            job_id: job.job_id.clone(),
            reason: Some("invalid".to_string()),
            message,
        };

        let Some(target) = state.tables.get_mut(&pending.table) else {
            return Err(WarehouseError::JobFailed {
                job_id: job.job_id.clone(),
                reason: Some("notFound".to_string()),
                message: format!("Not found: Table {}", pending.table),
            });
        };
        check_compatible(&target.schema, &pending.data).map_err(failed)?;

        let rows = pending.data.rows;
        let output_rows = rows.len() as u64;
        match pending.disposition {
            WriteDisposition::Append => target.rows.extend(rows),
            WriteDisposition::Truncate => target.rows = rows,
        }
        debug!(job_id = %job.job_id, table = %pending.table, output_rows, "memory warehouse: job done");
        Ok(JobOutcome {
            output_rows: Some(output_rows),
        })
    }
}
