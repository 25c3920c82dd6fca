use std::path::PathBuf;

/// Progress events emitted during a load run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadEvent {
    SourceRead {
        path: PathBuf,
        rows: usize,
        columns: usize,
    },
    DatasetExists {
        dataset: String,
        region: Option<String>,
    },
    DatasetCreated { dataset: String, region: String },
    TableExists { table: String, rows: Option<u64> },
    TableCreated { table: String, columns: usize },
    LoadSubmitted { table: String, job_id: String },
    LoadCompleted {
        table: String,
        job_id: String,
        rows: usize,
    },
}

/// Observer hook for load events.
pub trait LoadObserver: Send + Sync {
    fn on_event(&self, event: &LoadEvent);
}

/// Prints one human-readable status line per event to stdout.
#[derive(Debug, Default)]
pub struct ConsoleObserver;

impl LoadObserver for ConsoleObserver {
    fn on_event(&self, event: &LoadEvent) {
        println!("{}", status_line(event));
    }
}

/// Render `event` as a status line.
pub fn status_line(event: &LoadEvent) -> String {
    match event {
        LoadEvent::SourceRead {
            path,
            rows,
            columns,
        } => format!("Read {rows} rows x {columns} columns from {}", path.display()),
        LoadEvent::DatasetExists { dataset, region } => match region {
            Some(region) => format!("Dataset {dataset} already exists in {region}"),
            None => format!("Dataset {dataset} already exists"),
        },
        LoadEvent::DatasetCreated { dataset, region } => {
            format!("Created dataset {dataset} in {region}")
        }
        LoadEvent::TableExists { table, rows } => match rows {
            Some(rows) => format!("Table {table} already exists with {rows} rows"),
            None => format!("Table {table} already exists"),
        },
        LoadEvent::TableCreated { table, columns } => {
            format!("Created table {table} with {columns} columns")
        }
        LoadEvent::LoadSubmitted { table, job_id } => {
            format!("Submitted load job {job_id} into {table}")
        }
        LoadEvent::LoadCompleted { table, rows, .. } => format!("Loaded {rows} rows into {table}"),
    }
}
