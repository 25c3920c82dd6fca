//! Run configuration, built once at startup and passed by reference.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::ingestion::SourceOptions;

/// Storage region used when a dataset has to be created and none was configured.
pub const DEFAULT_REGION: &str = "EU";

/// Fully qualified destination table: `project.dataset.table`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarehouseLocation {
    project: String,
    dataset: String,
    table: String,
}

impl WarehouseLocation {
    /// Create a location, rejecting empty identifiers.
    pub fn new(
        project: impl Into<String>,
        dataset: impl Into<String>,
        table: impl Into<String>,
    ) -> Result<Self> {
        let loc = Self {
            project: project.into().trim().to_string(),
            dataset: dataset.into().trim().to_string(),
            table: table.into().trim().to_string(),
        };
        for (what, value) in [
            ("project", &loc.project),
            ("dataset", &loc.dataset),
            ("table", &loc.table),
        ] {
            if value.is_empty() {
                return Err(Error::Config {
                    message: format!("{what} identifier must not be empty"),
                });
            }
        }
        Ok(loc)
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn dataset(&self) -> &str {
        &self.dataset
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// `project.dataset`
    pub fn dataset_path(&self) -> String {
        format!("{}.{}", self.project, self.dataset)
    }

    /// `project.dataset.table`
    pub fn table_path(&self) -> String {
        format!("{}.{}.{}", self.project, self.dataset, self.table)
    }
}

impl fmt::Display for WarehouseLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.table_path())
    }
}

/// Settings consumed by [`crate::orchestrator::Loader`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadSettings {
    /// Destination table.
    pub location: WarehouseLocation,
    /// Region used when the dataset must be created.
    pub region: String,
    /// Upper bound on the load job wait. `None` waits indefinitely.
    pub job_timeout: Option<Duration>,
}

impl LoadSettings {
    /// Settings with the default region and no job timeout.
    pub fn new(location: WarehouseLocation) -> Self {
        Self {
            location,
            region: DEFAULT_REGION.to_string(),
            job_timeout: None,
        }
    }
}

/// Settings for the HTTP warehouse client.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientSettings {
    /// API root, e.g. `https://bigquery.googleapis.com`.
    pub endpoint: String,
    /// Bearer token. When `None`, the client asks `gcloud` for one.
    pub access_token: Option<String>,
    /// Delay between job status polls.
    pub poll_interval: Duration,
    /// Per-request HTTP timeout.
    pub request_timeout: Duration,
}

impl fmt::Debug for ClientSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientSettings")
            .field("endpoint", &self.endpoint)
            .field("access_token_set", &self.access_token.is_some())
            .field("poll_interval", &self.poll_interval)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            endpoint: crate::warehouse::bigquery::DEFAULT_ENDPOINT.to_string(),
            access_token: None,
            poll_interval: Duration::from_secs(1),
            request_timeout: Duration::from_secs(300),
        }
    }
}

/// Everything a run needs.
#[derive(Debug, Clone)]
pub struct Config {
    /// Spreadsheet to load.
    pub source: PathBuf,
    /// How to read the spreadsheet.
    pub source_options: SourceOptions,
    /// Destination and provisioning settings.
    pub load: LoadSettings,
    /// Warehouse client settings.
    pub client: ClientSettings,
    /// Run against an in-memory warehouse instead of the real service.
    pub dry_run: bool,
}
