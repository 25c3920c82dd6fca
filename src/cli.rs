//! Command-line arguments.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::config::{ClientSettings, Config, LoadSettings, WarehouseLocation, DEFAULT_REGION};
use crate::error::{Error, Result};
use crate::ingestion::{SheetSelection, SourceOptions};
use crate::warehouse::bigquery::DEFAULT_ENDPOINT;

/// Load a spreadsheet into a BigQuery table, creating the dataset and table when absent.
#[derive(Debug, Parser)]
#[command(name = "sheetload")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Google Cloud project.
    #[arg(long, env = "SHEETLOAD_PROJECT")]
    pub project: Option<String>,

    /// Destination dataset.
    #[arg(long, env = "SHEETLOAD_DATASET")]
    pub dataset: Option<String>,

    /// Destination table.
    #[arg(long, env = "SHEETLOAD_TABLE")]
    pub table: Option<String>,

    /// Spreadsheet (.xlsx, .xls, .ods, ...) or CSV file to load.
    #[arg(long, env = "SHEETLOAD_SOURCE")]
    pub source: Option<PathBuf>,

    /// Region for a newly created dataset.
    #[arg(long, env = "SHEETLOAD_REGION", default_value = DEFAULT_REGION)]
    pub region: String,

    /// Sheet to read (defaults to the first sheet).
    #[arg(long, env = "SHEETLOAD_SHEET")]
    pub sheet: Option<String>,

    /// Give up waiting for the load job after this many seconds.
    #[arg(long, env = "SHEETLOAD_TIMEOUT_SECS")]
    pub timeout_secs: Option<u64>,

    /// OAuth access token. Falls back to `gcloud auth application-default print-access-token`.
    #[arg(long, env = "GOOGLE_OAUTH_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,

    /// BigQuery API root.
    #[arg(long, env = "BIGQUERY_API_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    pub api_endpoint: String,

    /// Read, infer and load against an in-memory warehouse instead of BigQuery.
    #[arg(long)]
    pub dry_run: bool,
}

impl Cli {
    /// Build the run configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if an identifier or the source path is missing or empty.
    pub fn config(&self) -> Result<Config> {
        let location = WarehouseLocation::new(
            self.project.clone().unwrap_or_default(),
            self.dataset.clone().unwrap_or_default(),
            self.table.clone().unwrap_or_default(),
        )?;

        let source = match &self.source {
            Some(p) if !p.as_os_str().is_empty() => p.clone(),
            _ => {
                return Err(Error::Config {
                    message: "no source file given (use --source or SHEETLOAD_SOURCE)".to_string(),
                });
            }
        };

        let region = self.region.trim();
        if region.is_empty() {
            return Err(Error::Config {
                message: "region must not be empty".to_string(),
            });
        }

        let sheet = match self.sheet.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => SheetSelection::Sheet(name.to_string()),
            _ => SheetSelection::First,
        };

        let mut load = LoadSettings::new(location);
        load.region = region.to_string();
        load.job_timeout = self.timeout_secs.map(Duration::from_secs);

        Ok(Config {
            source,
            source_options: SourceOptions {
                format: None,
                sheet,
            },
            load,
            client: ClientSettings {
                endpoint: self.api_endpoint.clone(),
                access_token: self.access_token.clone(),
                ..ClientSettings::default()
            },
            dry_run: self.dry_run,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REQUIRED: [&str; 9] = [
        "sheetload",
        "--project",
        "proj",
        "--dataset",
        "ds",
        "--table",
        "tbl",
        "--source",
        "data.xlsx",
    ];

    #[test]
    fn config_from_flags() {
        let mut args = REQUIRED.to_vec();
        args.extend([
            "--region",
            "us-east1",
            "--sheet",
            "Orders",
            "--timeout-secs",
            "30",
            "--access-token",
            "tok",
            "--api-endpoint",
            "http://localhost:9050",
            "--dry-run",
        ]);
        let config = Cli::parse_from(args).config().unwrap();

        assert_eq!(config.source, PathBuf::from("data.xlsx"));
        assert_eq!(config.load.location.table_path(), "proj.ds.tbl");
        assert_eq!(config.load.region, "us-east1");
        assert_eq!(config.load.job_timeout, Some(Duration::from_secs(30)));
        assert_eq!(
            config.source_options.sheet,
            SheetSelection::Sheet("Orders".to_string())
        );
        assert_eq!(config.client.access_token.as_deref(), Some("tok"));
        assert_eq!(config.client.endpoint, "http://localhost:9050");
        assert!(config.dry_run);
    }

    #[test]
    fn empty_identifier_is_config_error() {
        let mut args = REQUIRED.to_vec();
        args[4] = " ";
        let err = Cli::parse_from(args).config().unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn blank_sheet_means_first() {
        let mut args = REQUIRED.to_vec();
        args.extend(["--sheet", ""]);
        let config = Cli::parse_from(args).config().unwrap();
        assert_eq!(config.source_options.sheet, SheetSelection::First);
    }
}
