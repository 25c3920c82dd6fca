//! `sheetload` binary.

use std::error::Error as _;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sheetload::cli::Cli;
use sheetload::orchestrator::{ConsoleObserver, LoadObserver, LoadReport};
use sheetload::warehouse::{BigQueryClient, MemoryWarehouse, Warehouse};
use sheetload::Error;

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    match execute(&cli) {
        Ok(report) => {
            println!(
                "Done: job {} appended {} rows",
                report.load.job_id,
                report
                    .load
                    .output_rows
                    .unwrap_or(report.load.rows_submitted as u64)
            );
            ExitCode::SUCCESS
        }
        Err(err) if err.is_graceful() => {
            println!("{err}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error: {err}");
            let mut cause = err.source();
            while let Some(c) = cause {
                eprintln!("  caused by: {c}");
                cause = c.source();
            }
            ExitCode::from(err.exit_code())
        }
    }
}

fn execute(cli: &Cli) -> sheetload::Result<LoadReport> {
    let config = cli.config()?;
    let observer: Arc<dyn LoadObserver> = Arc::new(ConsoleObserver);

    // The source is read before any credentials are resolved.
    let data = sheetload::read(&config, Some(observer.as_ref()))?;

    let warehouse: Box<dyn Warehouse> = if config.dry_run {
        println!("Dry run: loading into an in-memory warehouse");
        Box::new(MemoryWarehouse::new())
    } else {
        let client = BigQueryClient::new(&config.client).map_err(|e| Error::Config {
            message: format!("cannot create BigQuery client: {e}"),
        })?;
        Box::new(client)
    };

    sheetload::load(&config, &data, warehouse, Some(observer))
}
