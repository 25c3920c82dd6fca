use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

use rust_xlsxwriter::Workbook;

const ENV_VARS: &[&str] = &[
    "SHEETLOAD_PROJECT",
    "SHEETLOAD_DATASET",
    "SHEETLOAD_TABLE",
    "SHEETLOAD_SOURCE",
    "SHEETLOAD_REGION",
    "SHEETLOAD_SHEET",
    "SHEETLOAD_TIMEOUT_SECS",
    "GOOGLE_OAUTH_ACCESS_TOKEN",
    "BIGQUERY_API_ENDPOINT",
    "RUST_LOG",
];

fn tmp_file(name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("sheetload-cli-{name}-{nanos}.xlsx"))
}

/// The binary with no inherited configuration, no token and no `gcloud` on `PATH`.
fn sheetload() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_sheetload"));
    for var in ENV_VARS {
        cmd.env_remove(var);
    }
    cmd.env("PATH", "/nonexistent");
    cmd
}

fn with_target<'a>(cmd: &'a mut Command, source: &Path) -> &'a mut Command {
    cmd.args(["--project", "proj", "--dataset", "inbox", "--table", "uploads"])
        .arg("--source")
        .arg(source)
}

fn write_people(path: &Path) {
    let mut wb = Workbook::new();
    let ws = wb.add_worksheet();
    ws.write_string(0, 0, "name").unwrap();
    ws.write_string(0, 1, "score").unwrap();
    ws.write_string(1, 0, "Ada").unwrap();
    ws.write_number(1, 1, 98.5).unwrap();
    ws.write_string(2, 0, "Grace").unwrap();
    ws.write_number(2, 1, 87).unwrap();
    wb.save(path).unwrap();
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn empty_workbook_exits_zero_without_credentials() {
    let path = tmp_file("empty");
    let mut wb = Workbook::new();
    wb.add_worksheet();
    wb.save(&path).unwrap();

    let output = with_target(&mut sheetload(), &path).output().unwrap();
    assert_eq!(output.status.code(), Some(0), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert!(!stdout(&output).contains("Done"));

    let _ = std::fs::remove_file(path);
}

#[test]
fn missing_source_exits_with_read_code() {
    let path = tmp_file("missing");

    let output = with_target(&mut sheetload(), &path).output().unwrap();
    assert_eq!(output.status.code(), Some(3));
    assert!(String::from_utf8_lossy(&output.stderr).contains("error:"));
}

#[test]
fn missing_identifier_exits_with_config_code() {
    let path = tmp_file("people");
    write_people(&path);

    let output = sheetload()
        .args(["--project", "proj", "--dataset", "inbox", "--dry-run"])
        .arg("--source")
        .arg(&path)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));

    let _ = std::fs::remove_file(path);
}

#[test]
fn dry_run_loads_into_memory() {
    let path = tmp_file("people");
    write_people(&path);

    let output = with_target(&mut sheetload(), &path)
        .arg("--dry-run")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(0), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let out = stdout(&output);
    assert!(out.contains("Read 2 rows x 2 columns"));
    assert!(out.contains("Created dataset proj.inbox in EU"));
    assert!(out.contains("Loaded 2 rows into proj.inbox.uploads"));
    assert!(out.contains("appended 2 rows"));

    let _ = std::fs::remove_file(path);
}

#[test]
fn destination_and_source_fall_back_to_environment() {
    let path = tmp_file("people");
    write_people(&path);

    let output = sheetload()
        .env("SHEETLOAD_PROJECT", "envproj")
        .env("SHEETLOAD_DATASET", "envds")
        .env("SHEETLOAD_TABLE", "envtbl")
        .env("SHEETLOAD_SOURCE", &path)
        .env("SHEETLOAD_REGION", "us-east1")
        .arg("--dry-run")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(0), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let out = stdout(&output);
    assert!(out.contains("Created dataset envproj.envds in us-east1"));
    assert!(out.contains("Loaded 2 rows into envproj.envds.envtbl"));

    let _ = std::fs::remove_file(path);
}
