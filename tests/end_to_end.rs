use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use rust_xlsxwriter::Workbook;

use sheetload::config::{ClientSettings, Config, LoadSettings, WarehouseLocation};
use sheetload::error::Error;
use sheetload::ingestion::SourceOptions;
use sheetload::orchestrator::{LoadEvent, LoadObserver, ResourceState};
use sheetload::types::Value;
use sheetload::warehouse::MemoryWarehouse;

fn tmp_file(name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("sheetload-e2e-{name}-{nanos}.xlsx"))
}

fn config(source: PathBuf) -> Config {
    Config {
        source,
        source_options: SourceOptions::default(),
        load: LoadSettings::new(WarehouseLocation::new("proj", "inbox", "uploads").unwrap()),
        client: ClientSettings::default(),
        dry_run: true,
    }
}

#[derive(Default)]
struct Events(Mutex<Vec<LoadEvent>>);

impl LoadObserver for Events {
    fn on_event(&self, event: &LoadEvent) {
        self.0.lock().unwrap().push(event.clone());
    }
}

#[test]
fn workbook_is_provisioned_and_loaded() {
    let path = tmp_file("people");
    let mut wb = Workbook::new();
    let ws = wb.add_worksheet();
    ws.write_string(0, 0, "name").unwrap();
    ws.write_string(0, 1, "score").unwrap();
    ws.write_string(1, 0, "Ada").unwrap();
    ws.write_number(1, 1, 98.5).unwrap();
    ws.write_string(2, 0, "Grace").unwrap();
    ws.write_number(2, 1, 87).unwrap();
    wb.save(&path).unwrap();

    let cfg = config(path.clone());
    let wh = MemoryWarehouse::new();
    let events = Arc::new(Events::default());

    let report = sheetload::run(&cfg, &wh, Some(events.clone() as Arc<dyn LoadObserver>)).unwrap();
    assert_eq!(report.dataset, ResourceState::Created);
    assert_eq!(report.table, ResourceState::Created);
    assert_eq!(report.load.rows_submitted, 2);

    let rows = wh.table_rows(&cfg.load.location).unwrap();
    assert_eq!(rows[1], vec![Value::Utf8("Grace".to_string()), Value::Float64(87.0)]);

    let events = events.0.lock().unwrap();
    assert_eq!(
        events[0],
        LoadEvent::SourceRead {
            path: path.clone(),
            rows: 2,
            columns: 2,
        }
    );
    assert!(matches!(events.last(), Some(LoadEvent::LoadCompleted { rows: 2, .. })));

    let _ = std::fs::remove_file(path);
}

#[test]
fn empty_spreadsheet_makes_no_warehouse_calls() {
    let path = tmp_file("empty");
    let mut wb = Workbook::new();
    wb.add_worksheet();
    wb.save(&path).unwrap();

    let wh = MemoryWarehouse::new();
    let err = sheetload::run(&config(path.clone()), &wh, None).unwrap_err();

    assert!(matches!(err, Error::EmptyDataset { .. }));
    assert!(err.is_graceful());
    assert_eq!(err.exit_code(), 0);
    assert!(wh.calls().is_empty());

    let _ = std::fs::remove_file(path);
}

#[test]
fn unreadable_source_makes_no_warehouse_calls() {
    let wh = MemoryWarehouse::new();
    let err = sheetload::run(&config(tmp_file("missing")), &wh, None).unwrap_err();

    assert!(matches!(err, Error::Read { .. }));
    assert!(!err.is_graceful());
    assert_eq!(err.exit_code(), 3);
    assert!(wh.calls().is_empty());
}
