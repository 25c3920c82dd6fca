use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use rust_xlsxwriter::{ExcelDateTime, Format, Workbook};

use sheetload::error::{Error, ReadError};
use sheetload::ingestion::{read_source, SheetSelection, SourceOptions};
use sheetload::schema::{table_schema_for, WarehouseType};
use sheetload::types::{DataType, Value};

fn tmp_file(name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("sheetload-{name}-{nanos}.xlsx"))
}

fn write_orders_xlsx(path: &PathBuf) {
    let mut wb = Workbook::new();
    let ts_format = Format::new().set_num_format("yyyy-mm-dd hh:mm:ss");
    let ws = wb.add_worksheet();
    ws.set_name("Orders").unwrap();

    ws.write_string(0, 0, "id").unwrap();
    ws.write_string(0, 1, "amount").unwrap();
    ws.write_string(0, 2, "ts").unwrap();

    let stamps = ["2024-01-01 09:00:00", "2024-01-02 10:30:00", "2024-01-03 23:59:59"];
    for (i, stamp) in stamps.iter().enumerate() {
        let row = i as u32 + 1;
        ws.write_number(row, 0, (i + 1) as f64).unwrap();
        let dt = ExcelDateTime::parse_from_str(stamp).unwrap();
        ws.write_datetime_with_format(row, 2, &dt, &ts_format).unwrap();
    }
    ws.write_number(1, 1, 1.5).unwrap();
    ws.write_number(2, 1, 2.25).unwrap();

    wb.save(path).unwrap();
}

#[test]
fn orders_sheet_infers_integer_float_and_timestamp() {
    let path = tmp_file("orders");
    write_orders_xlsx(&path);

    let ds = read_source(&path, &SourceOptions::default()).unwrap();
    assert_eq!(ds.row_count(), 3);
    assert_eq!(
        ds.schema.fields.iter().map(|f| f.data_type).collect::<Vec<_>>(),
        vec![DataType::Int64, DataType::Float64, DataType::Timestamp]
    );
    assert_eq!(ds.rows[0][0], Value::Int64(1));
    assert_eq!(ds.rows[1][1], Value::Float64(2.25));
    assert_eq!(ds.rows[2][1], Value::Null);

    let schema = table_schema_for(&ds);
    let pairs: Vec<(&str, WarehouseType)> = schema
        .columns
        .iter()
        .map(|c| (c.name.as_str(), c.field_type))
        .collect();
    assert_eq!(
        pairs,
        vec![
            ("id", WarehouseType::Integer),
            ("amount", WarehouseType::Float),
            ("ts", WarehouseType::Timestamp),
        ]
    );

    let _ = std::fs::remove_file(path);
}

#[test]
fn empty_workbook_is_graceful() {
    let path = tmp_file("empty");
    let mut wb = Workbook::new();
    wb.add_worksheet();
    wb.save(&path).unwrap();

    let err = read_source(&path, &SourceOptions::default()).unwrap_err();
    assert!(matches!(err, Error::EmptyDataset { .. }));
    assert!(err.is_graceful());

    let _ = std::fs::remove_file(path);
}

#[test]
fn header_only_sheet_is_graceful() {
    let path = tmp_file("header-only");
    let mut wb = Workbook::new();
    let ws = wb.add_worksheet();
    ws.write_string(0, 0, "id").unwrap();
    ws.write_string(0, 1, "name").unwrap();
    wb.save(&path).unwrap();

    let err = read_source(&path, &SourceOptions::default()).unwrap_err();
    assert!(matches!(err, Error::EmptyDataset { .. }));

    let _ = std::fs::remove_file(path);
}

#[test]
fn named_sheet_is_read_and_missing_sheet_fails() {
    let path = tmp_file("sheets");
    let mut wb = Workbook::new();
    let first = wb.add_worksheet();
    first.set_name("Summary").unwrap();
    first.write_string(0, 0, "note").unwrap();
    first.write_string(1, 0, "ignore me").unwrap();

    let second = wb.add_worksheet();
    second.set_name("Data").unwrap();
    second.write_string(0, 0, "name").unwrap();
    second.write_string(0, 1, "active").unwrap();
    second.write_string(1, 0, "Ada").unwrap();
    second.write_boolean(1, 1, true).unwrap();
    second.write_string(2, 0, "Grace").unwrap();
    second.write_boolean(2, 1, false).unwrap();
    wb.save(&path).unwrap();

    let opts = SourceOptions {
        sheet: SheetSelection::Sheet("Data".to_string()),
        ..Default::default()
    };
    let ds = read_source(&path, &opts).unwrap();
    assert_eq!(ds.schema.field_names().collect::<Vec<_>>(), vec!["name", "active"]);
    assert_eq!(ds.schema.fields[1].data_type, DataType::Bool);
    assert_eq!(ds.rows[1][1], Value::Bool(false));

    let schema = table_schema_for(&ds);
    assert_eq!(schema.columns[1].field_type, WarehouseType::String);

    let missing = SourceOptions {
        sheet: SheetSelection::Sheet("Nope".to_string()),
        ..Default::default()
    };
    let err = read_source(&path, &missing).unwrap_err();
    match err {
        Error::Read {
            source: ReadError::SheetNotFound { sheet, available },
            ..
        } => {
            assert_eq!(sheet, "Nope");
            assert_eq!(available, vec!["Summary".to_string(), "Data".to_string()]);
        }
        other => panic!("expected SheetNotFound, got {other:?}"),
    }

    let _ = std::fs::remove_file(path);
}

#[test]
fn duplicate_and_blank_headers_are_renamed() {
    let path = tmp_file("headers");
    let mut wb = Workbook::new();
    let ws = wb.add_worksheet();
    ws.write_string(0, 0, "value").unwrap();
    ws.write_string(0, 1, "value").unwrap();
    ws.write_number(0, 3, 2024).unwrap();
    for col in 0..4u16 {
        ws.write_number(1, col, f64::from(col)).unwrap();
    }
    wb.save(&path).unwrap();

    let ds = read_source(&path, &SourceOptions::default()).unwrap();
    assert_eq!(
        ds.schema.field_names().collect::<Vec<_>>(),
        vec!["value", "value.1", "Unnamed: 2", "2024"]
    );

    let _ = std::fs::remove_file(path);
}

#[test]
fn mixed_column_falls_back_to_text() {
    let path = tmp_file("mixed");
    let mut wb = Workbook::new();
    let ws = wb.add_worksheet();
    ws.write_string(0, 0, "code").unwrap();
    ws.write_number(1, 0, 7).unwrap();
    ws.write_string(2, 0, "A7").unwrap();
    wb.save(&path).unwrap();

    let ds = read_source(&path, &SourceOptions::default()).unwrap();
    assert_eq!(ds.schema.fields[0].data_type, DataType::Utf8);
    assert_eq!(ds.rows[0][0], Value::Utf8("7".to_string()));
    assert_eq!(ds.rows[1][0], Value::Utf8("A7".to_string()));

    let _ = std::fs::remove_file(path);
}
